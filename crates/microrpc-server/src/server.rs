//! Server lifecycle: start, accept loop, stop.
//!
//! States move `Created → Starting → Started → Stopping → Stopped`; there
//! is no restart. `start` spawns two tasks: the accept loop, and a shutdown
//! waiter parked on a one-shot rendezvous. `stop` hands the waiter a reply
//! channel; the waiter closes the listener, waits for the accept loop to
//! exit (or aborts it if the close failed) and answers with the close result.

use std::sync::Arc;
use std::time::Instant;

use metrics::counter;
use microrpc_transport::{Listener, TransportError};
use parking_lot::{Mutex, RwLock};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::dispatcher::ConnectionDispatcher;
use crate::errors::{RegisterError, ServerError};
use crate::handler::{Handler, Receiver};
use crate::health::{HEALTH_METHOD, HealthHandler};
use crate::metrics::RPC_CONNECTIONS_TOTAL;
use crate::options::{Options, ServerOption};
use crate::registry::MethodRegistry;

type CloseReply = oneshot::Sender<Result<(), TransportError>>;
type Outcome = Result<(), ServerError>;

/// Observable lifecycle state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ServerState {
    /// Built, never started (or a start attempt failed).
    Created,
    /// `start` is binding the listener.
    Starting,
    /// Accepting connections.
    Started,
    /// `stop` is closing the listener.
    Stopping,
    /// Stopped for good.
    Stopped,
}

enum Lifecycle {
    Created,
    Starting,
    Started { exit: oneshot::Sender<CloseReply> },
    Stopping { outcome: watch::Receiver<Option<Outcome>> },
    Stopped { outcome: Outcome },
}

impl Lifecycle {
    fn state(&self) -> ServerState {
        match self {
            Self::Created => ServerState::Created,
            Self::Starting => ServerState::Starting,
            Self::Started { .. } => ServerState::Started,
            Self::Stopping { .. } => ServerState::Stopping,
            Self::Stopped { .. } => ServerState::Stopped,
        }
    }
}

enum StopStep {
    Perform {
        exit: oneshot::Sender<CloseReply>,
        outcome: watch::Sender<Option<Outcome>>,
    },
    Wait(watch::Receiver<Option<Outcome>>),
    Done(Outcome),
}

/// An embeddable RPC server.
pub struct RpcServer {
    options: Options,
    registry: Arc<MethodRegistry>,
    address: RwLock<String>,
    lifecycle: Mutex<Lifecycle>,
}

impl RpcServer {
    /// Build a server from default config plus `options`.
    pub fn new(options: impl IntoIterator<Item = ServerOption>) -> Self {
        Self::from_config(&ServerConfig::default(), options)
    }

    /// Build a server from `config`, then apply `options` on top.
    pub fn from_config(
        config: &ServerConfig,
        options: impl IntoIterator<Item = ServerOption>,
    ) -> Self {
        Self {
            options: Options::from_config(config).apply(options),
            registry: Arc::new(MethodRegistry::new()),
            address: RwLock::new(String::new()),
            lifecycle: Mutex::new(Lifecycle::Created),
        }
    }

    /// Resolved options.
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// The handler registry.
    pub fn registry(&self) -> &Arc<MethodRegistry> {
        &self.registry
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ServerState {
        self.lifecycle.lock().state()
    }

    /// Bound address; empty until `start` has bound the listener.
    pub fn address(&self) -> String {
        self.address.read().clone()
    }

    // ── Registration ────────────────────────────────────────────────

    /// Wrap a handler for registration under its type-derived name.
    pub fn new_receiver<H: Handler>(&self, handler: H) -> Receiver {
        Receiver::new(Arc::new(handler))
    }

    /// Wrap a handler for registration under `name`.
    pub fn new_named_receiver<H: Handler>(&self, name: impl Into<String>, handler: H) -> Receiver {
        Receiver::named(name, Arc::new(handler))
    }

    /// Register a receiver. A service registered under an existing name
    /// replaces it.
    pub fn register(&self, receiver: &Receiver) -> Result<(), RegisterError> {
        let _ = self.registry.register(receiver)?;
        Ok(())
    }

    // ── Lifecycle ───────────────────────────────────────────────────

    /// Bind the transport and start serving.
    ///
    /// A start that fails, or is dropped before binding completes, leaves
    /// the server in `Created` so it can be started again.
    pub async fn start(&self) -> Result<(), ServerError> {
        let guard = {
            let mut state = self.lifecycle.lock();
            match &*state {
                Lifecycle::Created => {}
                Lifecycle::Stopping { .. } | Lifecycle::Stopped { .. } => {
                    return Err(ServerError::Stopped);
                }
                Lifecycle::Starting | Lifecycle::Started { .. } => {
                    return Err(ServerError::AlreadyStarted);
                }
            }
            *state = Lifecycle::Starting;
            StartGuard {
                lifecycle: &self.lifecycle,
                armed: true,
            }
        };

        self.register_health()?;

        let transport = self.options.transport();
        let listener = transport
            .listen(self.options.address())
            .await
            .map_err(|err| ServerError::Bind(Arc::new(err)))?;

        let address = listener.addr();
        *self.address.write() = address.clone();
        info!(%address, transport = transport.name(), "rpc server listening");

        let dispatcher =
            ConnectionDispatcher::new(Arc::clone(&self.registry), self.options.codecs().clone());
        let accept = tokio::spawn(accept_loop(Arc::clone(&listener), dispatcher));
        let (exit_tx, exit_rx) = oneshot::channel();
        let _waiter = tokio::spawn(shutdown_waiter(listener, accept, exit_rx));

        guard.finish(Lifecycle::Started { exit: exit_tx });
        Ok(())
    }

    /// Stop accepting connections and close the listener.
    ///
    /// In-flight requests are neither awaited nor cancelled. The first call
    /// performs the close; concurrent and later calls get its recorded
    /// result. Calling before `start` returns [`ServerError::NotStarted`].
    /// If the performing call is dropped before the close is reported, the
    /// listener is still closed and the recorded outcome is
    /// [`ServerError::ShutdownInterrupted`].
    pub async fn stop(&self) -> Result<(), ServerError> {
        let step = {
            let mut state = self.lifecycle.lock();
            let (outcome_tx, outcome_rx) = watch::channel(None);
            match std::mem::replace(&mut *state, Lifecycle::Stopping { outcome: outcome_rx }) {
                Lifecycle::Started { exit } => StopStep::Perform {
                    exit,
                    outcome: outcome_tx,
                },
                previous => {
                    let step = match &previous {
                        Lifecycle::Stopping { outcome } => StopStep::Wait(outcome.clone()),
                        Lifecycle::Stopped { outcome } => StopStep::Done(outcome.clone()),
                        Lifecycle::Created | Lifecycle::Starting | Lifecycle::Started { .. } => {
                            StopStep::Done(Err(ServerError::NotStarted))
                        }
                    };
                    *state = previous;
                    step
                }
            }
        };

        match step {
            StopStep::Done(outcome) => outcome,
            StopStep::Wait(outcome) => wait_for_outcome(outcome).await,
            StopStep::Perform { exit, outcome } => {
                let mut guard = StopGuard {
                    lifecycle: &self.lifecycle,
                    outcome: Some(outcome),
                };
                let result = close_listener(exit).await;
                guard.record(result.clone());
                match &result {
                    Ok(()) => info!(address = %self.address(), "rpc server stopped"),
                    Err(err) => warn!(error = %err, "rpc server stopped with error"),
                }
                result
            }
        }
    }

    fn register_health(&self) -> Result<(), RegisterError> {
        let service = self.options.health_service();
        let handler = HealthHandler::new(Instant::now());
        let _ = self
            .registry
            .register(&Receiver::named(service, Arc::new(handler)))?;
        let path = self.options.health_path();
        if !path.is_empty() {
            self.registry
                .add_route(path, format!("{service}.{HEALTH_METHOD}"))?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for RpcServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcServer")
            .field("address", &self.address())
            .field("state", &self.state())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

// ── Cancellation guards ─────────────────────────────────────────────

/// Puts the lifecycle back to `Created` unless `start` reaches `Started`.
struct StartGuard<'a> {
    lifecycle: &'a Mutex<Lifecycle>,
    armed: bool,
}

impl StartGuard<'_> {
    fn finish(mut self, started: Lifecycle) {
        *self.lifecycle.lock() = started;
        self.armed = false;
    }
}

impl Drop for StartGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            *self.lifecycle.lock() = Lifecycle::Created;
        }
    }
}

/// Records the stop outcome exactly once, falling back to
/// [`ServerError::ShutdownInterrupted`] when the stopping call is dropped.
struct StopGuard<'a> {
    lifecycle: &'a Mutex<Lifecycle>,
    outcome: Option<watch::Sender<Option<Outcome>>>,
}

impl StopGuard<'_> {
    fn record(&mut self, result: Outcome) {
        let Some(outcome) = self.outcome.take() else {
            return;
        };
        *self.lifecycle.lock() = Lifecycle::Stopped {
            outcome: result.clone(),
        };
        let _ = outcome.send(Some(result));
    }
}

impl Drop for StopGuard<'_> {
    fn drop(&mut self) {
        if self.outcome.is_some() {
            warn!("stop dropped before the listener reported closure");
            self.record(Err(ServerError::ShutdownInterrupted));
        }
    }
}

/// Hand the shutdown waiter a reply channel and wait for the close result.
async fn close_listener(exit: oneshot::Sender<CloseReply>) -> Outcome {
    let (reply_tx, reply_rx) = oneshot::channel();
    if exit.send(reply_tx).is_err() {
        return Err(ServerError::ShutdownInterrupted);
    }
    match reply_rx.await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(ServerError::Close(Arc::new(err))),
        Err(_) => Err(ServerError::ShutdownInterrupted),
    }
}

async fn wait_for_outcome(mut outcome: watch::Receiver<Option<Outcome>>) -> Outcome {
    match outcome.wait_for(Option::is_some).await {
        Ok(recorded) => recorded
            .clone()
            .unwrap_or(Err(ServerError::ShutdownInterrupted)),
        Err(_) => Err(ServerError::ShutdownInterrupted),
    }
}

async fn accept_loop(listener: Arc<dyn Listener>, dispatcher: ConnectionDispatcher) {
    loop {
        match listener.accept().await {
            Ok(socket) => {
                counter!(RPC_CONNECTIONS_TOTAL).increment(1);
                let dispatcher = dispatcher.clone();
                let _ = tokio::spawn(async move { dispatcher.serve(socket).await });
            }
            Err(err) if err.is_closed() => {
                debug!("listener closed, accept loop exiting");
                return;
            }
            Err(err) => {
                warn!(error = %err, "accept failed, accept loop exiting");
                return;
            }
        }
    }
}

/// Park until `stop` sends a reply channel (or the server is dropped), then
/// close the listener and report.
///
/// The accept loop is only awaited after a clean close; a failed close may
/// leave `accept` pending forever, so the loop is aborted instead.
async fn shutdown_waiter(
    listener: Arc<dyn Listener>,
    accept: JoinHandle<()>,
    exit: oneshot::Receiver<CloseReply>,
) {
    let reply = exit.await.ok();
    let result = listener.close().await;
    if result.is_ok() {
        if let Err(err) = accept.await {
            warn!(error = %err, "accept loop task failed");
        }
    } else {
        accept.abort();
    }
    match reply {
        Some(reply) => {
            let _ = reply.send(result);
        }
        None => debug!("server dropped, listener closed"),
    }
}
