//! In-process transport backed by `tokio::sync::mpsc` channels.
//!
//! Clones of a [`MemoryTransport`] share one address table, so a server and
//! its clients must be handed clones of the same instance.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use microrpc_core::Message;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{Listener, Socket, Transport, TransportError};

/// Pending connections a listener buffers before `dial` waits.
const ACCEPT_BACKLOG: usize = 128;
/// Messages buffered per socket direction.
const SOCKET_BUFFER: usize = 16;

/// In-memory transport.
#[derive(Clone, Default)]
pub struct MemoryTransport {
    hub: Arc<Hub>,
}

#[derive(Default)]
struct Hub {
    listeners: Mutex<HashMap<String, mpsc::Sender<MemorySocket>>>,
    next_id: AtomicU64,
}

impl MemoryTransport {
    /// Create a transport with an empty address table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live listeners.
    pub fn listener_count(&self) -> usize {
        self.hub.listeners.lock().len()
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn listen(&self, address: &str) -> Result<Arc<dyn Listener>, TransportError> {
        let address = if address.is_empty() {
            let id = self.hub.next_id.fetch_add(1, Ordering::Relaxed);
            format!("memory-{id}")
        } else {
            address.to_owned()
        };

        let (tx, rx) = mpsc::channel(ACCEPT_BACKLOG);
        {
            let mut listeners = self.hub.listeners.lock();
            if listeners.contains_key(&address) {
                return Err(TransportError::AddressInUse { address });
            }
            let _ = listeners.insert(address.clone(), tx);
        }

        Ok(Arc::new(MemoryListener {
            addr: address,
            hub: self.hub.clone(),
            incoming: tokio::sync::Mutex::new(rx),
            closed: CancellationToken::new(),
        }))
    }

    async fn dial(&self, address: &str) -> Result<Box<dyn Socket>, TransportError> {
        let sender = self
            .hub
            .listeners
            .lock()
            .get(address)
            .cloned()
            .ok_or_else(|| TransportError::NoListener {
                address: address.to_owned(),
            })?;

        let id = self.hub.next_id.fetch_add(1, Ordering::Relaxed);
        let client_addr = format!("memory-client-{id}");
        let (client, server) = MemorySocket::pair(client_addr, address.to_owned());
        sender
            .send(server)
            .await
            .map_err(|_| TransportError::NoListener {
                address: address.to_owned(),
            })?;
        Ok(Box::new(client))
    }
}

/// Listener half of [`MemoryTransport`].
struct MemoryListener {
    addr: String,
    hub: Arc<Hub>,
    incoming: tokio::sync::Mutex<mpsc::Receiver<MemorySocket>>,
    closed: CancellationToken,
}

#[async_trait]
impl Listener for MemoryListener {
    fn addr(&self) -> String {
        self.addr.clone()
    }

    async fn accept(&self) -> Result<Box<dyn Socket>, TransportError> {
        if self.closed.is_cancelled() {
            return Err(TransportError::Closed);
        }
        let mut incoming = self.incoming.lock().await;
        tokio::select! {
            biased;
            () = self.closed.cancelled() => Err(TransportError::Closed),
            socket = incoming.recv() => match socket {
                Some(socket) => Ok(Box::new(socket) as Box<dyn Socket>),
                None => Err(TransportError::Closed),
            },
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        if self.closed.is_cancelled() {
            return Err(TransportError::Closed);
        }
        self.closed.cancel();
        let _ = self.hub.listeners.lock().remove(&self.addr);
        Ok(())
    }
}

impl Drop for MemoryListener {
    fn drop(&mut self) {
        if !self.closed.is_cancelled() {
            let _ = self.hub.listeners.lock().remove(&self.addr);
        }
    }
}

/// One end of an in-memory connection.
struct MemorySocket {
    tx: mpsc::Sender<Message>,
    rx: mpsc::Receiver<Message>,
    remote: String,
}

impl MemorySocket {
    fn pair(client_addr: String, server_addr: String) -> (Self, Self) {
        let (to_server, from_client) = mpsc::channel(SOCKET_BUFFER);
        let (to_client, from_server) = mpsc::channel(SOCKET_BUFFER);
        let client = Self {
            tx: to_server,
            rx: from_server,
            remote: server_addr,
        };
        let server = Self {
            tx: to_client,
            rx: from_client,
            remote: client_addr,
        };
        (client, server)
    }
}

#[async_trait]
impl Socket for MemorySocket {
    async fn recv(&mut self) -> Result<Message, TransportError> {
        self.rx.recv().await.ok_or(TransportError::ConnectionClosed)
    }

    async fn send(&mut self, message: &Message) -> Result<(), TransportError> {
        self.tx
            .send(message.clone())
            .await
            .map_err(|_| TransportError::ConnectionClosed)
    }

    fn remote_addr(&self) -> String {
        self.remote.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_address_allocates_unique_names() {
        let transport = MemoryTransport::new();
        let a = transport.listen("").await.unwrap();
        let b = transport.listen("").await.unwrap();
        assert_ne!(a.addr(), b.addr());
        assert_eq!(transport.listener_count(), 2);
    }

    #[tokio::test]
    async fn duplicate_address_rejected() {
        let transport = MemoryTransport::new();
        let _first = transport.listen("svc").await.unwrap();
        let err = match transport.listen("svc").await {
            Err(err) => err,
            Ok(_) => panic!("expected address conflict"),
        };
        assert!(matches!(err, TransportError::AddressInUse { .. }));
    }

    #[tokio::test]
    async fn dial_and_exchange() {
        let transport = MemoryTransport::new();
        let listener = transport.listen("svc").await.unwrap();

        let mut client = transport.dial("svc").await.unwrap();
        let mut server = listener.accept().await.unwrap();

        client.send(&Message::new("ping")).await.unwrap();
        let got = server.recv().await.unwrap();
        assert_eq!(&got.body[..], b"ping");

        server.send(&Message::new("pong")).await.unwrap();
        let got = client.recv().await.unwrap();
        assert_eq!(&got.body[..], b"pong");
        assert_eq!(client.remote_addr(), "svc");
    }

    #[tokio::test]
    async fn dropped_peer_reports_connection_closed() {
        let transport = MemoryTransport::new();
        let listener = transport.listen("svc").await.unwrap();
        let mut client = transport.dial("svc").await.unwrap();
        let server = listener.accept().await.unwrap();
        drop(server);
        assert!(matches!(
            client.recv().await,
            Err(TransportError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn dial_unknown_address_fails() {
        let transport = MemoryTransport::new();
        assert!(matches!(
            transport.dial("nowhere").await,
            Err(TransportError::NoListener { .. })
        ));
    }

    #[tokio::test]
    async fn close_frees_address_and_wakes_accept() {
        let transport = MemoryTransport::new();
        let listener = transport.listen("svc").await.unwrap();
        let pending = tokio::spawn({
            let listener = listener.clone();
            async move { listener.accept().await.map(|_| ()) }
        });
        tokio::task::yield_now().await;

        listener.close().await.unwrap();
        assert!(matches!(pending.await.unwrap(), Err(TransportError::Closed)));
        assert_eq!(transport.listener_count(), 0);
        assert!(matches!(
            transport.dial("svc").await,
            Err(TransportError::NoListener { .. })
        ));
        assert!(listener.close().await.unwrap_err().is_closed());
    }

    #[tokio::test]
    async fn dropping_listener_frees_address() {
        let transport = MemoryTransport::new();
        drop(transport.listen("svc").await.unwrap());
        assert_eq!(transport.listener_count(), 0);
        let _again = transport.listen("svc").await.unwrap();
    }
}
