//! TCP transport with length-delimited framing.
//!
//! A message travels as two frames: the header map encoded as a JSON object,
//! then the raw body.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::{SinkExt, StreamExt};
use microrpc_core::Message;
use parking_lot::Mutex;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::{Framed, LengthDelimitedCodec};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{Listener, Socket, Transport, TransportError};

/// Address bound when the caller does not provide one.
pub const DEFAULT_ADDRESS: &str = "127.0.0.1:0";

/// Largest frame accepted from a peer (16 MB).
pub const DEFAULT_MAX_FRAME_LENGTH: usize = 16 * 1024 * 1024;

/// TCP transport.
#[derive(Clone, Debug)]
pub struct TcpTransport {
    max_frame_length: usize,
}

impl TcpTransport {
    /// Create a transport with the default frame limit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the largest accepted frame.
    #[must_use]
    pub fn with_max_frame_length(mut self, max_frame_length: usize) -> Self {
        self.max_frame_length = max_frame_length;
        self
    }

    fn framed(&self, stream: TcpStream) -> Framed<TcpStream, LengthDelimitedCodec> {
        let codec = LengthDelimitedCodec::builder()
            .max_frame_length(self.max_frame_length)
            .new_codec();
        Framed::new(stream, codec)
    }
}

impl Default for TcpTransport {
    fn default() -> Self {
        Self {
            max_frame_length: DEFAULT_MAX_FRAME_LENGTH,
        }
    }
}

#[async_trait]
impl Transport for TcpTransport {
    fn name(&self) -> &'static str {
        "tcp"
    }

    async fn listen(&self, address: &str) -> Result<Arc<dyn Listener>, TransportError> {
        let address = if address.is_empty() {
            DEFAULT_ADDRESS
        } else {
            address
        };
        let listener = TcpListener::bind(address)
            .await
            .map_err(|source| TransportError::Bind {
                address: address.to_owned(),
                source,
            })?;
        let local = listener.local_addr()?;
        Ok(Arc::new(TcpListenerHandle {
            addr: local.to_string(),
            inner: Mutex::new(Some(Arc::new(listener))),
            closed: CancellationToken::new(),
            transport: self.clone(),
        }))
    }

    async fn dial(&self, address: &str) -> Result<Box<dyn Socket>, TransportError> {
        let stream = TcpStream::connect(address)
            .await
            .map_err(|source| TransportError::Dial {
                address: address.to_owned(),
                source,
            })?;
        let peer = stream.peer_addr()?;
        Ok(Box::new(TcpSocket {
            framed: self.framed(stream),
            peer,
        }))
    }
}

/// Listener half of [`TcpTransport`].
struct TcpListenerHandle {
    addr: String,
    inner: Mutex<Option<Arc<TcpListener>>>,
    closed: CancellationToken,
    transport: TcpTransport,
}

#[async_trait]
impl Listener for TcpListenerHandle {
    fn addr(&self) -> String {
        self.addr.clone()
    }

    async fn accept(&self) -> Result<Box<dyn Socket>, TransportError> {
        let listener = self.inner.lock().clone().ok_or(TransportError::Closed)?;
        tokio::select! {
            biased;
            () = self.closed.cancelled() => Err(TransportError::Closed),
            accepted = listener.accept() => {
                let (stream, peer) = accepted?;
                debug!(%peer, "accepted tcp connection");
                Ok(Box::new(TcpSocket {
                    framed: self.transport.framed(stream),
                    peer,
                }) as Box<dyn Socket>)
            }
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        let Some(listener) = self.inner.lock().take() else {
            return Err(TransportError::Closed);
        };
        self.closed.cancel();
        drop(listener);
        debug!(addr = %self.addr, "tcp listener closed");
        Ok(())
    }
}

/// One framed TCP connection.
struct TcpSocket {
    framed: Framed<TcpStream, LengthDelimitedCodec>,
    peer: SocketAddr,
}

impl TcpSocket {
    async fn next_frame(&mut self) -> Result<BytesMut, TransportError> {
        match self.framed.next().await {
            Some(Ok(frame)) => Ok(frame),
            Some(Err(err)) => Err(err.into()),
            None => Err(TransportError::ConnectionClosed),
        }
    }
}

#[async_trait]
impl Socket for TcpSocket {
    async fn recv(&mut self) -> Result<Message, TransportError> {
        let header_frame = self.next_frame().await?;
        let header: HashMap<String, String> = serde_json::from_slice(&header_frame)?;
        let body = self.next_frame().await?;
        Ok(Message {
            header,
            body: body.freeze(),
        })
    }

    async fn send(&mut self, message: &Message) -> Result<(), TransportError> {
        let header = serde_json::to_vec(&message.header)?;
        self.framed.feed(Bytes::from(header)).await?;
        self.framed.send(message.body.clone()).await?;
        Ok(())
    }

    fn remote_addr(&self) -> String {
        self.peer.to_string()
    }
}
