use std::fmt;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_rustls::TlsAcceptor;
use tokio_rustls::server::TlsStream;
use tracing::{debug, trace};

use crate::protocol::TransportError;
use crate::transport::Transport;

enum TlsState {
    Pending { acceptor: TlsAcceptor, stream: TcpStream },
    Established(Box<TlsStream<TcpStream>>),
    Failed,
}

/// A server side TLS session over TCP.
///
/// The [`TlsAcceptor`] is the shared, read-only TLS context; the session state
/// created by the handshake belongs to this transport alone.
pub struct TlsTransport {
    state: TlsState,
    read_closed: bool,
    shut_down: bool,
}

impl TlsTransport {
    pub fn new(acceptor: TlsAcceptor, stream: TcpStream) -> Self {
        Self { state: TlsState::Pending { acceptor, stream }, read_closed: false, shut_down: false }
    }

    fn established(&mut self) -> Result<&mut TlsStream<TcpStream>, TransportError> {
        match &mut self.state {
            TlsState::Established(stream) => Ok(stream),
            _ => Err(TransportError::NotReady),
        }
    }
}

#[async_trait]
impl Transport for TlsTransport {
    async fn init(&mut self) -> Result<(), TransportError> {
        match std::mem::replace(&mut self.state, TlsState::Failed) {
            TlsState::Pending { acceptor, stream } => match acceptor.accept(stream).await {
                Ok(stream) => {
                    debug!("tls handshake finished");
                    self.state = TlsState::Established(Box::new(stream));
                    Ok(())
                }
                Err(e) => {
                    self.read_closed = true;
                    self.shut_down = true;
                    Err(TransportError::handshake(e))
                }
            },
            established @ TlsState::Established(_) => {
                self.state = established;
                Ok(())
            }
            TlsState::Failed => Err(TransportError::NotReady),
        }
    }

    async fn receive(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        let result = self.established()?.read(buf).await;
        match result {
            Ok(0) => {
                self.read_closed = true;
                Ok(0)
            }
            Ok(n) => Ok(n),
            Err(e) => {
                self.read_closed = true;
                Err(e.into())
            }
        }
    }

    async fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let stream = self.established()?;
        let result = match stream.write_all(bytes).await {
            Ok(()) => stream.flush().await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            self.shut_down = true;
            return Err(e.into());
        }
        Ok(())
    }

    /// Always 0. Bytes waiting on the socket are ciphertext and may hold only
    /// part of a record, so they say nothing about what `receive` can return.
    fn available(&self) -> usize {
        0
    }

    fn is_open(&self) -> bool {
        !self.read_closed && !self.shut_down && !matches!(self.state, TlsState::Failed)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if self.shut_down {
            return Ok(());
        }
        self.shut_down = true;
        match &mut self.state {
            TlsState::Established(stream) => {
                trace!("send close_notify and shutdown write side");
                stream.shutdown().await?;
            }
            TlsState::Pending { stream, .. } => stream.shutdown().await?,
            TlsState::Failed => {}
        }
        Ok(())
    }
}

impl fmt::Debug for TlsTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.state {
            TlsState::Pending { .. } => "pending",
            TlsState::Established(_) => "established",
            TlsState::Failed => "failed",
        };
        f.debug_struct("TlsTransport")
            .field("state", &state)
            .field("read_closed", &self.read_closed)
            .field("shut_down", &self.shut_down)
            .finish()
    }
}
