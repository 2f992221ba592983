use async_trait::async_trait;
use futures::FutureExt;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::trace;

use crate::protocol::TransportError;
use crate::transport::Transport;

/// Upper bound of a single readiness probe, see [`peek_available`].
const PEEK_PROBE_SIZE: usize = 1024;

/// A plaintext TCP connection.
#[derive(Debug)]
pub struct PlainTransport {
    stream: TcpStream,
    read_closed: bool,
    shut_down: bool,
}

impl PlainTransport {
    pub fn new(stream: TcpStream) -> Self {
        Self { stream, read_closed: false, shut_down: false }
    }

    pub fn get_ref(&self) -> &TcpStream {
        &self.stream
    }
}

#[async_trait]
impl Transport for PlainTransport {
    async fn init(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn receive(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        match self.stream.read(buf).await {
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
        if let Err(e) = self.stream.write_all(bytes).await {
            self.shut_down = true;
            return Err(e.into());
        }
        Ok(())
    }

    fn available(&self) -> usize {
        peek_available(&self.stream)
    }

    fn is_open(&self) -> bool {
        !self.read_closed && !self.shut_down
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if self.shut_down {
            return Ok(());
        }
        self.shut_down = true;
        trace!("shutdown write side of tcp stream");
        // the descriptor itself is released when the stream drops
        self.stream.shutdown().await?;
        Ok(())
    }
}

/// Counts the bytes that are readable right now, without consuming them and
/// without suspending. Reports 0 whenever the socket is not known to be ready,
/// so it is only ever a lower bound.
fn peek_available(stream: &TcpStream) -> usize {
    let mut probe = [0u8; PEEK_PROBE_SIZE];
    match stream.peek(&mut probe).now_or_never() {
        Some(Ok(n)) => n,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn pair() -> (PlainTransport, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).await.unwrap();
        let (server, _) = listener.accept().await.unwrap();
        (PlainTransport::new(server), client)
    }

    #[tokio::test]
    async fn receive_and_write() {
        let (mut transport, mut client) = pair().await;
        transport.init().await.unwrap();

        client.write_all(b"ping").await.unwrap();
        let mut buf = [0u8; 16];
        let n = transport.receive(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"ping");

        transport.write(b"pong").await.unwrap();
        let mut reply = [0u8; 4];
        client.read_exact(&mut reply).await.unwrap();
        assert_eq!(&reply, b"pong");
    }

    #[tokio::test]
    async fn peer_close_marks_transport_closed() {
        let (mut transport, client) = pair().await;
        drop(client);

        let mut buf = [0u8; 16];
        assert_eq!(transport.receive(&mut buf).await.unwrap(), 0);
        assert!(!transport.is_open());
    }

    #[tokio::test]
    async fn close_half_closes_towards_peer() {
        let (mut transport, mut client) = pair().await;
        transport.close().await.unwrap();
        transport.close().await.unwrap();
        assert!(!transport.is_open());

        let mut buf = Vec::new();
        assert_eq!(client.read_to_end(&mut buf).await.unwrap(), 0);
    }
}
