//! Byte stream abstraction underneath the protocol engine.
//!
//! A [`Transport`] is owned by exactly one connection task and is used as a
//! `Box<dyn Transport>`, so plaintext and TLS connections share one engine at
//! the cost of a virtual call per I/O operation.
//!
//! - [`PlainTransport`]: a raw `TcpStream`
//! - [`TlsTransport`]: a server side rustls session over a `TcpStream` (feature `tls`)
//! - [`MemoryTransport`]: a scripted in-memory stream for tests and benches

use async_trait::async_trait;

use crate::protocol::TransportError;

mod memory;
mod plain;
#[cfg(feature = "tls")]
mod tls;

pub use memory::{MemoryTransport, MemoryTransportBuilder, WrittenBytes};
pub use plain::PlainTransport;
#[cfg(feature = "tls")]
pub use tls::TlsTransport;

#[async_trait]
pub trait Transport: Send {
    /// Prepares the stream for use; the TLS handshake happens here.
    async fn init(&mut self) -> Result<(), TransportError>;

    /// Reads at most `buf.len()` bytes. `Ok(0)` means the peer closed its side.
    ///
    /// Must be cancel safe: dropping the future before completion loses no bytes.
    async fn receive(&mut self, buf: &mut [u8]) -> Result<usize, TransportError>;

    /// Writes the whole of `bytes`.
    async fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError>;

    /// A lower bound of the bytes that [`Transport::receive`] can return without
    /// suspending. Never suspends.
    fn available(&self) -> usize;

    fn is_open(&self) -> bool;

    /// Signals the end of writes, then closes the stream. Closing twice is a no-op.
    async fn close(&mut self) -> Result<(), TransportError>;
}
