//! Status line and connection level headers.
//!
//! Every response starts with the same block:
//!
//! ```text
//! HTTP/1.1 200 \r\n
//! Server: kiln/0.1.0\r\n
//! Date: Sun, 06 Nov 1994 08:49:37 GMT\r\n
//! Connection: keep-alive\r\n
//! Keep-Alive: timeout=30, max=1000\r\n
//! ```
//!
//! or `Connection: close` in place of the last two lines. Content headers and
//! the terminating blank line are written by the response encoder.

use std::io;
use std::io::Write;

use bytes::{BufMut, BytesMut};
use http::StatusCode;
use tokio_util::codec::Encoder;

use crate::codec::header::http_date::with_http_date;
use crate::protocol::{ConnectionPolicy, SendError};

/// Initial buffer size reserved for the header block
const INIT_HEADER_SIZE: usize = 256;

pub(crate) const SERVER_HEADER: &str = concat!("Server: kiln/", env!("CARGO_PKG_VERSION"), "\r\n");

#[derive(Debug, Default, Clone, Copy)]
pub struct HeaderEncoder;

impl Encoder<(StatusCode, ConnectionPolicy)> for HeaderEncoder {
    type Error = SendError;

    fn encode(&mut self, item: (StatusCode, ConnectionPolicy), dst: &mut BytesMut) -> Result<(), Self::Error> {
        let (status, policy) = item;
        dst.reserve(INIT_HEADER_SIZE);

        // no reason phrase, clients must not depend on it
        dst.put_slice(b"HTTP/1.1 ");
        dst.put_slice(status.as_str().as_bytes());
        dst.put_slice(b" \r\n");

        dst.put_slice(SERVER_HEADER.as_bytes());

        with_http_date(|date| {
            dst.put_slice(b"Date: ");
            dst.put_slice(date.as_bytes());
            dst.put_slice(b"\r\n");
        });

        match policy {
            ConnectionPolicy::KeepAlive { timeout, max } => {
                dst.put_slice(b"Connection: keep-alive\r\n");
                write!(FastWrite(dst), "Keep-Alive: timeout={}, max={}\r\n", timeout.as_secs(), max)?;
            }
            ConnectionPolicy::Close => dst.put_slice(b"Connection: close\r\n"),
        }
        Ok(())
    }
}

/// `io::Write` over `BytesMut`, so numbers can be formatted without an
/// intermediate `String`.
pub(crate) struct FastWrite<'a>(pub(crate) &'a mut BytesMut);

impl Write for FastWrite<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.put_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
