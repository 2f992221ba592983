use std::io::Write;

use bytes::{BufMut, BytesMut};
use http::StatusCode;
use tokio_util::codec::Encoder;
use tracing::error;

use crate::codec::header::{FastWrite, HeaderEncoder};
use crate::ensure;
use crate::protocol::{Content, ResponseMessage, SendError};

/// Renders a [`ResponseMessage`] into the outbound buffer.
///
/// Content that reports its length up front is printed straight into the
/// destination; other content is printed into a scratch buffer first so that
/// `Content-Length` can precede the body. A failure leaves `dst` exactly as it
/// was before the call.
#[derive(Debug, Default)]
pub struct ResponseEncoder {
    header_encoder: HeaderEncoder,
    scratch: BytesMut,
}

impl ResponseEncoder {
    pub fn new() -> Self {
        Default::default()
    }

    fn encode_message(&mut self, item: &ResponseMessage, dst: &mut BytesMut) -> Result<(), SendError> {
        let response = item.response();
        let status = response.status();
        self.header_encoder.encode((status, item.policy()), dst)?;

        let Some(content) = response.content() else {
            if permits_body(status) {
                dst.put_slice(b"Content-Length: 0\r\n");
            }
            dst.put_slice(b"\r\n");
            return Ok(());
        };

        dst.put_slice(b"Content-Type: ");
        dst.put_slice(content.media_type().as_ref().as_bytes());
        dst.put_slice(b"\r\n");

        match content.content_length() {
            Some(length) => {
                write!(FastWrite(dst), "Content-Length: {}\r\n\r\n", length)?;
                if !item.omit_body() {
                    write_sized(content, length, dst)?;
                }
            }
            None => {
                self.scratch.clear();
                content.write_to(&mut self.scratch).map_err(|e| SendError::invalid_body(e.to_string()))?;
                write!(FastWrite(dst), "Content-Length: {}\r\n\r\n", self.scratch.len())?;
                if !item.omit_body() {
                    dst.extend_from_slice(&self.scratch);
                }
            }
        }
        Ok(())
    }
}

fn write_sized(content: &dyn Content, length: usize, dst: &mut BytesMut) -> Result<(), SendError> {
    dst.reserve(length);
    let before = dst.len();
    content.write_to(dst).map_err(|e| SendError::invalid_body(e.to_string()))?;

    let written = dst.len() - before;
    ensure!(written == length, SendError::invalid_body(format!("content announced {length} bytes but wrote {written}")));
    Ok(())
}

/// 1xx, 204 and 304 responses never carry a body, not even an empty one.
fn permits_body(status: StatusCode) -> bool {
    !(status.is_informational() || status == StatusCode::NO_CONTENT || status == StatusCode::NOT_MODIFIED)
}

impl Encoder<ResponseMessage> for ResponseEncoder {
    type Error = SendError;

    fn encode(&mut self, item: ResponseMessage, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let start = dst.len();
        let result = self.encode_message(&item, dst);
        if let Err(e) = &result {
            error!(cause = %e, status = %item.response().status(), "render response error");
            dst.truncate(start);
        }
        result
    }
}
