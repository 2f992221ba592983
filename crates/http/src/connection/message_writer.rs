use bytes::BytesMut;
use tokio_util::codec::Encoder;

use crate::codec::ResponseEncoder;
use crate::protocol::{ResponseMessage, SendError};
use crate::transport::Transport;

/// Renders responses into an outbound buffer and flushes it to a transport.
#[derive(Debug)]
pub struct MessageWriter {
    buffer: BytesMut,
    encoder: ResponseEncoder,
}

impl MessageWriter {
    pub fn with_capacity(buffer_size: usize) -> Self {
        Self { buffer: BytesMut::with_capacity(buffer_size), encoder: ResponseEncoder::new() }
    }

    pub fn clear_buf(&mut self) {
        self.buffer.clear();
    }

    #[inline]
    pub fn write(&mut self, item: ResponseMessage) -> Result<(), SendError> {
        self.encoder.encode(item, &mut self.buffer)
    }

    pub async fn flush(&mut self, transport: &mut dyn Transport) -> Result<(), SendError> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let result = transport.write(&self.buffer).await;
        self.buffer.clear();
        Ok(result?)
    }
}
