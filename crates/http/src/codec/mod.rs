//! Wire codec of the HTTP/1.1 engine.
//!
//! Decoding is incremental and works in place: [`BufReader`] owns the
//! connection arena and refills it from the transport, [`RequestDecoder`]
//! records the request line as spans into that arena and [`HeaderDecoder`]
//! walks the header block for its `Connection` header only.
//!
//! Encoding is synchronous: [`ResponseEncoder`] implements
//! [`tokio_util::codec::Encoder`] and renders a whole response into a
//! `BytesMut`, so the only suspension point on the way out is the final write.
//!
//! ```text
//! BufReader ──▶ RequestDecoder ──▶ HeaderDecoder          (per request)
//! ResponseMessage ──▶ ResponseEncoder ──▶ BytesMut ──▶ Transport
//! ```

mod buf_reader;
mod header;
mod request_decoder;
mod response_encoder;

pub use buf_reader::BufReader;
pub use header::{HeaderDecoder, HeaderEncoder};
pub use request_decoder::RequestDecoder;
pub use response_encoder::ResponseEncoder;
