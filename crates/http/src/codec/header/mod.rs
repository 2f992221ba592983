//! Header block processing.
//!
//! - [`HeaderDecoder`]: scans a request header block for its keep-alive effect
//! - [`HeaderEncoder`]: writes the status line and the connection level headers
//!   (`Server`, `Date`, `Connection`, `Keep-Alive`) of a response

mod header_decoder;
mod header_encoder;
mod http_date;

pub use header_decoder::HeaderDecoder;
pub use header_encoder::HeaderEncoder;
pub(crate) use header_encoder::FastWrite;
