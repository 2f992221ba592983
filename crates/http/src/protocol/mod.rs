//! Core HTTP protocol values shared by the codec and the connection task.
//!
//! - **Requests** ([`request`]): [`RequestLine`] spans produced by the decoder and
//!   the borrowed [`Request`] view handed to middlewares and dispatch
//! - **Responses** ([`response`]): [`Response`], the [`Content`] capability and the
//!   byte-backed [`Body`]
//! - **Keep-alive** ([`keep_alive`]): the per-connection [`KeepAliveClock`] and the
//!   [`ConnectionPolicy`] it renders to
//! - **Messages** ([`message`]): [`ResponseMessage`], the renderer input
//! - **Errors** ([`error`]): one error enum per layer, joined by [`HttpError`]

mod message;
pub use message::ResponseMessage;

mod request;
pub use request::Request;
pub use request::RequestLine;
pub use request::Span;

mod response;
pub use response::Body;
pub use response::Content;
pub use response::NOT_FOUND_BODY;
pub use response::Response;

mod keep_alive;
pub use keep_alive::ConnectionPolicy;
pub use keep_alive::DEFAULT_KEEP_ALIVE_TIMEOUT;
pub use keep_alive::DEFAULT_MAX_KEEP_ALIVE_REQUESTS;
pub use keep_alive::KeepAliveClock;

mod error;
pub use error::BoxError;
pub use error::DispatchError;
pub use error::HttpError;
pub use error::ParseError;
pub use error::SendError;
pub use error::TransportError;
