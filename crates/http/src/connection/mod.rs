//! The connection task.
//!
//! - [`HttpConnection`]: serves the requests of one transport, one after
//!   another, until the keep-alive clock expires or the peer goes away
//! - [`ConnectionConfig`]: arena size and keep-alive limits of every connection

mod http_connection;
mod message_writer;

pub use http_connection::{ConnectionConfig, DEFAULT_BUFFER_CAPACITY, HttpConnection};
