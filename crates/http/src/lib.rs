//! An embeddable HTTP/1.1 server engine
//!
//! This crate parses HTTP/1.1 requests incrementally out of a byte stream,
//! enforces the keep-alive lifecycle of each connection, hands every request to
//! a user supplied [`handler::Dispatch`] and renders the response back onto the
//! stream. Parsing never needs a whole request in one read: every step is a
//! cursor scan over a per-connection arena that refills on demand, and every
//! wait for bytes is bounded by the connection's keep-alive deadline.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use kiln_http::connection::ConnectionConfig;
//! use kiln_http::handler::{make_dispatch, HttpService};
//! use kiln_http::protocol::{Request, Response};
//! use kiln_http::server::{serve, Acceptor};
//! use tokio::net::TcpListener;
//! use tracing::{error, info, Level};
//! use tracing_subscriber::FmtSubscriber;
//!
//! #[tokio::main]
//! async fn main() {
//!     let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
//!     tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
//!
//!     info!(port = 8080, "start listening");
//!     let listener = match TcpListener::bind("127.0.0.1:8080").await {
//!         Ok(listener) => listener,
//!         Err(e) => {
//!             error!(cause = %e, "bind server error");
//!             return;
//!         }
//!     };
//!
//!     let dispatch = make_dispatch(|request: &Request<'_>| match request.path() {
//!         "/" => Ok(Response::text("Hello World!\r\n")),
//!         _ => Ok(Response::not_found()),
//!     });
//!     let service = Arc::new(HttpService::new(dispatch));
//!
//!     let shutdown = async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     };
//!     if let Err(e) = serve(listener, Acceptor::Plain, service, ConnectionConfig::default(), shutdown).await {
//!         error!(cause = %e, "server stopped with error");
//!     }
//! }
//! ```
//!
//! # Architecture
//!
//! - [`transport`]: the byte stream abstraction, plaintext, TLS and in-memory
//! - [`codec`]: the arena reader, request line decoder, header scanner and
//!   response encoder
//! - [`protocol`]: requests, responses, the keep-alive clock and errors
//! - [`connection`]: the per-connection task
//! - [`handler`]: the dispatch and middleware seams
//! - [`server`]: the reactor accept loop and the bounded thread pool
//!
//! # Keep-alive
//!
//! HTTP/1.1 connections persist by default. A `Connection` header carrying a
//! `close` token closes the connection after the response, and so does reaching
//! [`connection::ConnectionConfig::max_keep_alive_requests`]. A connection that
//! sends nothing before its deadline is closed without a response.
//!
//! # Error Handling
//!
//! - [`protocol::HttpError`]: top level error of a connection task
//! - [`protocol::ParseError`]: request parsing errors
//! - [`protocol::DispatchError`]: handler failures, including captured panics
//! - [`protocol::SendError`]: response rendering and sending errors
//! - [`protocol::TransportError`]: failures of the underlying stream
//!
//! Any error raised while a request is being parsed or dispatched is answered
//! with a best effort `500` and the connection is closed; nothing escapes the
//! connection task.
//!
//! # Limitations
//!
//! - HTTP/1.1 only
//! - request bodies are not read
//! - no chunked transfer encoding, no pipelining, no compression
//! - the request line plus header block must fit into the connection arena

pub mod codec;
pub mod connection;
pub mod handler;
pub mod protocol;
pub mod server;
pub mod transport;

mod utils;
pub(crate) use utils::ensure;
