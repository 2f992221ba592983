//! Routing, static files and server wiring on top of [`kiln_http`].
//!
//! # Example
//!
//! ```no_run
//! use kiln_web::{handler_fn, Json, RequestLogger, Router, Server};
//! use kiln_http::protocol::Request;
//!
//! fn hello(_request: &Request<'_>) -> Json<&'static str> {
//!     Json("Hello, World!")
//! }
//!
//! fn main() {
//!     let router = Router::builder().get("/json", handler_fn(hello)).build();
//!
//!     let server = Server::builder()
//!         .address("127.0.0.1:8080")
//!         .threads(4)
//!         .static_files("/", "static")
//!         .middleware(RequestLogger)
//!         .router(router)
//!         .build()
//!         .unwrap();
//!
//!     server.run().unwrap();
//! }
//! ```
//!
//! A request is answered by the static files first, then by the handler
//! registered for its exact method and path, and finally by the not found
//! handler.

pub mod config;
pub mod content_type;
pub mod error;

mod handler;
mod json;
mod middleware;
mod query;
mod responder;
mod router;
mod server;
mod static_files;
#[cfg(feature = "tls")]
pub mod tls;

pub use config::{Scheduling, ServerConfig};
pub use error::{ConfigError, ServerBuildError, ServerError, TlsConfigError};
pub use handler::{FnHandler, RequestHandler, handler_fn};
pub use json::Json;
pub use middleware::RequestLogger;
pub use query::query_as;
pub use responder::Responder;
pub use router::{Router, RouterBuilder};
pub use server::{Server, ServerBuilder};
pub use static_files::StaticFiles;
