//! Schedulers that run connection tasks.
//!
//! - [`serve`]: the primary model. Every accepted connection becomes a task on
//!   the surrounding tokio runtime; with a multi-threaded runtime any worker may
//!   resume any connection, and no worker ever blocks on socket I/O.
//! - [`ThreadPool`] with [`serve_blocking`]: the alternative model. A fixed set
//!   of OS threads each drives one connection at a time, and the accept loop
//!   stops accepting while the pool is full.
//!
//! Both take an [`Acceptor`], which decides whether accepted sockets speak
//! plaintext or TLS.

mod acceptor;
mod reactor;
mod thread_pool;

pub use acceptor::Acceptor;
pub use reactor::serve;
pub use thread_pool::{PoolShutdown, ThreadPool, serve_blocking};
