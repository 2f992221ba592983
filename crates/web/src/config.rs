//! Server configuration.
//!
//! Every field has a default, so a JSON file only names what it changes:
//!
//! ```json
//! {
//!     "addresses": ["127.0.0.1:8080"],
//!     "threads": 4,
//!     "static_files": { "prefix": "/", "root": "static" },
//!     "scheduling": { "model": "thread_pool", "max_connections": 256 }
//! }
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use kiln_http::connection::{ConnectionConfig, DEFAULT_BUFFER_CAPACITY};
use kiln_http::protocol::{DEFAULT_KEEP_ALIVE_TIMEOUT, DEFAULT_MAX_KEEP_ALIVE_REQUESTS};
use serde::Deserialize;

use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub addresses: Vec<SocketAddr>,
    /// Worker threads of either scheduling model.
    pub threads: usize,
    pub keep_alive_timeout_secs: u64,
    /// Arena size of each connection, the limit for a request line plus headers.
    pub buffer_capacity: usize,
    pub max_keep_alive_requests: usize,
    pub tls: Option<TlsConfig>,
    pub static_files: Option<StaticFilesConfig>,
    pub scheduling: Scheduling,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TlsConfig {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StaticFilesConfig {
    pub prefix: String,
    pub root: PathBuf,
}

/// How connections are mapped onto threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum Scheduling {
    /// A multi-threaded reactor; connections suspend instead of blocking a thread.
    #[default]
    Reactor,
    /// One connection per worker thread at a time, at most `max_connections`
    /// queued or running.
    ThreadPool { max_connections: usize },
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addresses: vec![SocketAddr::from(([0, 0, 0, 0], 80))],
            threads: default_threads(),
            keep_alive_timeout_secs: DEFAULT_KEEP_ALIVE_TIMEOUT.as_secs(),
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            max_keep_alive_requests: DEFAULT_MAX_KEEP_ALIVE_REQUESTS,
            tls: None,
            static_files: None,
            scheduling: Scheduling::default(),
        }
    }
}

impl ServerConfig {
    /// Loads a JSON config file.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be read or is not a valid config.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text =
            std::fs::read_to_string(path).map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })
    }

    pub fn keep_alive_timeout(&self) -> Duration {
        Duration::from_secs(self.keep_alive_timeout_secs)
    }

    pub fn to_connection_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            buffer_capacity: self.buffer_capacity,
            keep_alive_timeout: self.keep_alive_timeout(),
            max_keep_alive_requests: self.max_keep_alive_requests,
        }
    }
}

fn default_threads() -> usize {
    std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
}
