use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while the server binds and runs.
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("bind {address} error: {source}")]
    Bind {
        address: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("runtime error: {source}")]
    Runtime {
        #[source]
        source: io::Error,
    },

    #[error("accept loop error: {source}")]
    Serve {
        #[source]
        source: io::Error,
    },
}

impl ServerError {
    pub fn bind(address: SocketAddr, source: io::Error) -> Self {
        Self::Bind { address, source }
    }

    pub fn runtime(source: io::Error) -> Self {
        Self::Runtime { source }
    }

    pub fn serve(source: io::Error) -> Self {
        Self::Serve { source }
    }
}

#[derive(Error, Debug)]
pub enum ServerBuildError {
    #[error("address must be set")]
    MissingAddress,

    #[error("invalid address: {source}")]
    InvalidAddress {
        #[source]
        source: io::Error,
    },

    #[error("invalid setting {name}: {reason}")]
    InvalidSetting { name: &'static str, reason: String },

    #[error(transparent)]
    Tls(#[from] TlsConfigError),
}

impl ServerBuildError {
    pub fn invalid_setting<S: ToString>(name: &'static str, reason: S) -> Self {
        Self::InvalidSetting { name, reason: reason.to_string() }
    }
}

#[derive(Error, Debug)]
pub enum TlsConfigError {
    #[error("read {} error: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("no certificate found in {}", path.display())]
    NoCertificate { path: PathBuf },

    #[error("no private key found in {}", path.display())]
    NoPrivateKey { path: PathBuf },

    #[cfg(feature = "tls")]
    #[error("invalid tls setup: {source}")]
    Rustls {
        #[from]
        source: rustls::Error,
    },

    #[error("tls support is not compiled in")]
    Unsupported,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("read config {} error: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("parse config {} error: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
