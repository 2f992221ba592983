use std::error::Error;
use std::io;
use thiserror::Error;

pub type BoxError = Box<dyn Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("handshake error: {source}")]
    HandshakeError { source: TransportError },

    #[error("request error: {source}")]
    RequestError {
        #[from]
        source: ParseError,
    },

    #[error("dispatch error: {source}")]
    DispatchError {
        #[from]
        source: DispatchError,
    },

    #[error("response error: {source}")]
    ResponseError {
        #[from]
        source: SendError,
    },
}

impl HttpError {
    pub fn handshake(source: TransportError) -> Self {
        Self::HandshakeError { source }
    }
}

/// Failures of the byte stream underneath the protocol engine.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("tls handshake failed: {source}")]
    Handshake { source: io::Error },

    #[error("transport used before its handshake completed")]
    NotReady,

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl TransportError {
    pub fn handshake<E: Into<io::Error>>(e: E) -> Self {
        Self::Handshake { source: e.into() }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("keep-alive deadline elapsed while waiting for request bytes")]
    Timeout,

    #[error("connection closed by peer")]
    ConnectionClosed,

    #[error("malformed request line: {reason}")]
    MalformedRequestLine { reason: String },

    #[error("unsupported http version, only HTTP/1.1 is accepted")]
    UnsupportedVersion,

    #[error("invalid header: {reason}")]
    InvalidHeader { reason: String },

    #[error("request head exceed the buffer capacity {capacity}")]
    TooLargeHead { capacity: usize },

    #[error("transport error: {source}")]
    Transport {
        #[from]
        source: TransportError,
    },
}

impl ParseError {
    pub fn malformed_request_line<S: ToString>(str: S) -> Self {
        Self::MalformedRequestLine { reason: str.to_string() }
    }

    pub fn invalid_header<S: ToString>(str: S) -> Self {
        Self::InvalidHeader { reason: str.to_string() }
    }

    pub fn too_large_head(capacity: usize) -> Self {
        Self::TooLargeHead { capacity }
    }

    /// Whether the failure means the peer simply stopped talking, as opposed to
    /// sending something we could not understand.
    pub fn is_silence(&self) -> bool {
        matches!(self, Self::Timeout | Self::ConnectionClosed)
    }
}

impl From<io::Error> for ParseError {
    fn from(e: io::Error) -> Self {
        Self::Transport { source: TransportError::io(e) }
    }
}

/// Handler level failure, opaque to the engine.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("handler failed: {source}")]
    Handler { source: BoxError },

    // a String keeps the error Sync, the panic payload is not
    #[error("handler panicked: {message}")]
    Panic { message: String },
}

impl DispatchError {
    pub fn handler<E: Into<BoxError>>(e: E) -> Self {
        Self::Handler { source: e.into() }
    }

    pub fn panic<S: ToString>(message: S) -> Self {
        Self::Panic { message: message.to_string() }
    }
}

#[derive(Error, Debug)]
pub enum SendError {
    #[error("invalid body: {reason}")]
    InvalidBody { reason: String },

    #[error("transport error: {source}")]
    Transport {
        #[from]
        source: TransportError,
    },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl SendError {
    pub fn invalid_body<S: ToString>(str: S) -> Self {
        Self::InvalidBody { reason: str.to_string() }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }
}
