use std::fmt;

use tokio::net::TcpStream;
#[cfg(feature = "tls")]
use tokio_rustls::TlsAcceptor;

#[cfg(feature = "tls")]
use crate::transport::TlsTransport;
use crate::transport::{PlainTransport, Transport};

/// Turns accepted sockets into transports.
///
/// The TLS variant holds the shared, read-only TLS context; cloning the
/// acceptor only clones a reference to it.
#[derive(Clone)]
pub enum Acceptor {
    Plain,
    #[cfg(feature = "tls")]
    Tls(TlsAcceptor),
}

impl Acceptor {
    pub fn accept(&self, stream: TcpStream) -> Box<dyn Transport> {
        match self {
            Acceptor::Plain => Box::new(PlainTransport::new(stream)),
            #[cfg(feature = "tls")]
            Acceptor::Tls(acceptor) => Box::new(TlsTransport::new(acceptor.clone(), stream)),
        }
    }

    pub fn is_tls(&self) -> bool {
        match self {
            Acceptor::Plain => false,
            #[cfg(feature = "tls")]
            Acceptor::Tls(_) => true,
        }
    }
}

#[cfg(feature = "tls")]
impl From<TlsAcceptor> for Acceptor {
    fn from(acceptor: TlsAcceptor) -> Self {
        Acceptor::Tls(acceptor)
    }
}

impl fmt::Debug for Acceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.is_tls() { "Acceptor::Tls" } else { "Acceptor::Plain" })
    }
}
