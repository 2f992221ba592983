//! Loading the server side TLS context from PEM files.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use rustls::ServerConfig;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tokio_rustls::TlsAcceptor;
use tracing::info;

use crate::error::TlsConfigError;

/// Builds a TLS server context from a PEM certificate chain and a PEM private key.
///
/// # Errors
///
/// Fails when a file cannot be read, holds no certificate or key, or when the
/// key does not match the certificate.
pub fn load_server_config(
    cert_path: impl AsRef<Path>,
    key_path: impl AsRef<Path>,
) -> Result<Arc<ServerConfig>, TlsConfigError> {
    let certs = read_certificates(cert_path.as_ref())?;
    let key = read_private_key(key_path.as_ref())?;

    let config = ServerConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
        .with_safe_default_protocol_versions()?
        .with_no_client_auth()
        .with_single_cert(certs, key)?;

    Ok(Arc::new(config))
}

/// The shared acceptor every TLS connection handshakes through.
///
/// # Errors
///
/// See [`load_server_config`].
pub fn load_acceptor(cert_path: impl AsRef<Path>, key_path: impl AsRef<Path>) -> Result<TlsAcceptor, TlsConfigError> {
    load_server_config(cert_path, key_path).map(TlsAcceptor::from)
}

fn read_certificates(path: &Path) -> Result<Vec<CertificateDer<'static>>, TlsConfigError> {
    let mut reader = open(path)?;
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| TlsConfigError::Read { path: path.to_path_buf(), source })?;

    if certs.is_empty() {
        return Err(TlsConfigError::NoCertificate { path: path.to_path_buf() });
    }
    info!(path = %path.display(), len = certs.len(), "read pem chain");
    Ok(certs)
}

fn read_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, TlsConfigError> {
    let mut reader = open(path)?;
    rustls_pemfile::private_key(&mut reader)
        .map_err(|source| TlsConfigError::Read { path: path.to_path_buf(), source })?
        .ok_or_else(|| TlsConfigError::NoPrivateKey { path: path.to_path_buf() })
}

fn open(path: &Path) -> Result<BufReader<File>, TlsConfigError> {
    File::open(path).map(BufReader::new).map_err(|source| TlsConfigError::Read { path: path.to_path_buf(), source })
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn write_temp(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("kiln-tls-{}-{name}", std::process::id()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn missing_file() {
        let e = load_server_config("/nonexistent/kiln/cert.pem", "/nonexistent/kiln/key.pem").unwrap_err();
        assert!(matches!(e, TlsConfigError::Read { .. }));
    }

    #[test]
    fn file_without_certificate() {
        let cert = write_temp("empty-cert.pem", "not a pem file\n");
        let key = write_temp("empty-key.pem", "not a pem file\n");

        let e = load_server_config(&cert, &key).unwrap_err();
        assert!(matches!(e, TlsConfigError::NoCertificate { .. }));
    }

    #[test]
    fn file_without_key() {
        let cert = write_temp(
            "only-cert.pem",
            "-----BEGIN CERTIFICATE-----\nMAMCAQA=\n-----END CERTIFICATE-----\n",
        );
        let key = write_temp("no-key.pem", "");

        let e = load_server_config(&cert, &key).unwrap_err();
        assert!(matches!(e, TlsConfigError::NoPrivateKey { .. }));
    }
}
