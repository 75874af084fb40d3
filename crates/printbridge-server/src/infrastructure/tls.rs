//! TLS for the secure (`wss://`) listener.
//!
//! Certificates and keys are read from PEM files once at startup and turned
//! into a [`TlsAcceptor`] shared by every secure connection.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::ServerConfig;
use thiserror::Error;
use tokio_rustls::TlsAcceptor;
use tracing::info;

use crate::domain::TlsFiles;

/// Error raised while loading the TLS certificate or key.
#[derive(Debug, Error)]
pub enum TlsError {
    #[error("cannot read PEM from {path}: {message}")]
    Pem { path: PathBuf, message: String },

    #[error("no certificate found in {path}")]
    NoCertificates { path: PathBuf },

    #[error("invalid TLS configuration: {0}")]
    Config(#[from] rustls::Error),
}

/// Builds the acceptor for `files`.
///
/// # Errors
///
/// [`TlsError::Pem`] when a file is missing or not PEM,
/// [`TlsError::NoCertificates`] for an empty chain and [`TlsError::Config`]
/// when rustls rejects the certificate/key pair.
pub fn load_acceptor(files: &TlsFiles) -> Result<TlsAcceptor, TlsError> {
    let certs = load_certs(&files.cert_path)?;
    let key = PrivateKeyDer::from_pem_file(&files.key_path).map_err(|e| pem(&files.key_path, e))?;

    let config = ServerConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()?
    .with_no_client_auth()
    .with_single_cert(certs, key)?;

    info!("TLS certificate loaded from {}", files.cert_path.display());
    Ok(TlsAcceptor::from(Arc::new(config)))
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, TlsError> {
    let certs = CertificateDer::pem_file_iter(path)
        .map_err(|e| pem(path, e))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| pem(path, e))?;
    if certs.is_empty() {
        return Err(TlsError::NoCertificates {
            path: path.to_path_buf(),
        });
    }
    Ok(certs)
}

fn pem(path: &Path, e: rustls::pki_types::pem::Error) -> TlsError {
    TlsError::Pem {
        path: path.to_path_buf(),
        message: e.to_string(),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
