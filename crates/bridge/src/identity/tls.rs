//! TLS client configuration pinned to the identity domain's own CA.
//!
//! The system trust store is never consulted: a whoami endpoint is only
//! trusted if its certificate chains to one of the certificates in the
//! configured PEM bundle.

use crate::error::SetupError;
use rustls::{ClientConfig, RootCertStore};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

/// Load every certificate in a PEM bundle into an otherwise empty root store.
pub fn load_ca_certificates(path: &Path) -> Result<RootCertStore, SetupError> {
    let ca_error = |source| SetupError::CaCertificate {
        path: path.display().to_string(),
        source,
    };

    let file = File::open(path).map_err(ca_error)?;
    let mut reader = BufReader::new(file);

    let mut roots = RootCertStore::empty();
    for cert in rustls_pemfile::certs(&mut reader) {
        roots.add(cert.map_err(ca_error)?)?;
    }

    if roots.is_empty() {
        return Err(SetupError::NoCertificates(path.display().to_string()));
    }
    Ok(roots)
}

/// Build a client config that only trusts the CA bundle at `ca_path`.
pub fn pinned_client_config(ca_path: &Path) -> Result<ClientConfig, SetupError> {
    let roots = load_ca_certificates(ca_path)?;
    tracing::debug!(
        ca_path = %ca_path.display(),
        certificates = roots.len(),
        "Loaded pinned CA certificates"
    );

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()?
        .with_root_certificates(roots)
        .with_no_client_auth();

    Ok(config)
}
