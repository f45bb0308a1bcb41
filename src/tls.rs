//! TLS configuration helpers.
//!
//! The server generates a self-signed certificate for its configured server
//! name at startup and persists the DER beside its data root; clients pin
//! exactly that certificate.  There is no CA infrastructure.

use std::path::Path;
use std::sync::Arc;

use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};

use crate::error::StorError;

/// A freshly generated self-signed server identity.
pub struct ServerIdentity {
    /// DER-encoded certificate, also handed out for clients to pin.
    pub cert_der: CertificateDer<'static>,
    key_der: PrivatePkcs8KeyDer<'static>,
}

/// Generate a self-signed certificate valid for `server_name`.
pub fn generate_identity(server_name: &str) -> Result<ServerIdentity, StorError> {
    let key = rcgen::KeyPair::generate()
        .map_err(|e| StorError::Transport(format!("generate key: {e}")))?;
    let params = rcgen::CertificateParams::new(vec![server_name.to_owned()])
        .map_err(|e| StorError::Transport(format!("certificate params: {e}")))?;
    let cert = params
        .self_signed(&key)
        .map_err(|e| StorError::Transport(format!("self-sign certificate: {e}")))?;
    Ok(ServerIdentity {
        cert_der: CertificateDer::from(cert.der().to_vec()),
        key_der: PrivatePkcs8KeyDer::from(key.serialize_der()),
    })
}

/// Build the rustls server config for a generated identity.
pub fn server_config(identity: &ServerIdentity) -> Result<rustls::ServerConfig, StorError> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    rustls::ServerConfig::builder_with_provider(provider)
        .with_protocol_versions(&[&rustls::version::TLS13])
        .map_err(|e| StorError::Transport(format!("tls versions: {e}")))?
        .with_no_client_auth()
        .with_single_cert(
            vec![identity.cert_der.clone()],
            PrivateKeyDer::Pkcs8(identity.key_der.clone_key()),
        )
        .map_err(|e| StorError::Transport(format!("server tls config: {e}")))
}

/// Build a rustls client config that trusts exactly `cert_der`.
pub fn client_config(cert_der: CertificateDer<'static>) -> Result<rustls::ClientConfig, StorError> {
    let mut roots = rustls::RootCertStore::empty();
    roots
        .add(cert_der)
        .map_err(|e| StorError::Transport(format!("trust certificate: {e}")))?;
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = rustls::ClientConfig::builder_with_provider(provider)
        .with_protocol_versions(&[&rustls::version::TLS13])
        .map_err(|e| StorError::Transport(format!("tls versions: {e}")))?
        .with_root_certificates(roots)
        .with_no_client_auth();
    Ok(config)
}

/// Read a DER certificate from disk.
pub fn read_cert(path: &Path) -> Result<CertificateDer<'static>, StorError> {
    let der = std::fs::read(path)
        .map_err(|e| StorError::Config(format!("{}: {e}", path.display())))?;
    Ok(CertificateDer::from(der))
}
