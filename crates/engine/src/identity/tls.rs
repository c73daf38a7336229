//! Pairing of the issued certificate and key into a rustls server config.

use std::io::BufReader;
use std::sync::Arc;

use rustls::ServerConfig;

use crate::error::EngineError;

/// Build a [`rustls::ServerConfig`] from PEM-encoded certificate and private key bytes.
///
/// The PEM data must hold exactly one certificate; the engine never serves a
/// chain. Only HTTP/1.1 is advertised over ALPN.
///
/// # Errors
///
/// Returns [`EngineError::PairingFailed`] if the certificate or key cannot be
/// parsed, or if rustls rejects the pair.
pub fn build_server_config(cert_pem: &[u8], key_pem: &[u8]) -> Result<Arc<ServerConfig>, EngineError> {
    let certs = rustls_pemfile::certs(&mut BufReader::new(cert_pem))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| EngineError::PairingFailed(format!("failed to parse TLS certificate: {e}")))?;
    if certs.len() != 1 {
        return Err(EngineError::PairingFailed(format!(
            "expected exactly one certificate, found {}",
            certs.len()
        )));
    }

    let key = rustls_pemfile::private_key(&mut BufReader::new(key_pem))
        .map_err(|e| EngineError::PairingFailed(format!("failed to read TLS private key: {e}")))?
        .ok_or_else(|| EngineError::PairingFailed("no private key found in PEM data".into()))?;

    let mut config =
        ServerConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
            .with_safe_default_protocol_versions()
            .map_err(|e| EngineError::PairingFailed(e.to_string()))?
            .with_no_client_auth()
            .with_single_cert(certs, key)
            .map_err(|e| EngineError::PairingFailed(format!("rustls rejected the pair: {e}")))?;
    config.alpn_protocols = vec![b"http/1.1".to_vec()];

    Ok(Arc::new(config))
}
