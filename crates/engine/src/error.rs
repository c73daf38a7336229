//! Setup-time and transport-level failures of the engine.
//!
//! Request-time failures never use this type; they are expressed directly as
//! [`Exception`]s and buffered as error responses.

use common::error::{codes, messages};
use common::{Exception, Violation};
use thiserror::Error;

/// Errors that abort startup or terminate the serving loop.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The RSA key size is unsupported or the key could not be generated.
    #[error("key generation failed: {0}")]
    KeyGenerationFailed(String),

    /// The certificate could not be constructed or signed.
    #[error("certificate not generated: {0}")]
    CertificateNotGenerated(String),

    /// The certificate or private key could not be serialised to PEM.
    #[error("encoding failed: {0}")]
    EncodingFailed(String),

    /// The encoded certificate and key do not form a usable TLS credential.
    #[error("certificate and key not paired: {0}")]
    PairingFailed(String),

    /// A route with the same canonical key is already registered.
    #[error("duplicate route: {key}")]
    DuplicateRoute { key: String },

    /// The listener could not be bound or stopped accepting connections.
    #[error("resource closed: {0}")]
    ResourceClosed(String),
}

impl EngineError {
    /// Express this failure as the wire-level error value.
    pub fn to_exception(&self) -> Exception {
        let (code, message, detail) = match self {
            EngineError::KeyGenerationFailed(d) => {
                (codes::KEY_GENERATION_FAILED, messages::KEY_GENERATION_FAILED, d)
            }
            EngineError::CertificateNotGenerated(d) => {
                (codes::RESOURCE_NOT_GENERATED, messages::RESOURCE_NOT_GENERATED, d)
            }
            EngineError::EncodingFailed(d) => {
                (codes::RESOURCE_NOT_ENCODED, messages::RESOURCE_NOT_ENCODED, d)
            }
            EngineError::PairingFailed(d) => {
                (codes::RESOURCES_NOT_PAIRED, messages::RESOURCES_NOT_PAIRED, d)
            }
            EngineError::DuplicateRoute { key } => {
                (codes::RESOURCE_DUPLICATED, messages::RESOURCE_DUPLICATED, key)
            }
            EngineError::ResourceClosed(d) => {
                (codes::RESOURCE_CLOSED, messages::RESOURCE_CLOSED, d)
            }
        };
        Exception::new(code, message).with(Violation::value(detail.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_route_names_the_key() {
        let e = EngineError::DuplicateRoute {
            key: "get-/items".into(),
        };
        assert!(e.to_string().contains("get-/items"));
        let ex = e.to_exception();
        assert_eq!(ex.code, codes::RESOURCE_DUPLICATED);
        assert_eq!(ex.data[0].value, "get-/items");
    }

    #[test]
    fn every_variant_has_a_distinct_code() {
        let all = [
            EngineError::KeyGenerationFailed("x".into()),
            EngineError::CertificateNotGenerated("x".into()),
            EngineError::EncodingFailed("x".into()),
            EngineError::PairingFailed("x".into()),
            EngineError::DuplicateRoute { key: "x".into() },
            EngineError::ResourceClosed("x".into()),
        ];
        let mut seen: Vec<String> = all.iter().map(|e| e.to_exception().code).collect();
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), all.len());
    }
}
