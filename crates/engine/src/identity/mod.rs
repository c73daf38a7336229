//! Service identity and TLS bootstrap.
//!
//! The engine never loads certificates from disk. At startup it generates an
//! RSA key pair ([`generate_private_key`]), issues a self-signed certificate
//! for a [`CertificateSubject`] ([`issue`]) and pairs both into a rustls
//! server configuration carried by a [`Credential`].
//!
//! # Invariants
//!
//! - A [`Credential`] always holds exactly one certificate/key pair.
//! - Private key material is never logged; `Debug` output is redacted.

pub mod certificate;
pub mod keys;
pub mod tls;

pub use certificate::{issue, CertificateProfile, CertificateSubject, Credential};
pub use keys::{generate_private_key, PrivateKey, MAX_KEY_BITS, MIN_KEY_BITS};

use serde::{Deserialize, Serialize};

/// Who this engine instance is and where it can be reached.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceIdentity {
    /// Stable identifier; also used as the certificate's subject key id.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    /// Display name.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// Socket address the listener binds to, e.g. `"0.0.0.0:8443"`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub internal: String,
    /// Address advertised to clients, e.g. `"https://api.example.com"`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub external: String,
}

impl ServiceIdentity {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        internal: impl Into<String>,
        external: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            internal: internal.into(),
            external: external.into(),
        }
    }
}
