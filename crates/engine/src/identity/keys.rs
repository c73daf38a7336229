//! RSA key pair generation.

use rsa::pkcs1::EncodeRsaPrivateKey;
use rsa::pkcs8::{EncodePrivateKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::RsaPrivateKey;

use crate::error::EngineError;

/// Smallest modulus size accepted, in bits.
pub const MIN_KEY_BITS: usize = 2048;

/// Largest modulus size accepted, in bits.
pub const MAX_KEY_BITS: usize = 8192;

/// A generated RSA private key.
///
/// The key material never leaves this type except through the PEM encoders
/// used during certificate issuance.
#[derive(Clone)]
pub struct PrivateKey(RsaPrivateKey);

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PrivateKey({} bits, [REDACTED])", self.bits())
    }
}

impl PrivateKey {
    /// Modulus size in bits.
    pub fn bits(&self) -> usize {
        self.0.size() * 8
    }

    /// PKCS#1 (`RSA PRIVATE KEY`) armoring, used for the TLS credential.
    pub(crate) fn to_pkcs1_pem(&self) -> Result<String, EngineError> {
        self.0
            .to_pkcs1_pem(LineEnding::LF)
            .map(|pem| pem.as_str().to_owned())
            .map_err(|e| EngineError::EncodingFailed(format!("private key to PKCS#1 PEM: {e}")))
    }

    /// PKCS#8 armoring, used to hand the key to the certificate signer.
    pub(crate) fn to_pkcs8_pem(&self) -> Result<String, EngineError> {
        self.0
            .to_pkcs8_pem(LineEnding::LF)
            .map(|pem| pem.as_str().to_owned())
            .map_err(|e| EngineError::EncodingFailed(format!("private key to PKCS#8 PEM: {e}")))
    }
}

/// Generate an RSA key pair with a modulus of `bits` bits.
///
/// This is CPU-bound and can take seconds for large sizes; call it before
/// serving starts.
///
/// # Errors
///
/// Returns [`EngineError::KeyGenerationFailed`] if `bits` lies outside
/// [`MIN_KEY_BITS`]..=[`MAX_KEY_BITS`] or the generator fails.
pub fn generate_private_key(bits: usize) -> Result<PrivateKey, EngineError> {
    if !(MIN_KEY_BITS..=MAX_KEY_BITS).contains(&bits) {
        return Err(EngineError::KeyGenerationFailed(format!(
            "unsupported key size {bits}: expected {MIN_KEY_BITS}..={MAX_KEY_BITS} bits"
        )));
    }
    let mut rng = rand::thread_rng();
    RsaPrivateKey::new(&mut rng, bits)
        .map(PrivateKey)
        .map_err(|e| EngineError::KeyGenerationFailed(e.to_string()))
}
