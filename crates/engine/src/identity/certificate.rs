//! Self-signed certificate issuance.
//!
//! Issuance runs four sequential steps and aborts on the first failure:
//! construct and sign, encode to PEM, pair into a TLS credential. Nothing
//! partially built is ever returned.

use std::sync::Arc;

use rcgen::{
    BasicConstraints, CertificateParams, DistinguishedName, DnType, ExtendedKeyUsagePurpose, IsCa,
    KeyIdMethod, KeyPair, KeyUsagePurpose, SerialNumber, PKCS_RSA_SHA256,
};
use rustls::pki_types::CertificateDer;
use rustls::ServerConfig;
use time::OffsetDateTime;
use tracing::debug;

use super::keys::PrivateKey;
use super::tls::build_server_config;
use crate::error::EngineError;

const OID_STREET_ADDRESS: [u64; 4] = [2, 5, 4, 9];
const OID_POSTAL_CODE: [u64; 4] = [2, 5, 4, 17];

/// Identity and validity fields asserted by an issued certificate.
///
/// Empty name fields are left out of the distinguished name. X.509 times
/// have one-second resolution, so the validity bounds are truncated to whole
/// seconds at issuance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateSubject {
    pub organization: String,
    pub country: String,
    pub province: String,
    pub locality: String,
    pub street_address: String,
    pub postal_code: String,
    pub serial_number: u64,
    pub not_before: OffsetDateTime,
    pub not_after: OffsetDateTime,
    /// DNS names or IP literals placed in the subject alternative name
    /// extension. When empty, the loopback addresses are used.
    pub subject_alt_names: Vec<String>,
}

/// Which kind of certificate to issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CertificateProfile {
    /// End-entity certificate: digital signature, client and server auth.
    #[default]
    Leaf,
    /// Certificate authority: additionally may sign other certificates.
    Authority,
}

/// A TLS credential built from one self-signed certificate and its key.
#[derive(Debug, Clone)]
pub struct Credential {
    certificate_pem: String,
    certificate_der: CertificateDer<'static>,
    server_config: Arc<ServerConfig>,
    not_before: OffsetDateTime,
    not_after: OffsetDateTime,
    profile: CertificateProfile,
}

impl Credential {
    /// PEM armoring of the certificate, suitable for distributing as a trust root.
    pub fn certificate_pem(&self) -> &str {
        &self.certificate_pem
    }

    /// DER encoding of the certificate.
    pub fn certificate_der(&self) -> &CertificateDer<'static> {
        &self.certificate_der
    }

    /// Server configuration holding exactly this certificate/key pair.
    pub fn server_config(&self) -> Arc<ServerConfig> {
        Arc::clone(&self.server_config)
    }

    pub fn not_before(&self) -> OffsetDateTime {
        self.not_before
    }

    pub fn not_after(&self) -> OffsetDateTime {
        self.not_after
    }

    pub fn profile(&self) -> CertificateProfile {
        self.profile
    }
}

/// Issue a self-signed certificate for `subject` signed by `key`.
///
/// `key_id`, when non-empty, becomes the subject key identifier; otherwise
/// one is derived from the public key.
///
/// # Errors
///
/// - [`EngineError::CertificateNotGenerated`] if the parameters are invalid
///   or signing fails.
/// - [`EngineError::EncodingFailed`] if the certificate or key cannot be
///   serialised.
/// - [`EngineError::PairingFailed`] if rustls rejects the resulting pair.
pub fn issue(
    subject: &CertificateSubject,
    key: &PrivateKey,
    profile: CertificateProfile,
    key_id: &[u8],
) -> Result<Credential, EngineError> {
    // Construct
    let params = certificate_params(subject, profile, key_id)?;
    let (not_before, not_after) = (params.not_before, params.not_after);
    let signer = KeyPair::from_pem_and_sign_algo(&key.to_pkcs8_pem()?, &PKCS_RSA_SHA256)
        .map_err(|e| EngineError::CertificateNotGenerated(format!("unusable signing key: {e}")))?;
    let cert = params
        .self_signed(&signer)
        .map_err(|e| EngineError::CertificateNotGenerated(e.to_string()))?;

    // Encode
    let certificate_pem = cert.pem();
    let key_pem = key.to_pkcs1_pem()?;

    // Pair
    let server_config = build_server_config(certificate_pem.as_bytes(), key_pem.as_bytes())?;

    debug!(
        serial = subject.serial_number,
        profile = ?profile,
        key_bits = key.bits(),
        "certificate issued"
    );

    Ok(Credential {
        certificate_pem,
        certificate_der: cert.der().clone(),
        server_config,
        not_before,
        not_after,
        profile,
    })
}

fn certificate_params(
    subject: &CertificateSubject,
    profile: CertificateProfile,
    key_id: &[u8],
) -> Result<CertificateParams, EngineError> {
    let not_before = whole_seconds(subject.not_before);
    let not_after = whole_seconds(subject.not_after);
    if not_after <= not_before {
        return Err(EngineError::CertificateNotGenerated(format!(
            "empty validity window: not_after {not_after} is not after not_before {not_before}"
        )));
    }

    let sans = if subject.subject_alt_names.is_empty() {
        vec!["127.0.0.1".to_owned(), "::1".to_owned()]
    } else {
        subject.subject_alt_names.clone()
    };
    let mut params = CertificateParams::new(sans)
        .map_err(|e| EngineError::CertificateNotGenerated(format!("invalid subject alt name: {e}")))?;

    let mut dn = DistinguishedName::new();
    let fields = [
        (DnType::OrganizationName, &subject.organization),
        (DnType::CountryName, &subject.country),
        (DnType::StateOrProvinceName, &subject.province),
        (DnType::LocalityName, &subject.locality),
        (DnType::CustomDnType(OID_STREET_ADDRESS.to_vec()), &subject.street_address),
        (DnType::CustomDnType(OID_POSTAL_CODE.to_vec()), &subject.postal_code),
    ];
    for (ty, value) in fields {
        if !value.is_empty() {
            dn.push(ty, value.as_str());
        }
    }
    params.distinguished_name = dn;

    params.serial_number = Some(SerialNumber::from(subject.serial_number));
    params.not_before = not_before;
    params.not_after = not_after;
    params.extended_key_usages = vec![
        ExtendedKeyUsagePurpose::ClientAuth,
        ExtendedKeyUsagePurpose::ServerAuth,
    ];
    match profile {
        CertificateProfile::Leaf => {
            params.is_ca = IsCa::NoCa;
            params.key_usages = vec![KeyUsagePurpose::DigitalSignature];
        }
        CertificateProfile::Authority => {
            params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
            params.key_usages = vec![
                KeyUsagePurpose::DigitalSignature,
                KeyUsagePurpose::KeyCertSign,
            ];
        }
    }
    if !key_id.is_empty() {
        params.key_identifier_method = KeyIdMethod::PreSpecified(key_id.to_vec());
    }

    Ok(params)
}

/// Drop the sub-second part, rounding towards the past.
fn whole_seconds(t: OffsetDateTime) -> OffsetDateTime {
    t - time::Duration::nanoseconds(i64::from(t.nanosecond()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::keys::generate_private_key;
    use std::sync::OnceLock;
    use time::Duration;

    fn shared_key() -> &'static PrivateKey {
        static KEY: OnceLock<PrivateKey> = OnceLock::new();
        KEY.get_or_init(|| generate_private_key(2048).unwrap())
    }

    fn subject() -> CertificateSubject {
        let not_before = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        CertificateSubject {
            organization: "Ravelo Systematic Solutions".into(),
            country: "CA".into(),
            province: "BC".into(),
            locality: "Vancouver".into(),
            street_address: "2289 E 1st Av".into(),
            postal_code: "V5M 0G2".into(),
            serial_number: 2024,
            not_before,
            not_after: not_before + Duration::days(365),
            subject_alt_names: vec!["localhost".into(), "127.0.0.1".into()],
        }
    }

    #[test]
    fn leaf_validity_window_is_exact() {
        let s = subject();
        let cred = issue(&s, shared_key(), CertificateProfile::Leaf, b"svc-1").unwrap();
        assert_eq!(cred.not_before(), s.not_before);
        assert_eq!(cred.not_after(), s.not_after);

        let parsed = CertificateParams::from_ca_cert_der(cred.certificate_der()).unwrap();
        assert_eq!(parsed.not_before, s.not_before);
        assert_eq!(parsed.not_after, s.not_after);
        assert!(matches!(parsed.is_ca, IsCa::NoCa | IsCa::ExplicitNoCa));
        assert!(cred
            .certificate_pem()
            .starts_with("-----BEGIN CERTIFICATE-----"));
    }

    #[test]
    fn sub_second_window_reports_encoded_times() {
        let mut s = subject();
        s.not_before = OffsetDateTime::from_unix_timestamp_nanos(1_700_000_000_500_000_000).unwrap();
        s.not_after = s.not_before + Duration::days(30) + Duration::milliseconds(250);

        let cred = issue(&s, shared_key(), CertificateProfile::Leaf, b"").unwrap();
        let parsed = CertificateParams::from_ca_cert_der(cred.certificate_der()).unwrap();
        assert_eq!(cred.not_before(), parsed.not_before);
        assert_eq!(cred.not_after(), parsed.not_after);
        assert_eq!(
            cred.not_before(),
            OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap()
        );
        assert_eq!(cred.not_after().nanosecond(), 0);
    }

    #[test]
    fn window_inside_one_second_is_rejected() {
        let mut s = subject();
        s.not_before = OffsetDateTime::from_unix_timestamp_nanos(1_700_000_000_100_000_000).unwrap();
        s.not_after = s.not_before + Duration::milliseconds(800);
        let err = issue(&s, shared_key(), CertificateProfile::Leaf, b"").unwrap_err();
        assert!(matches!(err, EngineError::CertificateNotGenerated(_)));
    }

    #[test]
    fn authority_sets_ca_constraint() {
        let cred = issue(&subject(), shared_key(), CertificateProfile::Authority, b"").unwrap();
        assert_eq!(cred.profile(), CertificateProfile::Authority);
        let parsed = CertificateParams::from_ca_cert_der(cred.certificate_der()).unwrap();
        assert!(matches!(parsed.is_ca, IsCa::Ca(_)));
    }

    #[test]
    fn default_sans_are_loopback() {
        let mut s = subject();
        s.subject_alt_names.clear();
        assert!(issue(&s, shared_key(), CertificateProfile::Leaf, b"").is_ok());
    }

    #[test]
    fn rejects_inverted_validity_window() {
        let mut s = subject();
        std::mem::swap(&mut s.not_before, &mut s.not_after);
        let err = issue(&s, shared_key(), CertificateProfile::Leaf, b"").unwrap_err();
        assert!(matches!(err, EngineError::CertificateNotGenerated(_)));
    }

    #[test]
    fn server_config_holds_the_pair() {
        let cred = issue(&subject(), shared_key(), CertificateProfile::Leaf, b"svc").unwrap();
        let config = cred.server_config();
        assert_eq!(config.alpn_protocols, vec![b"http/1.1".to_vec()]);
    }
}
