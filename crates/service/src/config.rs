//! Service settings: identity, certificate subject, listener and log level.
//!
//! Read once from the process environment (`SERVICE_ID`, `KEY_BITS`,
//! `CERT_*`, ...). Only `SERVICE_ID` is mandatory.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use engine::identity::{MAX_KEY_BITS, MIN_KEY_BITS};
use engine::{CertificateProfile, CertificateSubject, ServiceIdentity};
use serde::Deserialize;
use time::{Duration, OffsetDateTime};

/// Validated service configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Stable service identifier, also the certificate's subject key id. **Required.**
    pub service_id: String,

    /// Display name.
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Address the HTTPS listener binds to.
    #[serde(default = "default_internal_addr")]
    pub internal_addr: String,

    /// Address clients are told to use.
    #[serde(default = "default_external_addr")]
    pub external_addr: String,

    /// RSA modulus size in bits.
    #[serde(default = "default_key_bits")]
    pub key_bits: usize,

    /// Issue a certificate authority instead of a leaf certificate.
    #[serde(default)]
    pub cert_authority: bool,

    #[serde(default)]
    pub cert_organization: String,
    #[serde(default)]
    pub cert_country: String,
    #[serde(default)]
    pub cert_province: String,
    #[serde(default)]
    pub cert_locality: String,
    #[serde(default)]
    pub cert_street_address: String,
    #[serde(default)]
    pub cert_postal_code: String,

    /// Length of the certificate validity window, counted from startup.
    #[serde(default = "default_cert_validity_days")]
    pub cert_validity_days: i64,

    /// Comma separated DNS names or IP literals for the certificate.
    #[serde(default = "default_cert_hostnames")]
    pub cert_hostnames: String,

    /// Largest request body accepted, in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Tracing log level (e.g. `"info"`, `"debug"`).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_service_name() -> String {
    "fwork".into()
}
fn default_internal_addr() -> String {
    "0.0.0.0:8443".into()
}
fn default_external_addr() -> String {
    "https://localhost:8443".into()
}
fn default_key_bits() -> usize {
    4096
}
fn default_cert_validity_days() -> i64 {
    3650
}
fn default_cert_hostnames() -> String {
    "localhost".into()
}
fn default_max_body_bytes() -> usize {
    engine::server::MAX_BODY_BYTES
}
fn default_log_level() -> String {
    "info".into()
}

impl Config {
    /// Read settings from the environment and check them.
    ///
    /// # Errors
    ///
    /// `SERVICE_ID` is unset, a numeric or boolean variable does not parse,
    /// or [`Config::validate`] rejects a value.
    pub fn from_env() -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::Environment::default())
            .build()
            .context("reading service settings from the environment")?
            .try_deserialize::<Config>()
            .context("service settings are malformed")?;
        settings.validate()?;
        Ok(settings)
    }

    /// First offending setting wins.
    fn validate(&self) -> Result<()> {
        ensure_non_empty(&self.service_id, "SERVICE_ID")?;

        self.internal_addr
            .parse::<SocketAddr>()
            .with_context(|| format!("INTERNAL_ADDR {:?} is not a socket address", self.internal_addr))?;

        if !(MIN_KEY_BITS..=MAX_KEY_BITS).contains(&self.key_bits) {
            anyhow::bail!("KEY_BITS must be within {MIN_KEY_BITS}..={MAX_KEY_BITS}");
        }
        if self.cert_validity_days <= 0 {
            anyhow::bail!("CERT_VALIDITY_DAYS must be > 0");
        }
        if self.max_body_bytes == 0 {
            anyhow::bail!("MAX_BODY_BYTES must be > 0");
        }
        Ok(())
    }

    pub fn identity(&self) -> ServiceIdentity {
        ServiceIdentity::new(
            &self.service_id,
            &self.service_name,
            &self.internal_addr,
            &self.external_addr,
        )
    }

    pub fn profile(&self) -> CertificateProfile {
        if self.cert_authority {
            CertificateProfile::Authority
        } else {
            CertificateProfile::Leaf
        }
    }

    /// Certificate subject valid from `now` for the configured number of days.
    pub fn subject(&self, now: OffsetDateTime) -> CertificateSubject {
        CertificateSubject {
            organization: self.cert_organization.clone(),
            country: self.cert_country.clone(),
            province: self.cert_province.clone(),
            locality: self.cert_locality.clone(),
            street_address: self.cert_street_address.clone(),
            postal_code: self.cert_postal_code.clone(),
            serial_number: now.unix_timestamp().unsigned_abs(),
            not_before: now,
            not_after: now + Duration::days(self.cert_validity_days),
            subject_alt_names: self
                .cert_hostnames
                .split(',')
                .map(str::trim)
                .filter(|h| !h.is_empty())
                .map(str::to_owned)
                .collect(),
        }
    }
}

fn ensure_non_empty(value: &str, name: &str) -> Result<()> {
    if value.trim().is_empty() {
        anyhow::bail!("{name} is required and must not be empty");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> Config {
        Config {
            service_id: "svc-1".into(),
            service_name: default_service_name(),
            internal_addr: default_internal_addr(),
            external_addr: default_external_addr(),
            key_bits: default_key_bits(),
            cert_authority: false,
            cert_organization: "Acme".into(),
            cert_country: "US".into(),
            cert_province: String::new(),
            cert_locality: String::new(),
            cert_street_address: String::new(),
            cert_postal_code: String::new(),
            cert_validity_days: default_cert_validity_days(),
            cert_hostnames: default_cert_hostnames(),
            max_body_bytes: default_max_body_bytes(),
            log_level: default_log_level(),
        }
    }

    #[test]
    fn defaults_are_correct() {
        assert_eq!(default_service_name(), "fwork");
        assert_eq!(default_internal_addr(), "0.0.0.0:8443");
        assert_eq!(default_external_addr(), "https://localhost:8443");
        assert_eq!(default_key_bits(), 4096);
        assert_eq!(default_cert_validity_days(), 3650);
        assert_eq!(default_cert_hostnames(), "localhost");
        assert_eq!(default_max_body_bytes(), 1024 * 1024);
        assert_eq!(default_log_level(), "info");
    }

    #[test]
    fn validate_accepts_defaults() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_service_id() {
        let cfg = Config {
            service_id: "  ".into(),
            ..valid()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_internal_addr() {
        let cfg = Config {
            internal_addr: "localhost".into(),
            ..valid()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_key_bits_out_of_range() {
        for bits in [1024, 16384] {
            let cfg = Config {
                key_bits: bits,
                ..valid()
            };
            assert!(cfg.validate().is_err(), "{bits}");
        }
    }

    #[test]
    fn validate_rejects_zero_validity() {
        let cfg = Config {
            cert_validity_days: 0,
            ..valid()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_body_limit() {
        let cfg = Config {
            max_body_bytes: 0,
            ..valid()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn subject_spans_validity_window_and_splits_hostnames() {
        let now = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        let cfg = Config {
            cert_validity_days: 10,
            cert_hostnames: " localhost, 10.0.0.1 ,,".into(),
            ..valid()
        };
        let s = cfg.subject(now);
        assert_eq!(s.not_before, now);
        assert_eq!(s.not_after - s.not_before, Duration::days(10));
        assert_eq!(s.subject_alt_names, vec!["localhost", "10.0.0.1"]);
        assert_eq!(s.serial_number, 1_700_000_000);
        assert_eq!(s.organization, "Acme");
    }

    #[test]
    fn authority_flag_selects_profile() {
        assert_eq!(valid().profile(), CertificateProfile::Leaf);
        let cfg = Config {
            cert_authority: true,
            ..valid()
        };
        assert_eq!(cfg.profile(), CertificateProfile::Authority);
    }
}
