use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use gcipher_common::views::CertificateView;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbCertificate {
    /// Lowercase hex serial number without leading zeros. Unique.
    pub serial_number: String,

    /// Issued certificate in PEM format
    pub certificate_pem: String,

    /// Username of the user that requested the certificate
    pub username: String,

    /// When the certificate was signed
    pub issued_at: DateTime<Utc>,

    /// Set once when the certificate is revoked, never cleared
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revoked_at: Option<DateTime<Utc>>,
}

impl DbCertificate {
    pub fn new(
        serial_number: impl Into<String>,
        certificate_pem: impl Into<String>,
        username: impl Into<String>,
        issued_at: DateTime<Utc>,
    ) -> Self {
        Self {
            serial_number: serial_number.into(),
            certificate_pem: certificate_pem.into(),
            username: username.into(),
            issued_at,
            revoked_at: None,
        }
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    pub fn state(&self) -> CertificateState {
        if self.is_revoked() {
            CertificateState::Revoked
        } else {
            CertificateState::Valid
        }
    }
}

impl Display for DbCertificate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "DbCertificate {{ serial_number: {}, username: {}, revoked_at: {:?} }}",
            self.serial_number, self.username, self.revoked_at
        )
    }
}

impl From<DbCertificate> for CertificateView {
    fn from(value: DbCertificate) -> Self {
        Self {
            cert_pem: value.certificate_pem,
        }
    }
}

/// Revocation state used to filter certificate listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CertificateState {
    #[default]
    All,
    Valid,
    Revoked,
}

impl CertificateState {
    pub fn matches(&self, cert: &DbCertificate) -> bool {
        match self {
            CertificateState::All => true,
            CertificateState::Valid => !cert.is_revoked(),
            CertificateState::Revoked => cert.is_revoked(),
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown certificate state: {0:?}")]
pub struct UnknownStateError(pub String);

impl FromStr for CertificateState {
    type Err = UnknownStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "all" => Ok(Self::All),
            "valid" => Ok(Self::Valid),
            "revoked" => Ok(Self::Revoked),
            other => Err(UnknownStateError(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_tokens() {
        assert_eq!("".parse::<CertificateState>().unwrap(), CertificateState::All);
        assert_eq!("all".parse::<CertificateState>().unwrap(), CertificateState::All);
        assert_eq!("Valid".parse::<CertificateState>().unwrap(), CertificateState::Valid);
        assert_eq!(
            " revoked ".parse::<CertificateState>().unwrap(),
            CertificateState::Revoked
        );
        assert!("expired".parse::<CertificateState>().is_err());
    }

    #[test]
    fn state_follows_revoked_at() {
        let mut cert = DbCertificate::new("01", "pem", "alice", Utc::now());
        assert_eq!(cert.state(), CertificateState::Valid);
        assert!(CertificateState::Valid.matches(&cert));
        assert!(!CertificateState::Revoked.matches(&cert));

        cert.revoked_at = Some(Utc::now());
        assert_eq!(cert.state(), CertificateState::Revoked);
        assert!(CertificateState::All.matches(&cert));
        assert!(CertificateState::Revoked.matches(&cert));
    }
}
