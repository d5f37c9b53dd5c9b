use chrono::{DateTime, TimeDelta, Utc};
use rcgen::{ExtendedKeyUsagePurpose, KeyUsagePurpose};

use super::CaError;

/// Intended use of an issued certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertificateKind {
    Client,
    Server,
}

impl CertificateKind {
    /// `"client"` selects a client certificate. Any other value, including
    /// an empty one, selects a server certificate.
    pub fn from_request(kind: &str) -> Self {
        match kind {
            "client" => Self::Client,
            _ => Self::Server,
        }
    }

    pub fn key_usages(&self) -> Vec<KeyUsagePurpose> {
        vec![
            KeyUsagePurpose::DigitalSignature,
            KeyUsagePurpose::KeyEncipherment,
        ]
    }

    pub fn extended_key_usages(&self) -> Vec<ExtendedKeyUsagePurpose> {
        match self {
            Self::Client => vec![ExtendedKeyUsagePurpose::ClientAuth],
            Self::Server => vec![ExtendedKeyUsagePurpose::ServerAuth],
        }
    }
}

/// Resolved usage and lifetime for a single issuance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IssuancePolicy {
    pub kind: CertificateKind,
    pub lifetime_days: i64,
}

impl IssuancePolicy {
    /// Lifetimes below one day fall back to `default_lifetime_days`. There
    /// is no upper bound.
    pub fn resolve(kind: &str, requested_lifetime_days: i64, default_lifetime_days: u32) -> Self {
        let lifetime_days = if requested_lifetime_days < 1 {
            i64::from(default_lifetime_days)
        } else {
            requested_lifetime_days
        };

        Self {
            kind: CertificateKind::from_request(kind),
            lifetime_days,
        }
    }

    /// Validity window starting at `not_before`.
    pub fn validity(
        &self,
        not_before: DateTime<Utc>,
    ) -> Result<(DateTime<Utc>, DateTime<Utc>), CaError> {
        let not_after = TimeDelta::try_days(self.lifetime_days)
            .and_then(|lifetime| not_before.checked_add_signed(lifetime))
            .ok_or_else(|| CaError::malformed("Requested lifetime is out of range"))?;

        Ok((not_before, not_after))
    }
}
