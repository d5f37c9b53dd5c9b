//! Certificate authority core: signing identities, issuance, revocation and
//! revocation list publication.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;

mod bootstrap;
mod crl;
mod error;
mod identity;
mod issuance;
mod policy;
mod records;
mod revocation;
mod serial;
mod source;

pub mod pem;

#[cfg(test)]
pub(crate) mod testing;

pub use bootstrap::{GeneratedCa, generate_ca};
pub use crl::{CrlGenerator, DEFAULT_CRL_INTERVAL};
pub use error::CaError;
pub use identity::{IdentitySource, KeyKind, SigningIdentities, SigningIdentity};
pub use issuance::{CertificateIssuer, IssuedCertificate, MAX_SERIAL_ATTEMPTS};
pub use policy::{CertificateKind, IssuancePolicy};
pub use records::CertificateRegistry;
pub use revocation::RevocationTracker;
pub use serial::{RandomSerialAllocator, SerialAllocator, SerialNumber};
pub use source::MaterialSource;

/// `sha256:<hex>` fingerprint of a DER encoded certificate.
pub fn fingerprint(der: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(der);
    format!("sha256:{}", hex::encode(hasher.finalize()))
}

/// The current time truncated to whole seconds.
pub(crate) fn now() -> Result<DateTime<Utc>, CaError> {
    DateTime::from_timestamp(Utc::now().timestamp(), 0)
        .ok_or_else(|| CaError::Generation("System clock out of range".into()))
}

pub(crate) fn to_offset(at: DateTime<Utc>) -> Result<OffsetDateTime, CaError> {
    OffsetDateTime::from_unix_timestamp(at.timestamp())
        .map_err(|e| CaError::Generation(format!("Invalid timestamp: {}", e)))
}
