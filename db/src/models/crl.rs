use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The current revocation list of one issuer. There is at most one record
/// per issuer; every generation replaces it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbCrl {
    /// Issuer identifier (`sha256:<hex>` fingerprint of the signing
    /// certificate)
    pub issuer: String,

    /// DER encoded CRL
    pub crl_der: Vec<u8>,

    /// When this list was generated
    pub updated_at: DateTime<Utc>,
}
