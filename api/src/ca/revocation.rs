use std::sync::Arc;

use chrono::Utc;
use gcipher_db::{
    models::DbCertificate,
    storage::{CertificateStore, Storage},
};
use tracing::info;

use super::{CaError, SerialNumber};

/// Moves certificates from valid to revoked. Revocation is terminal.
pub struct RevocationTracker {
    db: Arc<dyn Storage>,
}

impl RevocationTracker {
    pub fn new(db: Arc<dyn Storage>) -> Self {
        Self { db }
    }

    #[tracing::instrument(skip(self))]
    pub async fn revoke(&self, serial_number: &str, owner: &str) -> Result<DbCertificate, CaError> {
        let serial = SerialNumber::parse(serial_number).ok_or(CaError::NotFound)?.to_hex();

        let existing = CertificateStore::get(self.db.as_ref(), &serial, owner)
            .await?
            .ok_or(CaError::NotFound)?;

        if existing.is_revoked() {
            return Err(CaError::AlreadyRevoked);
        }

        // The update only matches unrevoked records, so a concurrent
        // revocation that got there first leaves nothing to update.
        let revoked = CertificateStore::mark_revoked(self.db.as_ref(), &serial, owner, Utc::now())
            .await?
            .ok_or(CaError::AlreadyRevoked)?;

        info!(serial = %serial, "Revoked certificate");
        Ok(revoked)
    }
}
