use std::sync::Arc;

use gcipher_db::{
    models::{CertificateState, DbCertificate},
    storage::{CertificateFilter, CertificateStore, CertificateStream, Storage},
};

use super::{CaError, SerialNumber};

/// Owner scoped read access to issued certificates.
pub struct CertificateRegistry {
    db: Arc<dyn Storage>,
}

impl CertificateRegistry {
    pub fn new(db: Arc<dyn Storage>) -> Self {
        Self { db }
    }

    /// Look up one of `owner`'s certificates. Unknown serials, unparseable
    /// serials and serials belonging to someone else all yield
    /// [`CaError::NotFound`].
    #[tracing::instrument(skip(self))]
    pub async fn retrieve(&self, serial_number: &str, owner: &str) -> Result<DbCertificate, CaError> {
        let serial = SerialNumber::parse(serial_number).ok_or(CaError::NotFound)?;

        CertificateStore::get(self.db.as_ref(), &serial.to_hex(), owner)
            .await?
            .ok_or(CaError::NotFound)
    }

    /// Stream `owner`'s certificates in the given state (`""`, `all`,
    /// `valid` or `revoked`).
    #[tracing::instrument(skip(self))]
    pub async fn list(&self, owner: &str, state: &str) -> Result<CertificateStream, CaError> {
        let state = state
            .parse::<CertificateState>()
            .map_err(|e| CaError::malformed(e.to_string()))?;

        let filter = CertificateFilter {
            username: Some(owner.to_string()),
            state,
        };

        Ok(CertificateStore::list(self.db.as_ref(), filter).await?)
    }
}
