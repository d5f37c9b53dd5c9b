use std::fmt::Debug;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use thiserror::Error;

use crate::models::{CertificateState, DbCertificate, DbCrl, DbUser};

pub mod memory;
pub mod mongodb;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Query Error: {0}")]
    MongoDB(#[from] ::mongodb::error::Error),

    #[error("Serialization Error: {0}")]
    Serialization(#[from] ::mongodb::bson::ser::Error),

    /// A uniqueness constraint rejected the write.
    #[error("Duplicate {entity}: {key}")]
    Duplicate { entity: &'static str, key: String },

    #[error(transparent)]
    Internal(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, StoreError::Duplicate { .. })
    }
}

/// A lazy, one-shot sequence of certificate records.
pub type CertificateStream = BoxStream<'static, Result<DbCertificate, StoreError>>;

#[async_trait]
pub trait Storage: CertificateStore + CrlStore + UserStore + Debug + Send + Sync + 'static {
    async fn ping(&self) -> Result<(), StoreError>;
}

#[derive(Debug, Default, Clone)]
pub struct CertificateFilter {
    pub username: Option<String>,
    pub state: CertificateState,
}

#[async_trait]
pub trait CertificateStore {
    /// Insert a new record. Fails with [`StoreError::Duplicate`] when the
    /// serial number is already taken.
    async fn insert(&self, cert: DbCertificate) -> Result<DbCertificate, StoreError>;

    /// Look up a record by serial number, scoped to its owner.
    async fn get(
        &self,
        serial_number: &str,
        username: &str,
    ) -> Result<Option<DbCertificate>, StoreError>;

    /// Set `revoked_at` on the owner's record if it is not revoked yet.
    /// Returns `None` when no unrevoked record matched.
    async fn mark_revoked(
        &self,
        serial_number: &str,
        username: &str,
        revoked_at: DateTime<Utc>,
    ) -> Result<Option<DbCertificate>, StoreError>;

    async fn list(&self, filter: CertificateFilter) -> Result<CertificateStream, StoreError>;

    /// Administrative removal of a record. Returns whether a record existed.
    async fn delete(&self, serial_number: &str) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait CrlStore {
    /// Replace the issuer's current list, creating it if needed.
    async fn upsert(&self, crl: DbCrl) -> Result<(), StoreError>;

    async fn get(&self, issuer: &str) -> Result<Option<DbCrl>, StoreError>;
}

#[async_trait]
pub trait UserStore {
    async fn get(&self, username: &str) -> Result<Option<DbUser>, StoreError>;

    /// Fails with [`StoreError::Duplicate`] when the username is taken.
    async fn create(&self, user: DbUser) -> Result<DbUser, StoreError>;
}
