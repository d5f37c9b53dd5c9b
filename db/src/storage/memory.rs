use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use tokio::sync::RwLock;

use crate::{
    models::{DbCertificate, DbCrl, DbUser},
    storage::{
        CertificateFilter, CertificateStore, CertificateStream, CrlStore, Storage, StoreError,
        UserStore,
    },
};

/// Process-local storage. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    certificates: RwLock<BTreeMap<String, DbCertificate>>,
    crls: RwLock<HashMap<String, DbCrl>>,
    users: RwLock<HashMap<String, DbUser>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[async_trait]
impl CertificateStore for MemoryStorage {
    async fn insert(&self, cert: DbCertificate) -> Result<DbCertificate, StoreError> {
        let mut certificates = self.certificates.write().await;
        if certificates.contains_key(&cert.serial_number) {
            return Err(StoreError::Duplicate {
                entity: "certificate",
                key: cert.serial_number,
            });
        }

        certificates.insert(cert.serial_number.clone(), cert.clone());
        Ok(cert)
    }

    async fn get(
        &self,
        serial_number: &str,
        username: &str,
    ) -> Result<Option<DbCertificate>, StoreError> {
        Ok(self
            .certificates
            .read()
            .await
            .get(serial_number)
            .filter(|c| c.username == username)
            .cloned())
    }

    async fn mark_revoked(
        &self,
        serial_number: &str,
        username: &str,
        revoked_at: DateTime<Utc>,
    ) -> Result<Option<DbCertificate>, StoreError> {
        let mut certificates = self.certificates.write().await;
        match certificates.get_mut(serial_number) {
            Some(cert) if cert.username == username && cert.revoked_at.is_none() => {
                cert.revoked_at = Some(revoked_at);
                Ok(Some(cert.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn list(&self, filter: CertificateFilter) -> Result<CertificateStream, StoreError> {
        let items: Vec<DbCertificate> = self
            .certificates
            .read()
            .await
            .values()
            .filter(|c| filter.username.as_ref().is_none_or(|u| &c.username == u))
            .filter(|c| filter.state.matches(c))
            .cloned()
            .collect();

        Ok(futures::stream::iter(items.into_iter().map(Ok)).boxed())
    }

    async fn delete(&self, serial_number: &str) -> Result<bool, StoreError> {
        Ok(self
            .certificates
            .write()
            .await
            .remove(serial_number)
            .is_some())
    }
}

#[async_trait]
impl CrlStore for MemoryStorage {
    async fn upsert(&self, crl: DbCrl) -> Result<(), StoreError> {
        self.crls.write().await.insert(crl.issuer.clone(), crl);
        Ok(())
    }

    async fn get(&self, issuer: &str) -> Result<Option<DbCrl>, StoreError> {
        Ok(self.crls.read().await.get(issuer).cloned())
    }
}

#[async_trait]
impl UserStore for MemoryStorage {
    async fn get(&self, username: &str) -> Result<Option<DbUser>, StoreError> {
        Ok(self.users.read().await.get(username).cloned())
    }

    async fn create(&self, user: DbUser) -> Result<DbUser, StoreError> {
        let mut users = self.users.write().await;
        if users.contains_key(&user.username) {
            return Err(StoreError::Duplicate {
                entity: "user",
                key: user.username,
            });
        }

        users.insert(user.username.clone(), user.clone());
        Ok(user)
    }
}
