use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::{StreamExt, TryStreamExt};
use mongodb::{
    Client, Collection, Database, IndexModel,
    bson::{Bson, doc},
    error::{ErrorKind, WriteFailure},
    options::{IndexOptions, ReturnDocument},
};
use tracing::debug;

use crate::{
    models::{CertificateState, DbCertificate, DbCrl, DbUser},
    storage::{
        CertificateFilter, CertificateStore, CertificateStream, CrlStore, Storage, StoreError,
        UserStore,
    },
};

pub const MONGODB_COLLECTION_CERTIFICATES: &str = "certificates";
pub const MONGODB_COLLECTION_CRLS: &str = "crls";
pub const MONGODB_COLLECTION_USERS: &str = "users";

const DUPLICATE_KEY_CODE: i32 = 11000;

#[derive(Debug)]
pub struct MongoDBStorage(Client);

impl MongoDBStorage {
    pub async fn new(uri: &str) -> Result<Self, mongodb::error::Error> {
        let client = Client::with_uri_str(uri).await?;
        let storage = Self(client);
        storage.ensure_indexes().await?;
        Ok(storage)
    }

    fn get_db(&self) -> Database {
        self.0
            .default_database()
            .unwrap_or_else(|| self.0.database("gcipher"))
    }

    fn certificates(&self) -> Collection<DbCertificate> {
        self.get_db()
            .collection::<DbCertificate>(MONGODB_COLLECTION_CERTIFICATES)
    }

    fn crls(&self) -> Collection<DbCrl> {
        self.get_db().collection::<DbCrl>(MONGODB_COLLECTION_CRLS)
    }

    fn users(&self) -> Collection<DbUser> {
        self.get_db().collection::<DbUser>(MONGODB_COLLECTION_USERS)
    }

    /// Serial numbers, issuers and usernames are unique; the indexes are what
    /// enforces it.
    async fn ensure_indexes(&self) -> Result<(), mongodb::error::Error> {
        let unique = || IndexOptions::builder().unique(true).build();

        self.certificates()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "serial_number": 1 })
                    .options(unique())
                    .build(),
            )
            .await?;
        self.certificates()
            .create_index(IndexModel::builder().keys(doc! { "username": 1 }).build())
            .await?;
        self.crls()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "issuer": 1 })
                    .options(unique())
                    .build(),
            )
            .await?;
        self.users()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "username": 1 })
                    .options(unique())
                    .build(),
            )
            .await?;

        debug!("MongoDB indexes ensured");
        Ok(())
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(e)) => e.code == DUPLICATE_KEY_CODE,
        _ => false,
    }
}

#[async_trait]
impl Storage for MongoDBStorage {
    async fn ping(&self) -> Result<(), StoreError> {
        self.get_db().run_command(doc! { "ping": 1 }).await?;
        Ok(())
    }
}

#[async_trait]
impl CertificateStore for MongoDBStorage {
    async fn insert(&self, cert: DbCertificate) -> Result<DbCertificate, StoreError> {
        match self.certificates().insert_one(&cert).await {
            Ok(_) => Ok(cert),
            Err(e) if is_duplicate_key(&e) => Err(StoreError::Duplicate {
                entity: "certificate",
                key: cert.serial_number,
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn get(
        &self,
        serial_number: &str,
        username: &str,
    ) -> Result<Option<DbCertificate>, StoreError> {
        Ok(self
            .certificates()
            .find_one(doc! { "serial_number": serial_number, "username": username })
            .await?)
    }

    async fn mark_revoked(
        &self,
        serial_number: &str,
        username: &str,
        revoked_at: DateTime<Utc>,
    ) -> Result<Option<DbCertificate>, StoreError> {
        let revoked_at = mongodb::bson::to_bson(&revoked_at)?;

        Ok(self
            .certificates()
            .find_one_and_update(
                doc! {
                    "serial_number": serial_number,
                    "username": username,
                    "revoked_at": Bson::Null,
                },
                doc! { "$set": { "revoked_at": revoked_at } },
            )
            .return_document(ReturnDocument::After)
            .await?)
    }

    async fn list(&self, filter: CertificateFilter) -> Result<CertificateStream, StoreError> {
        let mut filter_doc = doc! {};
        if let Some(username) = filter.username {
            filter_doc.insert("username", username);
        }
        match filter.state {
            CertificateState::All => {}
            CertificateState::Valid => {
                filter_doc.insert("revoked_at", Bson::Null);
            }
            CertificateState::Revoked => {
                filter_doc.insert("revoked_at", doc! { "$ne": Bson::Null });
            }
        }

        let cursor = self
            .certificates()
            .find(filter_doc)
            .sort(doc! { "issued_at": 1 })
            .await?;

        Ok(cursor.map_err(StoreError::MongoDB).boxed())
    }

    async fn delete(&self, serial_number: &str) -> Result<bool, StoreError> {
        let result = self
            .certificates()
            .delete_one(doc! { "serial_number": serial_number })
            .await?;

        Ok(result.deleted_count > 0)
    }
}

#[async_trait]
impl CrlStore for MongoDBStorage {
    async fn upsert(&self, crl: DbCrl) -> Result<(), StoreError> {
        self.crls()
            .replace_one(doc! { "issuer": &crl.issuer }, &crl)
            .upsert(true)
            .await?;
        Ok(())
    }

    async fn get(&self, issuer: &str) -> Result<Option<DbCrl>, StoreError> {
        Ok(self.crls().find_one(doc! { "issuer": issuer }).await?)
    }
}

#[async_trait]
impl UserStore for MongoDBStorage {
    async fn get(&self, username: &str) -> Result<Option<DbUser>, StoreError> {
        Ok(self.users().find_one(doc! { "username": username }).await?)
    }

    async fn create(&self, user: DbUser) -> Result<DbUser, StoreError> {
        match self.users().insert_one(&user).await {
            Ok(_) => Ok(user),
            Err(e) if is_duplicate_key(&e) => Err(StoreError::Duplicate {
                entity: "user",
                key: user.username,
            }),
            Err(e) => Err(e.into()),
        }
    }
}
