use std::sync::Arc;

use gcipher_db::storage::Storage;

use crate::{
    auth::PasswordAuthenticator,
    ca::{
        CertificateIssuer, CertificateRegistry, RandomSerialAllocator, RevocationTracker,
        SigningIdentities,
    },
};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct ApiContext {
    pub db: Arc<dyn Storage>,
    pub identities: Arc<SigningIdentities>,
    pub authenticator: Arc<PasswordAuthenticator>,
    pub issuer: Arc<CertificateIssuer>,
    pub registry: Arc<CertificateRegistry>,
    pub revocations: Arc<RevocationTracker>,
}

impl ApiContext {
    pub fn new(
        db: Arc<dyn Storage>,
        identities: Arc<SigningIdentities>,
        default_lifetime_days: u32,
    ) -> Self {
        Self {
            authenticator: Arc::new(PasswordAuthenticator::new(db.clone())),
            issuer: Arc::new(CertificateIssuer::new(
                identities.clone(),
                Arc::new(RandomSerialAllocator),
                db.clone(),
                default_lifetime_days,
            )),
            registry: Arc::new(CertificateRegistry::new(db.clone())),
            revocations: Arc::new(RevocationTracker::new(db.clone())),
            identities,
            db,
        }
    }
}
