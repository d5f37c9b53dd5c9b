use std::{fmt::Display, sync::Arc};

use chrono::{DateTime, Utc};
use gcipher_common::caller::{ApiCaller, Caller, CallerKind};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbUser {
    pub username: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl Display for DbUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DbUser {{ username: {} }}", self.username)
    }
}

impl DbUser {
    /// Build a new user, hashing `password` with bcrypt.
    pub fn with_password(
        username: impl Into<String>,
        password: &str,
        cost: u32,
    ) -> Result<Self, bcrypt::BcryptError> {
        Ok(Self {
            username: username.into(),
            password_hash: bcrypt::hash(password, cost)?,
            created_at: Utc::now(),
        })
    }

    /// Check `password` against the stored hash. A malformed hash never
    /// verifies.
    pub fn verify_password(&self, password: &str) -> bool {
        bcrypt::verify(password, &self.password_hash).unwrap_or(false)
    }

    pub fn to_caller(&self) -> Caller {
        Caller::new(Arc::new(self.clone()))
    }
}

impl ApiCaller for DbUser {
    fn kind(&self) -> CallerKind {
        CallerKind::User
    }

    fn username(&self) -> &str {
        &self.username
    }
}
