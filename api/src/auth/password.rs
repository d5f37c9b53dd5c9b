use std::sync::Arc;

use gcipher_common::{caller::Caller, params::AuthParams};
use gcipher_db::{
    models::DbUser,
    storage::{Storage, UserStore},
};
use tokio::sync::OnceCell;
use tracing::{debug, instrument};

use super::AuthError;

/// Checks username and password against the bcrypt hashes in storage.
pub struct PasswordAuthenticator {
    db: Arc<dyn Storage>,
    cost: u32,
    /// Checked in place of a user that does not exist, so unknown names
    /// cost the same bcrypt round as a wrong password.
    placeholder: OnceCell<DbUser>,
}

impl PasswordAuthenticator {
    pub fn new(db: Arc<dyn Storage>) -> Self {
        Self::with_cost(db, bcrypt::DEFAULT_COST)
    }

    /// `cost` should match the work factor user hashes were created with.
    pub fn with_cost(db: Arc<dyn Storage>, cost: u32) -> Self {
        Self {
            db,
            cost,
            placeholder: OnceCell::new(),
        }
    }

    async fn placeholder(&self) -> Result<DbUser, AuthError> {
        let cost = self.cost;
        self.placeholder
            .get_or_try_init(|| async move {
                tokio::task::spawn_blocking(move || DbUser::with_password("", "gcipher", cost))
                    .await
                    .map_err(|e| AuthError::Other(e.into()))?
                    .map_err(|e| AuthError::Other(e.into()))
            })
            .await
            .cloned()
    }

    #[instrument(skip_all, fields(username = %params.username))]
    pub async fn authenticate(&self, params: &AuthParams) -> Result<Caller, AuthError> {
        if params.username.is_empty() || params.password.is_empty() {
            return Err(AuthError::MissingCredentials);
        }

        let (user, known) = match UserStore::get(self.db.as_ref(), &params.username).await? {
            Some(user) => (user, true),
            None => (self.placeholder().await?, false),
        };

        // bcrypt verification blocks
        let password = params.password.clone();
        let verified = tokio::task::spawn_blocking(move || user.verify_password(&password).then_some(user))
            .await
            .map_err(|e| AuthError::Other(e.into()))?;

        match verified {
            Some(user) if known => {
                debug!("Authenticated");
                Ok(user.to_caller())
            }
            _ => {
                debug!(known, "Rejected credentials");
                Err(AuthError::InvalidCredentials)
            }
        }
    }
}
