use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing credentials")]
    MissingCredentials,

    /// Unknown user or wrong password; the two are not told apart.
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error(transparent)]
    Storage(#[from] gcipher_db::storage::StoreError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
