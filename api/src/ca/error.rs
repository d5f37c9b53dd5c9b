use gcipher_db::storage::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum CaError {
    /// The request cannot be acted upon as sent.
    #[error("{0}")]
    MalformedRequest(String),

    #[error("Certificate not found")]
    NotFound,

    #[error("Certificate already revoked")]
    AlreadyRevoked,

    #[error("No free serial number found after {attempts} attempts")]
    SerialCollision { attempts: usize },

    /// Signing material is missing or unusable. Only raised at startup.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Unsupported signing key type: {0}")]
    UnsupportedKeyType(String),

    #[error("Randomness source failed: {0}")]
    Randomness(getrandom::Error),

    #[error("Certificate generation error: {0}")]
    Generation(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

impl CaError {
    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedRequest(message.into())
    }
}
