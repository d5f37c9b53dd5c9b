use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use gcipher_common::views::ApiResponse;
use gcipher_db::storage::StoreError;
use thiserror::Error;

use crate::{auth::AuthError, ca::CaError};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    MalformedRequest(String),

    #[error("Unauthenticated")]
    Unauthenticated,

    #[error("{0}")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(&'static str),

    #[error(transparent)]
    Storage(#[from] StoreError),

    #[error(transparent)]
    Ca(CaError),

    #[error(transparent)]
    InternalAnyhow(#[from] anyhow::Error),
}

impl ApiError {
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedRequest(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MalformedRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Storage(_) | Self::Ca(_) | Self::InternalAnyhow(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// The message sent to the client. Internal failures are not described.
    pub fn public_message(&self) -> String {
        match self {
            Self::MalformedRequest(message) => message.clone(),
            Self::Unauthenticated => "Unauthenticated".into(),
            Self::NotFound(message) | Self::Conflict(message) => (*message).into(),
            Self::Storage(_) | Self::Ca(_) | Self::InternalAnyhow(_) => {
                "Internal server error".into()
            }
        }
    }
}

impl From<CaError> for ApiError {
    fn from(err: CaError) -> Self {
        match err {
            CaError::MalformedRequest(message) => Self::MalformedRequest(message),
            CaError::NotFound => Self::NotFound("Certificate not found"),
            CaError::AlreadyRevoked => Self::Conflict("Certificate already revoked"),
            CaError::SerialCollision { .. } => {
                Self::Conflict("Could not allocate a serial number, please retry")
            }
            CaError::Storage(e) => Self::Storage(e),
            other => Self::Ca(other),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingCredentials | AuthError::InvalidCredentials => Self::Unauthenticated,
            AuthError::Storage(e) => Self::Storage(e),
            AuthError::Other(e) => Self::InternalAnyhow(e),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!(error = %rejection, "Rejected request body");
        Self::malformed("Invalid request body")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status_code = self.status_code();

        if status_code.is_server_error() {
            tracing::error!("Error returned by handler: {self}");
        } else {
            tracing::info!(status = status_code.as_u16(), "Request failed: {self}");
        }

        let body = ApiResponse::error(status_code.as_u16(), self.public_message());
        (status_code, Json(body)).into_response()
    }
}
