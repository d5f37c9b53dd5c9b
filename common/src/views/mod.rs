//! Output views for the various functions within gcipher.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

mod certificate;
pub use certificate::*;

/// Envelope wrapping every API response. Successful responses carry `data`,
/// failed ones carry `errors`.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ApiErrorResponse>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            errors: Vec::new(),
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    /// A successful response without a payload.
    pub fn success() -> Self {
        Self {
            success: true,
            errors: Vec::new(),
            data: None,
        }
    }

    pub fn error(code: u16, message: impl Into<String>) -> Self {
        Self {
            success: false,
            errors: vec![ApiErrorResponse {
                code,
                message: message.into(),
            }],
            data: None,
        }
    }
}

/// A single error reported to the client.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
pub struct ApiErrorResponse {
    /// The HTTP status code the error was reported with.
    pub code: u16,

    /// A human-readable message describing the error that occurred.
    pub message: String,
}
