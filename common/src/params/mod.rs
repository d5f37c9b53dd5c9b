//! Input parameters for the various functions within gcipher.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

mod auth;
pub use auth::*;

mod certificate;
pub use certificate::*;

/// Every API call carries the caller's credentials next to the operation
/// specific payload.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct ApiRequest<T> {
    /// Credentials of the user performing the request.
    pub auth: AuthParams,

    /// Operation specific parameters.
    pub data: T,
}
