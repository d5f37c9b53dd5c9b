use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Deserialize, Serialize, ToSchema)]
pub struct AuthParams {
    /// The username of the user to authenticate as.
    pub username: String,

    /// The password of the user to authenticate as.
    pub password: String,
}

impl fmt::Debug for AuthParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthParams")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}
