//! Authentication of the credentials carried in every API request body.

pub mod error;
pub mod password;

pub use error::AuthError;
pub use password::PasswordAuthenticator;
