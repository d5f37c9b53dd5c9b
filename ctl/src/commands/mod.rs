mod create_user;
mod delete_cert;
mod generate_ca;
mod import_certs;

pub use create_user::*;
pub use delete_cert::*;
pub use generate_ca::*;
pub use import_certs::*;
