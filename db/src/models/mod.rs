pub mod certificate;
pub mod crl;
pub mod user;

pub use certificate::*;
pub use crl::*;
pub use user::*;
