use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A certificate issued by gcipher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CertificateView {
    /// Certificate in PEM format
    #[serde(rename = "cert")]
    pub cert_pem: String,
}
