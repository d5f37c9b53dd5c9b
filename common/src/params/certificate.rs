use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Parameters for requesting a new certificate.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct IssueCertificateParams {
    /// Base64 encoded certificate signing request. Both DER and PEM encoded
    /// requests are accepted inside the base64 envelope.
    pub csr: String,

    /// Intended usage of the certificate. `client` yields a client
    /// authentication certificate, anything else a server certificate.
    #[serde(default, rename = "type")]
    pub kind: String,

    /// Requested lifetime in days. Values below 1 select the configured
    /// default lifetime.
    #[serde(default)]
    pub lifetime: i64,
}

/// Parameters addressing a single certificate by its serial number.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct CertificateSerialParams {
    /// Hex encoded serial number of the certificate.
    #[serde(default, rename = "serialnumber")]
    pub serial_number: String,
}

/// Parameters for listing certificates.
#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
pub struct ListCertificatesParams {
    /// One of `all` (or empty), `valid` or `revoked`.
    #[serde(default)]
    pub state: String,
}
