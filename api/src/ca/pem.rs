//! PEM helpers. Everything gcipher emits is encoded here so a certificate
//! read back from storage is byte-identical to the one handed out.

use pem_rfc7468::LineEnding;
use x509_parser::pem::Pem;

use super::CaError;

pub const CERTIFICATE: &str = "CERTIFICATE";
pub const CERTIFICATE_REQUEST: &str = "CERTIFICATE REQUEST";
pub const X509_CRL: &str = "X509 CRL";
pub const PRIVATE_KEY: &str = "PRIVATE KEY";
pub const ENCRYPTED_PRIVATE_KEY: &str = "ENCRYPTED PRIVATE KEY";
pub const RSA_PRIVATE_KEY: &str = "RSA PRIVATE KEY";
pub const EC_PRIVATE_KEY: &str = "EC PRIVATE KEY";
pub const EC_PARAMETERS: &str = "EC PARAMETERS";

pub fn encode(label: &str, der: &[u8]) -> Result<String, CaError> {
    pem_rfc7468::encode_string(label, LineEnding::LF, der)
        .map_err(|e| CaError::Generation(format!("Failed to encode {label} PEM: {e}")))
}

/// Read the first PEM block of `input`, tolerating explanatory text around
/// it the way OpenSSL output often carries.
pub fn decode_first(input: &[u8]) -> Option<Pem> {
    Pem::iter_from_buffer(input).next()?.ok()
}

/// All PEM blocks of `input` in order. Malformed blocks end the iteration.
pub fn decode_all(input: &[u8]) -> Vec<Pem> {
    Pem::iter_from_buffer(input).map_while(Result::ok).collect()
}

pub fn looks_like_pem(input: &[u8]) -> bool {
    input.trim_ascii_start().starts_with(b"-----BEGIN ")
}
