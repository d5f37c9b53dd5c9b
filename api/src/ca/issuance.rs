use std::sync::Arc;

use chrono::{DateTime, Utc};
use gcipher_db::{
    models::DbCertificate,
    storage::{CertificateStore, Storage},
};
use rcgen::{CertificateSigningRequestParams, IsCa};
use tracing::{info, warn};
use x509_parser::{certification_request::X509CertificationRequest, prelude::FromDer};

use super::{
    CaError, IssuancePolicy, SerialAllocator, SerialNumber, SigningIdentities, now, pem, to_offset,
};

/// Attempts made to find an unused serial number before giving up.
pub const MAX_SERIAL_ATTEMPTS: usize = 3;

#[derive(Debug, Clone)]
pub struct IssuedCertificate {
    pub serial_number: SerialNumber,
    pub cert_pem: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
}

/// Turns certificate signing requests into signed, persisted certificates.
pub struct CertificateIssuer {
    identities: Arc<SigningIdentities>,
    serials: Arc<dyn SerialAllocator>,
    db: Arc<dyn Storage>,
    default_lifetime_days: u32,
}

impl CertificateIssuer {
    pub fn new(
        identities: Arc<SigningIdentities>,
        serials: Arc<dyn SerialAllocator>,
        db: Arc<dyn Storage>,
        default_lifetime_days: u32,
    ) -> Self {
        Self {
            identities,
            serials,
            db,
            default_lifetime_days,
        }
    }

    /// Sign `csr` (DER or PEM) for `owner` and record it.
    ///
    /// Nothing is persisted unless the request is valid. A serial number
    /// already taken in storage is redrawn up to [`MAX_SERIAL_ATTEMPTS`]
    /// times in total.
    #[tracing::instrument(skip(self, csr))]
    pub async fn issue(
        &self,
        csr: &[u8],
        owner: &str,
        kind: &str,
        lifetime_days: i64,
    ) -> Result<IssuedCertificate, CaError> {
        let csr_pem = verify_csr(csr)?;
        let policy = IssuancePolicy::resolve(kind, lifetime_days, self.default_lifetime_days);
        let (not_before, not_after) = policy.validity(now()?)?;
        let validity = (
            to_offset(not_before)?,
            to_offset(not_after).map_err(|_| CaError::malformed("Requested lifetime is out of range"))?,
        );
        let identity = self.identities.active();

        let mut parsed = Some(parse_csr(&csr_pem)?);

        for attempt in 1..=MAX_SERIAL_ATTEMPTS {
            let mut request = match parsed.take() {
                Some(request) => request,
                None => parse_csr(&csr_pem)?,
            };

            let serial_number = self.serials.allocate()?;

            request.params.serial_number = Some((&serial_number).into());
            request.params.not_before = validity.0;
            request.params.not_after = validity.1;
            request.params.key_usages = policy.kind.key_usages();
            request.params.extended_key_usages = policy.kind.extended_key_usages();
            request.params.is_ca = IsCa::ExplicitNoCa;
            request.params.use_authority_key_identifier_extension = true;

            let cert = identity.sign_certificate(request)?;
            let cert_pem = pem::encode(pem::CERTIFICATE, cert.der())?;

            let record = DbCertificate::new(serial_number.to_hex(), cert_pem.clone(), owner, not_before);

            match CertificateStore::insert(self.db.as_ref(), record).await {
                Ok(_) => {
                    info!(
                        serial = %serial_number,
                        kind = ?policy.kind,
                        lifetime_days = policy.lifetime_days,
                        "Issued certificate"
                    );

                    return Ok(IssuedCertificate {
                        serial_number,
                        cert_pem,
                        not_before,
                        not_after,
                    });
                }
                Err(e) if e.is_duplicate() => {
                    warn!(attempt, serial = %serial_number, "Serial number already in use, drawing another");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(CaError::SerialCollision {
            attempts: MAX_SERIAL_ATTEMPTS,
        })
    }
}

/// Check that `csr` is a well formed request carrying a valid self
/// signature. Returns it PEM encoded.
fn verify_csr(csr: &[u8]) -> Result<String, CaError> {
    let der = if pem::looks_like_pem(csr) {
        pem::decode_first(csr)
            .filter(|b| b.label == pem::CERTIFICATE_REQUEST || b.label == "NEW CERTIFICATE REQUEST")
            .ok_or_else(|| CaError::malformed("Invalid CSR format"))?
            .contents
    } else {
        csr.to_vec()
    };

    let (rest, request) = X509CertificationRequest::from_der(&der)
        .map_err(|_| CaError::malformed("Failed to parse CSR"))?;

    if !rest.is_empty() {
        return Err(CaError::malformed("Failed to parse CSR"));
    }

    request
        .verify_signature()
        .map_err(|_| CaError::malformed("CSR signature verification failed"))?;

    pem::encode(pem::CERTIFICATE_REQUEST, &der)
}

fn parse_csr(csr_pem: &str) -> Result<CertificateSigningRequestParams, CaError> {
    CertificateSigningRequestParams::from_pem(csr_pem)
        .map_err(|e| CaError::malformed(format!("Failed to parse CSR: {}", e)))
}
