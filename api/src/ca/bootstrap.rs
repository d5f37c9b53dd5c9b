use chrono::{DateTime, TimeDelta, Utc};
use rcgen::{BasicConstraints, CertificateParams, DistinguishedName, DnType, IsCa, KeyPair};

use super::{CaError, fingerprint, now, pem, to_offset};

/// A freshly generated self-signed CA.
#[derive(Debug, Clone)]
pub struct GeneratedCa {
    pub cert_pem: String,
    pub key_pem: String,
    pub fingerprint: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
}

/// Generate a self-signed P-256 root usable as gcipher's signing identity.
pub fn generate_ca(common_name: &str, validity_days: u32) -> Result<GeneratedCa, CaError> {
    let key_pair = KeyPair::generate_for(&rcgen::PKCS_ECDSA_P256_SHA256)
        .map_err(|e| CaError::Generation(format!("Failed to generate keypair: {}", e)))?;

    let mut params = CertificateParams::default();

    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, common_name);
    params.distinguished_name = dn;

    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);

    let not_before = now()?;
    let not_after = TimeDelta::try_days(i64::from(validity_days))
        .and_then(|validity| not_before.checked_add_signed(validity))
        .ok_or_else(|| CaError::Generation("CA validity out of range".into()))?;
    params.not_before = to_offset(not_before)?;
    params.not_after = to_offset(not_after)?;

    // CrlSign is required to publish revocation lists
    params.key_usages = vec![
        rcgen::KeyUsagePurpose::DigitalSignature,
        rcgen::KeyUsagePurpose::KeyCertSign,
        rcgen::KeyUsagePurpose::CrlSign,
    ];

    let cert = params
        .self_signed(&key_pair)
        .map_err(|e| CaError::Generation(format!("Failed to self-sign CA: {}", e)))?;

    Ok(GeneratedCa {
        cert_pem: pem::encode(pem::CERTIFICATE, cert.der())?,
        key_pem: key_pair.serialize_pem(),
        fingerprint: fingerprint(cert.der()),
        not_before,
        not_after,
    })
}
