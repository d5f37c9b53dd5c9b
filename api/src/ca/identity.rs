use std::fmt;

use pkcs8::{
    AlgorithmIdentifierRef, ObjectIdentifier, PrivateKeyInfo,
    der::{Decode, Encode, Tag, asn1::AnyRef},
};
use rcgen::{
    Certificate, CertificateParams, CertificateRevocationList, CertificateRevocationListParams,
    CertificateSigningRequestParams, KeyIdMethod, KeyPair,
};
use tracing::{info, warn};
use x509_parser::{
    extensions::ParsedExtension,
    prelude::{FromDer, X509Certificate},
};

use super::{CaError, MaterialSource, fingerprint, pem};

/// Signature scheme family of a signing key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    Rsa,
    Ec,
}

impl KeyKind {
    fn of(key: &KeyPair) -> Result<Self, CaError> {
        let alg = key.algorithm();

        if alg == &rcgen::PKCS_RSA_SHA256
            || alg == &rcgen::PKCS_RSA_SHA384
            || alg == &rcgen::PKCS_RSA_SHA512
        {
            Ok(Self::Rsa)
        } else if alg == &rcgen::PKCS_ECDSA_P256_SHA256 || alg == &rcgen::PKCS_ECDSA_P384_SHA384 {
            Ok(Self::Ec)
        } else {
            Err(CaError::UnsupportedKeyType(format!("{alg:?}")))
        }
    }
}

/// Where to load one certificate and its private key from.
#[derive(Debug, Clone)]
pub struct IdentitySource {
    pub cert: MaterialSource,
    pub key: MaterialSource,
    pub passphrase: Option<String>,
}

/// A CA certificate together with the key that signs on its behalf.
pub struct SigningIdentity {
    key_pair: KeyPair,
    issuer: Certificate,
    cert_der: Vec<u8>,
    cert_pem: String,
    fingerprint: String,
    subject: String,
    key_kind: KeyKind,
    key_identifier: Option<Vec<u8>>,
}

impl fmt::Debug for SigningIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningIdentity")
            .field("subject", &self.subject)
            .field("fingerprint", &self.fingerprint)
            .field("key_kind", &self.key_kind)
            .finish_non_exhaustive()
    }
}

impl SigningIdentity {
    pub async fn load(source: &IdentitySource) -> Result<Self, CaError> {
        let cert = source.cert.fetch().await?;
        let key = source.key.fetch().await?;

        Self::from_pem(&cert, &key, source.passphrase.as_deref())
    }

    /// Build an identity from a PEM certificate and a PEM key. Keys may be
    /// PKCS#8, PKCS#1 (`RSA PRIVATE KEY`) or SEC1 (`EC PRIVATE KEY`). An
    /// `ENCRYPTED PRIVATE KEY` is decrypted with `passphrase`.
    pub fn from_pem(cert: &[u8], key: &[u8], passphrase: Option<&str>) -> Result<Self, CaError> {
        let block = pem::decode_first(cert)
            .filter(|b| b.label == pem::CERTIFICATE)
            .ok_or_else(|| CaError::Configuration("CA certificate is not a PEM certificate".into()))?;
        let cert_der = block.contents;

        let (_, x509) = X509Certificate::from_der(&cert_der)
            .map_err(|e| CaError::Configuration(format!("Failed to parse CA certificate: {}", e)))?;

        if !x509.is_ca() {
            return Err(CaError::Configuration(format!(
                "Certificate {} is not a CA certificate",
                x509.subject()
            )));
        }

        if !x509.validity().is_valid() {
            warn!(subject = %x509.subject(), "CA certificate is outside its validity period");
        }

        let key_pair = load_key_pair(key, passphrase)?;
        let key_kind = KeyKind::of(&key_pair)?;

        if key_pair.public_key_raw() != x509.public_key().subject_public_key.data.as_ref() {
            return Err(CaError::Configuration(format!(
                "Private key does not match certificate {}",
                x509.subject()
            )));
        }

        let key_identifier = x509.iter_extensions().find_map(|ext| match ext.parsed_extension() {
            ParsedExtension::SubjectKeyIdentifier(key_id) => Some(key_id.0.to_vec()),
            _ => None,
        });

        let cert_pem = pem::encode(pem::CERTIFICATE, &cert_der)?;

        // Parse CA certificate params to reconstruct Certificate
        let params = CertificateParams::from_ca_cert_pem(&cert_pem)
            .map_err(|e| CaError::Configuration(format!("Failed to parse CA cert: {}", e)))?;

        // Self-sign with the CA key to recreate the Certificate object
        let issuer = params
            .self_signed(&key_pair)
            .map_err(|e| CaError::Configuration(format!("Failed to reconstruct CA cert: {}", e)))?;

        Ok(Self {
            subject: x509.subject().to_string(),
            fingerprint: fingerprint(&cert_der),
            key_pair,
            issuer,
            cert_pem,
            cert_der,
            key_kind,
            key_identifier,
        })
    }

    pub fn sign_certificate(
        &self,
        csr: CertificateSigningRequestParams,
    ) -> Result<Certificate, CaError> {
        csr.signed_by(&self.issuer, &self.key_pair)
            .map_err(|e| CaError::Generation(format!("Failed to sign certificate: {}", e)))
    }

    pub fn sign_crl(
        &self,
        params: CertificateRevocationListParams,
    ) -> Result<CertificateRevocationList, CaError> {
        params
            .signed_by(&self.issuer, &self.key_pair)
            .map_err(|e| CaError::Generation(format!("Failed to sign CRL: {}", e)))
    }

    pub fn certificate_der(&self) -> &[u8] {
        &self.cert_der
    }

    pub fn certificate_pem(&self) -> &str {
        &self.cert_pem
    }

    /// Issuer identifier CRLs are stored under.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn key_kind(&self) -> KeyKind {
        self.key_kind
    }

    /// Authority key identifier for objects this identity signs: the
    /// certificate's subject key identifier when it has one.
    pub fn key_identifier_method(&self) -> KeyIdMethod {
        match &self.key_identifier {
            Some(key_id) => KeyIdMethod::PreSpecified(key_id.clone()),
            None => KeyIdMethod::Sha256,
        }
    }
}

const RSA_ENCRYPTION: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");
const EC_PUBLIC_KEY: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");

fn load_key_pair(key: &[u8], passphrase: Option<&str>) -> Result<KeyPair, CaError> {
    // `openssl ecparam -genkey` writes the curve as its own block first
    let block = pem::decode_all(key)
        .into_iter()
        .find(|b| b.label != pem::EC_PARAMETERS)
        .ok_or_else(|| CaError::Configuration("Signing key is not PEM encoded".into()))?;

    let pkcs8_der = match block.label.as_str() {
        pem::PRIVATE_KEY => block.contents,
        pem::ENCRYPTED_PRIVATE_KEY => {
            let passphrase = passphrase.ok_or_else(|| {
                CaError::Configuration("Signing key is encrypted but no passphrase is set".into())
            })?;

            let encrypted = pkcs8::EncryptedPrivateKeyInfo::try_from(block.contents.as_slice())
                .map_err(|e| CaError::Configuration(format!("Invalid encrypted key: {}", e)))?;

            encrypted
                .decrypt(passphrase)
                .map_err(|e| CaError::Configuration(format!("Failed to decrypt signing key: {}", e)))?
                .as_bytes()
                .to_vec()
        }
        pem::RSA_PRIVATE_KEY => pkcs1_to_pkcs8(&block.contents)?,
        pem::EC_PRIVATE_KEY => sec1_to_pkcs8(&block.contents)?,
        other => {
            return Err(CaError::Configuration(format!(
                "Unexpected {other:?} block in signing key"
            )));
        }
    };

    KeyPair::from_pem(&pem::encode(pem::PRIVATE_KEY, &pkcs8_der)?)
        .map_err(|e| CaError::Configuration(format!("Invalid private key: {}", e)))
}

/// Wrap a PKCS#1 RSA key in a PKCS#8 envelope.
fn pkcs1_to_pkcs8(der: &[u8]) -> Result<Vec<u8>, CaError> {
    pkcs1::RsaPrivateKey::from_der(der)
        .map_err(|e| CaError::Configuration(format!("Invalid RSA private key: {}", e)))?;

    wrap_pkcs8(RSA_ENCRYPTION, Some(AnyRef::NULL), der)
}

/// Wrap a SEC1 EC key in a PKCS#8 envelope. The curve must be named in the
/// key itself.
fn sec1_to_pkcs8(der: &[u8]) -> Result<Vec<u8>, CaError> {
    let key = sec1::EcPrivateKey::from_der(der)
        .map_err(|e| CaError::Configuration(format!("Invalid EC private key: {}", e)))?;

    let Some(sec1::EcParameters::NamedCurve(curve)) = key.parameters else {
        return Err(CaError::Configuration(
            "EC private key does not name its curve".into(),
        ));
    };
    let curve = AnyRef::new(Tag::ObjectIdentifier, curve.as_bytes())
        .map_err(|e| CaError::Configuration(format!("Invalid EC curve: {}", e)))?;

    // PKCS#8 names the curve in the algorithm identifier only
    let inner = sec1::EcPrivateKey {
        private_key: key.private_key,
        parameters: None,
        public_key: key.public_key,
    }
    .to_der()
    .map_err(|e| CaError::Configuration(format!("Failed to re-encode EC key: {}", e)))?;

    wrap_pkcs8(EC_PUBLIC_KEY, Some(curve), &inner)
}

fn wrap_pkcs8(
    oid: ObjectIdentifier,
    parameters: Option<AnyRef<'_>>,
    private_key: &[u8],
) -> Result<Vec<u8>, CaError> {
    PrivateKeyInfo {
        algorithm: AlgorithmIdentifierRef { oid, parameters },
        private_key,
        public_key: None,
    }
    .to_der()
    .map_err(|e| CaError::Configuration(format!("Failed to re-encode private key: {}", e)))
}

/// The root identity and an optional intermediate below it. New
/// certificates and CRLs are signed by the intermediate when one is set.
#[derive(Debug)]
pub struct SigningIdentities {
    root: SigningIdentity,
    intermediate: Option<SigningIdentity>,
}

impl SigningIdentities {
    pub fn new(
        root: SigningIdentity,
        intermediate: Option<SigningIdentity>,
    ) -> Result<Self, CaError> {
        if let Some(intermediate) = &intermediate {
            let (_, root_cert) = X509Certificate::from_der(root.certificate_der())
                .map_err(|e| CaError::Configuration(format!("Failed to parse root: {}", e)))?;
            let (_, cert) = X509Certificate::from_der(intermediate.certificate_der()).map_err(|e| {
                CaError::Configuration(format!("Failed to parse intermediate: {}", e))
            })?;

            cert.verify_signature(Some(root_cert.public_key())).map_err(|_| {
                CaError::Configuration(format!(
                    "Intermediate {} is not signed by root {}",
                    intermediate.subject(),
                    root.subject()
                ))
            })?;
        }

        Ok(Self { root, intermediate })
    }

    #[tracing::instrument(skip_all)]
    pub async fn load(
        root: &IdentitySource,
        intermediate: Option<&IdentitySource>,
    ) -> Result<Self, CaError> {
        let root = SigningIdentity::load(root).await?;
        let intermediate = match intermediate {
            Some(source) => Some(SigningIdentity::load(source).await?),
            None => None,
        };

        let identities = Self::new(root, intermediate)?;
        let active = identities.active();
        info!(
            subject = active.subject(),
            fingerprint = active.fingerprint(),
            key = ?active.key_kind(),
            intermediate = identities.intermediate.is_some(),
            "Loaded signing identity"
        );

        Ok(identities)
    }

    pub fn root(&self) -> &SigningIdentity {
        &self.root
    }

    pub fn active(&self) -> &SigningIdentity {
        self.intermediate.as_ref().unwrap_or(&self.root)
    }
}
