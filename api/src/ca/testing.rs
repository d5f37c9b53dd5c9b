//! Throwaway CAs and requests for tests.

use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gcipher_db::{
    models::{DbCertificate, DbCrl, DbUser},
    storage::{
        CertificateFilter, CertificateStore, CertificateStream, CrlStore, Storage, StoreError,
        UserStore, memory::MemoryStorage,
    },
};
use rcgen::{
    BasicConstraints, CertificateParams, CertificateSigningRequestParams, DnType, IsCa, KeyPair,
    KeyUsagePurpose, SignatureAlgorithm,
};

use x509_parser::{
    extensions::ParsedExtension,
    prelude::{FromDer, X509Certificate},
};

use super::{SigningIdentities, SigningIdentity, pem};

// CAs made with the openssl CLI (`req -x509`, `genrsa -traditional`,
// `ecparam -genkey`), valid for a century.
pub const RSA_CA_CERT: &str = include_str!("../../testdata/rsa-ca.crt");
pub const RSA_CA_KEY: &str = include_str!("../../testdata/rsa-ca.key");
pub const RSA_CA_PKCS1_KEY: &str = include_str!("../../testdata/rsa-ca.pkcs1.key");
pub const EC_CA_CERT: &str = include_str!("../../testdata/ec-ca.crt");
pub const EC_CA_SEC1_KEY: &str = include_str!("../../testdata/ec-ca.sec1.key");

fn ca_params(common_name: &str) -> CertificateParams {
    let mut params = CertificateParams::default();
    params.distinguished_name.push(DnType::CommonName, common_name);
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    params.key_usages = vec![
        KeyUsagePurpose::DigitalSignature,
        KeyUsagePurpose::KeyCertSign,
        KeyUsagePurpose::CrlSign,
    ];
    params
}

/// A self-signed root as (certificate PEM, PKCS#8 key PEM).
pub fn root_ca(alg: &'static SignatureAlgorithm) -> (String, String) {
    let key = KeyPair::generate_for(alg).unwrap();
    let cert = ca_params("gcipher test root").self_signed(&key).unwrap();

    (pem::encode(pem::CERTIFICATE, cert.der()).unwrap(), key.serialize_pem())
}

/// An intermediate signed by the given root.
pub fn intermediate_ca(root_cert: &str, root_key: &str) -> (String, String) {
    let root_key = KeyPair::from_pem(root_key).unwrap();
    let root = CertificateParams::from_ca_cert_pem(root_cert)
        .unwrap()
        .self_signed(&root_key)
        .unwrap();

    let key = KeyPair::generate().unwrap();
    let cert = ca_params("gcipher test intermediate")
        .signed_by(&key, &root, &root_key)
        .unwrap();

    (pem::encode(pem::CERTIFICATE, cert.der()).unwrap(), key.serialize_pem())
}

pub fn identities() -> Arc<SigningIdentities> {
    let (cert, key) = root_ca(&rcgen::PKCS_ECDSA_P256_SHA256);
    let root = SigningIdentity::from_pem(cert.as_bytes(), key.as_bytes(), None).unwrap();
    Arc::new(SigningIdentities::new(root, None).unwrap())
}

pub fn identities_with_intermediate() -> Arc<SigningIdentities> {
    let (root_cert, root_key) = root_ca(&rcgen::PKCS_ECDSA_P384_SHA384);
    let (cert, key) = intermediate_ca(&root_cert, &root_key);

    let root = SigningIdentity::from_pem(root_cert.as_bytes(), root_key.as_bytes(), None).unwrap();
    let intermediate = SigningIdentity::from_pem(cert.as_bytes(), key.as_bytes(), None).unwrap();
    Arc::new(SigningIdentities::new(root, Some(intermediate)).unwrap())
}

/// A root-only identity set from PEM material.
pub fn identities_from(cert: &str, key: &str) -> Arc<SigningIdentities> {
    let root = SigningIdentity::from_pem(cert.as_bytes(), key.as_bytes(), None).unwrap();
    Arc::new(SigningIdentities::new(root, None).unwrap())
}

pub fn subject_key_identifier(cert_der: &[u8]) -> Vec<u8> {
    let (_, cert) = X509Certificate::from_der(cert_der).unwrap();
    cert.iter_extensions()
        .find_map(|ext| match ext.parsed_extension() {
            ParsedExtension::SubjectKeyIdentifier(key_id) => Some(key_id.0.to_vec()),
            _ => None,
        })
        .unwrap()
}

fn csr_params(common_name: &str) -> (CertificateParams, KeyPair) {
    let key = KeyPair::generate().unwrap();
    let mut params = CertificateParams::new(vec![common_name.to_string()]).unwrap();
    params.distinguished_name.push(DnType::CommonName, common_name);
    (params, key)
}

/// A PEM certificate signing request for `common_name`, which is also its
/// DNS subject alternative name.
pub fn csr_pem(common_name: &str) -> String {
    let (params, key) = csr_params(common_name);
    params.serialize_request(&key).unwrap().pem().unwrap()
}

pub fn csr_der(common_name: &str) -> Vec<u8> {
    let (params, key) = csr_params(common_name);
    params.serialize_request(&key).unwrap().der().to_vec()
}

pub struct Leaf {
    pub cert: String,
    pub key: String,
}

/// An end-entity certificate signed directly by `identity`.
pub fn issue_leaf(identity: &SigningIdentity) -> Leaf {
    let (params, key) = csr_params("leaf.test");
    let csr = params.serialize_request(&key).unwrap().pem().unwrap();
    let csr = CertificateSigningRequestParams::from_pem(&csr).unwrap();
    let cert = identity.sign_certificate(csr).unwrap();

    Leaf {
        cert: pem::encode(pem::CERTIFICATE, cert.der()).unwrap(),
        key: key.serialize_pem(),
    }
}

/// Re-wrap a PKCS#8 key as an `ENCRYPTED PRIVATE KEY` under `password`.
pub fn encrypt_key(key_pem: &str, password: &str) -> String {
    let der = pem::decode_first(key_pem.as_bytes()).unwrap().contents;
    let info = pkcs8::PrivateKeyInfo::try_from(der.as_slice()).unwrap();
    let iv = [7u8; 16];
    let params =
        pkcs8::pkcs5::pbes2::Parameters::pbkdf2_sha256_aes256cbc(2048, b"gcipher-test-salt", &iv)
            .unwrap();
    let encrypted = info.encrypt_with_params(params, password).unwrap();

    pem::encode(pem::ENCRYPTED_PRIVATE_KEY, encrypted.as_bytes()).unwrap()
}

/// Memory storage whose certificate writes and listings can be made to fail.
#[derive(Debug, Default)]
pub struct FlakyStorage {
    inner: MemoryStorage,
    fail_inserts: AtomicBool,
    failing_lists: AtomicUsize,
    pub lists: AtomicUsize,
}

impl FlakyStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }

    /// Fail the next `count` listings.
    pub fn fail_lists(&self, count: usize) {
        self.failing_lists.store(count, Ordering::SeqCst);
    }

    fn unavailable() -> StoreError {
        StoreError::Internal("storage unavailable".into())
    }
}

#[async_trait]
impl Storage for FlakyStorage {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[async_trait]
impl CertificateStore for FlakyStorage {
    async fn insert(&self, cert: DbCertificate) -> Result<DbCertificate, StoreError> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        CertificateStore::insert(&self.inner, cert).await
    }

    async fn get(
        &self,
        serial_number: &str,
        username: &str,
    ) -> Result<Option<DbCertificate>, StoreError> {
        CertificateStore::get(&self.inner, serial_number, username).await
    }

    async fn mark_revoked(
        &self,
        serial_number: &str,
        username: &str,
        revoked_at: DateTime<Utc>,
    ) -> Result<Option<DbCertificate>, StoreError> {
        CertificateStore::mark_revoked(&self.inner, serial_number, username, revoked_at).await
    }

    async fn list(&self, filter: CertificateFilter) -> Result<CertificateStream, StoreError> {
        self.lists.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failing_lists
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(Self::unavailable());
        }
        CertificateStore::list(&self.inner, filter).await
    }

    async fn delete(&self, serial_number: &str) -> Result<bool, StoreError> {
        CertificateStore::delete(&self.inner, serial_number).await
    }
}

#[async_trait]
impl CrlStore for FlakyStorage {
    async fn upsert(&self, crl: DbCrl) -> Result<(), StoreError> {
        CrlStore::upsert(&self.inner, crl).await
    }

    async fn get(&self, issuer: &str) -> Result<Option<DbCrl>, StoreError> {
        CrlStore::get(&self.inner, issuer).await
    }
}

#[async_trait]
impl UserStore for FlakyStorage {
    async fn get(&self, username: &str) -> Result<Option<DbUser>, StoreError> {
        UserStore::get(&self.inner, username).await
    }

    async fn create(&self, user: DbUser) -> Result<DbUser, StoreError> {
        UserStore::create(&self.inner, user).await
    }
}
