use std::{sync::Arc, time::Duration};

use chrono::TimeDelta;
use futures::TryStreamExt;
use gcipher_db::{
    models::{CertificateState, DbCertificate, DbCrl},
    storage::{CertificateFilter, CertificateStore, CrlStore, Storage},
};
use rcgen::{CertificateRevocationListParams, RevokedCertParams};
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{MissedTickBehavior, interval},
};
use tracing::{error, info, warn};

use super::{CaError, SerialNumber, SigningIdentities, now, to_offset};

pub const DEFAULT_CRL_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Periodically publishes the revocation list of the active signing
/// identity.
pub struct CrlGenerator {
    identities: Arc<SigningIdentities>,
    db: Arc<dyn Storage>,
    interval: Duration,
}

impl CrlGenerator {
    pub fn new(identities: Arc<SigningIdentities>, db: Arc<dyn Storage>, interval: Duration) -> Self {
        Self {
            identities,
            db,
            interval,
        }
    }

    /// Build, sign and store a fresh CRL covering every revoked
    /// certificate. The stored list replaces the previous one.
    #[tracing::instrument(skip(self))]
    pub async fn generate(&self) -> Result<DbCrl, CaError> {
        let identity = self.identities.active();

        let filter = CertificateFilter {
            username: None,
            state: CertificateState::Revoked,
        };
        let revoked: Vec<DbCertificate> = CertificateStore::list(self.db.as_ref(), filter)
            .await?
            .try_collect()
            .await?;

        let mut revoked_certs = Vec::with_capacity(revoked.len());
        for cert in &revoked {
            let Some(revoked_at) = cert.revoked_at else {
                continue;
            };

            let Some(serial) = SerialNumber::parse(&cert.serial_number) else {
                warn!(serial = %cert.serial_number, "Skipping revoked certificate with unparseable serial");
                continue;
            };

            revoked_certs.push(RevokedCertParams {
                serial_number: (&serial).into(),
                revocation_time: to_offset(revoked_at)?,
                reason_code: None,
                invalidity_date: None,
            });
        }

        let this_update = now()?;
        let next_update = TimeDelta::from_std(self.interval)
            .ok()
            .and_then(|interval| this_update.checked_add_signed(interval))
            .ok_or_else(|| CaError::Generation("CRL interval out of range".into()))?;

        let crl_number = SerialNumber::from_bytes(&this_update.timestamp().to_be_bytes())
            .ok_or_else(|| CaError::Generation("System clock out of range".into()))?;

        let entries = revoked_certs.len();
        let params = CertificateRevocationListParams {
            this_update: to_offset(this_update)?,
            next_update: to_offset(next_update)?,
            crl_number: (&crl_number).into(),
            issuing_distribution_point: None,
            revoked_certs,
            key_identifier_method: identity.key_identifier_method(),
        };

        let crl = identity.sign_crl(params)?;

        let record = DbCrl {
            issuer: identity.fingerprint().to_string(),
            crl_der: crl.der().to_vec(),
            updated_at: this_update,
        };
        CrlStore::upsert(self.db.as_ref(), record.clone()).await?;

        info!(
            issuer = %record.issuer,
            entries,
            next_update = %next_update,
            "Published certificate revocation list"
        );

        Ok(record)
    }

    /// Run [`Self::generate`] now and then once per interval until
    /// `shutdown` changes. A failed cycle is logged and the previously
    /// published list stays in place. A cycle in progress when shutdown is
    /// requested runs to completion.
    pub fn spawn(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = self.generate().await {
                            error!(error = %e, "CRL generation failed");
                        }
                    }
                    _ = shutdown.changed() => {
                        info!("Stopping CRL generation");
                        break;
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};
    use gcipher_db::storage::memory::MemoryStorage;
    use std::sync::atomic::Ordering;

    use x509_parser::{
        extensions::ParsedExtension,
        prelude::{FromDer, X509Certificate},
        revocation_list::CertificateRevocationList,
    };

    use super::*;
    use crate::ca::testing;

    const HOUR: Duration = Duration::from_secs(3600);

    fn at(ts: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(ts, 0).unwrap()
    }

    async fn seeded() -> Arc<MemoryStorage> {
        let db = Arc::new(MemoryStorage::new());
        for serial in ["0a", "0b", "0c"] {
            CertificateStore::insert(db.as_ref(), DbCertificate::new(serial, "pem", "alice", Utc::now()))
                .await
                .unwrap();
        }
        CertificateStore::mark_revoked(db.as_ref(), "0b", "alice", at(1_700_000_000))
            .await
            .unwrap();
        CertificateStore::mark_revoked(db.as_ref(), "0c", "alice", at(1_700_003_600))
            .await
            .unwrap();
        db
    }

    fn entries(der: &[u8]) -> Vec<(String, i64)> {
        let (_, crl) = CertificateRevocationList::from_der(der).unwrap();
        let mut entries: Vec<_> = crl
            .iter_revoked_certificates()
            .map(|entry| {
                let serial = SerialNumber::from_bytes(entry.raw_serial()).unwrap();
                (serial.to_hex(), entry.revocation_date.timestamp())
            })
            .collect();
        entries.sort();
        entries
    }

    #[tokio::test]
    async fn lists_exactly_the_revoked_certificates() {
        let db = seeded().await;
        let identities = testing::identities();
        let generator = CrlGenerator::new(identities.clone(), db.clone(), HOUR);

        let record = generator.generate().await.unwrap();
        assert_eq!(record.issuer, identities.active().fingerprint());
        assert_eq!(
            entries(&record.crl_der),
            vec![
                ("0b".to_string(), 1_700_000_000),
                ("0c".to_string(), 1_700_003_600)
            ]
        );

        let (_, crl) = CertificateRevocationList::from_der(&record.crl_der).unwrap();
        let this_update = crl.last_update().timestamp();
        let next_update = crl.next_update().unwrap().timestamp();
        assert_eq!(next_update - this_update, 3600);
        assert_eq!(this_update, record.updated_at.timestamp());

        let (_, ca) = X509Certificate::from_der(identities.active().certificate_der()).unwrap();
        assert_eq!(crl.issuer().to_string(), ca.subject().to_string());

        let stored = CrlStore::get(db.as_ref(), identities.active().fingerprint())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.crl_der, record.crl_der);
    }

    #[tokio::test]
    async fn second_cycle_refreshes_window_and_keeps_entries() {
        let db = seeded().await;
        let generator = CrlGenerator::new(testing::identities(), db, HOUR);

        let first = generator.generate().await.unwrap();
        let second = generator.generate().await.unwrap();

        assert!(second.updated_at >= first.updated_at);
        assert_eq!(entries(&first.crl_der), entries(&second.crl_der));
    }

    #[tokio::test]
    async fn intermediate_signs_when_configured() {
        let db = seeded().await;
        let identities = testing::identities_with_intermediate();
        let record = CrlGenerator::new(identities.clone(), db, HOUR)
            .generate()
            .await
            .unwrap();

        assert_eq!(record.issuer, identities.active().fingerprint());
        assert_ne!(record.issuer, identities.root().fingerprint());
    }

    #[tokio::test]
    async fn skips_unparseable_serials() {
        let db = seeded().await;
        CertificateStore::insert(db.as_ref(), DbCertificate::new("zz", "pem", "alice", Utc::now()))
            .await
            .unwrap();
        CertificateStore::mark_revoked(db.as_ref(), "zz", "alice", Utc::now())
            .await
            .unwrap();

        let record = CrlGenerator::new(testing::identities(), db, HOUR)
            .generate()
            .await
            .unwrap();
        assert_eq!(entries(&record.crl_der).len(), 2);
    }

    #[tokio::test]
    async fn empty_list_is_still_published() {
        let db = Arc::new(MemoryStorage::new());
        let record = CrlGenerator::new(testing::identities(), db, HOUR)
            .generate()
            .await
            .unwrap();
        assert!(entries(&record.crl_der).is_empty());
    }

    #[tokio::test]
    async fn scheduler_runs_immediately_and_stops_on_shutdown() {
        let db = seeded().await;
        let identities = testing::identities();
        let generator = Arc::new(CrlGenerator::new(identities.clone(), db.clone(), HOUR));

        let (shutdown, rx) = watch::channel(false);
        let task = generator.spawn(rx);

        let mut published = None;
        for _ in 0..100 {
            published = CrlStore::get(db.as_ref(), identities.active().fingerprint())
                .await
                .unwrap();
            if published.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(published.is_some());

        shutdown.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
    }

    fn authority_key_identifier(crl: &CertificateRevocationList<'_>) -> Vec<u8> {
        crl.extensions()
            .iter()
            .find_map(|ext| match ext.parsed_extension() {
                ParsedExtension::AuthorityKeyIdentifier(aki) => {
                    aki.key_identifier.as_ref().map(|key_id| key_id.0.to_vec())
                }
                _ => None,
            })
            .unwrap()
    }

    #[tokio::test]
    async fn openssl_made_cas_sign_matchable_lists() {
        for (cert, key) in [
            (testing::RSA_CA_CERT, testing::RSA_CA_KEY),
            (testing::EC_CA_CERT, testing::EC_CA_SEC1_KEY),
        ] {
            let identities = testing::identities_from(cert, key);
            let record = CrlGenerator::new(identities.clone(), seeded().await, HOUR)
                .generate()
                .await
                .unwrap();

            let ca_der = identities.active().certificate_der();
            let (_, ca) = X509Certificate::from_der(ca_der).unwrap();
            let (_, crl) = CertificateRevocationList::from_der(&record.crl_der).unwrap();

            crl.verify_signature(ca.public_key()).unwrap();
            assert_eq!(
                authority_key_identifier(&crl),
                testing::subject_key_identifier(ca_der)
            );
            assert_eq!(entries(&record.crl_der).len(), 2);
        }
    }

    #[tokio::test]
    async fn failed_cycle_keeps_previous_list() {
        let db = Arc::new(testing::FlakyStorage::new());
        let identities = testing::identities();
        let generator = CrlGenerator::new(identities.clone(), db.clone(), HOUR);

        let published = generator.generate().await.unwrap();

        db.fail_lists(1);
        let result = generator.generate().await;
        assert!(matches!(result, Err(CaError::Storage(_))));

        let stored = CrlStore::get(db.as_ref(), identities.active().fingerprint())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.crl_der, published.crl_der);
        assert_eq!(stored.updated_at, published.updated_at);
    }

    #[tokio::test]
    async fn scheduler_survives_failed_cycles() {
        let db = Arc::new(testing::FlakyStorage::new());
        db.fail_lists(2);

        let identities = testing::identities();
        let generator = Arc::new(CrlGenerator::new(
            identities.clone(),
            db.clone(),
            Duration::from_millis(20),
        ));

        let (shutdown, rx) = watch::channel(false);
        let task = generator.spawn(rx);

        let mut published = None;
        for _ in 0..250 {
            published = CrlStore::get(db.as_ref(), identities.active().fingerprint())
                .await
                .unwrap();
            if published.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(published.is_some());
        assert!(db.lists.load(Ordering::SeqCst) >= 3);

        shutdown.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
    }
}
