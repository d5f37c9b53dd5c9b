use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::DateTime;
use clap::Parser;
use gcipher_api::ca::{SerialNumber, pem};
use gcipher_db::{models::DbCertificate, storage::CertificateStore};
use tracing::warn;
use x509_parser::prelude::{FromDer, X509Certificate};

#[derive(Clone, Parser)]
pub struct ImportCertsParams {
    /// Directory holding PEM certificates, one or more per file.
    #[clap(short, long)]
    pub dir: PathBuf,

    /// Username the imported certificates will belong to.
    #[clap(short, long)]
    pub owner: String,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub imported: usize,
    pub duplicates: usize,
    pub skipped: usize,
}

fn to_record(der: &[u8], owner: &str) -> anyhow::Result<DbCertificate> {
    let (_, cert) = X509Certificate::from_der(der).context("Not an X.509 certificate")?;

    let serial = SerialNumber::from_bytes(cert.raw_serial()).context("Certificate has serial zero")?;
    let issued_at = DateTime::from_timestamp(cert.validity().not_before.timestamp(), 0)
        .context("Invalid notBefore")?;

    Ok(DbCertificate::new(
        serial.to_hex(),
        pem::encode(pem::CERTIFICATE, der)?,
        owner,
        issued_at,
    ))
}

async fn import_file(
    stg: &impl CertificateStore,
    path: &Path,
    owner: &str,
    summary: &mut ImportSummary,
) -> anyhow::Result<()> {
    let contents = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let blocks = pem::decode_all(&contents);
    if blocks.is_empty() {
        warn!(file = %path.display(), "No PEM data, skipping");
        summary.skipped += 1;
    }

    for block in blocks {
        if block.label != pem::CERTIFICATE {
            warn!(file = %path.display(), label = %block.label, "Not a certificate, skipping");
            summary.skipped += 1;
            continue;
        }

        let record = match to_record(&block.contents, owner) {
            Ok(record) => record,
            Err(e) => {
                warn!(file = %path.display(), error = %e, "Unreadable certificate, skipping");
                summary.skipped += 1;
                continue;
            }
        };

        match CertificateStore::insert(stg, record).await {
            Ok(record) => {
                println!("Imported {} from {}", record.serial_number, path.display());
                summary.imported += 1;
            }
            Err(e) if e.is_duplicate() => {
                warn!(file = %path.display(), error = %e, "Already imported");
                summary.duplicates += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}

pub async fn import_certs(
    stg: &impl CertificateStore,
    ImportCertsParams { dir, owner }: ImportCertsParams,
) -> anyhow::Result<ImportSummary> {
    let mut entries = tokio::fs::read_dir(&dir)
        .await
        .with_context(|| format!("Failed to open {}", dir.display()))?;

    let mut paths = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let hidden = entry.file_name().to_string_lossy().starts_with('.');
        if hidden || !entry.file_type().await?.is_file() {
            continue;
        }
        paths.push(entry.path());
    }
    paths.sort();

    let mut summary = ImportSummary::default();
    for path in paths {
        import_file(stg, &path, &owner, &mut summary).await?;
    }

    println!(
        "Imported {} certificates for {} ({} already present, {} skipped)",
        summary.imported, owner, summary.duplicates, summary.skipped
    );

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use futures::TryStreamExt;
    use gcipher_api::ca::generate_ca;
    use gcipher_db::storage::{CertificateFilter, memory::MemoryStorage};

    use super::*;

    async fn stored(stg: &MemoryStorage) -> Vec<DbCertificate> {
        CertificateStore::list(stg, CertificateFilter::default())
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn imports_certificates_and_skips_the_rest() {
        let dir = std::env::temp_dir().join(format!("gcipherctl-import-{}", std::process::id()));
        tokio::fs::create_dir_all(dir.join("nested")).await.unwrap();

        let first = generate_ca("import one", 1).unwrap();
        let second = generate_ca("import two", 1).unwrap();
        let hidden = generate_ca("import hidden", 1).unwrap();

        let bundle = format!("{}{}", first.cert_pem, first.key_pem);
        tokio::fs::write(dir.join("a.pem"), bundle).await.unwrap();
        tokio::fs::write(dir.join("b.crt"), &second.cert_pem).await.unwrap();
        tokio::fs::write(dir.join("notes.txt"), "hello").await.unwrap();
        tokio::fs::write(dir.join(".hidden.pem"), &hidden.cert_pem).await.unwrap();
        tokio::fs::write(dir.join("nested/c.pem"), &hidden.cert_pem).await.unwrap();

        let stg = MemoryStorage::new();
        let params = ImportCertsParams {
            dir: dir.clone(),
            owner: "legacy".into(),
        };

        let summary = import_certs(&stg, params.clone()).await.unwrap();
        assert_eq!(
            summary,
            ImportSummary {
                imported: 2,
                duplicates: 0,
                skipped: 2,
            }
        );

        let records = stored(&stg).await;
        assert_eq!(records.len(), 2);
        for record in &records {
            assert_eq!(record.username, "legacy");
            assert!(!record.is_revoked());
            assert!(
                [&first.cert_pem, &second.cert_pem].contains(&&record.certificate_pem),
                "stored PEM must match the imported certificate"
            );
            assert!(SerialNumber::parse(&record.serial_number).is_some());
        }

        let again = import_certs(&stg, params).await.unwrap();
        assert_eq!(again.imported, 0);
        assert_eq!(again.duplicates, 2);

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }
}
