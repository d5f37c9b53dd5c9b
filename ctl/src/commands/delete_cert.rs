use anyhow::Context;
use clap::Parser;
use gcipher_api::ca::SerialNumber;
use gcipher_db::storage::CertificateStore;

#[derive(Clone, Parser)]
pub struct DeleteCertParams {
    /// Hex serial number of the certificate.
    #[clap(short, long)]
    pub serial: String,
}

pub async fn delete_cert(stg: &impl CertificateStore, params: DeleteCertParams) -> anyhow::Result<()> {
    let serial = SerialNumber::parse(&params.serial)
        .with_context(|| format!("{:?} is not a serial number", params.serial))?;

    if CertificateStore::delete(stg, &serial.to_hex()).await? {
        println!("Deleted certificate {serial}");
    } else {
        anyhow::bail!("No certificate with serial {serial}");
    }

    Ok(())
}
