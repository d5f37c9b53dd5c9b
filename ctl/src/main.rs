use anyhow::Context;
use clap::{Parser, Subcommand};
use gcipher_db::storage::mongodb::MongoDBStorage;
use tracing_subscriber::EnvFilter;

use crate::commands::{CreateUserParams, DeleteCertParams, GenerateCaParams, ImportCertsParams};

mod commands;

/// Operator tooling for gcipher.
#[derive(Parser)]
#[command(name = "gcipherctl", version)]
pub struct Args {
    #[clap(subcommand)]
    command: Command,

    /// MongoDB connection string used by the commands that touch records.
    #[clap(short = 'D', long, env = "GCIPHER_DATABASE_URL", hide_env_values = true)]
    db_url: Option<String>,
}

#[derive(Clone, Subcommand)]
pub enum Command {
    /// Create an API user.
    #[command(name = "create-user")]
    CreateUser(CreateUserParams),

    /// Import existing PEM certificates as records owned by a user.
    #[command(name = "import-certs")]
    ImportCerts(ImportCertsParams),

    /// Remove a certificate record.
    #[command(name = "delete-cert")]
    DeleteCert(DeleteCertParams),

    /// Generate a self-signed root CA certificate and key.
    #[command(name = "generate-ca")]
    GenerateCa(GenerateCaParams),
}

impl Args {
    async fn storage(&self) -> anyhow::Result<MongoDBStorage> {
        let url = self
            .db_url
            .as_deref()
            .context("No database configured (set --db-url or GCIPHER_DATABASE_URL)")?;

        MongoDBStorage::new(url)
            .await
            .context("Failed to connect to MongoDB")
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or("warn".into()))
        .init();

    let args = Args::parse();

    match args.command.clone() {
        Command::CreateUser(params) => {
            commands::create_user(&args.storage().await?, params)
                .await
                .context("Failed to create user")?;
        }
        Command::ImportCerts(params) => {
            commands::import_certs(&args.storage().await?, params)
                .await
                .context("Failed to import certificates")?;
        }
        Command::DeleteCert(params) => {
            commands::delete_cert(&args.storage().await?, params)
                .await
                .context("Failed to delete certificate")?;
        }
        Command::GenerateCa(params) => {
            commands::generate_ca(params).context("Failed to generate CA")?;
        }
    }

    Ok(())
}
