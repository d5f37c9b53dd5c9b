use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use gcipher_api::{
    ca::{CrlGenerator, SigningIdentities},
    config::GcipherConfig,
    context::ApiContext,
    server,
};
use gcipher_db::storage::{Storage, memory::MemoryStorage, mongodb::MongoDBStorage};
use tokio::{net::TcpListener, sync::watch};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = GcipherConfig::parse();

    if config.dump_openapi {
        print!("{}", server::openapi().to_pretty_json()?);
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or("gcipher_api=info,gcipher_common=info,gcipher_db=info".into()),
        )
        .pretty()
        .init();

    let db: Arc<dyn Storage> = match &config.database_url {
        Some(url) => Arc::new(
            MongoDBStorage::new(url)
                .await
                .context("Failed to connect to MongoDB")?,
        ),
        None => {
            warn!("No database configured, records are kept in memory and lost on restart");
            Arc::new(MemoryStorage::new())
        }
    };

    let identities = Arc::new(
        SigningIdentities::load(&config.root_identity(), config.intermediate_identity().as_ref())
            .await
            .context("Failed to load signing identity")?,
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let crl = Arc::new(CrlGenerator::new(
        identities.clone(),
        db.clone(),
        config.crl_interval(),
    ));
    let crl_task = crl.spawn(shutdown_rx);

    let context = ApiContext::new(db, identities, config.certificate_lifetime_default);
    let router = server::make(context);

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    info!("Listening on http://{:?}", config.bind_addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    let _ = shutdown_tx.send(true);
    crl_task.await.context("CRL task panicked")?;

    info!("Shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
