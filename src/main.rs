//! SimpleHost server: wires the tree engine together and runs the upload
//! session janitor until shutdown.
//!
//! Request routing is owned by whatever front end embeds the services; this
//! binary prepares the store, the blob root, and the background reaper.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, fmt};

use simplehost_core::config::AppConfig;
use simplehost_core::error::AppError;
use simplehost_core::traits::storage::StorageProvider;
use simplehost_database::migration::run_migrations;
use simplehost_database::{DatabasePool, SqlTreeStore, TreeStore};
use simplehost_service::{FolderService, UploadService};
use simplehost_storage::LocalStorageProvider;

#[tokio::main]
async fn main() {
    let env = std::env::var("SIMPLEHOST_ENV").unwrap_or_else(|_| "development".to_string());
    let config = match AppConfig::load(&env) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    init_logging(&config);
    tracing::info!(env = %env, "Configuration loaded");

    if let Err(e) = run(config).await {
        tracing::error!(error = %e, "Server error");
        std::process::exit(1);
    }
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting SimpleHost v{}", env!("CARGO_PKG_VERSION"));

    // ── Database connection + migrations ─────────────────────────
    let db = DatabasePool::connect(&config.database).await?;
    run_migrations(db.pool()).await?;
    tracing::info!("Database migrations complete");

    let tree: Arc<dyn TreeStore> = Arc::new(SqlTreeStore::new(db.pool().clone()));

    // ── Blob storage ─────────────────────────────────────────────
    let storage: Arc<dyn StorageProvider> =
        Arc::new(LocalStorageProvider::new(&config.storage.root_path).await?);
    if !storage.health_check().await? {
        return Err(AppError::storage(format!(
            "Storage root '{}' is not usable",
            config.storage.root_path
        )));
    }
    tracing::info!(
        provider = storage.provider_type(),
        root = %config.storage.root_path,
        "Blob storage ready"
    );

    // ── Services ─────────────────────────────────────────────────
    let folders = FolderService::new(Arc::clone(&tree), &config.tree);
    folders.ensure_root().await?;

    let uploads = UploadService::new(
        Arc::clone(&tree),
        Arc::clone(&storage),
        config.storage.clone(),
        config.upload.clone(),
    );

    // ── Upload session janitor ───────────────────────────────────
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let interval = Duration::from_secs(config.upload.janitor_interval_seconds.max(1));
    let janitor = tokio::spawn(run_janitor(uploads, interval, shutdown_rx));

    tracing::info!("SimpleHost ready");
    shutdown_signal().await;
    tracing::info!("Shutdown signal received, starting graceful shutdown...");
    let _ = shutdown_tx.send(true);

    if let Err(e) = janitor.await {
        tracing::warn!(error = %e, "Janitor task ended abnormally");
    }
    db.close().await;

    tracing::info!("SimpleHost shut down gracefully");
    Ok(())
}

/// Reap idle upload sessions every `interval` until shutdown.
async fn run_janitor(uploads: UploadService, interval: Duration, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match uploads.reap_stale_sessions(uploads.session_ttl()).await {
                    Ok(0) => {}
                    Ok(reaped) => tracing::info!(reaped, "Upload janitor pass finished"),
                    Err(e) => tracing::warn!(error = %e, "Upload janitor pass failed"),
                }
            }
            _ = shutdown.changed() => break,
        }
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
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
}
