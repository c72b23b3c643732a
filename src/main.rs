use anyhow::Result;
use std::{fs, io::ErrorKind, path::Path};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

mod config;
mod errors;
mod handlers;
mod models;
mod routes;
mod services;

use services::{audio_service::AudioService, json_import, metadata_store::MetadataStore};

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config + import flag ---
    let (cfg, import_json) = config::AppConfig::from_env_and_args()?;

    tracing::info!("Starting audio-store with config: {:?}", cfg);

    // --- Metadata store (connects lazily on first use) ---
    let store = MetadataStore::open(&cfg.database_url)?;

    // --- Handle import mode ---
    if let Some(path) = import_json {
        let report = json_import::import_json(&store, &path).await;
        store.close().await;
        let report = report?;
        for skipped in &report.skipped {
            tracing::warn!("not imported: {}: {}", skipped.audio, skipped.reason);
        }
        if let Some(backup) = &report.backup_path {
            tracing::info!("Legacy JSON backed up to {}", backup.display());
        }
        tracing::info!(
            "Import complete: {} migrated, {} total record(s)",
            report.migrated,
            report.total_records
        );
        return Ok(()); // exit after import
    }

    // --- Ensure upload directory exists ---
    if !Path::new(&cfg.upload_dir).exists() {
        fs::create_dir_all(&cfg.upload_dir)?;
        tracing::info!("Created upload directory at {}", cfg.upload_dir);
    }

    // Fail fast on an unusable database rather than on the first request.
    store.ping().await?;

    // --- Initialize core service + router ---
    let service = AudioService::new(store.clone(), cfg.upload_dir.clone(), cfg.max_upload_bytes);
    let app = routes::routes::app(service, &cfg.public_dir);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    tracing::info!("Dashboard served from {}", cfg.public_dir);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    store.close().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
