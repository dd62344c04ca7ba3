//! Reading desk (ysr-rd) - Main entry point
//!
//! Serves the reader and admin pages of YaSong Reader as a JSON API with
//! segment and vocabulary audio playback.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ysr_common::config::RootFolderInitializer;
use ysr_common::db::init_database;
use ysr_common::store::select_store;
use ysr_rd::api::{self, AppContext};
use ysr_rd::audio::{create_backend, DecodeAdapter};
use ysr_rd::config::{Args, Config};
use ysr_rd::SharedState;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Read the bootstrap file first so its log level applies from the start
    let toml = Config::load_toml(&args).context("Failed to load configuration file")?;
    let default_filter = format!(
        "ysr_rd={},ysr_common={},tower_http=debug",
        toml.logging.level, toml.logging.level
    );

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Some(path) = Config::config_path(&args) {
        info!("Configuration file: {}", path.display());
    }

    let config = Config::resolve(&args, toml);

    info!("Starting ysr-rd on port {}", config.port);
    info!("Root folder: {}", config.root_folder.display());

    RootFolderInitializer::new(config.root_folder.clone())
        .ensure_directories()
        .context("Failed to create root folder")?;

    let pool = init_database(&config.database_path)
        .await
        .context("Failed to initialize database")?;

    let store = select_store(&config.remote, pool).context("Failed to create article store")?;

    let decoder = Arc::new(
        DecodeAdapter::new(config.media_root.clone(), config.audio.decode_cache_entries)
            .context("Failed to create decode adapter")?,
    );
    let output = create_backend(&config.audio);
    info!("Audio output backend: {}", output.name());

    let state = Arc::new(SharedState::new(
        store,
        decoder,
        output,
        Duration::from_millis(config.audio.release_grace_ms),
        Default::default(),
    ));

    let count = state.router.load().await;
    info!("Loaded {} articles", count);

    let ctx = AppContext {
        state: Arc::clone(&state),
        port: config.port,
    };

    api::run(ctx, shutdown_signal())
        .await
        .context("Server error")?;

    state.shutdown().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
