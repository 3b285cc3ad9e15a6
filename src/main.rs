//! Galgame Server - back end of an AI visual-novel
//!
//! Serves save files, proxies speech synthesis and maintains the image cache.

use std::net::SocketAddr;

use anyhow::Context;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use galgame_server::{create_router, spawn_maintenance_task, AppState, Config, ImageCache, LocalStore};

/// Main entry point for the galgame server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Open the local store and image cache
/// 4. Make sure the save directory exists
/// 5. Start background cache maintenance
/// 6. Start HTTP server on configured port
/// 7. Handle graceful shutdown on SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "galgame_server=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Galgame Server");

    let config = Config::from_env();
    info!(
        "Configuration loaded: port={}, save_dir={}, store={}, quota={} bytes",
        config.server_port,
        config.save_dir.display(),
        config.store_path.display(),
        config.store_quota_bytes
    );
    if config.tts_app_id.is_empty() || config.tts_access_key.is_empty() {
        warn!("TTS credentials are not configured; /api/tts requests will be rejected upstream");
    }

    let store = LocalStore::open(&config.store_path, config.store_quota_bytes)
        .with_context(|| format!("opening store {}", config.store_path.display()))?;
    let state = AppState::from_config(&config, ImageCache::open(store));
    info!("Image cache initialized");

    state
        .saves
        .ensure_exists()
        .await
        .context("creating save directory")?;

    let maintenance_handle = spawn_maintenance_task(
        state.cache.clone(),
        config.cache_max_age,
        config.cache_maintenance_interval,
    );
    info!("Background cache maintenance started");

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(maintenance_handle))
        .await
        .context("serving HTTP")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM), then aborts maintenance.
async fn shutdown_signal(maintenance_handle: tokio::task::JoinHandle<()>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    maintenance_handle.abort();
    warn!("Cache maintenance task aborted");
}
