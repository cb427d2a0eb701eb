//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{DbAdapter, JsonFileAdapter, MemoryAdapter},
    config::{Config, StorageBackend},
    error::ApiError,
    sweeper::spawn_session_sweeper,
    web::{build_router, AppState},
};
use genfuze_core::ports::DatabaseService;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Opens the configured store, running migrations for SQLite.
async fn open_store(config: &Config) -> Result<Arc<dyn DatabaseService>, ApiError> {
    match config.storage_backend {
        StorageBackend::Sqlite => {
            info!("Connecting to database...");
            let db_adapter = DbAdapter::connect(&config.database_url).await?;
            info!("Running database migrations...");
            db_adapter.run_migrations().await?;
            info!("Database migrations complete.");
            Ok(Arc::new(db_adapter))
        }
        StorageBackend::Json => {
            info!("Opening JSON store at {}", config.json_store_path.display());
            Ok(Arc::new(JsonFileAdapter::open(config.json_store_path.clone()).await?))
        }
        StorageBackend::Memory => {
            warn!("Using the in-memory store; nothing survives a restart");
            Ok(Arc::new(MemoryAdapter::new()))
        }
    }
}

async fn shutdown_signal(cancel: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutdown signal received");
    cancel.cancel();
}

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Open the Store ---
    let db = open_store(&config).await?;

    // --- 3. Build the Shared AppState ---
    let app_state = Arc::new(AppState::from_config(config.clone(), db.clone())?);

    // --- 4. Start the Refresh-Token Sweeper ---
    let cancel = CancellationToken::new();
    let sweeper = spawn_session_sweeper(
        db,
        Duration::from_secs(config.session_sweep_interval_secs.max(1)),
        cancel.clone(),
    );

    // --- 5. Create the Web Router ---
    let app = build_router(app_state)?;

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel.clone()))
        .await?;

    cancel.cancel();
    if let Err(e) = sweeper.await {
        warn!("Session sweeper ended abnormally: {}", e);
    }
    info!("Server stopped");
    Ok(())
}
