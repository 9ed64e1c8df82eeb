//! Customer Intake Server - Main entry point

use anyhow::Result;
use intake_common::logging::{init_logging, LogConfig};
use std::{net::SocketAddr, sync::Arc};
use tokio::signal;
use tracing::{info, warn};

use intake_server::{
    config::{Config, StoreKind},
    create_router, db,
    ingest::{MemoryRecordStore, PgRecordStore, RecordStore},
    AppState,
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Environment variables take precedence over these defaults
    let log_config = LogConfig::builder()
        .log_file_prefix("intake-server")
        .filter_directives("intake_server=debug,tower_http=info,sqlx=warn")
        .build()
        .merge_env()?;

    let _log_guard = init_logging(&log_config)?;

    info!("Starting intake server");

    let config = Config::load()?;
    info!(
        host = %config.server.host,
        port = config.server.port,
        store = ?config.ingest.store,
        field_error_policy = %config.ingest.field_error_policy,
        strict_csv = config.ingest.strict_csv,
        max_upload_bytes = config.ingest.max_upload_bytes,
        "Configuration loaded"
    );

    let store: Arc<dyn RecordStore> = match config.ingest.store {
        StoreKind::Postgres => {
            let pool = db::create_pool(&config.database).await?;
            db::run_migrations(&pool).await?;
            Arc::new(PgRecordStore::new(pool))
        },
        StoreKind::Memory => {
            warn!("Using the in-memory store; records are lost on restart");
            Arc::new(MemoryRecordStore::new())
        },
    };

    let state = AppState::new(store, &config.ingest);
    let app = create_router(state, &config);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down gracefully");

    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        },
    }
}
