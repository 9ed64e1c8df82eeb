//! Customer Intake Server Library
//!
//! HTTP service that ingests delimited customer files.
//!
//! # Overview
//!
//! A client uploads a CSV or whitespace/tab delimited text file to
//! `POST /upload`. Every line after the header is normalized and validated,
//! including the national identifier checksum, and the lines that pass are
//! inserted into the `customers` table inside one transaction. The response
//! is a plain-text report such as `"2 records processed, 1 records skipped."`.
//!
//! Lines that fail validation are skipped and counted. Failures that make the
//! transaction untrustworthy (the database refusing to begin or commit, the
//! upload stream breaking) roll everything back and return 500.
//!
//! # Architecture
//!
//! - [`ingest`]: decoding, validation and the transactional orchestrator
//! - [`features`]: HTTP routes, one vertical slice per feature
//! - [`config`], [`db`], [`middleware`]: server plumbing
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use intake_server::{config::Config, create_router, ingest::MemoryRecordStore, AppState};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::default();
//!     let state = AppState::new(Arc::new(MemoryRecordStore::new()), &config.ingest);
//!     let app = create_router(state, &config);
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod features;
pub mod ingest;
pub mod middleware;

use std::sync::Arc;

use axum::{extract::DefaultBodyLimit, routing::get, Router};
use tower_http::compression::CompressionLayer;

use config::{Config, IngestConfig};
use ingest::{IngestOrchestrator, RecordStore};

// Re-export commonly used types
pub use error::{ApiResult, AppError};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RecordStore>,
    pub orchestrator: IngestOrchestrator,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(store: Arc<dyn RecordStore>, ingest: &IngestConfig) -> Self {
        Self {
            orchestrator: IngestOrchestrator::new(store.clone(), ingest.options()),
            store,
            max_upload_bytes: ingest.max_upload_bytes,
        }
    }
}

/// Create the application router with all routes and middleware
pub fn create_router(state: AppState, config: &Config) -> Router {
    let body_limit = state.max_upload_bytes;

    Router::new()
        .route("/health", get(api::health::health_check))
        .merge(features::router())
        .with_state(state)
        // Apply layers from innermost to outermost
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CompressionLayer::new())
        .layer(middleware::tracing_layer())
        .layer(middleware::cors_layer(&config.cors))
}
