//! Feature modules
//!
//! Each feature is a vertical slice with its own `commands/` and `routes.rs`.
//!
//! - **uploads**: `POST /upload`, ingest a delimited customer file

pub mod uploads;

use axum::Router;

use crate::AppState;

/// Router with every feature's routes mounted
pub fn router() -> Router<AppState> {
    Router::new().merge(uploads::uploads_routes())
}
