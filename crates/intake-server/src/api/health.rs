use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

use super::response::HealthResponse;
use crate::AppState;

/// Report whether the record store answers a probe
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.ping().await {
        Ok(()) => (StatusCode::OK, Json(HealthResponse::healthy())),
        Err(e) => {
            tracing::error!(error = %e, "Store health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, Json(HealthResponse::unhealthy()))
        },
    }
}
