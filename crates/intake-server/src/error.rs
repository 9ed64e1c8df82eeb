//! Server-side error types

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::api::response::ErrorResponse;
use crate::ingest::IngestError;

/// Result type alias for handlers
pub type ApiResult<T> = std::result::Result<T, AppError>;

/// Errors a handler can return
#[derive(Error, Debug)]
pub enum AppError {
    /// The request itself is unusable; nothing was stored
    #[error("Bad request: {message}")]
    BadRequest { code: &'static str, message: String },

    /// The body is larger than the configured limit
    #[error("Upload exceeds the {limit} byte limit")]
    PayloadTooLarge { limit: usize },

    /// The upload was valid but could not be persisted
    #[error("Ingestion failed: {0}")]
    Ingestion(#[from] IngestError),
}

impl AppError {
    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self::BadRequest {
            code,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest { .. } | AppError::PayloadTooLarge { .. } => {
                StatusCode::BAD_REQUEST
            },
            AppError::Ingestion(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            AppError::BadRequest { code, message } => {
                tracing::warn!(code, %message, "Rejected upload request");
                ErrorResponse::new(code, message)
            },
            AppError::PayloadTooLarge { limit } => {
                tracing::warn!(limit, "Rejected oversized upload");
                ErrorResponse::with_details(
                    "PAYLOAD_TOO_LARGE",
                    format!("Upload exceeds the {limit} byte limit"),
                    serde_json::json!({ "limit_bytes": limit }),
                )
            },
            AppError::Ingestion(ref e) => {
                tracing::error!(error = %e, "Ingestion failed, transaction rolled back");
                ErrorResponse::new(
                    "INGESTION_FAILED",
                    "The upload could not be stored; no records were saved",
                )
            },
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::StoreError;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::bad_request("MISSING_FILE", "no file").status(),
            StatusCode::BAD_REQUEST
        );
        let err = AppError::from(IngestError::Begin(StoreError::Begin("pool timed out".into())));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_ingestion_error_body_is_generic() {
        let err = AppError::from(IngestError::Commit(StoreError::Commit(
            "password=hunter2 connection reset".into(),
        )));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = String::from_utf8(body.to_vec()).unwrap();
        assert!(body.contains("INGESTION_FAILED"));
        assert!(!body.contains("hunter2"));
    }
}
