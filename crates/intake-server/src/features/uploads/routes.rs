use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use futures::TryStreamExt;
use std::io;
use tokio_util::io::StreamReader;

use super::commands::{self, IngestUploadCommand, UploadError};
use crate::error::ApiResult;
use crate::AppState;

/// Multipart field carrying the file
pub const FILE_FIELD: &str = "file";

pub fn uploads_routes() -> Router<AppState> {
    Router::new().route("/upload", post(upload))
}

#[tracing::instrument(skip(state, headers, multipart))]
async fn upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Response> {
    let limit = state.max_upload_bytes;

    if let Some(length) = declared_length(&headers) {
        if length > limit as u64 {
            return Err(UploadError::PayloadTooLarge { limit }.into());
        }
    }

    let mut multipart = multipart.map_err(|e| UploadError::Multipart(e.body_text()))?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| UploadError::from_multipart(&e, limit))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let command = IngestUploadCommand {
            file_name: field.file_name().map(str::to_string),
            content_type: field.content_type().map(str::to_string),
            limit,
        };
        let reader = StreamReader::new(Box::pin(field.map_err(io::Error::other)));

        let outcome = commands::ingest::handle(&state.orchestrator, command, reader).await?;

        return Ok((StatusCode::OK, outcome.to_string()).into_response());
    }

    Err(UploadError::MissingFile.into())
}

fn declared_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_declared_length() {
        let mut headers = HeaderMap::new();
        assert_eq!(declared_length(&headers), None);

        headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("2048"));
        assert_eq!(declared_length(&headers), Some(2048));

        headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("lots"));
        assert_eq!(declared_length(&headers), None);
    }
}
