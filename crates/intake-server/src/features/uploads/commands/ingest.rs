use std::io;

use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use tokio::io::AsyncBufRead;

use crate::error::AppError;
use crate::ingest::{IngestError, IngestOrchestrator, IngestionOutcome, UploadHint};

/// Ingest the `file` part of an upload request
#[derive(Debug, Clone, Default)]
pub struct IngestUploadCommand {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    /// Body size limit in force for this request
    pub limit: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("Multipart field 'file' is required")]
    MissingFile,
    #[error("Malformed multipart body: {0}")]
    Multipart(String),
    #[error("Upload exceeds the {limit} byte limit")]
    PayloadTooLarge { limit: usize },
    #[error(transparent)]
    Ingest(IngestError),
}

impl UploadError {
    /// Classify a multipart failure. Hitting the body limit mid-stream
    /// surfaces here as a 413-flavoured multipart error.
    pub fn from_multipart(err: &MultipartError, limit: usize) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self::PayloadTooLarge { limit }
        } else {
            Self::Multipart(err.to_string())
        }
    }

    /// A read error caused by the client's multipart body is the client's
    /// fault; any other ingestion failure is ours.
    fn from_ingest(err: IngestError, limit: usize) -> Self {
        if let IngestError::Read(ref io_err) = err {
            if let Some(multipart) = multipart_source(io_err) {
                return Self::from_multipart(multipart, limit);
            }
        }
        Self::Ingest(err)
    }
}

fn multipart_source(err: &io::Error) -> Option<&MultipartError> {
    err.get_ref()?.downcast_ref::<MultipartError>()
}

impl From<UploadError> for AppError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::MissingFile => AppError::bad_request("MISSING_FILE", err.to_string()),
            UploadError::Multipart(_) => AppError::bad_request("INVALID_MULTIPART", err.to_string()),
            UploadError::PayloadTooLarge { limit } => AppError::PayloadTooLarge { limit },
            UploadError::Ingest(e) => AppError::Ingestion(e),
        }
    }
}

impl IngestUploadCommand {
    pub fn hint(&self) -> UploadHint {
        UploadHint::new(self.file_name.clone(), self.content_type.clone())
    }
}

#[tracing::instrument(
    skip(orchestrator, command, reader),
    fields(file_name = ?command.file_name, content_type = ?command.content_type)
)]
pub async fn handle<R>(
    orchestrator: &IngestOrchestrator,
    command: IngestUploadCommand,
    reader: R,
) -> Result<IngestionOutcome, UploadError>
where
    R: AsyncBufRead + Unpin + Send,
{
    let hint = command.hint();
    let outcome = orchestrator
        .ingest(reader, &hint)
        .await
        .map_err(|e| UploadError::from_ingest(e, command.limit))?;

    tracing::info!(
        processed = outcome.processed(),
        skipped = outcome.skipped(),
        "Upload handled"
    );

    Ok(outcome)
}
