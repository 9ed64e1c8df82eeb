pub mod ingest;

pub use ingest::{IngestUploadCommand, UploadError};
