pub mod commands;
pub mod routes;

pub use commands::{IngestUploadCommand, UploadError};

pub use routes::uploads_routes;
