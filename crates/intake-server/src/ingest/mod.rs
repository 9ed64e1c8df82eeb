//! Upload ingestion core
//!
//! - [`decoder`]: delimiter selection and line splitting
//! - [`normalize`], [`fields`], [`identifier`]: per-field cleanup and validation
//! - [`record`]: raw and parsed records, per-record errors, the outcome report
//! - [`orchestrator`]: one transaction per upload
//! - [`store`]: where accepted records go

pub mod decoder;
pub mod fields;
pub mod identifier;
pub mod normalize;
pub mod orchestrator;
pub mod record;
pub mod store;

pub use decoder::{Delimiter, UploadHint};
pub use fields::FieldErrorPolicy;
pub use orchestrator::{IngestError, IngestOptions, IngestOrchestrator, IngestionState};
pub use record::{IngestionOutcome, ParsedRecord, RawRecord, RecordError};
pub use store::{MemoryRecordStore, PgRecordStore, RecordStore, StoreError};
