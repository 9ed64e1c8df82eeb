//! Storage collaborator for the ingestion pipeline
//!
//! The orchestrator only talks to these traits. One [`StoreTransaction`] is
//! opened per upload; every accepted record is inserted through it and the
//! whole batch is committed or rolled back at the end.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;

use super::record::ParsedRecord;

pub use memory::MemoryRecordStore;
pub use postgres::PgRecordStore;

/// Storage failures.
///
/// Only [`StoreError::Rejected`] is scoped to a single record; every other
/// variant means the transaction can no longer be trusted.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to begin transaction: {0}")]
    Begin(String),

    #[error("failed to prepare insert statement: {0}")]
    Prepare(String),

    #[error("record rejected: {0}")]
    Rejected(String),

    #[error("savepoint handling failed: {0}")]
    Savepoint(String),

    #[error("failed to commit transaction: {0}")]
    Commit(String),

    #[error("failed to roll back transaction: {0}")]
    Rollback(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// True when the error only affects the record being inserted
    pub fn is_record_level(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A source of transactions
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Open a new transaction, waiting for a free connection if needed
    async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>>;

    /// Cheap liveness probe used by the health endpoint
    async fn ping(&self) -> StoreResult<()>;
}

/// One open transaction
#[async_trait]
pub trait StoreTransaction: Send {
    /// Prepare the insert statement for this transaction
    async fn prepare(&mut self) -> StoreResult<()>;

    /// Insert one record. A `Rejected` error leaves earlier inserts intact.
    async fn insert(&mut self, record: &ParsedRecord) -> StoreResult<()>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;

    async fn rollback(self: Box<Self>) -> StoreResult<()>;
}
