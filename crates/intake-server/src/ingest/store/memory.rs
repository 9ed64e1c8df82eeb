//! In-memory record store
//!
//! Used when the server runs without a database and by the tests. Rows are
//! buffered per transaction and become visible only on commit. Failures can
//! be injected at each stage of the transaction.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use super::{RecordStore, StoreError, StoreResult, StoreTransaction};
use crate::ingest::record::ParsedRecord;

#[derive(Debug, Default)]
struct Failures {
    begin: bool,
    prepare: bool,
    commit: bool,
    rejected_ids: HashSet<String>,
}

#[derive(Debug, Default)]
struct State {
    committed: Vec<ParsedRecord>,
    rollbacks: usize,
}

/// Shared in-memory store. Clones share the same rows.
#[derive(Debug, Clone, Default)]
pub struct MemoryRecordStore {
    state: Arc<Mutex<State>>,
    failures: Arc<Failures>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `begin` fail
    pub fn failing_begin(self) -> Self {
        self.with_failures(|f| f.begin = true)
    }

    /// Make every `prepare` fail
    pub fn failing_prepare(self) -> Self {
        self.with_failures(|f| f.prepare = true)
    }

    /// Make every `commit` fail
    pub fn failing_commit(self) -> Self {
        self.with_failures(|f| f.commit = true)
    }

    /// Reject inserts of this national identifier, like a constraint violation
    pub fn rejecting(self, national_id: impl Into<String>) -> Self {
        let national_id = national_id.into();
        self.with_failures(|f| {
            f.rejected_ids.insert(national_id);
        })
    }

    fn with_failures(self, update: impl FnOnce(&mut Failures)) -> Self {
        let mut failures = Failures {
            begin: self.failures.begin,
            prepare: self.failures.prepare,
            commit: self.failures.commit,
            rejected_ids: self.failures.rejected_ids.clone(),
        };
        update(&mut failures);
        Self {
            state: self.state,
            failures: Arc::new(failures),
        }
    }

    /// Rows committed so far, in insertion order
    pub fn committed(&self) -> Vec<ParsedRecord> {
        lock(&self.state).committed.clone()
    }

    /// Number of transactions rolled back
    pub fn rollbacks(&self) -> usize {
        lock(&self.state).rollbacks
    }
}

// A panic while holding the lock cannot leave the rows half-written, so a
// poisoned lock is still usable.
fn lock(state: &Mutex<State>) -> MutexGuard<'_, State> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>> {
        if self.failures.begin {
            return Err(StoreError::Begin("injected begin failure".to_string()));
        }

        Ok(Box::new(MemoryTransaction {
            store: self.clone(),
            pending: Vec::new(),
            prepared: false,
        }))
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

struct MemoryTransaction {
    store: MemoryRecordStore,
    pending: Vec<ParsedRecord>,
    prepared: bool,
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn prepare(&mut self) -> StoreResult<()> {
        if self.store.failures.prepare {
            return Err(StoreError::Prepare("injected prepare failure".to_string()));
        }
        self.prepared = true;
        Ok(())
    }

    async fn insert(&mut self, record: &ParsedRecord) -> StoreResult<()> {
        if !self.prepared {
            return Err(StoreError::Unavailable(
                "insert before prepare".to_string(),
            ));
        }
        if self.store.failures.rejected_ids.contains(&record.national_id) {
            return Err(StoreError::Rejected(format!(
                "national_id {} rejected",
                record.national_id
            )));
        }
        self.pending.push(record.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        if self.store.failures.commit {
            lock(&self.store.state).rollbacks += 1;
            return Err(StoreError::Commit("injected commit failure".to_string()));
        }

        let Self { store, pending, .. } = *self;
        lock(&store.state).committed.extend(pending);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        lock(&self.store.state).rollbacks += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(national_id: &str) -> ParsedRecord {
        ParsedRecord {
            national_id: national_id.to_string(),
            is_private: 1,
            is_incomplete: 0,
            last_purchase_date: None,
            average_ticket: None,
            last_purchase_ticket: None,
            most_frequent_store: None,
            last_purchase_store: None,
        }
    }

    #[tokio::test]
    async fn test_rows_visible_only_after_commit() {
        let store = MemoryRecordStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.prepare().await.unwrap();
        tx.insert(&record("52998224725")).await.unwrap();
        assert!(store.committed().is_empty());

        tx.commit().await.unwrap();
        assert_eq!(store.committed().len(), 1);
    }

    #[tokio::test]
    async fn test_rollback_discards_rows() {
        let store = MemoryRecordStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.prepare().await.unwrap();
        tx.insert(&record("52998224725")).await.unwrap();
        tx.rollback().await.unwrap();

        assert!(store.committed().is_empty());
        assert_eq!(store.rollbacks(), 1);
    }

    #[tokio::test]
    async fn test_rejected_id_keeps_other_rows() {
        let store = MemoryRecordStore::new().rejecting("11144477735");
        let mut tx = store.begin().await.unwrap();
        tx.prepare().await.unwrap();
        tx.insert(&record("52998224725")).await.unwrap();

        let err = tx.insert(&record("11144477735")).await.unwrap_err();
        assert!(err.is_record_level());

        tx.commit().await.unwrap();
        assert_eq!(store.committed().len(), 1);
    }

    #[tokio::test]
    async fn test_injected_failures() {
        assert!(matches!(
            MemoryRecordStore::new().failing_begin().begin().await,
            Err(StoreError::Begin(_))
        ));

        let store = MemoryRecordStore::new().failing_prepare();
        let mut tx = store.begin().await.unwrap();
        assert!(matches!(tx.prepare().await, Err(StoreError::Prepare(_))));

        let store = MemoryRecordStore::new().failing_commit();
        let mut tx = store.begin().await.unwrap();
        tx.prepare().await.unwrap();
        tx.insert(&record("52998224725")).await.unwrap();
        assert!(matches!(tx.commit().await, Err(StoreError::Commit(_))));
        assert!(store.committed().is_empty());
    }
}
