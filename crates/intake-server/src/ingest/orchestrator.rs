//! Ingestion orchestrator
//!
//! Drives one upload from the raw byte stream to a committed transaction:
//! open the transaction, decode every line, insert the records that validate,
//! then commit. Bad lines are counted and skipped; anything that makes the
//! transaction untrustworthy aborts the whole upload.

use std::io;
use std::sync::Arc;

use thiserror::Error;
use tokio::io::AsyncBufRead;
use tracing::{debug, error, info, warn};

use super::decoder::{DecoderOptions, RecordDecoder, UploadHint};
use super::fields::FieldErrorPolicy;
use super::record::{IngestionOutcome, ParsedRecord, RecordError};
use super::store::{RecordStore, StoreError, StoreTransaction};

/// Skip reasons kept for the summary log line.
const MAX_SKIP_SAMPLES: usize = 5;

/// Lifecycle of a single upload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestionState {
    Start,
    DecodingHeader,
    DecodingRecords,
    Committing,
    Done,
    Aborted,
}

impl IngestionState {
    pub fn as_str(&self) -> &str {
        match self {
            IngestionState::Start => "start",
            IngestionState::DecodingHeader => "decoding_header",
            IngestionState::DecodingRecords => "decoding_records",
            IngestionState::Committing => "committing",
            IngestionState::Done => "done",
            IngestionState::Aborted => "aborted",
        }
    }
}

/// Failures that abort the whole upload
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("could not open transaction: {0}")]
    Begin(#[source] StoreError),

    #[error("could not prepare insert: {0}")]
    Prepare(#[source] StoreError),

    #[error("could not commit transaction: {0}")]
    Commit(#[source] StoreError),

    #[error("failed to read upload: {0}")]
    Read(#[source] io::Error),

    #[error("store failed mid-upload: {0}")]
    Store(#[source] StoreError),
}

/// Per-upload behaviour switches
#[derive(Debug, Clone, Copy, Default)]
pub struct IngestOptions {
    pub field_error_policy: FieldErrorPolicy,
    pub strict_csv: bool,
}

#[derive(Debug, Default)]
struct Tally {
    processed: usize,
    skipped: usize,
    samples: Vec<String>,
}

impl Tally {
    fn skip(&mut self, line: usize, err: &RecordError) {
        warn!(line, kind = err.kind(), error = %err, "Record skipped");
        self.skipped += 1;
        if self.samples.len() < MAX_SKIP_SAMPLES {
            self.samples.push(format!("line {line}: {err}"));
        }
    }
}

/// Runs uploads against a record store
#[derive(Clone)]
pub struct IngestOrchestrator {
    store: Arc<dyn RecordStore>,
    options: IngestOptions,
}

impl IngestOrchestrator {
    pub fn new(store: Arc<dyn RecordStore>, options: IngestOptions) -> Self {
        Self { store, options }
    }

    /// Ingest one uploaded file.
    ///
    /// All accepted records are committed together. On any error the
    /// transaction is rolled back and nothing from this upload persists.
    pub async fn ingest<R>(
        &self,
        reader: R,
        hint: &UploadHint,
    ) -> Result<IngestionOutcome, IngestError>
    where
        R: AsyncBufRead + Unpin + Send,
    {
        let mut state = IngestionState::Start;
        debug!(state = state.as_str(), "Opening transaction");

        let mut tx = self.store.begin().await.map_err(|e| {
            transition(&mut state, IngestionState::Aborted);
            IngestError::Begin(e)
        })?;

        if let Err(e) = tx.prepare().await {
            abort(tx, &mut state).await;
            return Err(IngestError::Prepare(e));
        }

        let tally = match self.decode_records(tx.as_mut(), reader, hint, &mut state).await {
            Ok(tally) => tally,
            Err(e) => {
                abort(tx, &mut state).await;
                return Err(e);
            },
        };

        transition(&mut state, IngestionState::Committing);
        if let Err(e) = tx.commit().await {
            transition(&mut state, IngestionState::Aborted);
            return Err(IngestError::Commit(e));
        }
        transition(&mut state, IngestionState::Done);

        info!(
            processed = tally.processed,
            skipped = tally.skipped,
            skip_samples = ?tally.samples,
            "Upload ingested"
        );

        Ok(IngestionOutcome::new(tally.processed, tally.skipped))
    }

    async fn decode_records<R>(
        &self,
        tx: &mut dyn StoreTransaction,
        reader: R,
        hint: &UploadHint,
        state: &mut IngestionState,
    ) -> Result<Tally, IngestError>
    where
        R: AsyncBufRead + Unpin + Send,
    {
        transition(state, IngestionState::DecodingHeader);
        let decoder_options = DecoderOptions {
            strict_csv: self.options.strict_csv,
        };
        let mut decoder = RecordDecoder::open(reader, hint, decoder_options)
            .await
            .map_err(IngestError::Read)?;

        transition(state, IngestionState::DecodingRecords);
        let mut tally = Tally::default();

        while let Some(line) = decoder.next_line().await.map_err(IngestError::Read)? {
            let policy = self.options.field_error_policy;
            let record = match line
                .result
                .and_then(|raw| ParsedRecord::from_raw(&raw, policy))
            {
                Ok(record) => record,
                Err(e) => {
                    tally.skip(line.line_number, &e);
                    continue;
                },
            };

            match tx.insert(&record).await {
                Ok(()) => tally.processed += 1,
                Err(e) if e.is_record_level() => {
                    tally.skip(line.line_number, &RecordError::Rejected(e.to_string()))
                },
                Err(e) => return Err(IngestError::Store(e)),
            }
        }

        Ok(tally)
    }
}

fn transition(state: &mut IngestionState, next: IngestionState) {
    debug!(from = state.as_str(), to = next.as_str(), "Ingestion state change");
    *state = next;
}

async fn abort(tx: Box<dyn StoreTransaction>, state: &mut IngestionState) {
    transition(state, IngestionState::Aborted);
    if let Err(e) = tx.rollback().await {
        error!(error = %e, "Rollback after failed upload also failed");
    }
}
