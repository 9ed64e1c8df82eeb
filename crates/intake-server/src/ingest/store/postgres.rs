//! PostgreSQL record store
//!
//! Each insert runs under a savepoint. PostgreSQL aborts the whole
//! transaction after a failed statement, so a rejected row is rolled back to
//! its savepoint and the rows inserted before it stay in the transaction.

use async_trait::async_trait;
use sqlx::{Executor, PgPool, Postgres, Transaction};

use super::{RecordStore, StoreError, StoreResult, StoreTransaction};
use crate::ingest::record::ParsedRecord;

pub const INSERT_CUSTOMER_SQL: &str = r#"
    INSERT INTO customers (
        national_id, is_private, is_incomplete, last_purchase_date,
        average_ticket, last_purchase_ticket, most_frequent_store, last_purchase_store
    )
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
"#;

const SAVEPOINT: &str = "SAVEPOINT customer_insert";
const RELEASE_SAVEPOINT: &str = "RELEASE SAVEPOINT customer_insert";
const ROLLBACK_TO_SAVEPOINT: &str = "ROLLBACK TO SAVEPOINT customer_insert";

/// Record store backed by a shared connection pool
#[derive(Clone)]
pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Begin(e.to_string()))?;

        Ok(Box::new(PgStoreTransaction { tx }))
    }

    async fn ping(&self) -> StoreResult<()> {
        crate::db::health_check(&self.pool)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }
}

/// An open PostgreSQL transaction. Dropping it without commit rolls back.
pub struct PgStoreTransaction {
    tx: Transaction<'static, Postgres>,
}

impl PgStoreTransaction {
    async fn savepoint(&mut self, sql: &'static str) -> StoreResult<()> {
        sqlx::query(sql)
            .execute(&mut *self.tx)
            .await
            .map(|_| ())
            .map_err(|e| StoreError::Savepoint(e.to_string()))
    }
}

#[async_trait]
impl StoreTransaction for PgStoreTransaction {
    async fn prepare(&mut self) -> StoreResult<()> {
        // sqlx caches the prepared statement on the connection, so the
        // per-record inserts below reuse it.
        (&mut *self.tx)
            .prepare(INSERT_CUSTOMER_SQL)
            .await
            .map(|_| ())
            .map_err(|e| StoreError::Prepare(e.to_string()))
    }

    async fn insert(&mut self, record: &ParsedRecord) -> StoreResult<()> {
        self.savepoint(SAVEPOINT).await?;

        let result = sqlx::query(INSERT_CUSTOMER_SQL)
            .bind(&record.national_id)
            .bind(record.is_private)
            .bind(record.is_incomplete)
            .bind(record.last_purchase_date)
            .bind(record.average_ticket)
            .bind(record.last_purchase_ticket)
            .bind(record.most_frequent_store.as_deref())
            .bind(record.last_purchase_store.as_deref())
            .execute(&mut *self.tx)
            .await;

        match result {
            Ok(_) => self.savepoint(RELEASE_SAVEPOINT).await,
            Err(e) => {
                self.savepoint(ROLLBACK_TO_SAVEPOINT).await?;
                Err(classify_insert_error(e))
            },
        }
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let Self { tx } = *self;
        tx.commit().await.map_err(|e| StoreError::Commit(e.to_string()))
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        let Self { tx } = *self;
        tx.rollback()
            .await
            .map_err(|e| StoreError::Rollback(e.to_string()))
    }
}

/// Constraint and data errors reported by the server are scoped to the row;
/// anything else means the connection itself is in trouble.
fn classify_insert_error(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => StoreError::Rejected(db_err.message().to_string()),
        other => StoreError::Unavailable(other.to_string()),
    }
}
