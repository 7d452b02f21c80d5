//! Storage contracts
//!
//! A [`Store`] hands out [`Session`]s. A session is one unit of work: its
//! writes are visible to itself immediately, to other sessions only after
//! `commit`, and are discarded by `rollback` or by dropping the session.

use crate::core::entity::{Lookup, Record, TableSchema};
use async_trait::async_trait;

/// Errors raised by storage backends
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("unique constraint {table}({cols}) violated", cols = .columns.join(", "))]
    UniqueViolation { table: String, columns: Vec<String> },

    #[error("{table} row {id} not found")]
    NotFound { table: String, id: i64 },

    #[error("expected at most one {table} row for {lookup}, found {found}")]
    MultipleResults {
        table: String,
        lookup: String,
        found: usize,
    },

    #[error("{table} row for {lookup} conflicted on insert but cannot be read back")]
    ConflictUnresolved { table: String, lookup: String },

    #[error("invalid {table} record: {message}")]
    InvalidRecord { table: String, message: String },

    #[error("no open savepoint")]
    NoSavepoint,

    #[error("failed to acquire lock: {0}")]
    LockPoisoned(String),

    #[error("{backend} error: {message}")]
    Backend {
        backend: &'static str,
        message: String,
    },
}

impl StoreError {
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, StoreError::UniqueViolation { .. })
    }
}

/// Row selection for [`Session::fetch`]
#[derive(Debug, Clone, Default)]
pub struct Query {
    pub lookup: Lookup,
    /// Lock matched rows until the session ends
    pub for_update: bool,
    pub offset: usize,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new(lookup: Lookup) -> Self {
        Self {
            lookup,
            ..Self::default()
        }
    }

    pub fn for_update(mut self) -> Self {
        self.for_update = true;
        self
    }

    pub fn slice(mut self, offset: usize, limit: usize) -> Self {
        self.offset = offset;
        self.limit = Some(limit);
        self
    }
}

/// One unit of work against a store
///
/// Rows come back ordered by `id`.
#[async_trait]
pub trait Session: Send {
    /// Insert a row; the store assigns `id` and returns the stored row
    async fn insert(&mut self, table: TableSchema, record: Record) -> Result<Record, StoreError>;

    async fn fetch(&mut self, table: TableSchema, query: &Query) -> Result<Vec<Record>, StoreError>;

    async fn count(&mut self, table: TableSchema, lookup: &Lookup) -> Result<u64, StoreError>;

    /// Merge `changes` into the row and return the result
    async fn update(
        &mut self,
        table: TableSchema,
        id: i64,
        changes: Record,
    ) -> Result<Record, StoreError>;

    /// Remove a row; `false` when it did not exist
    async fn delete(&mut self, table: TableSchema, id: i64) -> Result<bool, StoreError>;

    async fn get(&mut self, table: TableSchema, id: i64) -> Result<Option<Record>, StoreError> {
        let rows = self.fetch(table, &Query::new(Lookup::by_id(id))).await?;
        Ok(rows.into_iter().next())
    }

    /// Open a savepoint
    async fn begin_nested(&mut self) -> Result<(), StoreError>;

    /// Keep the work done since the last savepoint
    async fn release_nested(&mut self) -> Result<(), StoreError>;

    /// Undo the work done since the last savepoint
    async fn rollback_nested(&mut self) -> Result<(), StoreError>;

    /// Make every pending write durable and release row locks
    async fn commit(&mut self) -> Result<(), StoreError>;

    /// Discard every pending write and release row locks
    async fn rollback(&mut self) -> Result<(), StoreError>;
}

/// Factory of sessions
#[async_trait]
pub trait Store: Send + Sync {
    /// Short backend name for logs
    fn backend(&self) -> &'static str;

    async fn session(&self) -> Result<Box<dyn Session>, StoreError>;
}
