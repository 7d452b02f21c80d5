//! Shared test harness for storage backend testing
//!
//! Provides the `Gadget` model, a conflict-injecting session wrapper and
//! the `repository_tests!` conformance suite.
//!
//! # Usage
//!
//! From any integration test file in `tests/`:
//! ```rust,ignore
//! #[macro_use]
//! mod storage_harness;
//! use storage_harness::*;
//!
//! repository_tests!(fresh_store());
//! ```

#![allow(dead_code)]

#[macro_use]
mod repository_tests;

use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;
use stencil::core::entity::{Lookup, Record, TableSchema};
use stencil::core::store::{Query, Session, Store, StoreError};

stencil::impl_model!(
    /// Test model with one unique column
    Gadget,
    "gadget",
    unique: [["code"]],
    {
        code: String,
        #[serde(default)]
        label: Option<String>,
        #[serde(default)]
        hits: i64,
    }
);

/// DDL of the gadget table for SQL backends
pub const GADGET_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS gadget (
    id          BIGSERIAL PRIMARY KEY,
    created_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
    enabled     BOOLEAN NOT NULL DEFAULT TRUE,
    code        TEXT NOT NULL UNIQUE,
    label       TEXT,
    hits        BIGINT NOT NULL DEFAULT 0
)
"#;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Build a record from a JSON object literal
pub fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        other => panic!("record() expects a JSON object, got {}", other),
    }
}

pub fn by_code(code: &str) -> Lookup {
    Lookup::new().eq("code", code)
}

pub fn gadget_fields(code: &str, label: &str) -> Record {
    record(json!({"code": code, "label": label}))
}

// ---------------------------------------------------------------------------
// Conflict injection
// ---------------------------------------------------------------------------

/// Session wrapper that lets a second writer interfere at chosen points
///
/// - `steal_insert`: before the first insert, another session commits a row
///   with the same fields, so the wrapped insert loses the unique race.
/// - `vanish_on_relock`: before the second `FOR UPDATE` read, another
///   session deletes the matching rows.
pub struct RacingSession {
    inner: Box<dyn Session>,
    store: Arc<dyn Store>,
    steal_insert: bool,
    vanish_on_relock: bool,
    locked_reads: usize,
}

impl RacingSession {
    pub async fn new(store: Arc<dyn Store>) -> Self {
        Self {
            inner: store.session().await.unwrap(),
            store,
            steal_insert: false,
            vanish_on_relock: false,
            locked_reads: 0,
        }
    }

    pub fn steal_insert(mut self) -> Self {
        self.steal_insert = true;
        self
    }

    pub fn vanish_on_relock(mut self) -> Self {
        self.vanish_on_relock = true;
        self
    }
}

#[async_trait]
impl Session for RacingSession {
    async fn insert(&mut self, table: TableSchema, record: Record) -> Result<Record, StoreError> {
        if std::mem::take(&mut self.steal_insert) {
            let mut rival = self.store.session().await?;
            rival.insert(table, record.clone()).await?;
            rival.commit().await?;
        }
        self.inner.insert(table, record).await
    }

    async fn fetch(&mut self, table: TableSchema, query: &Query) -> Result<Vec<Record>, StoreError> {
        if query.for_update {
            self.locked_reads += 1;
            if self.vanish_on_relock && self.locked_reads == 2 {
                let mut rival = self.store.session().await?;
                let rows = rival.fetch(table, &Query::new(query.lookup.clone())).await?;
                for row in rows {
                    if let Some(id) = row.get("id").and_then(Value::as_i64) {
                        rival.delete(table, id).await?;
                    }
                }
                rival.commit().await?;
            }
        }
        self.inner.fetch(table, query).await
    }

    async fn count(&mut self, table: TableSchema, lookup: &Lookup) -> Result<u64, StoreError> {
        self.inner.count(table, lookup).await
    }

    async fn update(&mut self, table: TableSchema, id: i64, changes: Record) -> Result<Record, StoreError> {
        self.inner.update(table, id, changes).await
    }

    async fn delete(&mut self, table: TableSchema, id: i64) -> Result<bool, StoreError> {
        self.inner.delete(table, id).await
    }

    async fn begin_nested(&mut self) -> Result<(), StoreError> {
        self.inner.begin_nested().await
    }

    async fn release_nested(&mut self) -> Result<(), StoreError> {
        self.inner.release_nested().await
    }

    async fn rollback_nested(&mut self) -> Result<(), StoreError> {
        self.inner.rollback_nested().await
    }

    async fn commit(&mut self) -> Result<(), StoreError> {
        self.inner.commit().await
    }

    async fn rollback(&mut self) -> Result<(), StoreError> {
        self.inner.rollback().await
    }
}
