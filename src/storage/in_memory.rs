//! In-memory store for tests and development
//!
//! Committed rows live behind one `RwLock`. Each session keeps its own write
//! overlay, so uncommitted work stays private. Updates are staged as column
//! changes and merged onto the committed row at commit, so concurrent
//! sessions touching different columns of one row both land. Unique keys are
//! checked again at commit time under the write lock. `FOR UPDATE` reads take
//! per-row async locks that the session holds until it commits, rolls back or
//! is dropped.

use crate::core::entity::{Lookup, Record, TableSchema};
use crate::core::store::{Query, Session, Store, StoreError};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, RwLock};
use tokio::sync::OwnedMutexGuard;

type RowKey = (&'static str, i64);
type Table = BTreeMap<i64, Record>;

/// A staged write of one row
#[derive(Debug, Clone)]
enum Change {
    /// Row created by this session
    Inserted(Record),
    /// Columns changed on a committed row
    Updated(Record),
    Deleted,
}

type Overlay = HashMap<RowKey, Change>;

/// Apply the staged changes of `table` onto `rows`
///
/// An update whose row has disappeared is dropped along with it.
fn apply(table: &str, rows: &mut Table, overlay: &Overlay) {
    for ((name, id), change) in overlay {
        if *name != table {
            continue;
        }
        match change {
            Change::Inserted(record) => {
                rows.insert(*id, record.clone());
            }
            Change::Updated(columns) => {
                if let Some(row) = rows.get_mut(id) {
                    row.extend(columns.clone());
                }
            }
            Change::Deleted => {
                rows.remove(id);
            }
        }
    }
}

#[derive(Default)]
struct Shared {
    tables: RwLock<HashMap<&'static str, Table>>,
    sequences: Mutex<HashMap<&'static str, i64>>,
    row_locks: Mutex<HashMap<RowKey, Arc<tokio::sync::Mutex<()>>>>,
}

/// In-memory store implementation
///
/// Cloning shares the underlying data.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    shared: Arc<Shared>,
}

impl InMemoryStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of committed rows in `table`
    pub fn committed_len(&self, table: &str) -> Result<usize, StoreError> {
        let tables = self
            .shared
            .tables
            .read()
            .map_err(|e| StoreError::LockPoisoned(format!("read lock: {}", e)))?;
        Ok(tables.get(table).map_or(0, BTreeMap::len))
    }
}

#[async_trait]
impl Store for InMemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn session(&self) -> Result<Box<dyn Session>, StoreError> {
        Ok(Box::new(InMemorySession {
            shared: Arc::clone(&self.shared),
            pending: Overlay::new(),
            savepoints: Vec::new(),
            schemas: HashMap::new(),
            held: HashMap::new(),
        }))
    }
}

/// A unit of work against an [`InMemoryStore`]
pub struct InMemorySession {
    shared: Arc<Shared>,
    pending: Overlay,
    savepoints: Vec<Overlay>,
    schemas: HashMap<&'static str, TableSchema>,
    held: HashMap<RowKey, OwnedMutexGuard<()>>,
}

impl InMemorySession {
    /// Committed rows of `table` with this session's writes applied
    fn view(&self, table: &'static str) -> Result<Table, StoreError> {
        let mut rows = {
            let tables = self
                .shared
                .tables
                .read()
                .map_err(|e| StoreError::LockPoisoned(format!("read lock: {}", e)))?;
            tables.get(table).cloned().unwrap_or_default()
        };
        apply(table, &mut rows, &self.pending);
        Ok(rows)
    }

    fn matching_ids(&self, table: &'static str, lookup: &Lookup) -> Result<Vec<i64>, StoreError> {
        Ok(self
            .view(table)?
            .into_iter()
            .filter(|(_, row)| lookup.matches(row))
            .map(|(id, _)| id)
            .collect())
    }

    fn next_id(&self, table: &'static str) -> Result<i64, StoreError> {
        let mut sequences = self
            .shared
            .sequences
            .lock()
            .map_err(|e| StoreError::LockPoisoned(format!("sequence lock: {}", e)))?;
        let next = sequences.entry(table).or_insert(0);
        *next += 1;
        Ok(*next)
    }

    async fn lock_row(&mut self, key: RowKey) -> Result<(), StoreError> {
        if self.held.contains_key(&key) {
            return Ok(());
        }
        let mutex = {
            let mut locks = self
                .shared
                .row_locks
                .lock()
                .map_err(|e| StoreError::LockPoisoned(format!("row lock table: {}", e)))?;
            Arc::clone(locks.entry(key).or_default())
        };
        let guard = mutex.lock_owned().await;
        self.held.insert(key, guard);
        Ok(())
    }

    /// Drop held row locks and forget the ones nobody else is waiting on
    fn release_locks(&mut self) {
        if self.held.is_empty() {
            return;
        }
        let keys: Vec<RowKey> = self.held.keys().copied().collect();
        self.held.clear();

        // Waiters clone the Arc under this same mutex, so a count of one is final.
        if let Ok(mut locks) = self.shared.row_locks.lock() {
            for key in keys {
                if locks.get(&key).is_some_and(|m| Arc::strong_count(m) == 1) {
                    locks.remove(&key);
                }
            }
        }
    }

    fn remember(&mut self, table: TableSchema) {
        self.schemas.entry(table.name).or_insert(table);
    }

    fn reset(&mut self) {
        self.pending.clear();
        self.savepoints.clear();
        self.release_locks();
    }
}

impl Drop for InMemorySession {
    fn drop(&mut self) {
        self.release_locks();
    }
}

fn check_unique(
    table: TableSchema,
    rows: &Table,
    id: i64,
    record: &Record,
) -> Result<(), StoreError> {
    for (other_id, other) in rows {
        if *other_id == id {
            continue;
        }
        if let Some(columns) = table.conflicting_key(record, other) {
            return Err(StoreError::UniqueViolation {
                table: table.name.to_string(),
                columns: columns.iter().map(|c| c.to_string()).collect(),
            });
        }
    }
    Ok(())
}

#[async_trait]
impl Session for InMemorySession {
    async fn insert(&mut self, table: TableSchema, mut record: Record) -> Result<Record, StoreError> {
        self.remember(table);
        let id = self.next_id(table.name)?;
        record.insert("id".into(), Value::from(id));

        check_unique(table, &self.view(table.name)?, id, &record)?;

        self.pending
            .insert((table.name, id), Change::Inserted(record.clone()));
        Ok(record)
    }

    async fn fetch(&mut self, table: TableSchema, query: &Query) -> Result<Vec<Record>, StoreError> {
        if query.for_update {
            for id in self.matching_ids(table.name, &query.lookup)? {
                self.lock_row((table.name, id)).await?;
            }
        }

        // Re-read after locking: a row may have changed while we waited.
        let rows = self
            .view(table.name)?
            .into_values()
            .filter(|row| query.lookup.matches(row))
            .skip(query.offset);
        Ok(match query.limit {
            Some(limit) => rows.take(limit).collect(),
            None => rows.collect(),
        })
    }

    async fn count(&mut self, table: TableSchema, lookup: &Lookup) -> Result<u64, StoreError> {
        Ok(self.matching_ids(table.name, lookup)?.len() as u64)
    }

    async fn update(
        &mut self,
        table: TableSchema,
        id: i64,
        mut changes: Record,
    ) -> Result<Record, StoreError> {
        self.remember(table);
        changes.remove("id");
        let rows = self.view(table.name)?;
        let mut record = rows.get(&id).cloned().ok_or_else(|| StoreError::NotFound {
            table: table.name.to_string(),
            id,
        })?;

        record.extend(changes.clone());
        check_unique(table, &rows, id, &record)?;

        let key = (table.name, id);
        match self.pending.get_mut(&key) {
            Some(Change::Inserted(row)) => row.extend(changes),
            Some(Change::Updated(columns)) => columns.extend(changes),
            _ => {
                self.pending.insert(key, Change::Updated(changes));
            }
        }
        Ok(record)
    }

    async fn delete(&mut self, table: TableSchema, id: i64) -> Result<bool, StoreError> {
        self.remember(table);
        if !self.view(table.name)?.contains_key(&id) {
            return Ok(false);
        }
        self.pending.insert((table.name, id), Change::Deleted);
        Ok(true)
    }

    async fn begin_nested(&mut self) -> Result<(), StoreError> {
        self.savepoints.push(self.pending.clone());
        Ok(())
    }

    async fn release_nested(&mut self) -> Result<(), StoreError> {
        self.savepoints.pop().map(|_| ()).ok_or(StoreError::NoSavepoint)
    }

    async fn rollback_nested(&mut self) -> Result<(), StoreError> {
        self.pending = self.savepoints.pop().ok_or(StoreError::NoSavepoint)?;
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), StoreError> {
        {
            let mut tables = self
                .shared
                .tables
                .write()
                .map_err(|e| StoreError::LockPoisoned(format!("write lock: {}", e)))?;

            // Merge every touched table first so a violation leaves nothing half-applied.
            let mut merged: HashMap<&'static str, Table> = HashMap::new();
            for schema in self.schemas.values() {
                let mut rows = tables.get(schema.name).cloned().unwrap_or_default();
                apply(schema.name, &mut rows, &self.pending);
                for (name, id) in self.pending.keys() {
                    if *name != schema.name {
                        continue;
                    }
                    if let Some(row) = rows.get(id) {
                        check_unique(*schema, &rows, *id, row)?;
                    }
                }
                merged.insert(schema.name, rows);
            }
            tables.extend(merged);
            self.pending.clear();
        }

        tracing::trace!(released = self.held.len(), "in-memory session committed");
        self.reset();
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), StoreError> {
        self.reset();
        Ok(())
    }
}
