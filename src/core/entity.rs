//! Persisted model abstraction
//!
//! Models are plain serde structs. Backends only ever see [`Record`]s (JSON
//! objects), so a single store implementation serves every model.
//!
//! Every model carries the same base columns: `id` (assigned by the store),
//! `created_at`, `updated_at` and the soft `enabled` flag.

use crate::core::store::StoreError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::fmt;

/// One row, column name to JSON value
pub type Record = Map<String, Value>;

/// Columns every model shares
pub const BASE_COLUMNS: [&str; 4] = ["id", "created_at", "updated_at", "enabled"];

/// Static description of a table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSchema {
    pub name: &'static str,
    /// Column sets that must be unique across rows
    pub unique: &'static [&'static [&'static str]],
}

impl TableSchema {
    /// First unique key on which the two records collide
    ///
    /// `null` never collides, matching SQL unique constraints.
    pub fn conflicting_key(&self, left: &Record, right: &Record) -> Option<&'static [&'static str]> {
        self.unique.iter().copied().find(|columns| {
            columns.iter().all(|column| match (left.get(*column), right.get(*column)) {
                (Some(a), Some(b)) => !a.is_null() && a == b,
                _ => false,
            })
        })
    }
}

/// Ordered equality filters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Lookup {
    filters: Vec<(String, Value)>,
}

impl Lookup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `column = value`; a repeated column replaces the earlier value
    pub fn eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        let column = column.into();
        let value = value.into();
        match self.filters.iter_mut().find(|(c, _)| *c == column) {
            Some(slot) => slot.1 = value,
            None => self.filters.push((column, value)),
        }
        self
    }

    pub fn by_id(id: i64) -> Self {
        Self::new().eq("id", id)
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.filters.iter().map(|(c, v)| (c.as_str(), v))
    }

    pub fn matches(&self, record: &Record) -> bool {
        self.filters
            .iter()
            .all(|(column, value)| record.get(column).unwrap_or(&Value::Null) == value)
    }

    /// Filters as a record, used as the seed of a new row
    pub fn to_record(&self) -> Record {
        self.filters.iter().cloned().collect()
    }
}

impl From<Record> for Lookup {
    fn from(record: Record) -> Self {
        Self {
            filters: record.into_iter().collect(),
        }
    }
}

impl fmt::Display for Lookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .filters
            .iter()
            .map(|(column, value)| format!("{}={}", column, value))
            .collect();
        write!(f, "{{{}}}", parts.join(", "))
    }
}

/// A persisted model
///
/// Implement with [`impl_model!`](crate::impl_model) rather than by hand.
pub trait Model: Clone + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Table name
    const TABLE: &'static str;

    /// Unique column sets
    const UNIQUE: &'static [&'static [&'static str]] = &[];

    fn schema() -> TableSchema {
        TableSchema {
            name: Self::TABLE,
            unique: Self::UNIQUE,
        }
    }

    fn id(&self) -> i64;

    fn created_at(&self) -> DateTime<Utc>;

    fn updated_at(&self) -> DateTime<Utc>;

    fn enabled(&self) -> bool;

    /// Column map of this instance
    fn to_record(&self) -> Result<Record, StoreError> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(other) => Err(StoreError::InvalidRecord {
                table: Self::TABLE.to_string(),
                message: format!("expected an object, got {}", other),
            }),
            Err(e) => Err(StoreError::InvalidRecord {
                table: Self::TABLE.to_string(),
                message: e.to_string(),
            }),
        }
    }

    fn from_record(record: Record) -> Result<Self, StoreError> {
        serde_json::from_value(Value::Object(record)).map_err(|e| StoreError::InvalidRecord {
            table: Self::TABLE.to_string(),
            message: e.to_string(),
        })
    }
}
