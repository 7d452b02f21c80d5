//! PostgreSQL storage backend using sqlx.
//!
//! Rows travel as JSONB: inserts and updates go through
//! `jsonb_populate_record`, reads come back as `to_jsonb(t)`, and lookups
//! are `@>` containment tests. One lazily opened transaction backs each
//! session; nested scopes are plain savepoints.
//!
//! # Feature flag
//!
//! This module is gated behind the `postgres` feature flag.

use crate::core::entity::{Lookup, Record, TableSchema};
use crate::core::store::{Query, Session, Store, StoreError};
use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Transaction};
use std::sync::LazyLock;
use std::time::Duration;

const BACKEND: &str = "postgres";

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z_][a-z0-9_]*$").expect("identifier pattern"));

/// Quote a table or column name after checking it is a plain identifier
fn ident(name: &str) -> Result<String, StoreError> {
    if IDENTIFIER.is_match(name) {
        Ok(format!("\"{}\"", name))
    } else {
        Err(StoreError::Backend {
            backend: BACKEND,
            message: format!("refusing identifier '{}'", name),
        })
    }
}

fn map_err(table: &str, err: sqlx::Error) -> StoreError {
    if let Some(db) = err.as_database_error() {
        if db.is_unique_violation() {
            return StoreError::UniqueViolation {
                table: table.to_string(),
                columns: db.constraint().map(|c| vec![c.to_string()]).unwrap_or_default(),
            };
        }
    }
    StoreError::Backend {
        backend: BACKEND,
        message: err.to_string(),
    }
}

fn lookup_json(lookup: &Lookup) -> Value {
    Value::Object(lookup.to_record())
}

fn into_record(table: &str, value: Value) -> Result<Record, StoreError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::InvalidRecord {
            table: table.to_string(),
            message: format!("expected a row object, got {}", other),
        }),
    }
}

/// Store backed by a `PgPool`
#[derive(Clone, Debug)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool against `url`
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .connect(url)
            .await
            .map_err(|e| map_err("pool", e))?;
        Ok(Self::new(pool))
    }

    /// Apply the bundled schema migrations
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Backend {
                backend: BACKEND,
                message: e.to_string(),
            })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PostgresStore {
    fn backend(&self) -> &'static str {
        BACKEND
    }

    async fn session(&self) -> Result<Box<dyn Session>, StoreError> {
        Ok(Box::new(PostgresSession {
            pool: self.pool.clone(),
            tx: None,
            depth: 0,
        }))
    }
}

/// A unit of work: one transaction, opened on first use
pub struct PostgresSession {
    pool: PgPool,
    tx: Option<Transaction<'static, Postgres>>,
    depth: usize,
}

impl PostgresSession {
    async fn tx(&mut self) -> Result<&mut Transaction<'static, Postgres>, StoreError> {
        let tx = match self.tx.take() {
            Some(tx) => tx,
            None => self.pool.begin().await.map_err(|e| map_err("transaction", e))?,
        };
        Ok(self.tx.insert(tx))
    }

    async fn execute(&mut self, sql: &str) -> Result<(), StoreError> {
        let tx = self.tx().await?;
        sqlx::query(sql)
            .execute(&mut **tx)
            .await
            .map_err(|e| map_err("savepoint", e))?;
        Ok(())
    }
}

#[async_trait]
impl Session for PostgresSession {
    async fn insert(&mut self, table: TableSchema, record: Record) -> Result<Record, StoreError> {
        let name = ident(table.name)?;
        let columns = record
            .keys()
            .filter(|c| c.as_str() != "id")
            .map(|c| ident(c))
            .collect::<Result<Vec<_>, _>>()?
            .join(", ");

        let sql = format!(
            "INSERT INTO {name} AS t ({columns}) \
             SELECT {columns} FROM jsonb_populate_record(NULL::{name}, $1) \
             RETURNING to_jsonb(t)"
        );
        let tx = self.tx().await?;
        let row: Value = sqlx::query_scalar(&sql)
            .bind(Value::Object(record))
            .fetch_one(&mut **tx)
            .await
            .map_err(|e| map_err(table.name, e))?;
        into_record(table.name, row)
    }

    async fn fetch(&mut self, table: TableSchema, query: &Query) -> Result<Vec<Record>, StoreError> {
        let name = ident(table.name)?;
        let lock = if query.for_update { " FOR UPDATE OF t" } else { "" };
        let sql = format!(
            "SELECT to_jsonb(t) FROM {name} AS t WHERE to_jsonb(t) @> $1 \
             ORDER BY t.id OFFSET $2 LIMIT $3{lock}"
        );
        let tx = self.tx().await?;
        let rows: Vec<Value> = sqlx::query_scalar(&sql)
            .bind(lookup_json(&query.lookup))
            .bind(query.offset as i64)
            .bind(query.limit.map(|l| l as i64))
            .fetch_all(&mut **tx)
            .await
            .map_err(|e| map_err(table.name, e))?;
        rows.into_iter().map(|row| into_record(table.name, row)).collect()
    }

    async fn count(&mut self, table: TableSchema, lookup: &Lookup) -> Result<u64, StoreError> {
        let name = ident(table.name)?;
        let sql = format!("SELECT COUNT(*) FROM {name} AS t WHERE to_jsonb(t) @> $1");
        let tx = self.tx().await?;
        let count: i64 = sqlx::query_scalar(&sql)
            .bind(lookup_json(lookup))
            .fetch_one(&mut **tx)
            .await
            .map_err(|e| map_err(table.name, e))?;
        Ok(count.max(0) as u64)
    }

    async fn update(
        &mut self,
        table: TableSchema,
        id: i64,
        changes: Record,
    ) -> Result<Record, StoreError> {
        let name = ident(table.name)?;
        let assignments = changes
            .keys()
            .filter(|c| c.as_str() != "id")
            .map(|c| ident(c).map(|quoted| format!("{quoted} = r.{quoted}")))
            .collect::<Result<Vec<_>, _>>()?;

        if assignments.is_empty() {
            return self.get(table, id).await?.ok_or_else(|| StoreError::NotFound {
                table: table.name.to_string(),
                id,
            });
        }

        let sql = format!(
            "UPDATE {name} AS t SET {} \
             FROM jsonb_populate_record(NULL::{name}, $1) AS r \
             WHERE t.id = $2 RETURNING to_jsonb(t)",
            assignments.join(", ")
        );
        let tx = self.tx().await?;
        let row: Option<Value> = sqlx::query_scalar(&sql)
            .bind(Value::Object(changes))
            .bind(id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(|e| map_err(table.name, e))?;
        match row {
            Some(row) => into_record(table.name, row),
            None => Err(StoreError::NotFound {
                table: table.name.to_string(),
                id,
            }),
        }
    }

    async fn delete(&mut self, table: TableSchema, id: i64) -> Result<bool, StoreError> {
        let sql = format!("DELETE FROM {} WHERE id = $1", ident(table.name)?);
        let tx = self.tx().await?;
        let result = sqlx::query(&sql)
            .bind(id)
            .execute(&mut **tx)
            .await
            .map_err(|e| map_err(table.name, e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn begin_nested(&mut self) -> Result<(), StoreError> {
        self.depth += 1;
        let sql = format!("SAVEPOINT sp_{}", self.depth);
        self.execute(&sql).await
    }

    async fn release_nested(&mut self) -> Result<(), StoreError> {
        if self.depth == 0 {
            return Err(StoreError::NoSavepoint);
        }
        let sql = format!("RELEASE SAVEPOINT sp_{}", self.depth);
        self.depth -= 1;
        self.execute(&sql).await
    }

    async fn rollback_nested(&mut self) -> Result<(), StoreError> {
        if self.depth == 0 {
            return Err(StoreError::NoSavepoint);
        }
        let sql = format!("ROLLBACK TO SAVEPOINT sp_{}", self.depth);
        self.depth -= 1;
        self.execute(&sql).await
    }

    async fn commit(&mut self) -> Result<(), StoreError> {
        self.depth = 0;
        if let Some(tx) = self.tx.take() {
            tx.commit().await.map_err(|e| map_err("transaction", e))?;
        }
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), StoreError> {
        self.depth = 0;
        if let Some(tx) = self.tx.take() {
            tx.rollback().await.map_err(|e| map_err("transaction", e))?;
        }
        Ok(())
    }
}
