//! Generic data access over a [`Session`]
//!
//! `Repository<T>` gives every [`Model`] the same CRUD and upsert surface.
//! It borrows the caller's session, so several repositories can take part in
//! one unit of work.
//!
//! ```rust,ignore
//! let mut session = store.session().await?;
//! let (role, created) = Repository::<Role>::new(session.as_mut())
//!     .get_or_create(Lookup::new().eq("name", "admin"), Record::new())
//!     .await?;
//! ```

use crate::core::entity::{Lookup, Model, Record};
use crate::core::pagination::{Page, Pagination};
use crate::core::store::{Query, Session, StoreError};
use chrono::Utc;
use serde_json::Value;
use std::marker::PhantomData;

pub struct Repository<'s, T: Model> {
    session: &'s mut dyn Session,
    _model: PhantomData<fn() -> T>,
}

fn now_value() -> Value {
    Value::String(Utc::now().to_rfc3339())
}

impl<'s, T: Model> Repository<'s, T> {
    pub fn new(session: &'s mut dyn Session) -> Self {
        Self {
            session,
            _model: PhantomData,
        }
    }

    /// The underlying session
    pub fn session(&mut self) -> &mut dyn Session {
        &mut *self.session
    }

    /// Fill base columns, apply model defaults and check column types
    fn prepare_new(fields: Record) -> Result<Record, StoreError> {
        let now = now_value();
        let mut seed = Record::new();
        seed.insert("id".into(), Value::from(0));
        seed.insert("created_at".into(), now.clone());
        seed.insert("updated_at".into(), now);
        seed.insert("enabled".into(), Value::Bool(true));
        seed.extend(fields);

        let mut record = T::from_record(seed)?.to_record()?;
        record.remove("id");
        Ok(record)
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Insert a new row and commit
    pub async fn create(&mut self, fields: Record) -> Result<T, StoreError> {
        self.create_with(fields, true).await
    }

    pub async fn create_with(&mut self, fields: Record, commit: bool) -> Result<T, StoreError> {
        let record = Self::prepare_new(fields)?;
        let stored = self.session.insert(T::schema(), record).await?;
        if commit {
            self.session.commit().await?;
        }
        T::from_record(stored)
    }

    /// Persist the full state of `entity`, inserting it when it has no row
    pub async fn save(&mut self, entity: &T, commit: bool) -> Result<T, StoreError> {
        let table = T::schema();
        let mut record = entity.to_record()?;
        record.remove("id");

        let exists = entity.id() > 0 && self.session.get(table, entity.id()).await?.is_some();
        let stored = if exists {
            record.insert("updated_at".into(), now_value());
            self.session.update(table, entity.id(), record).await?
        } else {
            self.session.insert(table, record).await?
        };

        if commit {
            self.session.commit().await?;
        }
        T::from_record(stored)
    }

    /// Apply `changes` to the row of `entity`
    ///
    /// Without `commit` the change is visible to this session only.
    pub async fn update(&mut self, entity: &T, changes: Record, commit: bool) -> Result<T, StoreError> {
        let mut changes = changes;
        changes.remove("id");
        changes.insert("updated_at".into(), now_value());

        let mut merged = entity.to_record()?;
        merged.extend(changes.clone());
        T::from_record(merged)?;

        let stored = self.session.update(T::schema(), entity.id(), changes).await?;
        if commit {
            self.session.commit().await?;
        }
        T::from_record(stored)
    }

    /// Remove the row of `entity`; the value is consumed
    pub async fn delete(&mut self, entity: T, commit: bool) -> Result<(), StoreError> {
        let removed = self.session.delete(T::schema(), entity.id()).await?;
        if !removed {
            return Err(StoreError::NotFound {
                table: T::TABLE.to_string(),
                id: entity.id(),
            });
        }
        if commit {
            self.session.commit().await?;
        }
        Ok(())
    }

    pub async fn commit(&mut self) -> Result<(), StoreError> {
        self.session.commit().await
    }

    pub async fn rollback(&mut self) -> Result<(), StoreError> {
        self.session.rollback().await
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub async fn get_by_id(&mut self, id: i64) -> Result<Option<T>, StoreError> {
        self.session
            .get(T::schema(), id)
            .await?
            .map(T::from_record)
            .transpose()
    }

    /// Accept an id as a JSON number or a string of digits; anything else is `None`
    pub async fn get_by_raw_id(&mut self, raw: &Value) -> Result<Option<T>, StoreError> {
        let id = match raw {
            Value::Number(n) => n.as_i64(),
            Value::String(s) if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) => {
                s.parse().ok()
            }
            _ => None,
        };
        match id {
            Some(id) => self.get_by_id(id).await,
            None => Ok(None),
        }
    }

    /// The single row matching `lookup`
    pub async fn get(&mut self, lookup: &Lookup) -> Result<Option<T>, StoreError> {
        self.one(Query::new(lookup.clone())).await
    }

    async fn one(&mut self, query: Query) -> Result<Option<T>, StoreError> {
        let lookup = query.lookup.to_string();
        let mut rows = self.session.fetch(T::schema(), &query).await?;
        match rows.len() {
            0 => Ok(None),
            1 => rows.pop().map(T::from_record).transpose(),
            found => Err(StoreError::MultipleResults {
                table: T::TABLE.to_string(),
                lookup,
                found,
            }),
        }
    }

    pub async fn find(&mut self, lookup: &Lookup) -> Result<Vec<T>, StoreError> {
        self.session
            .fetch(T::schema(), &Query::new(lookup.clone()))
            .await?
            .into_iter()
            .map(T::from_record)
            .collect()
    }

    pub async fn count(&mut self, lookup: &Lookup) -> Result<u64, StoreError> {
        self.session.count(T::schema(), lookup).await
    }

    pub async fn paginate(&mut self, lookup: &Lookup, pagination: Pagination) -> Result<Page<T>, StoreError> {
        let total = self.count(lookup).await?;
        let offset = match pagination.offset() {
            Some(offset) if offset < total => offset,
            _ => return Ok(Page::new(Vec::new(), pagination, total)),
        };

        let query = Query::new(lookup.clone()).slice(offset as usize, pagination.per_page() as usize);
        let items = self
            .session
            .fetch(T::schema(), &query)
            .await?
            .into_iter()
            .map(T::from_record)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(items, pagination, total))
    }

    // =========================================================================
    // Upserts
    // =========================================================================

    /// Return the row matching `lookup`, creating it from `lookup` + `defaults`
    ///
    /// The insert is committed immediately. When a concurrent caller wins the
    /// race on a unique key, the session is rolled back and the winner's row
    /// is returned with `false`.
    pub async fn get_or_create(&mut self, lookup: Lookup, defaults: Record) -> Result<(T, bool), StoreError> {
        if let Some(found) = self.get(&lookup).await? {
            return Ok((found, false));
        }

        let mut fields = lookup.to_record();
        fields.extend(defaults);

        match self.create_with(fields, true).await {
            Ok(created) => Ok((created, true)),
            Err(err) if err.is_unique_violation() => {
                tracing::debug!(table = T::TABLE, %lookup, "create lost a unique race, reading winner");
                self.session.rollback().await?;
                match self.get(&lookup).await? {
                    Some(winner) => Ok((winner, false)),
                    None => Err(err),
                }
            }
            Err(err) => Err(err),
        }
    }

    /// Lock the row matching `lookup` and apply `defaults`, or create it
    ///
    /// A freshly created row already contains the defaults and is returned
    /// as-is. The whole operation is committed before returning.
    pub async fn update_or_create(&mut self, lookup: Lookup, defaults: Record) -> Result<(T, bool), StoreError> {
        self.session.begin_nested().await?;
        let locked = match self.one(Query::new(lookup.clone()).for_update()).await {
            Ok(row) => row,
            Err(err) => {
                self.session.rollback_nested().await?;
                return Err(err);
            }
        };

        let row = match locked {
            Some(row) => row,
            None => {
                self.session.release_nested().await?;
                let (row, created) = self.get_or_create(lookup.clone(), defaults.clone()).await?;
                if created {
                    return Ok((row, true));
                }
                self.session.begin_nested().await?;
                match self.one(Query::new(lookup.clone()).for_update()).await? {
                    Some(row) => row,
                    None => {
                        self.session.rollback_nested().await?;
                        return Err(StoreError::ConflictUnresolved {
                            table: T::TABLE.to_string(),
                            lookup: lookup.to_string(),
                        });
                    }
                }
            }
        };

        let updated = match self.update(&row, defaults, false).await {
            Ok(updated) => updated,
            Err(err) => {
                self.session.rollback_nested().await?;
                return Err(err);
            }
        };
        self.session.release_nested().await?;
        self.session.commit().await?;
        Ok((updated, false))
    }
}
