//! Macro-generated conformance suite for `Store` implementations.
//!
//! `repository_tests!` drives a store through `Repository<Gadget>` and checks
//! the behaviour every backend must share.
//!
//! # Usage
//!
//! ```rust,ignore
//! #[macro_use]
//! mod storage_harness;
//!
//! use storage_harness::*;
//!
//! repository_tests!(fresh_store());
//! ```
//!
//! # Generated Tests
//!
//! ## CRUD
//! - `test_create_and_get`: create then read back from a fresh session
//! - `test_get_by_raw_id`: numeric strings resolve, garbage is `None`
//! - `test_update_persists`: committed update is visible elsewhere
//! - `test_uncommitted_update_is_private`: pending work stays in its session
//! - `test_interleaved_updates_keep_both_columns`: two writers, no lost update
//! - `test_delete`: deleted rows are gone; deleting again is `NotFound`
//! - `test_get_multiple_results`: ambiguous lookups fail
//! - `test_unique_violation`: duplicate unique key on create
//!
//! ## Upserts
//! - `test_get_or_create`: creates once, then returns the existing row
//! - `test_get_or_create_concurrent`: parallel callers agree on one row
//! - `test_get_or_create_lost_race`: injected rival insert, winner returned
//! - `test_update_or_create_creates` / `test_update_or_create_updates`
//! - `test_update_or_create_row_vanishes`: `ConflictUnresolved`
//!
//! ## Listing
//! - `test_paginate`: windows, totals and navigation flags
//! - `test_paginate_far_page`: huge page numbers give an empty page

/// Generate the `Store` conformance suite.
///
/// `$factory` must evaluate to an `Arc<dyn Store>` over empty tables. It is
/// re-evaluated for each test.
#[macro_export]
macro_rules! repository_tests {
    ($factory:expr) => {
        mod repository_contract_tests {
            use super::*;
            use serde_json::json;
            use std::sync::Arc;
            use stencil::core::entity::{Lookup, Model, Record};
            use stencil::core::pagination::Pagination;
            use stencil::core::repository::Repository;
            use stencil::core::store::{Store, StoreError};

            // ==================================================================
            // CRUD
            // ==================================================================

            #[tokio::test]
            async fn test_create_and_get() {
                let store: Arc<dyn Store> = $factory;
                let mut session = store.session().await.unwrap();
                let created = Repository::<Gadget>::new(session.as_mut())
                    .create(gadget_fields("g-1", "first"))
                    .await
                    .unwrap();
                assert!(created.id > 0);
                assert!(created.enabled);
                assert_eq!(created.hits, 0);
                assert_eq!(created.label.as_deref(), Some("first"));

                let mut other = store.session().await.unwrap();
                let found = Repository::<Gadget>::new(other.as_mut())
                    .get_by_id(created.id)
                    .await
                    .unwrap()
                    .expect("committed row is visible to other sessions");
                assert_eq!(found.code, "g-1");
                assert_eq!(found.id, created.id);
            }

            #[tokio::test]
            async fn test_get_by_raw_id() {
                let store: Arc<dyn Store> = $factory;
                let mut session = store.session().await.unwrap();
                let mut repo = Repository::<Gadget>::new(session.as_mut());
                let created = repo.create(gadget_fields("g-1", "first")).await.unwrap();

                let by_string = repo.get_by_raw_id(&json!(created.id.to_string())).await.unwrap();
                assert_eq!(by_string.map(|g| g.id), Some(created.id));
                assert!(repo.get_by_raw_id(&json!("xyz")).await.unwrap().is_none());
                assert!(repo.get_by_raw_id(&json!(null)).await.unwrap().is_none());
                assert!(repo.get_by_id(created.id + 1000).await.unwrap().is_none());
            }

            #[tokio::test]
            async fn test_update_persists() {
                let store: Arc<dyn Store> = $factory;
                let mut session = store.session().await.unwrap();
                let mut repo = Repository::<Gadget>::new(session.as_mut());
                let created = repo.create(gadget_fields("g-1", "first")).await.unwrap();

                let updated = repo
                    .update(&created, record(json!({"hits": 5, "id": 999})), true)
                    .await
                    .unwrap();
                assert_eq!(updated.id, created.id, "id is never rewritten");
                assert_eq!(updated.hits, 5);
                assert!(updated.updated_at >= created.updated_at);

                let mut other = store.session().await.unwrap();
                let found = Repository::<Gadget>::new(other.as_mut())
                    .get(&by_code("g-1"))
                    .await
                    .unwrap()
                    .unwrap();
                assert_eq!(found.hits, 5);
            }

            #[tokio::test]
            async fn test_uncommitted_update_is_private() {
                let store: Arc<dyn Store> = $factory;
                let mut session = store.session().await.unwrap();
                let mut repo = Repository::<Gadget>::new(session.as_mut());
                let created = repo.create(gadget_fields("g-1", "first")).await.unwrap();
                repo.update(&created, record(json!({"hits": 7})), false).await.unwrap();
                assert_eq!(repo.get_by_id(created.id).await.unwrap().unwrap().hits, 7);

                {
                    let mut other = store.session().await.unwrap();
                    let seen = Repository::<Gadget>::new(other.as_mut())
                        .get_by_id(created.id)
                        .await
                        .unwrap()
                        .unwrap();
                    assert_eq!(seen.hits, 0, "pending update leaked to another session");
                }

                repo.commit().await.unwrap();
                let mut other = store.session().await.unwrap();
                let seen = Repository::<Gadget>::new(other.as_mut())
                    .get_by_id(created.id)
                    .await
                    .unwrap()
                    .unwrap();
                assert_eq!(seen.hits, 7);
            }

            #[tokio::test]
            async fn test_interleaved_updates_keep_both_columns() {
                let store: Arc<dyn Store> = $factory;
                let mut setup = store.session().await.unwrap();
                let created = Repository::<Gadget>::new(setup.as_mut())
                    .create(gadget_fields("g-1", "first"))
                    .await
                    .unwrap();

                let mut slow = store.session().await.unwrap();
                let mut slow_repo = Repository::<Gadget>::new(slow.as_mut());
                slow_repo
                    .update(&created, record(json!({"hits": 1})), false)
                    .await
                    .unwrap();

                // The second writer may have to wait for the first one's row lock.
                let rival_store = store.clone();
                let rival_row = created.clone();
                let rival = tokio::spawn(async move {
                    let mut session = rival_store.session().await.unwrap();
                    Repository::<Gadget>::new(session.as_mut())
                        .update(&rival_row, record(json!({"label": "from-rival"})), true)
                        .await
                        .unwrap();
                });
                tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                slow_repo.commit().await.unwrap();
                rival.await.unwrap();

                let mut reader = store.session().await.unwrap();
                let found = Repository::<Gadget>::new(reader.as_mut())
                    .get_by_id(created.id)
                    .await
                    .unwrap()
                    .unwrap();
                assert_eq!(found.hits, 1);
                assert_eq!(found.label.as_deref(), Some("from-rival"));
            }

            #[tokio::test]
            async fn test_delete() {
                let store: Arc<dyn Store> = $factory;
                let mut session = store.session().await.unwrap();
                let mut repo = Repository::<Gadget>::new(session.as_mut());
                let created = repo.create(gadget_fields("g-1", "first")).await.unwrap();
                let id = created.id;

                repo.delete(created.clone(), true).await.unwrap();
                assert!(repo.get_by_id(id).await.unwrap().is_none());

                let err = repo.delete(created, true).await.unwrap_err();
                assert!(matches!(err, StoreError::NotFound { .. }), "got {err:?}");
            }

            #[tokio::test]
            async fn test_get_multiple_results() {
                let store: Arc<dyn Store> = $factory;
                let mut session = store.session().await.unwrap();
                let mut repo = Repository::<Gadget>::new(session.as_mut());
                repo.create(gadget_fields("g-1", "shared")).await.unwrap();
                repo.create(gadget_fields("g-2", "shared")).await.unwrap();

                let lookup = Lookup::new().eq("label", "shared");
                let err = repo.get(&lookup).await.unwrap_err();
                assert!(matches!(err, StoreError::MultipleResults { found: 2, .. }), "got {err:?}");
                assert_eq!(repo.find(&lookup).await.unwrap().len(), 2);
                assert_eq!(repo.count(&lookup).await.unwrap(), 2);
            }

            #[tokio::test]
            async fn test_unique_violation() {
                let store: Arc<dyn Store> = $factory;
                let mut session = store.session().await.unwrap();
                let mut repo = Repository::<Gadget>::new(session.as_mut());
                repo.create(gadget_fields("g-1", "first")).await.unwrap();

                let err = repo.create(gadget_fields("g-1", "second")).await.unwrap_err();
                assert!(err.is_unique_violation(), "got {err:?}");
                repo.rollback().await.unwrap();
                assert_eq!(repo.count(&Lookup::new()).await.unwrap(), 1);
            }

            // ==================================================================
            // Upserts
            // ==================================================================

            #[tokio::test]
            async fn test_get_or_create() {
                let store: Arc<dyn Store> = $factory;
                let mut session = store.session().await.unwrap();
                let mut repo = Repository::<Gadget>::new(session.as_mut());

                let (first, created) = repo
                    .get_or_create(by_code("g-1"), record(json!({"label": "made"})))
                    .await
                    .unwrap();
                assert!(created);
                assert_eq!(first.label.as_deref(), Some("made"));

                let (again, created) = repo
                    .get_or_create(by_code("g-1"), record(json!({"label": "ignored"})))
                    .await
                    .unwrap();
                assert!(!created);
                assert_eq!(again.id, first.id);
                assert_eq!(again.label.as_deref(), Some("made"));
            }

            #[tokio::test]
            async fn test_get_or_create_concurrent() {
                let store: Arc<dyn Store> = $factory;
                let mut handles = Vec::new();
                for _ in 0..4 {
                    let store = Arc::clone(&store);
                    handles.push(tokio::spawn(async move {
                        let mut session = store.session().await.unwrap();
                        Repository::<Gadget>::new(session.as_mut())
                            .get_or_create(by_code("shared"), Record::new())
                            .await
                            .unwrap()
                    }));
                }

                let mut ids = Vec::new();
                let mut created = 0;
                for handle in handles {
                    let (gadget, was_created) = handle.await.unwrap();
                    ids.push(gadget.id);
                    created += usize::from(was_created);
                }
                assert_eq!(created, 1, "exactly one caller creates the row");
                ids.dedup();
                assert_eq!(ids.len(), 1, "every caller sees the same row");
            }

            #[tokio::test]
            async fn test_get_or_create_lost_race() {
                let store: Arc<dyn Store> = $factory;
                let mut racing = RacingSession::new(Arc::clone(&store)).await.steal_insert();
                let (gadget, created) = Repository::<Gadget>::new(&mut racing)
                    .get_or_create(by_code("g-1"), record(json!({"label": "mine"})))
                    .await
                    .unwrap();
                assert!(!created, "the rival created the row");
                assert_eq!(gadget.code, "g-1");

                let mut session = store.session().await.unwrap();
                assert_eq!(
                    Repository::<Gadget>::new(session.as_mut())
                        .count(&by_code("g-1"))
                        .await
                        .unwrap(),
                    1
                );
            }

            #[tokio::test]
            async fn test_update_or_create_creates() {
                let store: Arc<dyn Store> = $factory;
                let mut session = store.session().await.unwrap();
                let (gadget, created) = Repository::<Gadget>::new(session.as_mut())
                    .update_or_create(by_code("g-1"), record(json!({"hits": 3})))
                    .await
                    .unwrap();
                assert!(created);
                assert_eq!(gadget.hits, 3);
            }

            #[tokio::test]
            async fn test_update_or_create_updates() {
                let store: Arc<dyn Store> = $factory;
                let mut session = store.session().await.unwrap();
                let mut repo = Repository::<Gadget>::new(session.as_mut());
                let existing = repo.create(gadget_fields("g-1", "first")).await.unwrap();

                let (gadget, created) = repo
                    .update_or_create(by_code("g-1"), record(json!({"hits": 9, "label": "second"})))
                    .await
                    .unwrap();
                assert!(!created);
                assert_eq!(gadget.id, existing.id);
                assert_eq!(gadget.hits, 9);

                let mut other = store.session().await.unwrap();
                let seen = Repository::<Gadget>::new(other.as_mut())
                    .get_by_id(existing.id)
                    .await
                    .unwrap()
                    .unwrap();
                assert_eq!(seen.label.as_deref(), Some("second"), "upsert commits its work");
            }

            #[tokio::test]
            async fn test_update_or_create_row_vanishes() {
                let store: Arc<dyn Store> = $factory;
                let mut racing = RacingSession::new(Arc::clone(&store))
                    .await
                    .steal_insert()
                    .vanish_on_relock();
                let err = Repository::<Gadget>::new(&mut racing)
                    .update_or_create(by_code("g-1"), record(json!({"hits": 1})))
                    .await
                    .unwrap_err();
                assert!(matches!(err, StoreError::ConflictUnresolved { .. }), "got {err:?}");
            }

            // ==================================================================
            // Listing
            // ==================================================================

            #[tokio::test]
            async fn test_paginate_far_page() {
                let store: Arc<dyn Store> = $factory;
                let mut session = store.session().await.unwrap();
                let mut repo = Repository::<Gadget>::new(session.as_mut());
                repo.create(gadget_fields("g-1", "only")).await.unwrap();

                let far = repo
                    .paginate(&Lookup::new(), Pagination::new(i64::MAX as u64, 100))
                    .await
                    .unwrap();
                assert!(far.items.is_empty());
                assert_eq!(far.total, 1);
                assert!(!far.has_next);
                assert!(far.has_prev);
            }

            #[tokio::test]
            async fn test_paginate() {
                let store: Arc<dyn Store> = $factory;
                let mut session = store.session().await.unwrap();
                let mut repo = Repository::<Gadget>::new(session.as_mut());
                for i in 0..5 {
                    repo.create(gadget_fields(&format!("g-{i}"), "batch")).await.unwrap();
                }

                let first = repo.paginate(&Lookup::new(), Pagination::new(1, 2)).await.unwrap();
                assert_eq!(first.items.len(), 2);
                assert_eq!(first.items[0].code, "g-0");
                assert_eq!(first.total, 5);
                assert_eq!(first.pages, 3);
                assert!(first.has_next);
                assert!(!first.has_prev);

                let last = repo.paginate(&Lookup::new(), Pagination::new(3, 2)).await.unwrap();
                assert_eq!(last.items.len(), 1);
                assert_eq!(last.items[0].code, "g-4");
                assert!(!last.has_next);
                assert!(last.has_prev);

                let beyond = repo.paginate(&Lookup::new(), Pagination::new(9, 2)).await.unwrap();
                assert!(beyond.items.is_empty());
                assert_eq!(Gadget::TABLE, "gadget");
            }
        }
    };
}
