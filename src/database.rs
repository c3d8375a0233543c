//! Identifier-normalizing document accessor
//!
//! `MongoDatabase` exposes CRUD and proximity operations on named
//! collections. Criteria, updates and documents are translated from the
//! external `id` shape to the native `_id` shape before they reach the
//! store, and results are translated back before the caller sees them.
//!
//! Lifecycle: `Uninitialized → Connected → Closed`. Every operation other
//! than `initialize` requires `Connected`.

use crate::config::DatabaseConfig;
use crate::document::{
    Criteria, DeleteAck, FindOptions, GeoNearHit, GeoNearOptions, Geolocation, InsertAck,
    InsertManyAck, Record, UpdateAck, WriteOptions,
};
use crate::error::{Error, Result};
use crate::store::{DocumentStore, MongoStore};
use crate::translate;
use mongodb::bson::{doc, Document};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::instrument::WithSubscriber;
use tracing::{debug, info, Dispatch};

/// Connection lifecycle
enum ConnectionState<S> {
    Uninitialized,
    Connected(Arc<S>),
    Closed,
}

impl<S> ConnectionState<S> {
    fn name(&self) -> &'static str {
        match self {
            ConnectionState::Uninitialized => "uninitialized",
            ConnectionState::Connected(_) => "connected",
            ConnectionState::Closed => "closed",
        }
    }
}

/// Document accessor over a named-collection store
pub struct MongoDatabase<S: DocumentStore = MongoStore> {
    config: DatabaseConfig,
    logger: Dispatch,
    state: RwLock<ConnectionState<S>>,
    /// Held from the connected check until the new store is attached
    init_lock: Mutex<()>,
}

impl<S: DocumentStore> std::fmt::Debug for MongoDatabase<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MongoDatabase")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl MongoDatabase<MongoStore> {
    /// Connect to the configured MongoDB deployment.
    ///
    /// No-op when already connected. A failure leaves the accessor in its
    /// previous state and is reported as `Error::ConnectionFailed`.
    pub async fn initialize(&self) -> Result<()> {
        self.initialize_with(|| MongoStore::connect(&self.config)).await
    }
}

impl<S: DocumentStore> MongoDatabase<S> {
    /// Create an accessor; the configuration is validated here, once.
    pub fn new(config: DatabaseConfig) -> Result<Self> {
        config.validate()?;
        let logger = config.resolve_logger();
        Ok(Self {
            config,
            logger,
            state: RwLock::new(ConnectionState::Uninitialized),
            init_lock: Mutex::new(()),
        })
    }

    /// Connect through `connect` unless already connected.
    ///
    /// Concurrent calls are serialized: only the first one opens a store,
    /// the others find the accessor connected and return.
    pub async fn initialize_with<F, Fut>(&self, connect: F) -> Result<()>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<S>>,
    {
        let _guard = self.init_lock.lock().await;

        if self.is_connected().await {
            self.logged(async {
                debug!("Database already connected");
            })
            .await;
            return Ok(());
        }

        let store = connect()
            .with_subscriber(self.logger.clone())
            .await
            .map_err(|e| Error::ConnectionFailed(e.to_string()))?;

        self.attach(store).await;
        self.logged(async {
            info!("Connection to database successful");
        })
        .await;
        Ok(())
    }

    /// Create an accessor already connected to `store`
    pub async fn with_store(config: DatabaseConfig, store: S) -> Result<Self> {
        let database = Self::new(config)?;
        database.attach(store).await;
        Ok(database)
    }

    /// Enter the connected state with an already opened store
    pub async fn attach(&self, store: S) {
        *self.state.write().await = ConnectionState::Connected(Arc::new(store));
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    pub async fn is_connected(&self) -> bool {
        matches!(*self.state.read().await, ConnectionState::Connected(_))
    }

    /// Close the connection; the accessor needs `initialize` again afterwards.
    pub async fn close(&self) -> Result<()> {
        let store = {
            let mut state = self.state.write().await;
            match std::mem::replace(&mut *state, ConnectionState::Closed) {
                ConnectionState::Connected(store) => store,
                previous => {
                    let name = previous.name();
                    *state = previous;
                    return Err(Error::NotConnected { state: name });
                }
            }
        };

        self.logged(async move {
            store.close().await?;
            info!("Database connection closed");
            Ok::<_, Error>(())
        })
        .await
    }

    /// Drop the whole database
    pub async fn drop(&self) -> Result<()> {
        let store = self.store().await?;
        self.logged(async move {
            store.drop_database().await?;
            debug!("Database dropped");
            Ok::<_, Error>(())
        })
        .await
    }

    /// Find every matching record, optionally ordered by one field
    pub async fn find_all(
        &self,
        collection: &str,
        criteria: Option<Criteria>,
        options: Option<FindOptions>,
    ) -> Result<Vec<Record>> {
        let store = self.store().await?;
        let filter = translate::criteria_to_native(criteria);
        let sort = options.unwrap_or_default().sort_document();

        self.logged(async move {
            debug!(collection, ?filter, ?sort, "find_all");
            let records = store.find(collection, filter, sort).await?;
            Ok::<_, Error>(translate::all_to_external(records))
        })
        .await
    }

    /// Find the first matching record
    pub async fn find_first(&self, collection: &str, criteria: Criteria) -> Result<Option<Record>> {
        let store = self.store().await?;
        let filter = translate::to_native(criteria);

        self.logged(async move {
            debug!(collection, ?filter, "find_first");
            let record = store.find_one(collection, filter).await?;
            Ok::<_, Error>(translate::maybe_to_external(record))
        })
        .await
    }

    /// Records near a point, nearest first, each paired with its distance
    pub async fn find_near(
        &self,
        collection: &str,
        geolocation: Geolocation,
        options: GeoNearOptions,
    ) -> Result<Vec<GeoNearHit>> {
        let store = self.store().await?;

        self.logged(async move {
            debug!(collection, ?geolocation, "find_near");
            let response = store.geo_near(collection, geolocation, options).await?;
            let hits = response
                .results
                .into_iter()
                .map(|result| GeoNearHit {
                    distance: result.dis,
                    document: translate::to_external(result.obj),
                })
                .collect::<Vec<_>>();
            Ok::<_, Error>(hits)
        })
        .await
    }

    /// Count matching records
    pub async fn count(&self, collection: &str, criteria: Criteria) -> Result<u64> {
        let store = self.store().await?;
        let filter = translate::to_native(criteria);

        self.logged(async move {
            debug!(collection, ?filter, "count");
            store.count(collection, filter).await
        })
        .await
    }

    /// Insert one record; a caller-supplied `id` becomes its identity
    pub async fn add(&self, collection: &str, document: Record) -> Result<InsertAck> {
        let store = self.store().await?;
        let document = translate::to_native(document);

        self.logged(async move {
            debug!(collection, "add");
            store.insert_one(collection, document).await
        })
        .await
    }

    /// Insert several records
    pub async fn add_all(&self, collection: &str, documents: Vec<Record>) -> Result<InsertManyAck> {
        let store = self.store().await?;
        let documents = translate::all_to_native(documents);

        self.logged(async move {
            debug!(collection, count = documents.len(), "add_all");
            store.insert_many(collection, documents).await
        })
        .await
    }

    /// Set the named fields on the first match
    pub async fn update_first(
        &self,
        collection: &str,
        criteria: Criteria,
        update: Document,
    ) -> Result<UpdateAck> {
        self.update_first_with(collection, criteria, update, WriteOptions::default())
            .await
    }

    pub async fn update_first_with(
        &self,
        collection: &str,
        criteria: Criteria,
        update: Document,
        options: WriteOptions,
    ) -> Result<UpdateAck> {
        let store = self.store().await?;
        let filter = translate::to_native(criteria);
        let update = update_document(translate::to_native(update));

        self.logged(async move {
            debug!(collection, ?filter, ?update, upsert = options.upsert, "update_first");
            store.update_one(collection, filter, update, options).await
        })
        .await
    }

    /// Replace the first match wholesale
    pub async fn replace_first(
        &self,
        collection: &str,
        criteria: Criteria,
        document: Record,
    ) -> Result<UpdateAck> {
        self.replace_first_with(collection, criteria, document, WriteOptions::default())
            .await
    }

    pub async fn replace_first_with(
        &self,
        collection: &str,
        criteria: Criteria,
        document: Record,
        options: WriteOptions,
    ) -> Result<UpdateAck> {
        let store = self.store().await?;
        let filter = translate::to_native(criteria);
        let document = translate::to_native(document);

        self.logged(async move {
            debug!(collection, ?filter, upsert = options.upsert, "replace_first");
            store.replace_one(collection, filter, document, options).await
        })
        .await
    }

    /// Delete the first match
    pub async fn delete_first(&self, collection: &str, criteria: Criteria) -> Result<DeleteAck> {
        let store = self.store().await?;
        let filter = translate::to_native(criteria);

        self.logged(async move {
            debug!(collection, ?filter, "delete_first");
            store.delete_one(collection, filter).await
        })
        .await
    }

    /// Create an index from a native index specification
    pub async fn create_index(&self, collection: &str, index: Document) -> Result<String> {
        let store = self.store().await?;

        self.logged(async move {
            debug!(collection, ?index, "Creating index");
            store.create_index(collection, index).await
        })
        .await
    }

    async fn store(&self) -> Result<Arc<S>> {
        match &*self.state.read().await {
            ConnectionState::Connected(store) => Ok(Arc::clone(store)),
            other => Err(Error::NotConnected {
                state: other.name(),
            }),
        }
    }

    /// Run `fut` with the injected logger as its dispatcher
    async fn logged<F: Future>(&self, fut: F) -> F::Output {
        fut.with_subscriber(self.logger.clone()).await
    }
}

/// Plain field maps become `$set`; operator documents pass through.
fn update_document(update: Document) -> Document {
    let is_operator_update =
        !update.is_empty() && update.keys().all(|key| key.starts_with('$'));
    if is_operator_update {
        update
    } else {
        doc! { "$set": update }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{GeoNearResponse, GeoNearResult, OrderBy};
    use crate::store::MockDocumentStore;
    use mongodb::bson::Bson;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn test_config() -> DatabaseConfig {
        DatabaseConfig::new("mongodb://localhost:27017/test_db").with_logger(Dispatch::none())
    }

    async fn connected(store: MockDocumentStore) -> MongoDatabase<MockDocumentStore> {
        MongoDatabase::with_store(test_config(), store).await.unwrap()
    }

    #[tokio::test]
    async fn test_add_translates_id() {
        let mut store = MockDocumentStore::new();
        store
            .expect_insert_one()
            .withf(|collection, document| {
                collection == "users" && *document == doc! {"_id": "u1", "name": "Ann"}
            })
            .times(1)
            .returning(|_, _| {
                Ok(InsertAck {
                    inserted_id: Bson::String("u1".to_string()),
                })
            });

        let database = connected(store).await;
        let ack = database
            .add("users", doc! {"id": "u1", "name": "Ann"})
            .await
            .unwrap();
        assert_eq!(ack.inserted_id, Bson::String("u1".to_string()));
    }

    #[tokio::test]
    async fn test_find_first_translates_both_ways() {
        let mut store = MockDocumentStore::new();
        store
            .expect_find_one()
            .withf(|collection, filter| collection == "users" && *filter == doc! {"_id": "u1"})
            .returning(|_, _| Ok(Some(doc! {"_id": "u1", "name": "Ann"})));

        let database = connected(store).await;
        let record = database
            .find_first("users", doc! {"id": "u1"})
            .await
            .unwrap();
        assert_eq!(record, Some(doc! {"id": "u1", "name": "Ann"}));
    }

    #[tokio::test]
    async fn test_find_first_absent() {
        let mut store = MockDocumentStore::new();
        store.expect_find_one().returning(|_, _| Ok(None));

        let database = connected(store).await;
        let record = database
            .find_first("users", doc! {"id": "missing"})
            .await
            .unwrap();
        assert_eq!(record, None);
    }

    #[tokio::test]
    async fn test_find_all_descending_sort() {
        let mut store = MockDocumentStore::new();
        store
            .expect_find()
            .withf(|collection, filter, sort| {
                collection == "users"
                    && filter.is_empty()
                    && *sort == Some(doc! {"age": -1})
            })
            .returning(|_, _, _| {
                Ok(vec![
                    doc! {"_id": "u2", "age": 40},
                    doc! {"_id": "u1", "age": 30},
                ])
            });

        let database = connected(store).await;
        let records = database
            .find_all("users", None, Some(FindOptions::order_by(OrderBy::desc("age"))))
            .await
            .unwrap();
        assert_eq!(
            records,
            vec![doc! {"id": "u2", "age": 40}, doc! {"id": "u1", "age": 30}]
        );
    }

    #[tokio::test]
    async fn test_find_all_without_options_applies_no_sort() {
        let mut store = MockDocumentStore::new();
        store
            .expect_find()
            .withf(|_, filter, sort| *filter == doc! {"_id": "u1"} && sort.is_none())
            .returning(|_, _, _| Ok(vec![]));

        let database = connected(store).await;
        let records = database
            .find_all("users", Some(doc! {"id": "u1"}), None)
            .await
            .unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_update_first_sets_named_fields() {
        let mut store = MockDocumentStore::new();
        store
            .expect_update_one()
            .withf(|collection, filter, update, options| {
                collection == "users"
                    && *filter == doc! {"_id": "u1"}
                    && *update == doc! {"$set": {"name": "Annie"}}
                    && !options.upsert
            })
            .returning(|_, _, _, _| {
                Ok(UpdateAck {
                    matched_count: 1,
                    modified_count: 1,
                    upserted_id: None,
                })
            });

        let database = connected(store).await;
        let ack = database
            .update_first("users", doc! {"id": "u1"}, doc! {"name": "Annie"})
            .await
            .unwrap();
        assert_eq!(ack.matched_count, 1);
        assert_eq!(ack.modified_count, 1);
    }

    #[tokio::test]
    async fn test_update_first_forwards_operator_documents() {
        let mut store = MockDocumentStore::new();
        store
            .expect_update_one()
            .withf(|_, _, update, options| {
                *update == doc! {"$inc": {"visits": 1}} && options.upsert
            })
            .returning(|_, _, _, _| Ok(UpdateAck::default()));

        let database = connected(store).await;
        database
            .update_first_with(
                "users",
                doc! {"id": "u1"},
                doc! {"$inc": {"visits": 1}},
                WriteOptions::upsert(),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_find_near_pairs_distance_with_document() {
        let mut store = MockDocumentStore::new();
        store
            .expect_geo_near()
            .withf(|collection, near, options| {
                collection == "places"
                    && *near == Geolocation::new(10.0, 20.0)
                    && options.max_distance == Some(500.0)
            })
            .returning(|_, _, _| {
                Ok(GeoNearResponse {
                    results: vec![GeoNearResult {
                        dis: 3.2,
                        obj: doc! {"_id": "p1", "label": "Cafe"},
                    }],
                })
            });

        let database = connected(store).await;
        let hits = database
            .find_near(
                "places",
                Geolocation::new(10.0, 20.0),
                GeoNearOptions::default().with_max_distance(500.0),
            )
            .await
            .unwrap();
        assert_eq!(
            hits,
            vec![GeoNearHit {
                distance: 3.2,
                document: doc! {"id": "p1", "label": "Cafe"},
            }]
        );
    }

    #[tokio::test]
    async fn test_count_and_delete_translate_criteria() {
        let mut store = MockDocumentStore::new();
        store
            .expect_count()
            .withf(|_, filter| *filter == doc! {"_id": "u1"})
            .returning(|_, _| Ok(1));
        store
            .expect_delete_one()
            .withf(|_, filter| *filter == doc! {"_id": "u1"})
            .returning(|_, _| Ok(DeleteAck { deleted_count: 1 }));

        let database = connected(store).await;
        assert_eq!(database.count("users", doc! {"id": "u1"}).await.unwrap(), 1);
        let ack = database
            .delete_first("users", doc! {"id": "u1"})
            .await
            .unwrap();
        assert_eq!(ack.deleted_count, 1);
    }

    #[tokio::test]
    async fn test_add_all_and_replace_first() {
        let mut store = MockDocumentStore::new();
        store
            .expect_insert_many()
            .withf(|_, documents| {
                *documents == vec![doc! {"_id": "a", "n": 1}, doc! {"n": 2}]
            })
            .returning(|_, _| {
                Ok(InsertManyAck {
                    inserted_ids: vec![Bson::String("a".into()), Bson::String("b".into())],
                })
            });
        store
            .expect_replace_one()
            .withf(|_, filter, replacement, _| {
                *filter == doc! {"_id": "a"} && *replacement == doc! {"_id": "a", "n": 3}
            })
            .returning(|_, _, _, _| Ok(UpdateAck::default()));

        let database = connected(store).await;
        let ack = database
            .add_all("counters", vec![doc! {"id": "a", "n": 1}, doc! {"n": 2}])
            .await
            .unwrap();
        assert_eq!(ack.inserted_ids.len(), 2);
        database
            .replace_first("counters", doc! {"id": "a"}, doc! {"id": "a", "n": 3})
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_create_index_is_forwarded() {
        let mut store = MockDocumentStore::new();
        store
            .expect_create_index()
            .withf(|collection, keys| collection == "places" && *keys == doc! {"location": "2dsphere"})
            .returning(|_, _| Ok("location_2dsphere".to_string()));

        let database = connected(store).await;
        let name = database
            .create_index("places", doc! {"location": "2dsphere"})
            .await
            .unwrap();
        assert_eq!(name, "location_2dsphere");
    }

    #[tokio::test]
    async fn test_store_errors_propagate_unchanged() {
        let mut store = MockDocumentStore::new();
        store
            .expect_count()
            .returning(|_, _| Err(Error::Store("unknown operator: $bogus".to_string())));

        let database = connected(store).await;
        let err = database
            .count("users", doc! {"age": {"$bogus": 1}})
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "unknown operator: $bogus");
    }

    #[tokio::test]
    async fn test_operations_require_connection() {
        let database: MongoDatabase<MockDocumentStore> = MongoDatabase::new(test_config()).unwrap();
        let err = database.count("users", doc! {}).await.unwrap_err();
        assert!(matches!(err, Error::NotConnected { state: "uninitialized" }));
        assert!(database.close().await.is_err());
    }

    #[tokio::test]
    async fn test_close_then_operations_fail() {
        let mut store = MockDocumentStore::new();
        store.expect_close().times(1).returning(|| Ok(()));

        let database = connected(store).await;
        assert!(database.is_connected().await);
        database.close().await.unwrap();
        assert!(!database.is_connected().await);

        let err = database.find_first("users", doc! {}).await.unwrap_err();
        assert!(matches!(err, Error::NotConnected { state: "closed" }));
    }

    #[test]
    fn test_invalid_config_is_rejected_at_construction() {
        let result: Result<MongoDatabase<MockDocumentStore>> =
            MongoDatabase::new(DatabaseConfig::new(""));
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[tokio::test]
    async fn test_initialize_wraps_connection_failure() {
        let config = DatabaseConfig::new("mongodb://127.0.0.1:1/test_db?serverSelectionTimeoutMS=200&connectTimeoutMS=200")
            .with_logger(Dispatch::none());
        let database: MongoDatabase = MongoDatabase::new(config).unwrap();

        let err = database.initialize().await.unwrap_err();
        assert!(err.is_connection_failure());
        assert!(err
            .to_string()
            .starts_with("Impossible to connect to database: "));
        assert!(!database.is_connected().await);
    }

    #[tokio::test]
    async fn test_concurrent_initialize_connects_once() {
        let database: MongoDatabase<MockDocumentStore> = MongoDatabase::new(test_config()).unwrap();
        let connects = Arc::new(AtomicUsize::new(0));
        let connect = || {
            let connects = connects.clone();
            async move {
                connects.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok(MockDocumentStore::new())
            }
        };

        let (first, second) = tokio::join!(
            database.initialize_with(connect),
            database.initialize_with(connect)
        );

        assert!(first.is_ok());
        assert!(second.is_ok());
        assert_eq!(connects.load(Ordering::SeqCst), 1);
        assert!(database.is_connected().await);
    }

    #[tokio::test]
    async fn test_initialize_with_failure_keeps_state() {
        let database: MongoDatabase<MockDocumentStore> = MongoDatabase::new(test_config()).unwrap();

        let err = database
            .initialize_with(|| async { Err(Error::Store("refused".to_string())) })
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Impossible to connect to database: refused");
        assert!(!database.is_connected().await);
    }

    #[test]
    fn test_update_document_wrapping() {
        assert_eq!(update_document(doc! {"a": 1}), doc! {"$set": {"a": 1}});
        assert_eq!(
            update_document(doc! {"$unset": {"a": ""}}),
            doc! {"$unset": {"a": ""}}
        );
        assert_eq!(update_document(doc! {}), doc! {"$set": {}});
    }
}
