//! MongoDB Store Implementation
//!
//! `DocumentStore` backed by the official mongodb driver

use super::DocumentStore;
use crate::config::DatabaseConfig;
use crate::document::{
    DeleteAck, GeoNearOptions, GeoNearResponse, GeoNearResult, Geolocation, InsertAck,
    InsertManyAck, UpdateAck, WriteOptions,
};
use crate::error::{Error, Result};
use async_trait::async_trait;
use futures::stream::TryStreamExt;
use mongodb::{
    bson::{bson, doc, Bson, Document},
    options::ClientOptions,
    Client, Collection, Database, IndexModel,
};
use tracing::debug;

/// Field the aggregation writes each match's distance into
const DISTANCE_FIELD: &str = "__distance";

/// MongoDB store handle
#[derive(Clone, Debug)]
pub struct MongoStore {
    client: Client,
    database: Database,
}

impl MongoStore {
    /// Connect and ping the server
    ///
    /// The database is the one named in the URL path, else the configured
    /// fallback.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let client_options = ClientOptions::parse(&config.store_url).await?;
        let database_name = client_options
            .default_database
            .clone()
            .unwrap_or_else(|| config.fallback_database().to_string());

        let client = Client::with_options(client_options)?;

        client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await?;

        let database = client.database(&database_name);
        debug!(database = %database_name, "MongoDB ping succeeded");

        Ok(Self { client, database })
    }

    /// Wrap an already configured client
    pub fn from_client(client: Client, database_name: &str) -> Self {
        let database = client.database(database_name);
        Self { client, database }
    }

    /// Get reference to MongoDB client
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Get reference to MongoDB database
    pub fn database(&self) -> &Database {
        &self.database
    }

    fn collection(&self, name: &str) -> Collection<Document> {
        self.database.collection::<Document>(name)
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn find(
        &self,
        collection: &str,
        filter: Document,
        sort: Option<Document>,
    ) -> Result<Vec<Document>> {
        let coll = self.collection(collection);
        let mut find = coll.find(filter);
        if let Some(sort) = sort {
            find = find.sort(sort);
        }
        let cursor = find.await?;
        Ok(cursor.try_collect().await?)
    }

    async fn find_one(&self, collection: &str, filter: Document) -> Result<Option<Document>> {
        Ok(self.collection(collection).find_one(filter).await?)
    }

    async fn count(&self, collection: &str, filter: Document) -> Result<u64> {
        Ok(self.collection(collection).count_documents(filter).await?)
    }

    async fn insert_one(&self, collection: &str, document: Document) -> Result<InsertAck> {
        let result = self.collection(collection).insert_one(document).await?;
        Ok(InsertAck {
            inserted_id: result.inserted_id,
        })
    }

    async fn insert_many(
        &self,
        collection: &str,
        documents: Vec<Document>,
    ) -> Result<InsertManyAck> {
        let result = self.collection(collection).insert_many(documents).await?;

        let mut indexed: Vec<(usize, Bson)> = result.inserted_ids.into_iter().collect();
        indexed.sort_by_key(|(index, _)| *index);

        Ok(InsertManyAck {
            inserted_ids: indexed.into_iter().map(|(_, id)| id).collect(),
        })
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
        options: WriteOptions,
    ) -> Result<UpdateAck> {
        let result = self
            .collection(collection)
            .update_one(filter, update)
            .upsert(options.upsert)
            .await?;

        Ok(UpdateAck {
            matched_count: result.matched_count,
            modified_count: result.modified_count,
            upserted_id: result.upserted_id,
        })
    }

    async fn replace_one(
        &self,
        collection: &str,
        filter: Document,
        replacement: Document,
        options: WriteOptions,
    ) -> Result<UpdateAck> {
        let result = self
            .collection(collection)
            .replace_one(filter, replacement)
            .upsert(options.upsert)
            .await?;

        Ok(UpdateAck {
            matched_count: result.matched_count,
            modified_count: result.modified_count,
            upserted_id: result.upserted_id,
        })
    }

    async fn delete_one(&self, collection: &str, filter: Document) -> Result<DeleteAck> {
        let result = self.collection(collection).delete_one(filter).await?;
        Ok(DeleteAck {
            deleted_count: result.deleted_count,
        })
    }

    async fn create_index(&self, collection: &str, keys: Document) -> Result<String> {
        let index_model = IndexModel::builder().keys(keys).build();
        let result = self.collection(collection).create_index(index_model).await?;
        Ok(result.index_name)
    }

    async fn geo_near(
        &self,
        collection: &str,
        near: Geolocation,
        options: GeoNearOptions,
    ) -> Result<GeoNearResponse> {
        let pipeline = geo_near_pipeline(near, &options);
        let cursor = self.collection(collection).aggregate(pipeline).await?;
        let matches: Vec<Document> = cursor.try_collect().await?;

        let results = matches
            .into_iter()
            .map(split_distance)
            .collect::<Result<Vec<_>>>()?;

        Ok(GeoNearResponse { results })
    }

    async fn drop_database(&self) -> Result<()> {
        self.database.drop().await?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.client.clone().shutdown().await;
        Ok(())
    }
}

/// `$geoNear` aggregation for a proximity query
///
/// Spherical queries use a GeoJSON point (2dsphere index); planar ones use
/// the legacy `[longitude, latitude]` pair (2d index).
fn geo_near_pipeline(near: Geolocation, options: &GeoNearOptions) -> Vec<Document> {
    let near_value = if options.spherical {
        Bson::Document(near.to_geojson())
    } else {
        bson!([near.longitude, near.latitude])
    };

    let mut stage = doc! {
        "near": near_value,
        "distanceField": DISTANCE_FIELD,
        "spherical": options.spherical,
    };
    if let Some(max_distance) = options.max_distance {
        stage.insert("maxDistance", max_distance);
    }
    if let Some(min_distance) = options.min_distance {
        stage.insert("minDistance", min_distance);
    }
    if let Some(ref query) = options.query {
        stage.insert("query", query.clone());
    }
    if let Some(multiplier) = options.distance_multiplier {
        stage.insert("distanceMultiplier", multiplier);
    }

    let mut pipeline = vec![doc! { "$geoNear": stage }];
    if let Some(limit) = options.limit {
        pipeline.push(doc! { "$limit": limit });
    }
    pipeline
}

fn split_distance(mut obj: Document) -> Result<GeoNearResult> {
    let dis = match obj.remove(DISTANCE_FIELD) {
        Some(Bson::Double(d)) => d,
        Some(Bson::Int32(i)) => f64::from(i),
        Some(Bson::Int64(i)) => i as f64,
        other => {
            return Err(Error::Store(format!(
                "$geoNear result without numeric distance: {:?}",
                other
            )))
        }
    };
    Ok(GeoNearResult { dis, obj })
}
