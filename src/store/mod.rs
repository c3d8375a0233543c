//! Document Store Abstraction
//!
//! Raw collection operations in native form. Nothing at this layer knows
//! about the external `id` field; translation happens in the accessor.

pub mod mongo;

pub use mongo::MongoStore;

use crate::document::{
    DeleteAck, GeoNearOptions, GeoNearResponse, Geolocation, InsertAck, InsertManyAck, UpdateAck,
    WriteOptions,
};
use crate::error::Result;
use async_trait::async_trait;
use mongodb::bson::Document;

/// Store handle consumed by the accessor
///
/// Implementations must tolerate concurrent outstanding calls.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Find every document matching `filter`, optionally sorted
    async fn find(
        &self,
        collection: &str,
        filter: Document,
        sort: Option<Document>,
    ) -> Result<Vec<Document>>;

    /// Find the first document matching `filter`
    async fn find_one(&self, collection: &str, filter: Document) -> Result<Option<Document>>;

    /// Count documents matching `filter`
    async fn count(&self, collection: &str, filter: Document) -> Result<u64>;

    async fn insert_one(&self, collection: &str, document: Document) -> Result<InsertAck>;

    async fn insert_many(&self, collection: &str, documents: Vec<Document>)
        -> Result<InsertManyAck>;

    /// Apply an update document to the first match
    async fn update_one(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
        options: WriteOptions,
    ) -> Result<UpdateAck>;

    /// Replace the first match wholesale
    async fn replace_one(
        &self,
        collection: &str,
        filter: Document,
        replacement: Document,
        options: WriteOptions,
    ) -> Result<UpdateAck>;

    async fn delete_one(&self, collection: &str, filter: Document) -> Result<DeleteAck>;

    /// Create an index from native index keys, returning its name
    async fn create_index(&self, collection: &str, keys: Document) -> Result<String>;

    /// Proximity query, nearest first
    async fn geo_near(
        &self,
        collection: &str,
        near: Geolocation,
        options: GeoNearOptions,
    ) -> Result<GeoNearResponse>;

    /// Drop the whole database
    async fn drop_database(&self) -> Result<()>;

    /// Release the connection
    async fn close(&self) -> Result<()>;
}
