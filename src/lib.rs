//! # mongo-database
//!
//! A thin accessor over MongoDB collections that presents records with an
//! `id` field while the store keeps its native `_id`.
//!
//! Criteria, update descriptors and documents are rewritten from `id` to
//! `_id` on the way in, and results are rewritten back on the way out. Every
//! other concern (queries, writes, indexes, proximity search) is forwarded to
//! the store handle unchanged.

pub mod config;
pub mod database;
pub mod document;
pub mod error;
pub mod logging;
pub mod store;
pub mod testing;
pub mod translate;

pub use config::{ConfigLoader, DatabaseConfig};
pub use database::MongoDatabase;
pub use document::{
    Criteria, DeleteAck, FindOptions, GeoNearHit, GeoNearOptions, Geolocation, InsertAck,
    InsertManyAck, OrderBy, Record, SortOrder, UpdateAck, WriteOptions,
};
pub use error::{Error, Result};
pub use logging::{LogConfig, LogLevel};
pub use store::{DocumentStore, MongoStore};
pub use testing::TestDatabase;
