//! Test lifecycle helper
//!
//! Connects once per suite and drops the database after each test case:
//!
//! ```no_run
//! # async fn example() -> mongo_database::Result<()> {
//! use mongo_database::{DatabaseConfig, TestDatabase};
//!
//! let harness = TestDatabase::new(DatabaseConfig::new("mongodb://localhost:27017/suite"))?;
//! let database = harness.setup().await?;
//! database.add("users", mongodb::bson::doc! {"id": "u1"}).await?;
//! harness.teardown().await?;
//! # Ok(())
//! # }
//! ```

use crate::config::DatabaseConfig;
use crate::database::MongoDatabase;
use crate::error::Result;
use tokio::sync::OnceCell;

pub struct TestDatabase {
    database: MongoDatabase,
    initialized: OnceCell<()>,
}

impl TestDatabase {
    pub fn new(config: DatabaseConfig) -> Result<Self> {
        Ok(Self {
            database: MongoDatabase::new(config)?,
            initialized: OnceCell::new(),
        })
    }

    /// Initialize on first call only; a failed attempt is retried next time.
    pub async fn setup(&self) -> Result<&MongoDatabase> {
        self.initialized
            .get_or_try_init(|| self.database.initialize())
            .await?;
        Ok(&self.database)
    }

    /// Drop the database so the next test case starts empty
    pub async fn teardown(&self) -> Result<()> {
        self.database.drop().await
    }

    pub fn database(&self) -> &MongoDatabase {
        &self.database
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.initialized()
    }
}
