use crate::error::{Error, Result};
use crate::logging::{console_dispatch, LogLevel};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::Dispatch;

/// Database name used when the URL does not carry one
pub const DEFAULT_DATABASE_NAME: &str = "test";

const URL_SCHEMES: [&str; 2] = ["mongodb://", "mongodb+srv://"];

/// Accessor configuration
///
/// `store_url` has no default and must be supplied. `log_level` defaults to
/// `info`; `logger` defaults to a console sink at `log_level`.
#[derive(Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Connection string, e.g. `mongodb://localhost:27017/app`
    pub store_url: String,
    /// Database used when `store_url` has no path component
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub log_level: LogLevel,
    /// Injected log sink
    #[serde(skip)]
    pub logger: Option<Dispatch>,
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("store_url", &self.store_url)
            .field("database", &self.database)
            .field("log_level", &self.log_level)
            .field("logger", &self.logger.as_ref().map(|_| "<dispatch>"))
            .finish()
    }
}

impl DatabaseConfig {
    pub fn new(store_url: impl Into<String>) -> Self {
        Self {
            store_url: store_url.into(),
            database: None,
            log_level: LogLevel::default(),
            logger: None,
        }
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }

    pub fn with_logger(mut self, logger: Dispatch) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.store_url.trim().is_empty() {
            return Err(Error::Configuration(
                "store_url cannot be empty".to_string(),
            ));
        }
        if !URL_SCHEMES
            .iter()
            .any(|scheme| self.store_url.starts_with(scheme))
        {
            return Err(Error::Configuration(format!(
                "store_url must start with one of {:?}",
                URL_SCHEMES
            )));
        }
        if let Some(ref name) = self.database {
            if name.is_empty() {
                return Err(Error::Configuration(
                    "database name cannot be empty".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// The configured logger, or a console sink at `log_level`
    pub fn resolve_logger(&self) -> Dispatch {
        self.logger
            .clone()
            .unwrap_or_else(|| console_dispatch(self.log_level))
    }

    /// Database name fallback when the URL does not select one
    pub fn fallback_database(&self) -> &str {
        self.database.as_deref().unwrap_or(DEFAULT_DATABASE_NAME)
    }
}
