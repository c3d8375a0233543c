//! Error types for the document accessor.

use thiserror::Error;

/// Result type alias for accessor operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for accessor and store operations
#[derive(Debug, Error)]
pub enum Error {
    /// The database could not be reached during initialization
    #[error("Impossible to connect to database: {0}")]
    ConnectionFailed(String),

    /// An operation was attempted outside the connected state
    #[error("Database is not connected ({state}): call initialize() first")]
    NotConnected { state: &'static str },

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Store-reported failure, message kept verbatim
    #[error("{0}")]
    Store(String),

    /// JSON/BSON conversion error
    #[error("Conversion error: {0}")]
    Conversion(String),

    /// MongoDB driver error
    #[error(transparent)]
    Mongo(#[from] mongodb::error::Error),
}

impl Error {
    /// True when the error happened while opening the connection
    pub fn is_connection_failure(&self) -> bool {
        matches!(self, Error::ConnectionFailed(_))
    }
}
