//! Configuration
//!
//! Typed accessor configuration and its layered loader.

pub mod loader;
pub mod types;

pub use loader::{ConfigLoader, ENV_PREFIX};
pub use types::{DatabaseConfig, DEFAULT_DATABASE_NAME};
