use super::types::DatabaseConfig;
use anyhow::{Context, Result};
use config::{Config, Environment, File};

/// Prefix of the environment variables read by the loader
pub const ENV_PREFIX: &str = "MONGO_DATABASE";

/// Configuration loader with builder pattern
#[derive(Debug, Default)]
pub struct ConfigLoader {
    config_file: Option<String>,
    load_env: bool,
    store_url: Option<String>,
    log_level: Option<String>,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from file
    pub fn load_from_file(mut self, path: Option<&str>) -> Self {
        self.config_file = path.map(String::from);
        self
    }

    /// Load configuration from `MONGO_DATABASE_*` environment variables
    pub fn load_from_env(mut self) -> Self {
        self.load_env = true;
        self
    }

    /// Override the store URL (highest precedence)
    pub fn store_url(mut self, url: Option<String>) -> Self {
        self.store_url = url;
        self
    }

    /// Override the log level (highest precedence)
    pub fn log_level(mut self, level: Option<String>) -> Self {
        self.log_level = level;
        self
    }

    /// Build and validate the final configuration
    pub fn build(self) -> Result<DatabaseConfig> {
        let mut builder = Config::builder().set_default("log_level", "info")?;

        if let Some(config_path) = &self.config_file {
            builder = builder.add_source(File::with_name(config_path).required(true));
        } else {
            builder = builder
                .add_source(File::with_name("mongo-database").required(false))
                .add_source(File::with_name("config/mongo-database").required(false));
        }

        if self.load_env {
            builder = builder.add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            );
        }

        builder = builder
            .set_override_option("store_url", self.store_url)?
            .set_override_option("log_level", self.log_level)?;

        let config: DatabaseConfig = builder
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate().context("Invalid configuration")?;

        Ok(config)
    }
}
