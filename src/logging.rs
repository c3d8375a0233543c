//! Logging setup
//!
//! Builds the `tracing` dispatcher handed to the accessor. Nothing here
//! installs a global subscriber: callers pass the dispatcher explicitly.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::Dispatch;
use tracing_subscriber::{fmt as tracing_fmt, layer::SubscriberExt, EnvFilter, Registry};

/// Log level (trace, debug, info, warn, error)
///
/// Deserializes through `FromStr`, so configuration files, environment
/// variables and CLI flags accept the same spellings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level: {}", other)),
        }
    }
}

impl TryFrom<String> for LogLevel {
    type Error = String;

    fn try_from(value: String) -> Result<Self, <LogLevel as TryFrom<String>>::Error> {
        value.parse()
    }
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: LogLevel,
    /// Emit JSON lines instead of the human-readable format
    pub json: bool,
    /// Include the event target (module path)
    pub with_target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            json: false,
            with_target: true,
        }
    }
}

impl LogConfig {
    pub fn new(level: LogLevel) -> Self {
        Self {
            level,
            ..Self::default()
        }
    }

    pub fn with_json(mut self, enabled: bool) -> Self {
        self.json = enabled;
        self
    }

    pub fn with_target(mut self, enabled: bool) -> Self {
        self.with_target = enabled;
        self
    }

    /// Filter applied to both this crate and the driver's own events
    pub fn env_filter(&self) -> EnvFilter {
        EnvFilter::new(self.level.as_str())
    }

    /// Build a console dispatcher for this configuration
    pub fn build_dispatch(&self) -> Dispatch {
        let registry = Registry::default().with(self.env_filter());
        if self.json {
            Dispatch::new(
                registry.with(
                    tracing_fmt::layer()
                        .json()
                        .with_target(self.with_target),
                ),
            )
        } else {
            Dispatch::new(registry.with(tracing_fmt::layer().with_target(self.with_target)))
        }
    }
}

/// Default console sink at the given level
pub fn console_dispatch(level: LogLevel) -> Dispatch {
    LogConfig::new(level).build_dispatch()
}
