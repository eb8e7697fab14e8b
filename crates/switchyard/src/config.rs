//! Bus configuration, read from TOML.
//!
//! ```toml
//! [dispatch]
//! slow_threshold_ms = 250
//!
//! [cache]
//! enabled = false
//! capacity = 1024
//!
//! [logging]
//! filter = "info,switchyard_core=debug"
//! json = false
//! ```
//!
//! Every section and key is optional.

use crate::error::ConfigError;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BusConfig {
    pub dispatch: DispatchConfig,
    pub cache: CacheConfig,
    pub logging: LoggingConfig,
}

impl BusConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DispatchConfig {
    /// Dispatches slower than this are logged at `WARN`.
    pub slow_threshold_ms: u64,
}

impl DispatchConfig {
    pub fn slow_threshold(&self) -> Duration {
        Duration::from_millis(self.slow_threshold_ms)
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            slow_threshold_ms: 250,
        }
    }
}

/// Query response cache. Off unless enabled explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    pub enabled: bool,
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            capacity: 1024,
        }
    }
}

/// Consumed by binaries when they install a `tracing` subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// `EnvFilter` directive string.
    pub filter: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
        }
    }
}
