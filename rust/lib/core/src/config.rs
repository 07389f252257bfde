use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ServiceError;

/// Storage and logging configuration shared by every entry point.
///
/// Resolution order: defaults, then an optional TOML file
/// ([`ServiceConfig::load`]), then `FLASHBACK_*` environment variables
/// ([`ServiceConfig::with_env`]), then command-line flags applied by the
/// binary.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServiceConfig {
    /// Directory holding the database file.
    pub data_dir: Option<PathBuf>,

    /// Path to the SQLite database file.
    /// Defaults to `{data_dir}/flashback.sqlite` if not specified.
    pub sqlite_path: Option<PathBuf>,

    /// Number of pooled connections. Throughput knob only.
    pub pool_size: usize,

    /// Retries for non-transactional reads that hit a connection error.
    pub max_retries: u32,

    /// Fixed delay between those retries.
    pub retry_backoff_ms: u64,

    /// How long a writer waits on SQLite's write lock.
    pub busy_timeout_ms: u64,

    /// Log every statement at debug level.
    pub log_queries: bool,

    /// Statements slower than this are logged as warnings.
    pub slow_query_ms: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            sqlite_path: None,
            pool_size: 10,
            max_retries: 2,
            retry_backoff_ms: 1000,
            busy_timeout_ms: 5000,
            log_queries: false,
            slow_query_ms: 500,
        }
    }
}

impl ServiceConfig {
    /// Load configuration from a TOML file. Missing keys keep their defaults.
    pub fn load(path: &Path) -> Result<Self, ServiceError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ServiceError::Validation(format!("cannot read config {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
            .map_err(|e| ServiceError::Validation(format!("{}: {}", path.display(), e)))
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ServiceError> {
        let config: ServiceConfig = toml::from_str(content)
            .map_err(|e| ServiceError::Validation(format!("invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from the process environment.
    pub fn with_env(self) -> Result<Self, ServiceError> {
        self.with_vars(std::env::vars())
    }

    /// Apply overrides from `(name, value)` pairs.
    ///
    /// Recognized variables:
    /// - `FLASHBACK_DATA_DIR`
    /// - `FLASHBACK_DB_PATH`
    /// - `FLASHBACK_POOL_SIZE`
    /// - `FLASHBACK_LOG_QUERIES` (`true`/`1`)
    pub fn with_vars<I>(mut self, vars: I) -> Result<Self, ServiceError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, val) in vars {
            match key.as_str() {
                "FLASHBACK_DATA_DIR" => self.data_dir = Some(PathBuf::from(val)),
                "FLASHBACK_DB_PATH" => self.sqlite_path = Some(PathBuf::from(val)),
                "FLASHBACK_POOL_SIZE" => {
                    self.pool_size = val.parse().map_err(|_| {
                        ServiceError::Validation(format!("FLASHBACK_POOL_SIZE: not a number: {}", val))
                    })?;
                }
                "FLASHBACK_LOG_QUERIES" => self.log_queries = val == "true" || val == "1",
                _ => {}
            }
        }
        self.validate()?;
        Ok(self)
    }

    /// Resolve the SQLite database path, falling back to `{data_dir}/flashback.sqlite`.
    pub fn resolve_sqlite_path(&self) -> PathBuf {
        self.sqlite_path.clone().unwrap_or_else(|| {
            self.data_dir
                .as_ref()
                .map(|d| d.join("flashback.sqlite"))
                .unwrap_or_else(|| PathBuf::from("flashback.sqlite"))
        })
    }

    fn validate(&self) -> Result<(), ServiceError> {
        if self.pool_size == 0 {
            return Err(ServiceError::Validation("pool_size must be at least 1".into()));
        }
        Ok(())
    }
}
