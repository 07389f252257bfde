//! Configuration resolution and store bootstrap.
//!
//! Defaults, then the optional TOML file, then `FLASHBACK_*` variables,
//! then command-line flags.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use flashback_core::{ServiceConfig, ServiceError};
use flashback_sql::{SqliteStore, StoreOptions};
use fleet::FleetError;
use tracing::info;

/// Flags that override file and environment settings.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub db: Option<PathBuf>,
    pub log_queries: bool,
}

/// Build the effective configuration.
pub fn resolve(file: Option<&Path>, overrides: &Overrides) -> Result<ServiceConfig, ServiceError> {
    let base = match file {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            ServiceConfig::load(path)?
        }
        None => ServiceConfig::default(),
    };
    Ok(apply(base.with_env()?, overrides))
}

fn apply(mut config: ServiceConfig, overrides: &Overrides) -> ServiceConfig {
    if let Some(db) = &overrides.db {
        config.sqlite_path = Some(db.clone());
    }
    if overrides.log_queries {
        config.log_queries = true;
    }
    config
}

pub fn store_options(config: &ServiceConfig) -> StoreOptions {
    StoreOptions {
        pool_size: config.pool_size,
        busy_timeout: Duration::from_millis(config.busy_timeout_ms),
        max_retries: config.max_retries,
        retry_backoff: Duration::from_millis(config.retry_backoff_ms),
        log_queries: config.log_queries,
        slow_query: Duration::from_millis(config.slow_query_ms),
        ..StoreOptions::default()
    }
}

/// Open the database named by `config`, creating its directory if needed.
pub fn open_store(config: &ServiceConfig) -> anyhow::Result<Arc<SqliteStore>> {
    let path = config.resolve_sqlite_path();
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    info!("Opening database {}", path.display());
    let store = SqliteStore::open(&path, store_options(config)).map_err(FleetError::from)?;
    Ok(Arc::new(store))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_win_over_config() {
        let config = ServiceConfig {
            sqlite_path: Some(PathBuf::from("/var/lib/flashback/a.sqlite")),
            ..Default::default()
        };
        let overrides = Overrides {
            db: Some(PathBuf::from("/tmp/b.sqlite")),
            log_queries: true,
        };
        let config = apply(config, &overrides);
        assert_eq!(config.resolve_sqlite_path(), PathBuf::from("/tmp/b.sqlite"));
        assert!(config.log_queries);
    }

    #[test]
    fn unset_flags_keep_config() {
        let config = ServiceConfig {
            log_queries: true,
            ..Default::default()
        };
        let config = apply(config, &Overrides::default());
        assert!(config.log_queries);
        assert_eq!(config.resolve_sqlite_path(), PathBuf::from("flashback.sqlite"));
    }

    #[test]
    fn millisecond_fields_become_durations() {
        let config = ServiceConfig {
            pool_size: 3,
            busy_timeout_ms: 250,
            retry_backoff_ms: 10,
            slow_query_ms: 75,
            ..Default::default()
        };
        let opts = store_options(&config);
        assert_eq!(opts.pool_size, 3);
        assert_eq!(opts.busy_timeout, Duration::from_millis(250));
        assert_eq!(opts.retry_backoff, Duration::from_millis(10));
        assert_eq!(opts.slow_query, Duration::from_millis(75));
        assert_eq!(opts.max_retries, config.max_retries);
    }
}
