//! Configuration types for ShardCache
//!
//! Configuration is layered: built-in defaults, then an optional TOML file,
//! then `SHARDCACHE_*` environment variables (`__` separates nested keys,
//! e.g. `SHARDCACHE_STORE__SHARDS=2`). It is read once at startup and never
//! mutated afterwards.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "SHARDCACHE";

/// File name of the cache database inside the data directory
pub const CACHE_FILE_NAME: &str = "cache.redb";

/// Root configuration for ShardCache
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Relational store configuration
    pub store: StoreConfig,
    /// Cache configuration
    pub cache: CacheConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from an optional file plus the environment.
    ///
    /// A missing file is not an error; the defaults apply.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(::config::File::from(path).required(false));
        }
        builder = builder.add_source(
            ::config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: Self = builder
            .build()
            .and_then(|settings| settings.try_deserialize::<Self>())
            .map_err(|e| Error::Configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Move the store's data directory.
    ///
    /// The cache file moves with it only while it still sits at its default
    /// location inside the old data directory; an explicitly configured
    /// cache path is kept.
    pub fn set_data_dir(&mut self, data_dir: PathBuf) {
        if self.cache.path == self.store.data_dir.join(CACHE_FILE_NAME) {
            self.cache.path = data_dir.join(CACHE_FILE_NAME);
        }
        self.store.data_dir = data_dir;
    }

    /// Reject configurations the store cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.store.shards == 0 {
            return Err(Error::Configuration(
                "store.shards must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Which implementation backs a collaborator
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Process-local maps, lost on exit
    Memory,
    /// Durable redb files
    #[default]
    Redb,
}

/// Relational store configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Backend implementation
    pub backend: BackendKind,
    /// Number of shards. Changing this for an existing data set
    /// reassigns keys to different shards.
    pub shards: usize,
    /// Directory holding one database file per shard
    pub data_dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Redb,
            shards: 2,
            data_dir: PathBuf::from("./shardcache-data"),
        }
    }
}

/// Cache configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Backend implementation
    pub backend: BackendKind,
    /// Cache database file
    pub path: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Redb,
            path: PathBuf::from("./shardcache-data").join(CACHE_FILE_NAME),
        }
    }
}

/// Logging configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.store.shards, 2);
        assert_eq!(config.store.backend, BackendKind::Redb);
        assert_eq!(config.cache.backend, BackendKind::Redb);
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load(Some(dir.path().join("absent.toml").as_path())).unwrap();
        assert_eq!(config.store.shards, 2);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("shardcache.toml");
        std::fs::write(
            &path,
            r#"
[store]
backend = "memory"
shards = 4
data_dir = "/tmp/shards"

[cache]
backend = "memory"
"#,
        )
        .unwrap();

        let config = Config::load(Some(path.as_path())).unwrap();
        assert_eq!(config.store.backend, BackendKind::Memory);
        assert_eq!(config.store.shards, 4);
        assert_eq!(config.store.data_dir, PathBuf::from("/tmp/shards"));
        assert_eq!(config.cache.backend, BackendKind::Memory);
        // Unspecified keys keep their defaults
        assert_eq!(config.cache.path, PathBuf::from("./shardcache-data/cache.redb"));
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_set_data_dir_moves_default_cache_path() {
        let mut config = Config::default();
        config.set_data_dir(PathBuf::from("/srv/shards"));
        assert_eq!(config.store.data_dir, PathBuf::from("/srv/shards"));
        assert_eq!(config.cache.path, PathBuf::from("/srv/shards/cache.redb"));
    }

    #[test]
    fn test_set_data_dir_keeps_explicit_cache_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("shardcache.toml");
        std::fs::write(&path, "[cache]\npath = \"/var/cache/people.redb\"\n").unwrap();

        let mut config = Config::load(Some(path.as_path())).unwrap();
        config.set_data_dir(PathBuf::from("/srv/shards"));
        assert_eq!(config.store.data_dir, PathBuf::from("/srv/shards"));
        assert_eq!(config.cache.path, PathBuf::from("/var/cache/people.redb"));
    }

    #[test]
    fn test_zero_shards_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("shardcache.toml");
        std::fs::write(&path, "[store]\nshards = 0\n").unwrap();

        let err = Config::load(Some(path.as_path())).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }
}
