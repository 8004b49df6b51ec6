//! Collaborator implementations
//!
//! Network connectors are out of scope; these in-process implementations
//! speak the same [`RelationalSession`] and [`CacheClient`] interfaces.

mod memory;
mod persistent;

pub use persistent::{RedbBackendError, RedbCache, RedbSession};
pub use memory::{MemoryCache, MemorySession};

use crate::cache::CacheClient;
use crate::session::RelationalSession;
use shardcache_common::config::{BackendKind, CacheConfig, StoreConfig};
use shardcache_common::{Error, Result};
use std::sync::Arc;
use tracing::info;

/// Construct the configured relational store backend.
pub fn open_session(config: &StoreConfig) -> Result<Arc<dyn RelationalSession>> {
    match config.backend {
        BackendKind::Memory => {
            info!("Relational store: memory ({} shards)", config.shards);
            Ok(Arc::new(MemorySession::new(config.shards)))
        }
        BackendKind::Redb => {
            info!(
                "Relational store: redb at {} ({} shards)",
                config.data_dir.display(),
                config.shards
            );
            let session = RedbSession::open(&config.data_dir, config.shards)
                .map_err(|e| Error::store_unavailable(e.to_string()))?;
            Ok(Arc::new(session))
        }
    }
}

/// Construct the configured cache backend.
pub fn open_cache(config: &CacheConfig) -> Result<Arc<dyn CacheClient>> {
    match config.backend {
        BackendKind::Memory => {
            info!("Cache: memory");
            Ok(Arc::new(MemoryCache::new()))
        }
        BackendKind::Redb => {
            info!("Cache: redb at {}", config.path.display());
            let cache = RedbCache::open(&config.path)
                .map_err(|e| Error::CacheUnavailable(e.to_string()))?;
            Ok(Arc::new(cache))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_open_memory_backends() {
        let store = StoreConfig {
            backend: BackendKind::Memory,
            shards: 3,
            ..StoreConfig::default()
        };
        assert_eq!(open_session(&store).unwrap().shard_count(), 3);

        let cache = CacheConfig {
            backend: BackendKind::Memory,
            ..CacheConfig::default()
        };
        assert!(open_cache(&cache).is_ok());
    }

    #[test]
    fn test_open_redb_backends() {
        let dir = tempdir().unwrap();
        let store = StoreConfig {
            backend: BackendKind::Redb,
            shards: 2,
            data_dir: dir.path().join("data"),
        };
        assert_eq!(open_session(&store).unwrap().shard_count(), 2);
        assert!(dir.path().join("data").join("shard-1.redb").exists());

        let cache = CacheConfig {
            backend: BackendKind::Redb,
            path: dir.path().join("data").join("cache.redb"),
        };
        assert!(open_cache(&cache).is_ok());
    }
}
