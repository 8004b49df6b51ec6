//! Cache client interface

use async_trait::async_trait;
use shardcache_common::Error;

/// Failures reported by a cache implementation
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("{0}")]
    Unavailable(String),
}

impl From<CacheError> for Error {
    fn from(e: CacheError) -> Self {
        Self::CacheUnavailable(e.to_string())
    }
}

/// Key/value cache holding encoded records.
///
/// Entries never expire and are only replaced by a later `put` of the same
/// key. Implementations must be safe to share between concurrent callers.
#[async_trait]
pub trait CacheClient: Send + Sync {
    /// Fetch the payload stored under `key`
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Store `value` under `key`, replacing any previous entry
    async fn put(&self, key: &str, value: String) -> Result<(), CacheError>;

    /// Number of entries currently held
    async fn size(&self) -> Result<u64, CacheError>;
}
