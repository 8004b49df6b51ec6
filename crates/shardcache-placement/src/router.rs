//! Key to shard routing

use crate::hint::RoutingHint;
use shardcache_common::{Error, Result};

/// Name and parameters of the stable hash. Part of the on-disk contract:
/// every writer and reader of a data set must agree on it.
pub const HASH_ALGORITHM: &str = "xxh64/seed=0";

/// Reference shard count
pub const DEFAULT_SHARDS: usize = 2;

/// Stable 64-bit hash of a key
#[must_use]
pub fn stable_hash(key: &str) -> u64 {
    xxhash_rust::xxh64::xxh64(key.as_bytes(), 0)
}

/// Maps keys to shards and shards to routing hints.
///
/// Pure and immutable after construction, so a single router can be shared
/// by any number of concurrent callers.
#[derive(Clone, Debug)]
pub struct ShardRouter {
    hints: Vec<RoutingHint>,
}

impl ShardRouter {
    /// Create a router over `shards` partitions.
    pub fn new(shards: usize) -> Result<Self> {
        if shards == 0 {
            return Err(Error::Configuration(
                "shard count must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            hints: (0..shards).map(RoutingHint::new).collect(),
        })
    }

    /// Number of shards
    #[must_use]
    pub fn shard_count(&self) -> usize {
        self.hints.len()
    }

    /// Shard owning `key`, in `[0, shard_count)`.
    #[must_use]
    pub fn shard_index(&self, key: &str) -> usize {
        // Lossless: the remainder is below `shard_count`, which is a usize.
        #[allow(clippy::cast_possible_truncation)]
        let index = (stable_hash(key) % self.hints.len() as u64) as usize;
        index
    }

    /// Routing hint for a shard index
    pub fn routing_hint(&self, shard: usize) -> Result<RoutingHint> {
        self.hints.get(shard).copied().ok_or_else(|| {
            Error::RoutingConfigMismatch(format!(
                "shard {shard} is outside the {}-shard topology",
                self.hints.len()
            ))
        })
    }

    /// Routing hint for the shard owning `key`
    #[must_use]
    pub fn hint_for(&self, key: &str) -> RoutingHint {
        self.hints[self.shard_index(key)]
    }

    /// One hint per shard, index-aligned with shard indices
    #[must_use]
    pub fn all_routing_hints(&self) -> &[RoutingHint] {
        &self.hints
    }

    /// Fail fast when a store topology disagrees with this router.
    pub fn verify_topology(&self, store_shards: usize) -> Result<()> {
        if store_shards != self.shard_count() {
            return Err(Error::routing_mismatch(self.shard_count(), store_shards));
        }
        Ok(())
    }
}

impl Default for ShardRouter {
    fn default() -> Self {
        Self {
            hints: (0..DEFAULT_SHARDS).map(RoutingHint::new).collect(),
        }
    }
}
