//! ShardCache Placement - key to shard routing
//!
//! Maps a record key to one of N shards and renders the routing hint the
//! relational store uses to select the physical shard.
//!
//! # Algorithm
//!
//! `shard(key) = xxh64(key, seed = 0) % N`
//!
//! XXH64 is a published, versioned hash, so the assignment is identical
//! across process restarts and across implementations in other languages.
//! N is fixed for the lifetime of a data set: changing it without migrating
//! rows sends existing keys to the wrong shard.
//!
//! # Example
//! ```
//! use shardcache_placement::ShardRouter;
//!
//! let router = ShardRouter::new(2).unwrap();
//! let shard = router.shard_index("alice");
//! assert!(shard < 2);
//! assert_eq!(router.all_routing_hints().len(), 2);
//! ```

pub mod hint;
pub mod router;

pub use hint::{HINT_PREFIX, RoutingHint, split_routed};
pub use router::{DEFAULT_SHARDS, HASH_ALGORITHM, ShardRouter, stable_hash};
