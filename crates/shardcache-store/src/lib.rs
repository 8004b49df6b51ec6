//! ShardCache Store - sharded storage behind a cache-aside layer
//!
//! [`CacheAsideStore`] routes every record operation to the shard that owns
//! the record's login and keeps an optional, explicitly populated cache copy
//! of records in their JSON transport form.
//!
//! The relational store and the cache are collaborators reached through the
//! [`RelationalSession`] and [`CacheClient`] traits. The [`backend`] module
//! provides in-memory and redb-backed implementations of both.

pub mod backend;
pub mod cache;
pub mod codec;
pub mod dialect;
pub mod session;
pub mod store;

// Re-exports
pub use backend::{MemoryCache, MemorySession, RedbCache, RedbSession, open_cache, open_session};
pub use cache::{CacheClient, CacheError};
pub use codec::RecordCodec;
pub use session::{Query, RelationalSession, Row, RowSet, SessionError, Value};
pub use store::{AccessStats, CacheAsideStore};
