//! Cache-aside access layer
//!
//! Reads and writes against the relational store are routed to the shard
//! that owns the record's login. The cache is separate and explicit:
//!
//! - [`CacheAsideStore::get_by_key`] reads the store and never touches the
//!   cache.
//! - [`CacheAsideStore::get_by_key_from_cache`] reads the cache and never
//!   falls back to the store; a miss is [`Error::NotFound`].
//! - [`CacheAsideStore::populate_cache`] is the only way entries are written.
//!   Entries have no expiry and are not invalidated by later inserts, so a
//!   cached record can be stale.
//!
//! Callers that want read-through behaviour compose it themselves:
//! `get_by_key_from_cache`, then on `NotFound` `get_by_key` followed by
//! `populate_cache`.

use crate::cache::CacheClient;
use crate::codec::RecordCodec;
use crate::dialect;
use crate::session::{Query, RelationalSession, RowSet};
use futures::future::try_join_all;
use shardcache_common::{Error, Person, Result};
use shardcache_placement::{RoutingHint, ShardRouter};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, error, info, warn};

/// Access counters for monitoring
#[derive(Debug, Default)]
pub struct AccessStats {
    /// Cache lookups that returned a record
    pub cache_hits: AtomicU64,
    /// Cache lookups that found no entry
    pub cache_misses: AtomicU64,
    /// Statements that read from the store
    pub store_reads: AtomicU64,
    /// Statements that wrote to the store
    pub store_writes: AtomicU64,
}

impl AccessStats {
    /// Calculate cache hit ratio (0.0 to 1.0)
    pub fn hit_ratio(&self) -> f64 {
        let hits = self.cache_hits.load(Ordering::Relaxed);
        let misses = self.cache_misses.load(Ordering::Relaxed);
        let total = hits + misses;
        if total == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let ratio = hits as f64 / total as f64;
        ratio
    }
}

/// Sharded record store with an explicitly managed cache
pub struct CacheAsideStore {
    router: ShardRouter,
    session: Arc<dyn RelationalSession>,
    cache: Arc<dyn CacheClient>,
    stats: AccessStats,
}

impl CacheAsideStore {
    /// Assemble a store from its collaborators.
    ///
    /// Fails with [`Error::RoutingConfigMismatch`] when the session's
    /// topology does not have exactly as many shards as the router.
    pub fn new(
        router: ShardRouter,
        session: Arc<dyn RelationalSession>,
        cache: Arc<dyn CacheClient>,
    ) -> Result<Self> {
        router.verify_topology(session.shard_count())?;
        Ok(Self {
            router,
            session,
            cache,
            stats: AccessStats::default(),
        })
    }

    pub fn router(&self) -> &ShardRouter {
        &self.router
    }

    pub fn stats(&self) -> &AccessStats {
        &self.stats
    }

    /// Drop and recreate the table on every shard. Destroys existing data.
    pub async fn create_schema(&self) -> Result<()> {
        for hint in self.router.all_routing_hints() {
            self.execute(Query::routed(dialect::DROP_TABLE, *hint)).await?;
            self.execute(Query::routed(dialect::CREATE_TABLE, *hint))
                .await?;
        }
        info!(
            "Schema created on {} shards",
            self.router.shard_count()
        );
        Ok(())
    }

    /// Write a record to the shard owning its login.
    ///
    /// Does not touch the cache.
    pub async fn insert(&self, person: &Person) -> Result<()> {
        person.validate()?;
        let query = Query::routed(dialect::INSERT, self.router.hint_for(&person.login))
            .bind(person.login.as_str())
            .bind(person.first_name.as_str())
            .bind(person.last_name.as_str())
            .bind(person.age);
        self.execute(query).await?;
        self.stats.store_writes.fetch_add(1, Ordering::Relaxed);
        info!("Inserted {}", person);
        Ok(())
    }

    /// Point read from the shard owning `login`. Never consults the cache.
    pub async fn get_by_key(&self, login: &str) -> Result<Person> {
        let query =
            Query::routed(dialect::SELECT_BY_LOGIN, self.router.hint_for(login)).bind(login);
        let rows = self.execute(query).await?;
        self.stats.store_reads.fetch_add(1, Ordering::Relaxed);

        if rows.len() > 1 {
            warn!("Point read for '{}' returned {} rows", login, rows.len());
        }
        match rows.first() {
            Some(row) => dialect::person_from_row(row),
            None => Err(Error::not_found(login)),
        }
    }

    /// Read a record from the cache. A miss is `NotFound`; the store is not
    /// consulted.
    pub async fn get_by_key_from_cache(&self, login: &str) -> Result<Person> {
        let payload = self.cache.get(login).await.map_err(|e| {
            error!("Cache get '{}' failed: {}", login, e);
            Error::from(e)
        })?;

        match payload {
            Some(payload) => {
                let person = RecordCodec::from_payload(&payload).inspect_err(|e| {
                    warn!("Cached entry for '{}' is unreadable: {}", login, e);
                })?;
                self.stats.cache_hits.fetch_add(1, Ordering::Relaxed);
                Ok(person)
            }
            None => {
                self.stats.cache_misses.fetch_add(1, Ordering::Relaxed);
                debug!("Cache miss for '{}'", login);
                Err(Error::not_found(login))
            }
        }
    }

    /// Write the record's transport form to the cache under its login,
    /// replacing any previous entry.
    pub async fn populate_cache(&self, person: &Person) -> Result<()> {
        person.validate()?;
        let payload = RecordCodec::to_payload(person)?;
        self.cache
            .put(&person.login, payload)
            .await
            .map_err(|e| {
                error!("Cache put '{}' failed: {}", person.login, e);
                Error::from(e)
            })
    }

    /// All records whose first and last names start with the given
    /// prefixes, across every shard, sorted by login.
    ///
    /// Fails as a whole if any shard fails.
    pub async fn find_by_name_prefix(
        &self,
        first_name_prefix: &str,
        last_name_prefix: &str,
    ) -> Result<Vec<Person>> {
        let first = dialect::prefix_pattern(first_name_prefix);
        let last = dialect::prefix_pattern(last_name_prefix);
        self.fan_out(|hint| {
            Query::routed(dialect::SELECT_BY_NAME, hint)
                .bind(first.as_str())
                .bind(last.as_str())
        })
        .await
    }

    /// Every record on every shard, sorted by login.
    pub async fn read_all(&self) -> Result<Vec<Person>> {
        self.fan_out(|hint| Query::routed(dialect::SELECT_ALL, hint))
            .await
    }

    /// Copy every stored record into the cache.
    ///
    /// Returns the number of entries written. Stops at the first failure.
    pub async fn warm_up_cache(&self) -> Result<usize> {
        let people = self.read_all().await?;
        for person in &people {
            self.populate_cache(person).await?;
        }
        info!("Cache warm-up wrote {} entries", people.len());
        Ok(people.len())
    }

    /// Number of entries reported by the cache
    pub async fn cache_size(&self) -> Result<u64> {
        Ok(self.cache.size().await?)
    }

    /// Issue one query per shard concurrently and merge the results.
    async fn fan_out(&self, build: impl Fn(RoutingHint) -> Query) -> Result<Vec<Person>> {
        let queries = self.router.all_routing_hints().iter().map(|hint| build(*hint));
        let per_shard = try_join_all(queries.map(|query| self.execute(query))).await?;
        self.stats
            .store_reads
            .fetch_add(per_shard.len() as u64, Ordering::Relaxed);

        let mut people = per_shard
            .iter()
            .flat_map(RowSet::iter)
            .map(dialect::person_from_row)
            .collect::<Result<Vec<_>>>()?;
        people.sort_by(|a, b| a.login.cmp(&b.login));
        Ok(people)
    }

    async fn execute(&self, query: Query) -> Result<RowSet> {
        debug!("{}", query.text());
        self.session.execute(&query).await.map_err(|e| {
            error!("Statement failed: {}: {}", query.text(), e);
            Error::from(e)
        })
    }
}
