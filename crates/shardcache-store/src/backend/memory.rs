//! In-memory backends
//!
//! Process-local implementations of both collaborators. Contents are lost
//! when the process exits. Used for tests, demos and embedding.

use crate::cache::{CacheClient, CacheError};
use crate::dialect::{self, Command};
use crate::session::{Query, RelationalSession, RowSet, SessionError};
use async_trait::async_trait;
use parking_lot::RwLock;
use shardcache_common::Person;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// One shard: `None` until the table is created
struct MemoryShard {
    table: RwLock<Option<BTreeMap<String, Person>>>,
    online: AtomicBool,
}

impl MemoryShard {
    fn new() -> Self {
        Self {
            table: RwLock::new(None),
            online: AtomicBool::new(true),
        }
    }
}

/// Sharded relational session held in memory
pub struct MemorySession {
    shards: Vec<MemoryShard>,
}

impl MemorySession {
    /// Create a session over `shards` empty shards with no table yet
    pub fn new(shards: usize) -> Self {
        Self {
            shards: (0..shards).map(|_| MemoryShard::new()).collect(),
        }
    }

    /// Make every statement routed to `shard` fail with a connection error
    pub fn take_offline(&self, shard: usize) {
        if let Some(s) = self.shards.get(shard) {
            s.online.store(false, Ordering::Release);
        }
    }

    /// Undo [`take_offline`](Self::take_offline)
    pub fn bring_online(&self, shard: usize) {
        if let Some(s) = self.shards.get(shard) {
            s.online.store(true, Ordering::Release);
        }
    }

    /// Number of rows stored on one shard
    pub fn row_count(&self, shard: usize) -> usize {
        self.shards
            .get(shard)
            .and_then(|s| s.table.read().as_ref().map(BTreeMap::len))
            .unwrap_or(0)
    }
}

fn missing_table() -> SessionError {
    SessionError::Statement(format!("table '{}' doesn't exist", dialect::TABLE))
}

#[async_trait]
impl RelationalSession for MemorySession {
    fn shard_count(&self) -> usize {
        self.shards.len()
    }

    async fn execute(&self, query: &Query) -> Result<RowSet, SessionError> {
        let routed = dialect::parse(query, self.shards.len())?;
        let shard = &self.shards[routed.shard];
        if !shard.online.load(Ordering::Acquire) {
            return Err(SessionError::Connection(format!(
                "shard {} is offline",
                routed.shard
            )));
        }
        debug!(shard = routed.shard, command = ?routed.command, "memory session");

        match routed.command {
            Command::DropTable => {
                *shard.table.write() = None;
                Ok(RowSet::empty())
            }
            Command::CreateTable => {
                shard.table.write().get_or_insert_with(BTreeMap::new);
                Ok(RowSet::empty())
            }
            Command::Insert(person) => {
                let mut guard = shard.table.write();
                let table = guard.as_mut().ok_or_else(missing_table)?;
                if table.contains_key(&person.login) {
                    return Err(SessionError::DuplicateKey(person.login));
                }
                table.insert(person.login.clone(), person);
                Ok(RowSet::empty())
            }
            Command::SelectByLogin(login) => {
                let guard = shard.table.read();
                let table = guard.as_ref().ok_or_else(missing_table)?;
                Ok(RowSet::new(
                    table.get(&login).map(dialect::person_row).into_iter().collect(),
                ))
            }
            Command::SelectByName { first, last } => {
                let guard = shard.table.read();
                let table = guard.as_ref().ok_or_else(missing_table)?;
                Ok(RowSet::new(
                    table
                        .values()
                        .filter(|p| dialect::name_matches(&first, &last, p))
                        .map(dialect::person_row)
                        .collect(),
                ))
            }
            Command::SelectAll => {
                let guard = shard.table.read();
                let table = guard.as_ref().ok_or_else(missing_table)?;
                Ok(RowSet::new(table.values().map(dialect::person_row).collect()))
            }
        }
    }
}

/// Cache held in memory
pub struct MemoryCache {
    entries: RwLock<HashMap<String, String>>,
    online: AtomicBool,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            online: AtomicBool::new(true),
        }
    }

    /// Toggle simulated cache availability
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::Release);
    }

    fn check_online(&self) -> Result<(), CacheError> {
        if self.online.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(CacheError::Unavailable("memory cache is offline".to_string()))
        }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheClient for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.check_online()?;
        Ok(self.entries.read().get(key).cloned())
    }

    async fn put(&self, key: &str, value: String) -> Result<(), CacheError> {
        self.check_online()?;
        self.entries.write().insert(key.to_string(), value);
        Ok(())
    }

    async fn size(&self) -> Result<u64, CacheError> {
        self.check_online()?;
        Ok(self.entries.read().len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{CREATE_TABLE, INSERT, SELECT_ALL, SELECT_BY_LOGIN};
    use shardcache_placement::ShardRouter;

    fn insert_query(router: &ShardRouter, person: &Person) -> Query {
        Query::routed(INSERT, router.hint_for(&person.login))
            .bind(person.login.as_str())
            .bind(person.first_name.as_str())
            .bind(person.last_name.as_str())
            .bind(person.age)
    }

    async fn create_tables(session: &MemorySession, router: &ShardRouter) {
        for hint in router.all_routing_hints() {
            session
                .execute(&Query::routed(CREATE_TABLE, *hint))
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_rows_land_on_routed_shard() {
        let router = ShardRouter::new(2).unwrap();
        let session = MemorySession::new(2);
        create_tables(&session, &router).await;

        let alice = Person::new("alice", "Alice", "Smith", 30);
        let carol = Person::new("carol", "Carol", "Jones", 41);
        session.execute(&insert_query(&router, &alice)).await.unwrap();
        session.execute(&insert_query(&router, &carol)).await.unwrap();

        assert_eq!(session.row_count(0), 1);
        assert_eq!(session.row_count(1), 1);

        // A point read routed to the wrong shard finds nothing
        let wrong = Query::routed(SELECT_BY_LOGIN, router.routing_hint(0).unwrap()).bind("alice");
        assert!(session.execute(&wrong).await.unwrap().is_empty());

        let right = Query::routed(SELECT_BY_LOGIN, router.hint_for("alice")).bind("alice");
        let rows = session.execute(&right).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(dialect::person_from_row(&rows.into_rows()[0]).unwrap(), alice);
    }

    #[tokio::test]
    async fn test_missing_table() {
        let router = ShardRouter::new(2).unwrap();
        let session = MemorySession::new(2);
        let query = Query::routed(SELECT_ALL, router.routing_hint(0).unwrap());
        assert!(matches!(
            session.execute(&query).await,
            Err(SessionError::Statement(_))
        ));
    }

    #[tokio::test]
    async fn test_duplicate_key() {
        let router = ShardRouter::new(2).unwrap();
        let session = MemorySession::new(2);
        create_tables(&session, &router).await;

        let alice = Person::new("alice", "Alice", "Smith", 30);
        session.execute(&insert_query(&router, &alice)).await.unwrap();
        assert!(matches!(
            session.execute(&insert_query(&router, &alice)).await,
            Err(SessionError::DuplicateKey(login)) if login == "alice"
        ));
    }

    #[tokio::test]
    async fn test_offline_shard() {
        let router = ShardRouter::new(2).unwrap();
        let session = MemorySession::new(2);
        create_tables(&session, &router).await;

        session.take_offline(1);
        let query = Query::routed(SELECT_ALL, router.routing_hint(1).unwrap());
        assert!(matches!(
            session.execute(&query).await,
            Err(SessionError::Connection(_))
        ));
        let query = Query::routed(SELECT_ALL, router.routing_hint(0).unwrap());
        assert!(session.execute(&query).await.is_ok());

        session.bring_online(1);
        let query = Query::routed(SELECT_ALL, router.routing_hint(1).unwrap());
        assert!(session.execute(&query).await.is_ok());
    }

    #[tokio::test]
    async fn test_memory_cache() {
        let cache = MemoryCache::new();
        assert_eq!(cache.get("alice").await.unwrap(), None);
        cache.put("alice", "v1".to_string()).await.unwrap();
        cache.put("alice", "v2".to_string()).await.unwrap();
        assert_eq!(cache.get("alice").await.unwrap().as_deref(), Some("v2"));
        assert_eq!(cache.size().await.unwrap(), 1);

        cache.set_online(false);
        assert!(cache.get("alice").await.is_err());
        assert!(cache.size().await.is_err());
    }
}
