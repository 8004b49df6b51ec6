//! Persistent backends backed by redb.
//!
//! [`RedbSession`] keeps one database file per shard (`shard-<i>.redb`)
//! under a data directory; each file holds the `person` table with
//! bincode-encoded rows keyed by login. [`RedbCache`] keeps payload strings
//! in a single database file. All writes are synchronous (write txn +
//! commit).

use crate::cache::{CacheClient, CacheError};
use crate::dialect::{self, Command};
use crate::session::{Query, RelationalSession, Row, RowSet, SessionError};
use async_trait::async_trait;
use redb::{Database, ReadableTable, ReadableTableMetadata, TableDefinition, TableHandle};
use shardcache_common::Person;
use std::path::Path;
use tracing::{debug, error};

/// Rows of the `Person` table, keyed by login
const PERSON: TableDefinition<&str, &[u8]> = TableDefinition::new("person");

/// Cached payloads, keyed by login
const CACHE_ENTRIES: TableDefinition<&str, &str> = TableDefinition::new("cache_entries");

/// Error type for redb-backed operations
#[derive(Debug, thiserror::Error)]
pub enum RedbBackendError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::DatabaseError),
    #[error("redb storage error: {0}")]
    Storage(#[from] redb::StorageError),
    #[error("redb table error: {0}")]
    Table(#[from] redb::TableError),
    #[error("redb transaction error: {0}")]
    Transaction(Box<redb::TransactionError>),
    #[error("redb commit error: {0}")]
    Commit(#[from] redb::CommitError),
    #[error("bincode error: {0}")]
    Bincode(#[from] bincode::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("table '{}' doesn't exist", dialect::TABLE)]
    MissingTable,
    #[error("duplicate entry '{0}'")]
    Duplicate(String),
}

impl From<redb::TransactionError> for RedbBackendError {
    fn from(e: redb::TransactionError) -> Self {
        Self::Transaction(Box::new(e))
    }
}

impl From<RedbBackendError> for SessionError {
    fn from(e: RedbBackendError) -> Self {
        match e {
            RedbBackendError::Duplicate(login) => Self::DuplicateKey(login),
            RedbBackendError::MissingTable | RedbBackendError::Bincode(_) => {
                Self::Statement(e.to_string())
            }
            RedbBackendError::Table(redb::TableError::TableDoesNotExist(_)) => {
                Self::Statement(RedbBackendError::MissingTable.to_string())
            }
            other => Self::Connection(other.to_string()),
        }
    }
}

impl From<RedbBackendError> for CacheError {
    fn from(e: RedbBackendError) -> Self {
        Self::Unavailable(e.to_string())
    }
}

pub type RedbBackendResult<T> = Result<T, RedbBackendError>;

/// Sharded relational session backed by one redb file per shard
pub struct RedbSession {
    shards: Vec<Database>,
}

impl RedbSession {
    /// Open (or create) `shards` shard files under `dir`.
    ///
    /// The `person` table is not created here; run the schema statements
    /// first, as against any relational store.
    pub fn open(dir: impl AsRef<Path>, shards: usize) -> RedbBackendResult<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let shards = (0..shards)
            .map(|i| Database::create(dir.join(format!("shard-{i}.redb"))))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { shards })
    }

    fn run(&self, db: &Database, command: Command) -> RedbBackendResult<RowSet> {
        match command {
            Command::DropTable => {
                let write_txn = db.begin_write()?;
                write_txn.delete_table(PERSON)?;
                write_txn.commit()?;
                Ok(RowSet::empty())
            }
            Command::CreateTable => {
                let write_txn = db.begin_write()?;
                {
                    let _t = write_txn.open_table(PERSON)?;
                }
                write_txn.commit()?;
                Ok(RowSet::empty())
            }
            Command::Insert(person) => {
                let bytes = bincode::serialize(&person)?;
                let write_txn = db.begin_write()?;
                // open_table would silently create the table
                let exists = write_txn
                    .list_tables()?
                    .any(|t| t.name() == PERSON.name());
                if !exists {
                    return Err(RedbBackendError::MissingTable);
                }
                {
                    let mut table = write_txn.open_table(PERSON)?;
                    // Drop the read guard before mutating
                    let duplicate = table.get(person.login.as_str())?.is_some();
                    if duplicate {
                        return Err(RedbBackendError::Duplicate(person.login));
                    }
                    table.insert(person.login.as_str(), bytes.as_slice())?;
                }
                write_txn.commit()?;
                Ok(RowSet::empty())
            }
            Command::SelectByLogin(login) => {
                let read_txn = db.begin_read()?;
                let table = read_txn.open_table(PERSON)?;
                let rows = match table.get(login.as_str())? {
                    Some(val) => vec![decode_row(val.value())?],
                    None => Vec::new(),
                };
                Ok(RowSet::new(rows))
            }
            Command::SelectByName { first, last } => {
                scan(db, |p| dialect::name_matches(&first, &last, p))
            }
            Command::SelectAll => scan(db, |_| true),
        }
    }
}

fn decode_row(bytes: &[u8]) -> RedbBackendResult<Row> {
    let person: Person = bincode::deserialize(bytes)?;
    Ok(dialect::person_row(&person))
}

fn scan(db: &Database, filter: impl Fn(&Person) -> bool) -> RedbBackendResult<RowSet> {
    let read_txn = db.begin_read()?;
    let table = read_txn.open_table(PERSON)?;
    let mut rows = Vec::new();
    for entry in table.iter()? {
        let entry = entry?;
        let person: Person = bincode::deserialize(entry.1.value())?;
        if filter(&person) {
            rows.push(dialect::person_row(&person));
        }
    }
    Ok(RowSet::new(rows))
}

#[async_trait]
impl RelationalSession for RedbSession {
    fn shard_count(&self) -> usize {
        self.shards.len()
    }

    async fn execute(&self, query: &Query) -> Result<RowSet, SessionError> {
        let routed = dialect::parse(query, self.shards.len())?;
        debug!(shard = routed.shard, command = ?routed.command, "redb session");
        self.run(&self.shards[routed.shard], routed.command)
            .map_err(|e| {
                if !matches!(e, RedbBackendError::Duplicate(_)) {
                    error!("redb shard {} failed: {}", routed.shard, e);
                }
                e.into()
            })
    }
}

/// Cache backed by a single redb file
pub struct RedbCache {
    db: Database,
}

impl RedbCache {
    /// Open (or create) the cache database at the given path.
    pub fn open(path: impl AsRef<Path>) -> RedbBackendResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;

        // Create the table eagerly so later read txns don't fail
        let write_txn = db.begin_write()?;
        {
            let _t = write_txn.open_table(CACHE_ENTRIES)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    fn get_entry(&self, key: &str) -> RedbBackendResult<Option<String>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(CACHE_ENTRIES)?;
        Ok(table.get(key)?.map(|v| v.value().to_string()))
    }

    fn put_entry(&self, key: &str, value: &str) -> RedbBackendResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(CACHE_ENTRIES)?;
            table.insert(key, value)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn entry_count(&self) -> RedbBackendResult<u64> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(CACHE_ENTRIES)?;
        Ok(table.len()?)
    }
}

#[async_trait]
impl CacheClient for RedbCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.get_entry(key)?)
    }

    async fn put(&self, key: &str, value: String) -> Result<(), CacheError> {
        Ok(self.put_entry(key, &value)?)
    }

    async fn size(&self) -> Result<u64, CacheError> {
        Ok(self.entry_count()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{
        CREATE_TABLE, DROP_TABLE, INSERT, SELECT_ALL, SELECT_BY_LOGIN, SELECT_BY_NAME,
    };
    use crate::session::Value;
    use shardcache_placement::ShardRouter;
    use tempfile::tempdir;

    fn insert_query(router: &ShardRouter, person: &Person) -> Query {
        Query::routed(INSERT, router.hint_for(&person.login))
            .bind(person.login.as_str())
            .bind(person.first_name.as_str())
            .bind(person.last_name.as_str())
            .bind(person.age)
    }

    async fn create_tables(session: &RedbSession, router: &ShardRouter) {
        for hint in router.all_routing_hints() {
            session
                .execute(&Query::routed(CREATE_TABLE, *hint))
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_rows_persist_across_reopen() {
        let dir = tempdir().unwrap();
        let router = ShardRouter::new(2).unwrap();
        let alice = Person::new("alice", "Alice", "Smith", 30);

        {
            let session = RedbSession::open(dir.path(), 2).unwrap();
            create_tables(&session, &router).await;
            session.execute(&insert_query(&router, &alice)).await.unwrap();
        }

        assert!(dir.path().join("shard-0.redb").exists());
        assert!(dir.path().join("shard-1.redb").exists());

        let session = RedbSession::open(dir.path(), 2).unwrap();
        let query = Query::routed(SELECT_BY_LOGIN, router.hint_for("alice")).bind("alice");
        let rows = session.execute(&query).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(dialect::person_from_row(&rows.into_rows()[0]).unwrap(), alice);

        // alice lives on shard 1 only
        let query = Query::routed(SELECT_ALL, router.routing_hint(0).unwrap());
        assert!(session.execute(&query).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_statements_before_create_fail() {
        let dir = tempdir().unwrap();
        let router = ShardRouter::new(2).unwrap();
        let session = RedbSession::open(dir.path(), 2).unwrap();

        let alice = Person::new("alice", "Alice", "Smith", 30);
        assert!(matches!(
            session.execute(&insert_query(&router, &alice)).await,
            Err(SessionError::Statement(_))
        ));
        let query = Query::routed(SELECT_ALL, router.routing_hint(0).unwrap());
        assert!(matches!(
            session.execute(&query).await,
            Err(SessionError::Statement(_))
        ));
    }

    #[tokio::test]
    async fn test_duplicate_and_drop() {
        let dir = tempdir().unwrap();
        let router = ShardRouter::new(2).unwrap();
        let session = RedbSession::open(dir.path(), 2).unwrap();
        create_tables(&session, &router).await;

        let alice = Person::new("alice", "Alice", "Smith", 30);
        session.execute(&insert_query(&router, &alice)).await.unwrap();
        assert!(matches!(
            session.execute(&insert_query(&router, &alice)).await,
            Err(SessionError::DuplicateKey(login)) if login == "alice"
        ));

        // Drop + create leaves an empty table
        let hint = router.hint_for("alice");
        session.execute(&Query::routed(DROP_TABLE, hint)).await.unwrap();
        session.execute(&Query::routed(CREATE_TABLE, hint)).await.unwrap();
        session.execute(&insert_query(&router, &alice)).await.unwrap();
    }

    #[tokio::test]
    async fn test_select_by_name() {
        let dir = tempdir().unwrap();
        let router = ShardRouter::new(2).unwrap();
        let session = RedbSession::open(dir.path(), 2).unwrap();
        create_tables(&session, &router).await;

        for person in [
            Person::new("alice", "Alice", "Smith", 30),
            Person::new("albert", "Albert", "Jones", 52),
            Person::new("bob", "Bob", "Smith", 25),
        ] {
            session.execute(&insert_query(&router, &person)).await.unwrap();
        }

        // alice, albert and bob all route to shard 1
        let query = Query::routed(SELECT_BY_NAME, router.routing_hint(1).unwrap())
            .bind("Al%")
            .bind("Sm%");
        let rows = session.execute(&query).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows.first().unwrap()[0], Value::Text("alice".into()));
    }

    #[tokio::test]
    async fn test_redb_cache() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache").join("cache.redb");
        {
            let cache = RedbCache::open(&path).unwrap();
            assert_eq!(cache.get("alice").await.unwrap(), None);
            assert_eq!(cache.size().await.unwrap(), 0);
            cache.put("alice", "v1".to_string()).await.unwrap();
            cache.put("alice", "v2".to_string()).await.unwrap();
        }

        let cache = RedbCache::open(&path).unwrap();
        assert_eq!(cache.get("alice").await.unwrap().as_deref(), Some("v2"));
        assert_eq!(cache.size().await.unwrap(), 1);
    }
}
