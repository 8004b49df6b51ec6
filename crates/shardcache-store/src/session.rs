//! Relational store session interface
//!
//! The store is reached through textual statements with positional
//! parameters. Routed statements carry a trailing routing hint that the
//! store's sharding layer consumes; the session treats the text as opaque.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shardcache_common::Error;
use shardcache_placement::RoutingHint;

/// A bound parameter or a result column
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Int(i64),
    Text(String),
}

impl Value {
    /// Borrow the text payload, if this is a text value
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Integer payload, if this is an integer value
    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

/// One result row, columns in select-list order
pub type Row = Vec<Value>;

/// Rows returned by a statement
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RowSet {
    rows: Vec<Row>,
}

impl RowSet {
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    /// Result of a statement that returns no rows
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn first(&self) -> Option<&Row> {
        self.rows.first()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Row> {
        self.rows.iter()
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }
}

impl IntoIterator for RowSet {
    type Item = Row;
    type IntoIter = std::vec::IntoIter<Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

/// A statement plus its bound parameters
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Query {
    text: String,
    params: Vec<Value>,
}

impl Query {
    /// Unrouted statement
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            params: Vec::new(),
        }
    }

    /// Statement directed at the shard selected by `hint`
    pub fn routed(statement: &str, hint: RoutingHint) -> Self {
        Self::new(hint.apply(statement))
    }

    /// Bind the next positional parameter
    #[must_use]
    pub fn bind(mut self, value: impl Into<Value>) -> Self {
        self.params.push(value.into());
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }
}

/// Failures reported by a session implementation
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("duplicate entry '{0}' for primary key")]
    DuplicateKey(String),

    #[error("statement failed: {0}")]
    Statement(String),

    #[error("shard {shard} is not part of the {shards}-shard topology")]
    UnknownShard { shard: usize, shards: usize },
}

impl From<SessionError> for Error {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::DuplicateKey(login) => Self::ConstraintViolation { login },
            SessionError::UnknownShard { .. } => Self::RoutingConfigMismatch(e.to_string()),
            SessionError::Connection(_) | SessionError::Statement(_) => {
                Self::StoreUnavailable(e.to_string())
            }
        }
    }
}

/// Connection to the sharded relational store.
///
/// Implementations must be safe to share between concurrent callers.
#[async_trait]
pub trait RelationalSession: Send + Sync {
    /// Number of shards behind this session
    fn shard_count(&self) -> usize;

    /// Execute one statement and return its rows
    async fn execute(&self, query: &Query) -> Result<RowSet, SessionError>;
}
