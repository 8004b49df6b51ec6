//! Core record type for ShardCache

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// The single record type held by the store.
///
/// `login` is the sharding key and the cache key. It is assigned once at
/// creation and must be unique across all shards combined.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Person {
    pub login: String,
    pub first_name: String,
    pub last_name: String,
    pub age: i64,
}

impl Person {
    /// Create a new record
    pub fn new(
        login: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        age: i64,
    ) -> Self {
        Self {
            login: login.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            age,
        }
    }

    /// Check the record-level invariants.
    pub fn validate(&self) -> Result<()> {
        if self.login.is_empty() {
            return Err(Error::invalid_argument("login must not be empty"));
        }
        Ok(())
    }
}

impl std::fmt::Display for Person {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({} {}, {})",
            self.login, self.first_name, self.last_name, self.age
        )
    }
}
