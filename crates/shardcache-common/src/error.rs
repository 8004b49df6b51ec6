//! Error types for ShardCache
//!
//! Every collaborator failure is translated into one of these variants at
//! the boundary where it is observed. Nothing in the core retries or
//! converts an error into an empty value.

use thiserror::Error;

/// Common result type for ShardCache operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for ShardCache
#[derive(Debug, Error)]
pub enum Error {
    // Relational store errors
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("constraint violation: duplicate login '{login}'")]
    ConstraintViolation { login: String },

    #[error("not found: {0}")]
    NotFound(String),

    // Cache errors
    #[error("cache unavailable: {0}")]
    CacheUnavailable(String),

    #[error("malformed record: {0}")]
    MalformedRecord(String),

    // Topology errors
    #[error("routing config mismatch: {0}")]
    RoutingConfigMismatch(String),

    // Caller and process errors
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Create a store unavailable error
    pub fn store_unavailable(msg: impl Into<String>) -> Self {
        Self::StoreUnavailable(msg.into())
    }

    /// Create a not found error for the given login
    pub fn not_found(login: impl Into<String>) -> Self {
        Self::NotFound(login.into())
    }

    /// Create a malformed record error
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedRecord(msg.into())
    }

    /// Create an invalid argument error
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Shard-count disagreement between the router and a store topology
    pub fn routing_mismatch(router_shards: usize, store_shards: usize) -> Self {
        Self::RoutingConfigMismatch(format!(
            "router is configured for {router_shards} shards, store reports {store_shards}"
        ))
    }

    /// Check if this is a not found error
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Check if a caller may reasonably retry the operation.
    ///
    /// Purely informational: no ShardCache component retries on its own.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_) | Self::CacheUnavailable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_retryable() {
        assert!(Error::store_unavailable("connection refused").is_retryable());
        assert!(Error::CacheUnavailable("timeout".into()).is_retryable());
        assert!(!Error::not_found("alice").is_retryable());
        assert!(
            !Error::ConstraintViolation {
                login: "alice".into()
            }
            .is_retryable()
        );
    }

    #[test]
    fn test_error_not_found() {
        assert!(Error::not_found("alice").is_not_found());
        assert!(!Error::malformed("missing field `age`").is_not_found());
    }

    #[test]
    fn test_routing_mismatch_message() {
        let err = Error::routing_mismatch(2, 3);
        assert_eq!(
            err.to_string(),
            "routing config mismatch: router is configured for 2 shards, store reports 3"
        );
    }
}
