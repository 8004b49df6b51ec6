//! ShardCache Common - Shared types and utilities
//!
//! This crate provides the record type, error definitions and
//! configuration used across all ShardCache components.

pub mod config;
pub mod error;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use types::*;
