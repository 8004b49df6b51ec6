//! Routing hints
//!
//! A routing hint is a SQL comment appended to a statement, e.g.
//! `SELECT ... WHERE login = ? -- sharding:1`. The sharding layer in front
//! of the relational store reads it to pick the physical shard.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Literal that introduces a routing hint
pub const HINT_PREFIX: &str = "-- sharding:";

/// Token selecting one shard
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoutingHint(usize);

impl RoutingHint {
    pub(crate) const fn new(shard: usize) -> Self {
        Self(shard)
    }

    /// Shard index this hint selects
    #[must_use]
    pub const fn shard(&self) -> usize {
        self.0
    }

    /// Parse a rendered hint (`-- sharding:<n>`).
    pub fn parse(s: &str) -> Option<Self> {
        s.trim()
            .strip_prefix(HINT_PREFIX)
            .and_then(|index| index.trim().parse().ok())
            .map(Self)
    }

    /// Append this hint to a statement
    #[must_use]
    pub fn apply(&self, statement: &str) -> String {
        format!("{statement} {self}")
    }
}

impl fmt::Display for RoutingHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{HINT_PREFIX}{}", self.0)
    }
}

/// Split a routed statement into its base text and its hint.
///
/// Returns the statement unchanged and `None` when no hint is present.
/// A trailing fragment that starts like a hint but does not parse is left in
/// the base text, so a malformed hint is never mistaken for shard 0.
pub fn split_routed(text: &str) -> (&str, Option<RoutingHint>) {
    match text.rfind(HINT_PREFIX) {
        Some(pos) => match RoutingHint::parse(&text[pos..]) {
            Some(hint) => (text[..pos].trim_end(), Some(hint)),
            None => (text, None),
        },
        None => (text, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_and_parse() {
        let hint = RoutingHint::new(1);
        assert_eq!(hint.to_string(), "-- sharding:1");
        assert_eq!(RoutingHint::parse("-- sharding:1"), Some(hint));
        assert_eq!(RoutingHint::parse("  -- sharding: 7 "), Some(RoutingHint::new(7)));
        assert_eq!(RoutingHint::parse("-- sharding:x"), None);
        assert_eq!(RoutingHint::parse("sharding:1"), None);
    }

    #[test]
    fn test_apply_and_split() {
        let hint = RoutingHint::new(0);
        let routed = hint.apply("SELECT 1");
        assert_eq!(routed, "SELECT 1 -- sharding:0");
        assert_eq!(split_routed(&routed), ("SELECT 1", Some(hint)));
    }

    #[test]
    fn test_split_without_hint() {
        assert_eq!(split_routed("SELECT 1"), ("SELECT 1", None));
        assert_eq!(
            split_routed("SELECT 1 -- sharding:"),
            ("SELECT 1 -- sharding:", None)
        );
    }
}
