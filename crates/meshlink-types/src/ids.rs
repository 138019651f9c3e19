//! Identifiers shared across the replicated data model.

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

/// Opaque identifier for a cluster member.
///
/// In production this is the node's WireGuard public key (base64), but the
/// replicated tables never assume that — it is treated as an opaque stable
/// string chosen at first write.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if this id is the empty string — used to represent "no
    /// owner" on a [`crate::DeploymentRow`] without an `Option` at the wire
    /// layer, matching the teacher's CAS-on-string-sentinel style.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for NodeId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<NodeId> for String {
    fn from(value: NodeId) -> Self {
        value.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self(String::new())
    }
}

/// Monotonic per-row version used for optimistic concurrency control.
///
/// `Version(0)` means "row does not exist yet" and is only ever valid as an
/// `expected_version` argument to [`crate::CasVersion::matches`], never as a
/// stored value — every row that has been written at least once carries
/// `Version >= 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct Version(u64);

impl Version {
    /// The version recorded on a row's first successful write.
    pub const INITIAL: Version = Version(1);

    /// The sentinel passed by a caller that believes the row does not exist.
    pub const NONE: Version = Version(0);

    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }

    pub fn is_none(self) -> bool {
        self.0 == 0
    }

    /// Returns the next version after a successful CAS write.
    pub fn next(self) -> Self {
        Version(self.0.saturating_add(1))
    }
}

impl Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

impl From<u64> for Version {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<Version> for u64 {
    fn from(value: Version) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_next_increments() {
        assert_eq!(Version::INITIAL.next(), Version::new(2));
    }

    #[test]
    fn node_id_empty_sentinel() {
        assert!(NodeId::default().is_empty());
        assert!(!NodeId::new("node-a").is_empty());
    }
}
