//! Subscription change events and the pure delta-application rule (§4.3).

use serde::{Deserialize, Serialize};

use crate::ids::NodeId;
use crate::network::PublicKey;
use crate::rows::MachineRow;

/// An event delivered on a machine/heartbeat subscription stream.
///
/// `Resync` tells the consumer that delta continuity is broken (e.g. the
/// subscriber's buffer overflowed) and it must re-list rather than trust
/// further deltas until it does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Change<T> {
    Added(T),
    Updated(T),
    Deleted(DeletedRef),
    Resync,
}

/// Identifies the row to remove on a `Deleted` change. A delete may arrive
/// keyed by id, by public key (e.g. `DeleteByEndpointExceptID`'s cleanup),
/// or both.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeletedRef {
    pub id: Option<NodeId>,
    pub public_key: Option<PublicKey>,
}

impl DeletedRef {
    pub fn by_id(id: NodeId) -> Self {
        Self {
            id: Some(id),
            public_key: None,
        }
    }

    fn matches(&self, row: &MachineRow) -> bool {
        let id_match = self.id.as_ref().is_some_and(|id| *id == row.id);
        let key_match = self
            .public_key
            .as_ref()
            .is_some_and(|key| *key == row.public_key);
        id_match || key_match
    }
}

/// Applies one [`Change<MachineRow>`] to a snapshot, per the rule in §4.3:
/// `Added`/`Updated` replace-or-append by id, `Deleted` removes rows
/// matching either the id or the public key carried on the change, and
/// `Resync` discards everything (the caller is expected to re-list next).
///
/// Pure over the slice: re-applying the same change to its own result is a
/// no-op on the set of ids present, which is exercised as a proptest
/// property in the registry crate.
pub fn apply_delta(mut rows: Vec<MachineRow>, change: &Change<MachineRow>) -> Vec<MachineRow> {
    match change {
        Change::Added(row) | Change::Updated(row) => {
            if let Some(existing) = rows.iter_mut().find(|r| r.id == row.id) {
                *existing = row.clone();
            } else {
                rows.push(row.clone());
            }
            rows
        }
        Change::Deleted(reference) => {
            rows.retain(|row| !reference.matches(row));
            rows
        }
        Change::Resync => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::Version;
    use base64::Engine as _;
    use chrono::Utc;

    fn row(id: &str, key_byte: u8) -> MachineRow {
        let encoded = base64::engine::general_purpose::STANDARD.encode([key_byte; 32]);
        MachineRow {
            id: NodeId::new(id),
            public_key: PublicKey::parse(encoded).unwrap(),
            subnet: "10.210.0.0/24".parse().unwrap(),
            endpoint: None,
            updated_at: Utc::now(),
            version: Version::INITIAL,
        }
    }

    #[test]
    fn add_then_delete_by_id_returns_to_original_length() {
        let start = vec![row("a", 1)];
        let added = apply_delta(start.clone(), &Change::Added(row("b", 2)));
        assert_eq!(added.len(), 2);
        let deleted = apply_delta(added, &Change::Deleted(DeletedRef::by_id(NodeId::new("b"))));
        assert_eq!(deleted.len(), start.len());
    }

    #[test]
    fn adding_same_id_twice_yields_one_entry() {
        let rows = apply_delta(Vec::new(), &Change::Added(row("a", 1)));
        let rows = apply_delta(rows, &Change::Added(row("a", 1)));
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn resync_discards_everything() {
        let rows = vec![row("a", 1), row("b", 2)];
        assert!(apply_delta(rows, &Change::Resync).is_empty());
    }

    #[test]
    fn idempotent_reapplication_preserves_id_set() {
        let rows = vec![row("a", 1)];
        let change = Change::Updated(row("a", 1));
        let once = apply_delta(rows, &change);
        let twice = apply_delta(once.clone(), &change);
        let ids_once: Vec<_> = once.iter().map(|r| r.id.clone()).collect();
        let ids_twice: Vec<_> = twice.iter().map(|r| r.id.clone()).collect();
        assert_eq!(ids_once, ids_twice);
    }
}
