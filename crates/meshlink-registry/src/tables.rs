//! Pure in-memory table logic shared by [`crate::LocalRegistry`] and the
//! per-node tables inside the cluster simulator. No locking, no I/O — the
//! owning type decides how to synchronize access.

use chrono::{DateTime, Utc};
use ipnet::Ipv4Net;
use meshlink_types::{HeartbeatRow, MachineRow, NodeId, Version};

use crate::error::{RegistryError, Result};

/// The canonical machine-row table for one replica.
#[derive(Debug, Default, Clone)]
pub struct MachineTable {
    rows: Vec<MachineRow>,
}

impl MachineTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// CAS semantics from §4.1: `expected_version == NONE` requires the
    /// row to be absent and inserts at `Version::INITIAL`; otherwise the
    /// stored version must equal `expected_version` and the row is
    /// replaced at `version.next()`.
    pub fn upsert(&mut self, mut row: MachineRow, expected_version: Version) -> Result<Version> {
        match self.rows.iter().position(|r| r.id == row.id) {
            None => {
                if !expected_version.is_none() {
                    return Err(RegistryError::Conflict {
                        expected: expected_version,
                        found: Version::NONE,
                    });
                }
                row.version = Version::INITIAL;
                self.rows.push(row);
                Ok(Version::INITIAL)
            }
            Some(idx) => {
                let current = self.rows[idx].version;
                if current != expected_version {
                    return Err(RegistryError::Conflict {
                        expected: expected_version,
                        found: current,
                    });
                }
                row.version = current.next();
                self.rows[idx] = row;
                Ok(current.next())
            }
        }
    }

    /// Inserts or replaces a row exactly as given, without CAS — used by
    /// remote delivery and anti-entropy merges, which carry an
    /// already-accepted version.
    pub fn apply_remote(&mut self, row: MachineRow) {
        match self.rows.iter().position(|r| r.id == row.id) {
            Some(idx) => self.rows[idx] = row,
            None => self.rows.push(row),
        }
    }

    pub fn delete(&mut self, id: &NodeId) {
        self.rows.retain(|r| &r.id != id);
    }

    /// Keeps only rows matching `predicate`, e.g. anti-entropy's "delete
    /// local rows no reachable peer retains" step (§4.8).
    pub fn retain(&mut self, predicate: impl FnMut(&MachineRow) -> bool) {
        self.rows.retain(predicate);
    }

    /// Copies `row` in only if no local row shares its id, or the local
    /// row's version is older — the anti-entropy merge rule from §4.8,
    /// as distinct from [`MachineTable::apply_remote`]'s unconditional
    /// replace (used for already-ordered delivery, not merging).
    pub fn merge_if_newer(&mut self, row: MachineRow) {
        match self.rows.iter().position(|r| r.id == row.id) {
            Some(idx) if self.rows[idx].version < row.version => self.rows[idx] = row,
            Some(_) => {}
            None => self.rows.push(row),
        }
    }

    pub fn delete_by_endpoint_except_id(&mut self, endpoint: &str, keep_id: &NodeId) {
        self.rows
            .retain(|r| &r.id == keep_id || r.endpoint.as_deref() != Some(endpoint));
    }

    pub fn get(&self, id: &NodeId) -> Option<&MachineRow> {
        self.rows.iter().find(|r| &r.id == id)
    }

    /// Point-in-time view sorted by id, per §4.1.
    pub fn list(&self) -> Vec<MachineRow> {
        let mut out = self.rows.clone();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        out
    }
}

/// The canonical heartbeat table for one replica: at most one row per
/// `NodeID`, sequence numbers strictly increasing on the writer.
#[derive(Debug, Default, Clone)]
pub struct HeartbeatTable {
    rows: std::collections::HashMap<NodeId, HeartbeatRow>,
}

impl HeartbeatTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increments `Seq` for `node_id` and writes `updated_at` verbatim,
    /// returning the new sequence.
    pub fn bump(&mut self, node_id: &NodeId, updated_at: DateTime<Utc>) -> u64 {
        let row = self
            .rows
            .entry(node_id.clone())
            .or_insert_with(|| HeartbeatRow {
                node_id: node_id.clone(),
                seq: 0,
                updated_at,
            });
        row.seq += 1;
        row.updated_at = updated_at;
        row.seq
    }

    /// Merges a remote row by keeping the higher `Seq`, per the
    /// anti-entropy rule in §4.8.
    pub fn merge_max_seq(&mut self, row: HeartbeatRow) {
        match self.rows.get(&row.node_id) {
            Some(existing) if existing.seq >= row.seq => {}
            _ => {
                self.rows.insert(row.node_id.clone(), row);
            }
        }
    }

    pub fn remove(&mut self, node_id: &NodeId) {
        self.rows.remove(node_id);
    }

    pub fn get(&self, node_id: &NodeId) -> Option<&HeartbeatRow> {
        self.rows.get(node_id)
    }

    pub fn list(&self) -> Vec<HeartbeatRow> {
        let mut out: Vec<_> = self.rows.values().cloned().collect();
        out.sort_by(|a, b| a.node_id.cmp(&b.node_id));
        out
    }
}

/// The single network-CIDR cell, first-writer-wins across the cluster.
#[derive(Debug, Default, Clone, Copy)]
pub struct NetworkCidrCell {
    installed: Option<Ipv4Net>,
}

impl NetworkCidrCell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs the CIDR on first call and returns it on every later
    /// call regardless of the arguments passed, per the first-writer-wins
    /// rule in §4.1. Preference order on first write: `requested`, then
    /// `fallback`, then `default`.
    pub fn ensure(
        &mut self,
        requested: Option<Ipv4Net>,
        fallback: Option<Ipv4Net>,
        default: Ipv4Net,
    ) -> Ipv4Net {
        *self
            .installed
            .get_or_insert_with(|| requested.or(fallback).unwrap_or(default))
    }

    pub fn get(&self) -> Option<Ipv4Net> {
        self.installed
    }
}
