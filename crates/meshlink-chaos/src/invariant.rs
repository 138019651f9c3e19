//! Invariant checks run after every chaos step (§8 universal invariants).

use std::collections::HashSet;

use meshlink_sim::ClusterSimulator;

/// A correctness property checked against the simulator's current state.
///
/// Implementations must be side-effect free — checking must never mutate
/// the cluster, only observe it.
pub trait Invariant: Send + Sync {
    /// Stable name used in violation reports.
    fn name(&self) -> &'static str;

    /// Returns `Err(message)` describing the violation, or `Ok(())`.
    async fn check(&self, sim: &ClusterSimulator) -> Result<(), String>;
}

/// Every node id in the cluster is distinct.
pub struct NodeIdsUnique;

impl Invariant for NodeIdsUnique {
    fn name(&self) -> &'static str {
        "node_ids_unique"
    }

    async fn check(&self, sim: &ClusterSimulator) -> Result<(), String> {
        let ids = sim.node_ids();
        let unique: HashSet<_> = ids.iter().collect();
        if unique.len() == ids.len() {
            Ok(())
        } else {
            Err(format!("duplicate node id among {ids:?}"))
        }
    }
}

/// Every live node's machine snapshot can be read without error.
pub struct SnapshotsReadable;

impl Invariant for SnapshotsReadable {
    fn name(&self) -> &'static str {
        "snapshots_readable"
    }

    async fn check(&self, sim: &ClusterSimulator) -> Result<(), String> {
        for id in sim.node_ids() {
            if sim.is_killed(&id) {
                continue;
            }
            if let Err(err) = sim.node(id.clone()).list_machine_rows().await {
                return Err(format!("node {id} snapshot unreadable: {err}"));
            }
        }
        Ok(())
    }
}

/// Every machine row observed anywhere carries a version `>= 1` (§8).
pub struct MachineVersionsPositive;

impl Invariant for MachineVersionsPositive {
    fn name(&self) -> &'static str {
        "machine_versions_positive"
    }

    async fn check(&self, sim: &ClusterSimulator) -> Result<(), String> {
        for id in sim.node_ids() {
            if sim.is_killed(&id) {
                continue;
            }
            let rows = sim
                .node(id.clone())
                .list_machine_rows()
                .await
                .map_err(|err| format!("node {id} unreadable while checking versions: {err}"))?;
            for row in rows {
                if row.version.is_none() {
                    return Err(format!(
                        "machine row {} on node {id} has version 0",
                        row.id
                    ));
                }
            }
        }
        Ok(())
    }
}

/// The default invariant set run by [`crate::run_chaos`].
pub fn default_invariants() -> Vec<Box<dyn Invariant>> {
    vec![
        Box::new(NodeIdsUnique),
        Box::new(SnapshotsReadable),
        Box::new(MachineVersionsPositive),
    ]
}

#[cfg(test)]
mod tests {
    use meshlink_types::NodeId;

    use super::*;

    #[tokio::test]
    async fn node_ids_unique_passes_on_a_fresh_cluster() {
        let sim = ClusterSimulator::new(1);
        sim.add_node(NodeId::new("a"));
        sim.add_node(NodeId::new("b"));
        assert!(NodeIdsUnique.check(&sim).await.is_ok());
    }

    #[tokio::test]
    async fn snapshots_readable_skips_killed_nodes() {
        let sim = ClusterSimulator::new(1);
        let a = NodeId::new("a");
        sim.add_node(a.clone());
        sim.kill(&a);
        assert!(SnapshotsReadable.check(&sim).await.is_ok());
    }

    #[tokio::test]
    async fn machine_versions_positive_holds_after_upsert() {
        use base64::Engine as _;
        use meshlink_registry::Registry;
        use meshlink_types::{MachineRow, PublicKey, Version};

        let sim = ClusterSimulator::new(1);
        let a = NodeId::new("a");
        sim.add_node(a.clone());
        let encoded = base64::engine::general_purpose::STANDARD.encode([7u8; 32]);
        let row = MachineRow {
            id: NodeId::new("m1"),
            public_key: PublicKey::parse(encoded).unwrap(),
            subnet: "10.210.0.0/24".parse().unwrap(),
            endpoint: None,
            updated_at: chrono::Utc::now(),
            version: Version::NONE,
        };
        sim.node(a).upsert_machine(row, Version::NONE).await.unwrap();
        assert!(MachineVersionsPositive.check(&sim).await.is_ok());
    }
}
