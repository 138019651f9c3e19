//! The cluster simulator (§4.8): a multi-node `Registry` with
//! programmable link latency, drop, asymmetric block, kill/restart and
//! anti-entropy merge. Exists so the reconciliation engine's convergence
//! behavior is specified deterministically and testably (§8).

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ipnet::Ipv4Net;
use meshlink_registry::{MachineTable, NetworkCidrCell, Registry, RegistryError, Result};
use meshlink_types::{Change, DeletedRef, HeartbeatRow, MachineRow, NodeId, Version};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::fault::FaultInjector;
use crate::link::LinkConfig;
use crate::node::NodeLocal;

/// One write fanned out from its origin node to every other node.
#[derive(Clone)]
enum ReplicatedOp {
    UpsertMachine(MachineRow),
    DeleteMachine(NodeId),
    DeleteByEndpointExceptId { endpoint: String, keep_id: NodeId },
    Heartbeat(HeartbeatRow),
}

#[derive(Clone, Copy)]
enum PendingKind {
    /// Deferred by a `LinkConfig::gate` predicate; re-evaluated in full on
    /// the next `tick()`/`drain()` rather than delivered on a timer.
    GateRetry,
    /// Deferred by `LinkConfig::latency`; delivered once `elapsed` passes
    /// `deliver_at`.
    TimedAt(Duration),
}

struct DelayedWrite {
    from: NodeId,
    to: NodeId,
    op: ReplicatedOp,
    kind: PendingKind,
}

struct SimState {
    nodes: HashMap<NodeId, NodeLocal>,
    links: HashMap<(NodeId, NodeId), LinkConfig>,
    blocked: HashSet<(NodeId, NodeId)>,
    killed: HashSet<NodeId>,
    pending: Vec<DelayedWrite>,
    rng: StdRng,
    elapsed: Duration,
    cidr: NetworkCidrCell,
}

/// The in-memory multi-node registry (§4.8). Cheap to clone — every clone
/// shares the same underlying state behind one mutex, mirroring
/// `LocalRegistry`'s `Arc<Mutex<Inner>>` shape.
#[derive(Clone)]
pub struct ClusterSimulator {
    state: Arc<Mutex<SimState>>,
    faults: Arc<FaultInjector>,
}

impl ClusterSimulator {
    /// Builds an empty cluster with no nodes. `seed` drives the drop-rate
    /// RNG; the same seed yields the same sequence of drop decisions.
    pub fn new(seed: u64) -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState {
                nodes: HashMap::new(),
                links: HashMap::new(),
                blocked: HashSet::new(),
                killed: HashSet::new(),
                pending: Vec::new(),
                rng: StdRng::seed_from_u64(seed),
                elapsed: Duration::ZERO,
                cidr: NetworkCidrCell::new(),
            })),
            faults: Arc::new(FaultInjector::new()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SimState> {
        self.state.lock().expect("cluster simulator mutex poisoned")
    }

    /// The shared fault injector (§9): decorate any of this cluster's
    /// registry operations by name (`"upsert_machine"`,
    /// `"subscribe_machines"`, ...) with `fail_once`/`fail_always`/
    /// `set_hook`.
    pub fn faults(&self) -> Arc<FaultInjector> {
        self.faults.clone()
    }

    pub fn add_node(&self, id: NodeId) {
        self.lock().nodes.entry(id).or_default();
    }

    pub fn remove_node(&self, id: &NodeId) {
        let mut state = self.lock();
        state.nodes.remove(id);
        state.killed.remove(id);
        state.links.retain(|(from, to), _| from != id && to != id);
        state.blocked.retain(|(from, to)| from != id && to != id);
        state.pending.retain(|write| &write.from != id && &write.to != id);
    }

    pub fn node_ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<_> = self.lock().nodes.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// A handle bound to one node, implementing the [`Registry`] port.
    pub fn node(&self, id: NodeId) -> SimNodeHandle {
        SimNodeHandle {
            sim: self.clone(),
            id,
        }
    }

    pub fn is_killed(&self, id: &NodeId) -> bool {
        self.lock().killed.contains(id)
    }

    pub fn kill(&self, id: &NodeId) {
        self.lock().killed.insert(id.clone());
    }

    /// Marks `id` alive again and performs the anti-entropy merge from
    /// peers reachable at this instant (§4.8 "`RestartNode`").
    pub fn restart(&self, id: &NodeId) {
        let mut state = self.lock();
        state.killed.remove(id);

        let reachable: Vec<NodeId> = state
            .nodes
            .keys()
            .filter(|peer| {
                *peer != id
                    && !state.killed.contains(*peer)
                    && !state.blocked.contains(&(id.clone(), (*peer).clone()))
                    && !state.blocked.contains(&((*peer).clone(), id.clone()))
            })
            .cloned()
            .collect();

        let mut peer_machines: Vec<MachineRow> = Vec::new();
        let mut peer_heartbeats: Vec<HeartbeatRow> = Vec::new();
        for peer in &reachable {
            if let Some(node) = state.nodes.get(peer) {
                peer_machines.extend(node.machines.list());
                peer_heartbeats.extend(node.heartbeats.list());
            }
        }
        let retained_ids: HashSet<NodeId> = peer_machines.iter().map(|row| row.id.clone()).collect();

        if let Some(local) = state.nodes.get_mut(id) {
            local.machines.retain(|row| retained_ids.contains(&row.id));
            for row in peer_machines {
                local.machines.merge_if_newer(row);
            }
            for row in peer_heartbeats {
                local.heartbeats.merge_max_seq(row);
            }
        }

        trace!(node = %id, reachable = reachable.len(), "anti-entropy restart merge");
    }

    pub fn set_link(&self, from: NodeId, to: NodeId, cfg: LinkConfig) {
        self.lock().links.insert((from, to), cfg);
    }

    pub fn clear_link(&self, from: &NodeId, to: &NodeId) {
        self.lock().links.remove(&(from.clone(), to.clone()));
    }

    /// Asymmetrically blocks `from -> to` only; `to -> from` is untouched.
    pub fn block_link(&self, from: NodeId, to: NodeId) {
        self.lock().blocked.insert((from, to));
    }

    pub fn unblock_link(&self, from: &NodeId, to: &NodeId) {
        self.lock().blocked.remove(&(from.clone(), to.clone()));
    }

    /// Symmetrically blocks every edge between the two groups.
    pub fn partition(&self, group_a: &[NodeId], group_b: &[NodeId]) {
        let mut state = self.lock();
        for a in group_a {
            for b in group_b {
                state.blocked.insert((a.clone(), b.clone()));
                state.blocked.insert((b.clone(), a.clone()));
            }
        }
    }

    pub fn heal_partition(&self, group_a: &[NodeId], group_b: &[NodeId]) {
        let mut state = self.lock();
        for a in group_a {
            for b in group_b {
                state.blocked.remove(&(a.clone(), b.clone()));
                state.blocked.remove(&(b.clone(), a.clone()));
            }
        }
    }

    /// Heals every block and partition in the cluster.
    pub fn heal_all(&self) {
        self.lock().blocked.clear();
    }

    /// Advances the simulator's virtual clock, used to mature
    /// latency-deferred writes ahead of the next `tick()`.
    pub fn advance(&self, delta: Duration) {
        self.lock().elapsed += delta;
    }

    pub fn elapsed(&self) -> Duration {
        self.lock().elapsed
    }

    /// Delivers every pending write whose latency has matured, and
    /// re-attempts every gate-deferred write from the top of the fan-out
    /// decision (§4.8 "`Tick()`").
    pub fn tick(&self) {
        let mut state = self.lock();
        let now = state.elapsed;
        let pending = std::mem::take(&mut state.pending);
        for write in pending {
            match write.kind {
                PendingKind::TimedAt(deliver_at) if deliver_at <= now => {
                    Self::deliver(&mut state, &write.to, write.op);
                }
                PendingKind::TimedAt(_) => state.pending.push(write),
                PendingKind::GateRetry => {
                    Self::dispatch(&mut state, write.from, write.to, write.op, now);
                }
            }
        }
    }

    /// Delivers every pending write unconditionally, except writes whose
    /// target is still killed or still blocked, which remain pending
    /// (§4.8 "`Drain()`").
    pub fn drain(&self) {
        let mut state = self.lock();
        let pending = std::mem::take(&mut state.pending);
        for write in pending {
            if state.killed.contains(&write.to) || state.blocked.contains(&(write.from.clone(), write.to.clone())) {
                state.pending.push(write);
                continue;
            }
            if let PendingKind::GateRetry = write.kind {
                let still_gated = state
                    .links
                    .get(&(write.from.clone(), write.to.clone()))
                    .is_some_and(LinkConfig::should_defer);
                if still_gated {
                    state.pending.push(write);
                    continue;
                }
            }
            Self::deliver(&mut state, &write.to, write.op);
        }
    }

    /// The full write path for one origin operation (§4.8 steps 1-3):
    /// apply locally, notify local subscribers, then fan the op out to
    /// every other live, unblocked node.
    fn apply_and_fan_out(&self, origin: &NodeId, op: ReplicatedOp) -> Result<()> {
        let mut state = self.lock();
        if state.killed.contains(origin) {
            return Err(RegistryError::NodeDead);
        }
        Self::apply_local(&mut state, origin, &op);

        let targets: Vec<NodeId> = state.nodes.keys().filter(|n| *n != origin).cloned().collect();
        let now = state.elapsed;
        for to in targets {
            if state.killed.contains(&to) || state.blocked.contains(&(origin.clone(), to.clone())) {
                continue;
            }
            Self::dispatch(&mut state, origin.clone(), to, op.clone(), now);
        }
        Ok(())
    }

    fn apply_local(state: &mut SimState, origin: &NodeId, op: &ReplicatedOp) {
        let Some(node) = state.nodes.get_mut(origin) else {
            return;
        };
        match op {
            ReplicatedOp::UpsertMachine(row) => {
                node.machines.apply_remote(row.clone());
                // The caller already resolved CAS semantics; downstream
                // consumers treat `Added`/`Updated` identically (see
                // `apply_delta`), so there is no need to re-derive which
                // one this was.
                node.notify_machines(&Change::Updated(row.clone()));
            }
            ReplicatedOp::DeleteMachine(id) => {
                node.machines.delete(id);
                node.notify_machines(&Change::Deleted(DeletedRef::by_id(id.clone())));
            }
            ReplicatedOp::DeleteByEndpointExceptId { endpoint, keep_id } => {
                node.machines.delete_by_endpoint_except_id(endpoint, keep_id);
                node.notify_machines(&Change::Resync);
            }
            ReplicatedOp::Heartbeat(row) => {
                node.heartbeats.merge_max_seq(row.clone());
                node.notify_heartbeats(&Change::Updated(row.clone()));
            }
        }
    }

    /// Step 3's per-target decision chain: gate, error hook, random drop,
    /// latency, or immediate delivery.
    fn dispatch(state: &mut SimState, from: NodeId, to: NodeId, op: ReplicatedOp, now: Duration) {
        let cfg = state.links.get(&(from.clone(), to.clone())).cloned().unwrap_or_default();

        if cfg.should_defer() {
            state.pending.push(DelayedWrite {
                from,
                to,
                op,
                kind: PendingKind::GateRetry,
            });
            return;
        }
        if cfg.err().is_some() {
            return;
        }
        if cfg.drop > 0.0 && state.rng.gen::<f64>() < cfg.drop {
            return;
        }
        if cfg.latency > Duration::ZERO {
            state.pending.push(DelayedWrite {
                from,
                to,
                op,
                kind: PendingKind::TimedAt(now + cfg.latency),
            });
            return;
        }
        Self::deliver(state, &to, op);
    }

    fn deliver(state: &mut SimState, to: &NodeId, op: ReplicatedOp) {
        let Some(node) = state.nodes.get_mut(to) else {
            return;
        };
        match op {
            ReplicatedOp::UpsertMachine(row) => {
                node.machines.apply_remote(row.clone());
                node.notify_machines(&Change::Updated(row));
            }
            ReplicatedOp::DeleteMachine(id) => {
                node.machines.delete(&id);
                node.notify_machines(&Change::Deleted(DeletedRef::by_id(id)));
            }
            ReplicatedOp::DeleteByEndpointExceptId { endpoint, keep_id } => {
                node.machines.delete_by_endpoint_except_id(&endpoint, &keep_id);
                node.notify_machines(&Change::Resync);
            }
            ReplicatedOp::Heartbeat(row) => {
                node.heartbeats.merge_max_seq(row.clone());
                node.notify_heartbeats(&Change::Updated(row));
            }
        }
    }

    fn eval_fault(&self, point: &str) -> Result<()> {
        match self.faults.eval(point) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn ensure_alive(&self, id: &NodeId) -> Result<()> {
        if self.lock().killed.contains(id) {
            return Err(RegistryError::NodeDead);
        }
        Ok(())
    }

    fn upsert_machine(&self, id: &NodeId, row: MachineRow, expected_version: Version) -> Result<Version> {
        self.eval_fault("upsert_machine")?;
        let version = {
            let mut state = self.lock();
            if state.killed.contains(id) {
                return Err(RegistryError::NodeDead);
            }
            let node = state.nodes.entry(id.clone()).or_default();
            node.machines.upsert(row.clone(), expected_version)?
        };
        let mut stored = row;
        stored.version = version;
        self.apply_and_fan_out(id, ReplicatedOp::UpsertMachine(stored))?;
        Ok(version)
    }

    fn delete_machine(&self, id: &NodeId, target: &NodeId) -> Result<()> {
        self.eval_fault("delete_machine")?;
        self.apply_and_fan_out(id, ReplicatedOp::DeleteMachine(target.clone()))
    }

    fn delete_by_endpoint_except_id(&self, id: &NodeId, endpoint: &str, keep_id: &NodeId) -> Result<()> {
        self.eval_fault("delete_by_endpoint_except_id")?;
        self.apply_and_fan_out(
            id,
            ReplicatedOp::DeleteByEndpointExceptId {
                endpoint: endpoint.to_string(),
                keep_id: keep_id.clone(),
            },
        )
    }

    fn list_machine_rows(&self, id: &NodeId) -> Result<Vec<MachineRow>> {
        self.eval_fault("list_machine_rows")?;
        let state = self.lock();
        if state.killed.contains(id) {
            return Err(RegistryError::NodeDead);
        }
        Ok(state.nodes.get(id).map(MachineTable::list).unwrap_or_default())
    }

    fn subscribe_machines(
        &self,
        id: &NodeId,
        cancel: CancellationToken,
    ) -> Result<(Vec<MachineRow>, mpsc::Receiver<Change<MachineRow>>)> {
        self.eval_fault("subscribe_machines")?;
        let (tx, rx) = mpsc::channel(meshlink_registry::SUBSCRIPTION_BUFFER);
        let snapshot = {
            let mut state = self.lock();
            if state.killed.contains(id) {
                return Err(RegistryError::NodeDead);
            }
            let node = state.nodes.entry(id.clone()).or_default();
            node.machine_subs.push(tx.clone());
            node.machines.list()
        };
        tokio::spawn(async move {
            cancel.cancelled().await;
            drop(tx);
        });
        Ok((snapshot, rx))
    }

    fn subscribe_heartbeats(
        &self,
        id: &NodeId,
        cancel: CancellationToken,
    ) -> Result<(Vec<HeartbeatRow>, mpsc::Receiver<Change<HeartbeatRow>>)> {
        self.eval_fault("subscribe_heartbeats")?;
        let (tx, rx) = mpsc::channel(meshlink_registry::SUBSCRIPTION_BUFFER);
        let snapshot = {
            let mut state = self.lock();
            if state.killed.contains(id) {
                return Err(RegistryError::NodeDead);
            }
            let node = state.nodes.entry(id.clone()).or_default();
            node.heartbeat_subs.push(tx.clone());
            node.heartbeats.list()
        };
        tokio::spawn(async move {
            cancel.cancelled().await;
            drop(tx);
        });
        Ok((snapshot, rx))
    }

    fn bump_heartbeat(&self, id: &NodeId, updated_at: chrono::DateTime<chrono::Utc>) -> Result<u64> {
        self.eval_fault("bump_heartbeat")?;
        let seq = {
            let mut state = self.lock();
            if state.killed.contains(id) {
                return Err(RegistryError::NodeDead);
            }
            let node = state.nodes.entry(id.clone()).or_default();
            node.heartbeats.bump(id, updated_at)
        };
        let row = HeartbeatRow {
            node_id: id.clone(),
            seq,
            updated_at,
        };
        self.apply_and_fan_out(id, ReplicatedOp::Heartbeat(row))?;
        Ok(seq)
    }

    fn ensure_network_cidr(
        &self,
        id: &NodeId,
        requested: Option<Ipv4Net>,
        fallback: Option<Ipv4Net>,
        default: Ipv4Net,
    ) -> Result<Ipv4Net> {
        self.eval_fault("ensure_network_cidr")?;
        let mut state = self.lock();
        if state.killed.contains(id) {
            return Err(RegistryError::NodeDead);
        }
        // First-writer-wins across the whole cluster, not per-node: every
        // node must converge to whichever node called first, so the cell
        // lives on `SimState` rather than inside any one `NodeLocal`.
        Ok(state.cidr.ensure(requested, fallback, default))
    }
}

/// A [`Registry`] handle bound to one simulated node. Cloning preserves
/// the binding; cloning the underlying [`ClusterSimulator`] (via
/// [`ClusterSimulator::node`]) is how a test obtains handles for distinct
/// nodes sharing one cluster.
#[derive(Clone)]
pub struct SimNodeHandle {
    sim: ClusterSimulator,
    id: NodeId,
}

impl SimNodeHandle {
    pub fn id(&self) -> &NodeId {
        &self.id
    }

    pub fn cluster(&self) -> &ClusterSimulator {
        &self.sim
    }
}

impl Registry for SimNodeHandle {
    async fn ensure_machine_table(&self) -> Result<()> {
        self.sim.ensure_alive(&self.id)
    }

    async fn ensure_heartbeat_table(&self) -> Result<()> {
        self.sim.ensure_alive(&self.id)
    }

    async fn ensure_network_config_table(&self) -> Result<()> {
        self.sim.ensure_alive(&self.id)
    }

    async fn ensure_deployment_table(&self) -> Result<()> {
        self.sim.ensure_alive(&self.id)
    }

    async fn ensure_network_cidr(
        &self,
        requested: Option<Ipv4Net>,
        fallback: Option<Ipv4Net>,
        default: Ipv4Net,
    ) -> Result<Ipv4Net> {
        self.sim.ensure_network_cidr(&self.id, requested, fallback, default)
    }

    async fn upsert_machine(&self, row: MachineRow, expected_version: Version) -> Result<Version> {
        self.sim.upsert_machine(&self.id, row, expected_version)
    }

    async fn delete_machine(&self, id: &NodeId) -> Result<()> {
        self.sim.delete_machine(&self.id, id)
    }

    async fn delete_by_endpoint_except_id(&self, endpoint: &str, keep_id: &NodeId) -> Result<()> {
        self.sim.delete_by_endpoint_except_id(&self.id, endpoint, keep_id)
    }

    async fn list_machine_rows(&self) -> Result<Vec<MachineRow>> {
        self.sim.list_machine_rows(&self.id)
    }

    async fn subscribe_machines(
        &self,
        cancel: CancellationToken,
    ) -> Result<(Vec<MachineRow>, mpsc::Receiver<Change<MachineRow>>)> {
        self.sim.subscribe_machines(&self.id, cancel)
    }

    async fn subscribe_heartbeats(
        &self,
        cancel: CancellationToken,
    ) -> Result<(Vec<HeartbeatRow>, mpsc::Receiver<Change<HeartbeatRow>>)> {
        self.sim.subscribe_heartbeats(&self.id, cancel)
    }

    async fn bump_heartbeat(&self, node_id: &NodeId, updated_at: chrono::DateTime<chrono::Utc>) -> Result<u64> {
        self.sim.bump_heartbeat(node_id, updated_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine as _;
    use chrono::Utc;
    use meshlink_types::PublicKey;

    fn key_of(byte: u8) -> PublicKey {
        let encoded = base64::engine::general_purpose::STANDARD.encode([byte; 32]);
        PublicKey::parse(encoded).unwrap()
    }

    fn machine(id: &str, key_byte: u8, endpoint: Option<&str>) -> MachineRow {
        MachineRow {
            id: NodeId::new(id),
            public_key: key_of(key_byte),
            subnet: "10.210.1.0/24".parse().unwrap(),
            endpoint: endpoint.map(str::to_string),
            updated_at: Utc::now(),
            version: Version::NONE,
        }
    }

    #[tokio::test]
    async fn two_node_share_with_no_link_config() {
        let cluster = ClusterSimulator::new(1);
        cluster.add_node(NodeId::new("a"));
        cluster.add_node(NodeId::new("b"));
        let a = cluster.node(NodeId::new("a"));
        let b = cluster.node(NodeId::new("b"));

        a.upsert_machine(machine("m1", 1, Some("1.2.3.4:51820")), Version::NONE)
            .await
            .unwrap();

        let seen = b.list_machine_rows().await.unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].id, NodeId::new("m1"));
    }

    #[tokio::test]
    async fn latency_gates_visibility_until_matured() {
        let cluster = ClusterSimulator::new(2);
        cluster.add_node(NodeId::new("a"));
        cluster.add_node(NodeId::new("b"));
        cluster.set_link(
            NodeId::new("a"),
            NodeId::new("b"),
            LinkConfig::with_latency(Duration::from_millis(200)),
        );
        let a = cluster.node(NodeId::new("a"));
        let b = cluster.node(NodeId::new("b"));

        a.upsert_machine(machine("m1", 1, None), Version::NONE).await.unwrap();

        cluster.advance(Duration::from_millis(100));
        cluster.tick();
        assert!(b.list_machine_rows().await.unwrap().is_empty());

        cluster.advance(Duration::from_millis(150));
        cluster.tick();
        assert_eq!(b.list_machine_rows().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn asymmetric_block_only_stops_one_direction() {
        let cluster = ClusterSimulator::new(3);
        cluster.add_node(NodeId::new("a"));
        cluster.add_node(NodeId::new("b"));
        cluster.block_link(NodeId::new("a"), NodeId::new("b"));
        let a = cluster.node(NodeId::new("a"));
        let b = cluster.node(NodeId::new("b"));

        a.upsert_machine(machine("m1", 1, None), Version::NONE).await.unwrap();
        assert!(b.list_machine_rows().await.unwrap().is_empty());

        b.upsert_machine(machine("m2", 2, None), Version::NONE).await.unwrap();
        let seen = a.list_machine_rows().await.unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].id, NodeId::new("m2"));
    }

    #[tokio::test]
    async fn optimistic_concurrency_conflicts_then_succeeds() {
        let cluster = ClusterSimulator::new(4);
        cluster.add_node(NodeId::new("a"));
        let a = cluster.node(NodeId::new("a"));

        let v1 = a.upsert_machine(machine("m1", 1, None), Version::NONE).await.unwrap();
        assert_eq!(v1, Version::INITIAL);
        let conflict = a.upsert_machine(machine("m1", 1, None), Version::NONE).await;
        assert!(matches!(conflict, Err(RegistryError::Conflict { .. })));
        let v2 = a.upsert_machine(machine("m1", 1, None), Version::INITIAL).await.unwrap();
        assert_eq!(v2, Version::new(2));
    }

    #[tokio::test]
    async fn first_writer_wins_network_cidr() {
        let cluster = ClusterSimulator::new(5);
        cluster.add_node(NodeId::new("a"));
        cluster.add_node(NodeId::new("b"));
        let a = cluster.node(NodeId::new("a"));
        let b = cluster.node(NodeId::new("b"));
        let default: Ipv4Net = "10.210.0.0/16".parse().unwrap();
        let requested: Ipv4Net = "10.42.0.0/16".parse().unwrap();

        let first = a.ensure_network_cidr(Some(requested), None, default).await.unwrap();
        assert_eq!(first, requested);

        let other: Ipv4Net = "10.99.0.0/16".parse().unwrap();
        let second = b.ensure_network_cidr(Some(other), None, default).await.unwrap();
        assert_eq!(second, requested);
    }

    #[tokio::test]
    async fn kill_restart_anti_entropy_split_brain() {
        let cluster = ClusterSimulator::new(6);
        for id in ["a", "b", "c"] {
            cluster.add_node(NodeId::new(id));
        }
        let a = cluster.node(NodeId::new("a"));
        let b = cluster.node(NodeId::new("b"));
        let c = cluster.node(NodeId::new("c"));

        a.upsert_machine(machine("m-shared", 9, None), Version::NONE)
            .await
            .unwrap();
        cluster.drain();

        cluster.kill(&NodeId::new("c"));

        a.upsert_machine(machine("m-a", 1, None), Version::NONE).await.unwrap();
        b.upsert_machine(machine("m-b", 2, None), Version::NONE).await.unwrap();
        cluster.drain();

        a.delete_machine(&NodeId::new("m-shared")).await.unwrap();
        cluster.drain();

        cluster.restart(&NodeId::new("c"));

        let mut ids: Vec<_> = c
            .list_machine_rows()
            .await
            .unwrap()
            .into_iter()
            .map(|row| row.id)
            .collect();
        ids.sort();
        assert_eq!(ids, vec![NodeId::new("m-a"), NodeId::new("m-b")]);
    }

    #[tokio::test]
    async fn killed_node_registry_ops_fail_fast() {
        let cluster = ClusterSimulator::new(7);
        cluster.add_node(NodeId::new("a"));
        cluster.kill(&NodeId::new("a"));
        let a = cluster.node(NodeId::new("a"));
        let err = a.list_machine_rows().await.unwrap_err();
        assert!(matches!(err, RegistryError::NodeDead));
    }

    #[tokio::test]
    async fn fault_injector_fails_named_operation_once() {
        let cluster = ClusterSimulator::new(8);
        cluster.add_node(NodeId::new("a"));
        let a = cluster.node(NodeId::new("a"));
        cluster.faults().fail_once("upsert_machine", RegistryError::Other("injected".into()));

        let err = a.upsert_machine(machine("m1", 1, None), Version::NONE).await;
        assert!(err.is_err());
        let ok = a.upsert_machine(machine("m1", 1, None), Version::NONE).await;
        assert!(ok.is_ok());
    }
}
