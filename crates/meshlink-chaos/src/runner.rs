//! The chaos runner itself: sample an operation, apply it, check invariants,
//! repeat. Same seed and config always produce the same `events` sequence
//! and the same invariant failure (if any), per §4.9's reproducibility
//! requirement.

use std::time::Duration;

use meshlink_properties::sometimes;
use meshlink_sim::ClusterSimulator;
use meshlink_types::NodeId;
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::invariant::{self, Invariant};
use crate::ops::{ChaosOp, OpWeights};
use crate::report::{ChaosReport, InvariantViolation, ReplayEvent};

/// One step advances simulated time by this much when it chooses the
/// "advance" half of `tick_or_drain`.
const TICK_ADVANCE: Duration = Duration::from_millis(250);

/// Parameters for one chaos run.
#[derive(Debug, Clone, Copy)]
pub struct ChaosConfig {
    /// Seeds both the cluster simulator's internal RNG and the operation
    /// sampler. Reusing a seed reproduces a run exactly.
    pub seed: u64,
    /// Number of operations to sample and apply before stopping (unless an
    /// invariant fails first).
    pub steps: u32,
    /// Nodes present before the first step.
    pub initial_nodes: u32,
    pub weights: OpWeights,
}

impl Default for ChaosConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            steps: 200,
            initial_nodes: 3,
            weights: OpWeights::default(),
        }
    }
}

#[derive(Clone, Copy, Debug)]
enum Kind {
    Heal,
    PartitionPair,
    KillNode,
    RestartNode,
    AddNode,
    RemoveNode,
    TickOrDrain,
}

fn candidates(weights: &OpWeights, live: &[NodeId], killed: &[NodeId]) -> Vec<(Kind, u32)> {
    let mut v = Vec::with_capacity(7);
    if weights.heal > 0 {
        v.push((Kind::Heal, weights.heal));
    }
    if weights.partition_pair > 0 && live.len() >= 2 {
        v.push((Kind::PartitionPair, weights.partition_pair));
    }
    if weights.kill_node > 0 && !live.is_empty() {
        v.push((Kind::KillNode, weights.kill_node));
    }
    if weights.restart_node > 0 && !killed.is_empty() {
        v.push((Kind::RestartNode, weights.restart_node));
    }
    if weights.add_node > 0 {
        v.push((Kind::AddNode, weights.add_node));
    }
    if weights.remove_node > 0 && !live.is_empty() {
        v.push((Kind::RemoveNode, weights.remove_node));
    }
    if weights.tick_or_drain > 0 {
        v.push((Kind::TickOrDrain, weights.tick_or_drain));
    }
    v
}

/// Samples one operation against the cluster's current membership and
/// applies it, mutating `next_node_idx` if a node was added.
fn step_once(
    sim: &ClusterSimulator,
    rng: &mut StdRng,
    weights: &OpWeights,
    next_node_idx: &mut u32,
) -> ChaosOp {
    let ids = sim.node_ids();
    let live: Vec<NodeId> = ids.iter().filter(|id| !sim.is_killed(id)).cloned().collect();
    let killed: Vec<NodeId> = ids.iter().filter(|id| sim.is_killed(id)).cloned().collect();

    let mut pool = candidates(weights, &live, &killed);
    if pool.is_empty() {
        // Nothing else is applicable (e.g. an empty cluster) — adding a
        // node is always safe and keeps the run moving.
        pool.push((Kind::AddNode, 1));
    }
    let dist = WeightedIndex::new(pool.iter().map(|(_, w)| *w)).expect("at least one candidate");
    let kind = pool[dist.sample(rng)].0;

    let op = match kind {
        Kind::Heal => ChaosOp::Heal,
        Kind::PartitionPair => {
            let pivot = live.choose(rng).expect("partition requires a live node").clone();
            ChaosOp::PartitionPair { pivot }
        }
        Kind::KillNode => {
            let id = live.choose(rng).expect("kill requires a live node").clone();
            ChaosOp::KillNode { id }
        }
        Kind::RestartNode => {
            let id = killed.choose(rng).expect("restart requires a killed node").clone();
            ChaosOp::RestartNode { id }
        }
        Kind::AddNode => {
            let id = NodeId::new(format!("chaos-n{next_node_idx}"));
            *next_node_idx += 1;
            ChaosOp::AddNode { id }
        }
        Kind::RemoveNode => {
            let id = live.choose(rng).expect("remove requires a live node").clone();
            ChaosOp::RemoveNode { id }
        }
        Kind::TickOrDrain => ChaosOp::TickOrDrain { drain: rng.gen_bool(0.5) },
    };

    apply(sim, &op);
    op
}

fn apply(sim: &ClusterSimulator, op: &ChaosOp) {
    match op {
        ChaosOp::Heal => sim.heal_all(),
        ChaosOp::PartitionPair { pivot } => {
            let group_a = vec![pivot.clone()];
            let group_b: Vec<NodeId> = sim
                .node_ids()
                .into_iter()
                .filter(|id| id != pivot)
                .collect();
            sim.partition(&group_a, &group_b);
        }
        ChaosOp::KillNode { id } => sim.kill(id),
        ChaosOp::RestartNode { id } => sim.restart(id),
        ChaosOp::AddNode { id } => sim.add_node(id.clone()),
        ChaosOp::RemoveNode { id } => sim.remove_node(id),
        ChaosOp::TickOrDrain { drain } => {
            if *drain {
                sim.drain();
            } else {
                sim.advance(TICK_ADVANCE);
                sim.tick();
            }
        }
    }
}

/// Runs a chaos scenario with the default invariant set (§8's universal
/// invariants: unique node ids, readable snapshots, positive versions).
pub async fn run_chaos(config: ChaosConfig) -> ChaosReport {
    run_chaos_with(config, invariant::default_invariants()).await
}

/// Runs a chaos scenario against a custom invariant set, for callers that
/// want to check additional scenario-specific properties.
pub async fn run_chaos_with(config: ChaosConfig, invariants: Vec<Box<dyn Invariant>>) -> ChaosReport {
    let sim = ClusterSimulator::new(config.seed);
    let mut rng = StdRng::seed_from_u64(config.seed ^ 0x5eed_1234);
    let mut next_node_idx = 0u32;

    for _ in 0..config.initial_nodes {
        sim.add_node(NodeId::new(format!("chaos-n{next_node_idx}")));
        next_node_idx += 1;
    }

    let mut events = Vec::with_capacity(config.steps as usize);
    let mut violation = None;

    for step in 0..config.steps {
        let op = step_once(&sim, &mut rng, &config.weights, &mut next_node_idx);
        sometimes!(op.kind() == "kill_node", "chaos run exercises kill_node");
        events.push(ReplayEvent { step, op });

        for inv in &invariants {
            if let Err(message) = inv.check(&sim).await {
                violation = Some(InvariantViolation {
                    step,
                    invariant: inv.name(),
                    message,
                });
                break;
            }
        }
        if violation.is_some() {
            break;
        }
    }

    ChaosReport {
        seed: config.seed,
        steps_run: events.len() as u32,
        events,
        violation,
    }
}
