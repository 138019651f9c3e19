//! The weighted operation alphabet the chaos runner samples from.

use meshlink_types::NodeId;
use serde::{Deserialize, Serialize};

/// One step of chaos, already resolved against concrete node ids — the
/// event log stores these directly so a run is replayable byte-for-byte.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChaosOp {
    /// Clears every blocked link and partition.
    Heal,
    /// Partitions the cluster into two halves around a pivot node.
    PartitionPair { pivot: NodeId },
    /// Marks a node dead; its registry operations start failing fast.
    KillNode { id: NodeId },
    /// Restarts a killed node, triggering anti-entropy against reachable peers.
    RestartNode { id: NodeId },
    /// Adds a fresh node to the cluster.
    AddNode { id: NodeId },
    /// Removes a node from the cluster entirely.
    RemoveNode { id: NodeId },
    /// Either advances simulated time by one tick or drains all pending
    /// deliveries, chosen by the sampler.
    TickOrDrain { drain: bool },
}

impl ChaosOp {
    /// Short, stable name used in invariant-violation messages and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ChaosOp::Heal => "heal",
            ChaosOp::PartitionPair { .. } => "partition_pair",
            ChaosOp::KillNode { .. } => "kill_node",
            ChaosOp::RestartNode { .. } => "restart_node",
            ChaosOp::AddNode { .. } => "add_node",
            ChaosOp::RemoveNode { .. } => "remove_node",
            ChaosOp::TickOrDrain { .. } => "tick_or_drain",
        }
    }
}

/// Relative sampling weights for the seven chaos operations. Zero disables
/// an operation entirely (the sampler skips it rather than treating it as
/// a fallback).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpWeights {
    pub heal: u32,
    pub partition_pair: u32,
    pub kill_node: u32,
    pub restart_node: u32,
    pub add_node: u32,
    pub remove_node: u32,
    pub tick_or_drain: u32,
}

impl Default for OpWeights {
    fn default() -> Self {
        Self {
            heal: 1,
            partition_pair: 2,
            kill_node: 2,
            restart_node: 2,
            add_node: 1,
            remove_node: 1,
            tick_or_drain: 4,
        }
    }
}
