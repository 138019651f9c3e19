//! A weighted, seeded chaos runner over the in-memory cluster simulator
//! (§4.9): samples partition/latency/kill/restart/anti-entropy operations,
//! checks invariants after every step, and produces a replayable event log
//! keyed by its seed.

mod invariant;
mod ops;
mod report;
mod runner;

pub use invariant::{default_invariants, Invariant, MachineVersionsPositive, NodeIdsUnique, SnapshotsReadable};
pub use ops::{ChaosOp, OpWeights};
pub use report::{ChaosReport, InvariantViolation, ReplayEvent};
pub use runner::{run_chaos, run_chaos_with, ChaosConfig};
