//! The replayable event log and summary produced by a chaos run.

use serde::{Deserialize, Serialize};

use crate::ops::ChaosOp;

/// One applied operation, in the order it was applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayEvent {
    pub step: u32,
    pub op: ChaosOp,
}

/// An invariant that failed during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvariantViolation {
    pub step: u32,
    pub invariant: &'static str,
    pub message: String,
}

/// The outcome of a full (or cut-short) chaos run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChaosReport {
    /// The seed the run was constructed with — replaying it against the
    /// same `ChaosConfig` reproduces `events` exactly.
    pub seed: u64,
    /// Steps actually executed (less than the configured step count if an
    /// invariant failed early).
    pub steps_run: u32,
    pub events: Vec<ReplayEvent>,
    /// `None` means every invariant held for the whole run.
    pub violation: Option<InvariantViolation>,
}

impl ChaosReport {
    pub fn is_clean(&self) -> bool {
        self.violation.is_none()
    }
}
