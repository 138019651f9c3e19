//! An in-memory multi-node [`Registry`](meshlink_registry::Registry)
//! cluster for exercising reconciliation convergence under programmable
//! network conditions: per-edge latency and drop, asymmetric blocks and
//! partitions, node kill/restart with anti-entropy merge, and dynamic
//! fault injection at named call sites.
//!
//! [`ClusterSimulator::node`] hands out a [`SimNodeHandle`] per simulated
//! node; each handle implements `Registry` directly, so it plugs into
//! `meshlink_reconciler::ReconcilerWorker` with no adapter code. Delivery
//! is driven explicitly: call [`ClusterSimulator::tick`] to let latency
//! mature and gated writes retry, or [`ClusterSimulator::drain`] to flush
//! everything deliverable right now.

mod cluster;
mod fault;
mod link;
mod node;

pub use cluster::{ClusterSimulator, SimNodeHandle};
pub use fault::FaultInjector;
pub use link::LinkConfig;
