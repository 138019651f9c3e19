//! Per-node replica state inside a [`crate::ClusterSimulator`]: the same
//! pure table types `meshlink-registry`'s `LocalRegistry` is built on,
//! plus the subscription lists the simulator notifies on local apply and
//! remote delivery alike.

use meshlink_registry::{HeartbeatTable, MachineTable, NetworkCidrCell};
use meshlink_types::{Change, HeartbeatRow, MachineRow};
use tokio::sync::mpsc;

/// One simulated node's replica. Holds no lock of its own — the owning
/// [`crate::ClusterSimulator`] serializes all access behind its single
/// mutex, per §4.8's concurrency note.
#[derive(Default)]
pub(crate) struct NodeLocal {
    pub(crate) machines: MachineTable,
    pub(crate) heartbeats: HeartbeatTable,
    pub(crate) cidr: NetworkCidrCell,
    pub(crate) machine_subs: Vec<mpsc::Sender<Change<MachineRow>>>,
    pub(crate) heartbeat_subs: Vec<mpsc::Sender<Change<HeartbeatRow>>>,
}

/// Sends on a best-effort basis, matching `LocalRegistry`: a full buffer
/// drops the update (the 30s full-reconcile tick is the backstop), a
/// closed receiver drops the subscription itself.
fn try_notify<T: Clone>(tx: &mpsc::Sender<T>, change: &T) -> bool {
    match tx.try_send(change.clone()) {
        Ok(()) | Err(mpsc::error::TrySendError::Full(_)) => true,
        Err(mpsc::error::TrySendError::Closed(_)) => false,
    }
}

impl NodeLocal {
    pub(crate) fn notify_machines(&mut self, change: &Change<MachineRow>) {
        self.machine_subs.retain(|tx| try_notify(tx, change));
    }

    pub(crate) fn notify_heartbeats(&mut self, change: &Change<HeartbeatRow>) {
        self.heartbeat_subs.retain(|tx| try_notify(tx, change));
    }
}
