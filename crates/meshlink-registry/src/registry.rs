//! The `Registry` port (§4.1) and `LocalRegistry`, a single-replica
//! in-memory implementation. Multi-node replication behavior is exercised
//! against the cluster simulator in `meshlink-sim`, which reuses the same
//! table types this implementation is built on.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use ipnet::Ipv4Net;
use meshlink_types::{Change, DeletedRef, HeartbeatRow, MachineRow, NodeId, Version};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{instrument, trace};

use crate::error::{RegistryError, Result};
use crate::tables::{HeartbeatTable, MachineTable, NetworkCidrCell};

/// Subscription buffer capacity (§4.8): fuller buffers drop updates and
/// rely on the periodic full-reconcile tick for eventual convergence.
pub const SUBSCRIPTION_BUFFER: usize = 256;

/// The replicated machine/heartbeat registry consumed by the reconciler.
///
/// Implementations are expected to be cheap to clone (an `Arc` handle) so
/// the reconciler worker can hold one per spawned task.
pub trait Registry: Send + Sync {
    async fn ensure_machine_table(&self) -> Result<()>;
    async fn ensure_heartbeat_table(&self) -> Result<()>;
    async fn ensure_network_config_table(&self) -> Result<()>;
    async fn ensure_deployment_table(&self) -> Result<()>;

    async fn ensure_network_cidr(
        &self,
        requested: Option<Ipv4Net>,
        fallback: Option<Ipv4Net>,
        default: Ipv4Net,
    ) -> Result<Ipv4Net>;

    async fn upsert_machine(&self, row: MachineRow, expected_version: Version) -> Result<Version>;
    async fn delete_machine(&self, id: &NodeId) -> Result<()>;
    async fn delete_by_endpoint_except_id(&self, endpoint: &str, keep_id: &NodeId) -> Result<()>;
    async fn list_machine_rows(&self) -> Result<Vec<MachineRow>>;

    async fn subscribe_machines(
        &self,
        cancel: CancellationToken,
    ) -> Result<(Vec<MachineRow>, mpsc::Receiver<Change<MachineRow>>)>;

    async fn subscribe_heartbeats(
        &self,
        cancel: CancellationToken,
    ) -> Result<(Vec<HeartbeatRow>, mpsc::Receiver<Change<HeartbeatRow>>)>;

    async fn bump_heartbeat(&self, node_id: &NodeId, updated_at: DateTime<Utc>) -> Result<u64>;
}

#[derive(Default)]
struct Inner {
    machines: MachineTable,
    heartbeats: HeartbeatTable,
    cidr: NetworkCidrCell,
    killed: bool,
    machine_subs: Vec<mpsc::Sender<Change<MachineRow>>>,
    heartbeat_subs: Vec<mpsc::Sender<Change<HeartbeatRow>>>,
}

/// Sends on a best-effort basis: a full buffer drops the update (the
/// subscriber relies on the periodic full-reconcile tick to catch up), a
/// closed receiver drops the subscription itself.
fn try_notify<T: Clone>(tx: &mpsc::Sender<T>, change: &T) -> bool {
    match tx.try_send(change.clone()) {
        Ok(()) | Err(mpsc::error::TrySendError::Full(_)) => true,
        Err(mpsc::error::TrySendError::Closed(_)) => false,
    }
}

impl Inner {
    fn notify_machines(&mut self, change: Change<MachineRow>) {
        self.machine_subs.retain(|tx| try_notify(tx, &change));
    }

    fn notify_heartbeats(&mut self, change: Change<HeartbeatRow>) {
        self.heartbeat_subs.retain(|tx| try_notify(tx, &change));
    }
}

/// A single-replica `Registry`. Every write is accepted locally and
/// fanned out to local subscribers only — there is no remote peer to
/// replicate to. Multi-node behavior lives in `meshlink-sim`'s
/// `ClusterSimulator`, which wraps one of these per simulated node.
#[derive(Clone)]
pub struct LocalRegistry {
    inner: std::sync::Arc<Mutex<Inner>>,
}

impl Default for LocalRegistry {
    fn default() -> Self {
        Self {
            inner: std::sync::Arc::new(Mutex::new(Inner::default())),
        }
    }
}

impl LocalRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the local replica dead: every subsequent operation fails with
    /// `NodeDead` until a fresh `LocalRegistry` is constructed, mirroring
    /// `ClusterSimulator`'s `killed` set for a single node.
    pub fn kill(&self) {
        self.inner.lock().expect("registry mutex poisoned").killed = true;
    }

    fn guard(&self) -> Result<std::sync::MutexGuard<'_, Inner>> {
        let guard = self.inner.lock().expect("registry mutex poisoned");
        if guard.killed {
            return Err(RegistryError::NodeDead);
        }
        Ok(guard)
    }
}

impl Registry for LocalRegistry {
    async fn ensure_machine_table(&self) -> Result<()> {
        self.guard()?;
        Ok(())
    }

    async fn ensure_heartbeat_table(&self) -> Result<()> {
        self.guard()?;
        Ok(())
    }

    async fn ensure_network_config_table(&self) -> Result<()> {
        self.guard()?;
        Ok(())
    }

    async fn ensure_deployment_table(&self) -> Result<()> {
        self.guard()?;
        Ok(())
    }

    async fn ensure_network_cidr(
        &self,
        requested: Option<Ipv4Net>,
        fallback: Option<Ipv4Net>,
        default: Ipv4Net,
    ) -> Result<Ipv4Net> {
        let mut guard = self.guard()?;
        Ok(guard.cidr.ensure(requested, fallback, default))
    }

    #[instrument(skip(self, row))]
    async fn upsert_machine(&self, row: MachineRow, expected_version: Version) -> Result<Version> {
        let mut guard = self.guard()?;
        let existed = guard.machines.get(&row.id).is_some();
        let version = guard.machines.upsert(row.clone(), expected_version)?;
        let mut stored = row;
        stored.version = version;
        let change = if existed {
            Change::Updated(stored)
        } else {
            Change::Added(stored)
        };
        trace!(version = %version, "machine upserted");
        guard.notify_machines(change);
        Ok(version)
    }

    async fn delete_machine(&self, id: &NodeId) -> Result<()> {
        let mut guard = self.guard()?;
        guard.machines.delete(id);
        guard.notify_machines(Change::Deleted(DeletedRef::by_id(id.clone())));
        Ok(())
    }

    async fn delete_by_endpoint_except_id(&self, endpoint: &str, keep_id: &NodeId) -> Result<()> {
        let mut guard = self.guard()?;
        guard.machines.delete_by_endpoint_except_id(endpoint, keep_id);
        guard.notify_machines(Change::Resync);
        Ok(())
    }

    async fn list_machine_rows(&self) -> Result<Vec<MachineRow>> {
        let guard = self.guard()?;
        Ok(guard.machines.list())
    }

    async fn subscribe_machines(
        &self,
        cancel: CancellationToken,
    ) -> Result<(Vec<MachineRow>, mpsc::Receiver<Change<MachineRow>>)> {
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let snapshot = {
            let mut guard = self.guard()?;
            guard.machine_subs.push(tx.clone());
            guard.machines.list()
        };
        tokio::spawn(async move {
            cancel.cancelled().await;
            drop(tx);
        });
        Ok((snapshot, rx))
    }

    async fn subscribe_heartbeats(
        &self,
        cancel: CancellationToken,
    ) -> Result<(Vec<HeartbeatRow>, mpsc::Receiver<Change<HeartbeatRow>>)> {
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let snapshot = {
            let mut guard = self.guard()?;
            guard.heartbeat_subs.push(tx.clone());
            guard.heartbeats.list()
        };
        tokio::spawn(async move {
            cancel.cancelled().await;
            drop(tx);
        });
        Ok((snapshot, rx))
    }

    async fn bump_heartbeat(&self, node_id: &NodeId, updated_at: DateTime<Utc>) -> Result<u64> {
        let mut guard = self.guard()?;
        let seq = guard.heartbeats.bump(node_id, updated_at);
        let row = guard.heartbeats.get(node_id).cloned().expect("just bumped");
        guard.notify_heartbeats(Change::Updated(row));
        Ok(seq)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine as _;
    use meshlink_types::PublicKey;

    fn row(id: &str, key_byte: u8) -> MachineRow {
        let encoded = base64::engine::general_purpose::STANDARD.encode([key_byte; 32]);
        MachineRow {
            id: NodeId::new(id),
            public_key: PublicKey::parse(encoded).unwrap(),
            subnet: "10.210.0.0/24".parse().unwrap(),
            endpoint: None,
            updated_at: Utc::now(),
            version: Version::NONE,
        }
    }

    #[tokio::test]
    async fn killed_registry_fails_fast() {
        let reg = LocalRegistry::new();
        reg.kill();
        let err = reg.list_machine_rows().await.unwrap_err();
        assert!(matches!(err, RegistryError::NodeDead));
    }

    #[tokio::test]
    async fn upsert_conflict_then_success() {
        let reg = LocalRegistry::new();
        reg.upsert_machine(row("m1", 1), Version::NONE).await.unwrap();
        let conflict = reg.upsert_machine(row("m1", 1), Version::NONE).await;
        assert!(matches!(conflict, Err(RegistryError::Conflict { .. })));
        let v2 = reg
            .upsert_machine(row("m1", 1), Version::INITIAL)
            .await
            .unwrap();
        assert_eq!(v2, Version::new(2));
    }

    #[tokio::test]
    async fn subscribers_observe_upserts() {
        let reg = LocalRegistry::new();
        let cancel = CancellationToken::new();
        let (snapshot, mut rx) = reg.subscribe_machines(cancel.clone()).await.unwrap();
        assert!(snapshot.is_empty());
        reg.upsert_machine(row("m1", 1), Version::NONE).await.unwrap();
        let change = rx.recv().await.unwrap();
        assert!(matches!(change, Change::Added(_)));
        cancel.cancel();
    }

    #[tokio::test]
    async fn bump_heartbeat_increments_and_notifies() {
        let reg = LocalRegistry::new();
        let cancel = CancellationToken::new();
        let (_snapshot, mut rx) = reg.subscribe_heartbeats(cancel.clone()).await.unwrap();
        let node = NodeId::new("a");
        let seq = reg.bump_heartbeat(&node, Utc::now()).await.unwrap();
        assert_eq!(seq, 1);
        let change = rx.recv().await.unwrap();
        assert!(matches!(change, Change::Updated(_)));
        cancel.cancel();
    }
}
