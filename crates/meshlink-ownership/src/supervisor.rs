//! The deployment supervisor (§4.5): claims ownership of a single
//! deployment, keeps the lease alive with a background heartbeat while the
//! caller's work runs, and relinquishes ownership once it finishes.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use meshlink_types::NodeId;
use tokio_util::sync::CancellationToken;
use tracing::{error, instrument};

use crate::error::Result;
use crate::store::DeploymentStore;
use crate::sweeper::DEFAULT_SWEEP_INTERVAL;

/// Runs `work` while holding the ownership lease on `deploy_id`.
///
/// Acquires ownership first (propagating `NotFound`/`Contended` to the
/// caller unchanged), spawns a background heartbeat renewer at
/// `heartbeat_interval`, runs `work`, then releases ownership regardless of
/// whether `work` succeeded. The renewer is stopped before returning.
#[instrument(skip(store, work))]
pub async fn supervise<F, Fut, T>(
    store: Arc<dyn DeploymentStore>,
    deploy_id: &str,
    machine_id: NodeId,
    heartbeat_interval: Duration,
    work: F,
) -> Result<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = T>,
{
    store.acquire_ownership(deploy_id, &machine_id, Utc::now())?;

    let cancel = CancellationToken::new();
    let renewer = {
        let store = store.clone();
        let deploy_id = deploy_id.to_string();
        let machine_id = machine_id.clone();
        let cancel = cancel.clone();
        let interval = if heartbeat_interval.is_zero() {
            DEFAULT_SWEEP_INTERVAL
        } else {
            heartbeat_interval
        };
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    () = cancel.cancelled() => return,
                    _ = ticker.tick() => {
                        if let Err(err) =
                            store.bump_ownership_heartbeat(&deploy_id, &machine_id, Utc::now())
                        {
                            error!(%deploy_id, %err, "lease renewal failed, stopping renewer");
                            return;
                        }
                    }
                }
            }
        })
    };

    let result = work().await;

    cancel.cancel();
    let _ = renewer.await;
    let _ = store.release_ownership(deploy_id);
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OwnershipError;
    use crate::store::LocalDeploymentStore;
    use meshlink_types::{DeploymentRow, DeploymentStatus, Version};

    fn seeded(id: &str) -> Arc<LocalDeploymentStore> {
        let store = Arc::new(LocalDeploymentStore::new());
        store.seed(DeploymentRow {
            id: id.to_string(),
            namespace: "ns".to_string(),
            status: DeploymentStatus::InProgress,
            owner: NodeId::default(),
            owner_heartbeat: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            version: Version::INITIAL,
        });
        store
    }

    #[tokio::test]
    async fn supervise_acquires_executes_and_releases() {
        let store = seeded("d1");
        let machine = NodeId::new("a");
        let ran = supervise(
            store.clone() as Arc<dyn DeploymentStore>,
            "d1",
            machine.clone(),
            Duration::from_millis(20),
            || async { 42 },
        )
        .await
        .unwrap();
        assert_eq!(ran, 42);
        assert!(store.get("d1").unwrap().is_released());
    }

    #[tokio::test]
    async fn supervise_fails_fast_on_contention() {
        let store = seeded("d1");
        store
            .acquire_ownership("d1", &NodeId::new("other"), Utc::now())
            .unwrap();
        let err = supervise(
            store as Arc<dyn DeploymentStore>,
            "d1",
            NodeId::new("a"),
            Duration::from_millis(20),
            || async {},
        )
        .await
        .unwrap_err();
        assert!(matches!(err, OwnershipError::Contended { .. }));
    }
}
