//! The ownership sweeper (§4.5 "Takeover policy"): a background task that
//! watches for deployments whose lease has gone stale and attempts to take
//! them over. A transient double-owner during a partition is accepted —
//! correctness relies on CAS through the local store plus eventual
//! convergence, and downstream container writes are keyed by id.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use meshlink_types::NodeId;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::OwnershipError;
use crate::store::DeploymentStore;

/// Suggested default: 3x the 1s heartbeat interval (§4.5, §9 open question).
pub const DEFAULT_LEASE_TTL: Duration = Duration::from_secs(3);

/// Sweep cadence. Finer than the lease TTL so a takeover is attempted
/// promptly once a lease actually expires.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Configuration for [`run_sweeper`].
#[derive(Debug, Clone)]
pub struct SweeperConfig {
    pub machine_id: NodeId,
    pub lease_ttl: Duration,
    pub sweep_interval: Duration,
}

impl SweeperConfig {
    pub fn new(machine_id: NodeId) -> Self {
        Self {
            machine_id,
            lease_ttl: DEFAULT_LEASE_TTL,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

/// One pass over the store: attempts to take over every deployment whose
/// owner heartbeat is older than `lease_ttl`, or that has no owner at all.
/// Returns the ids successfully acquired this pass.
pub fn sweep_once(
    store: &dyn DeploymentStore,
    cfg: &SweeperConfig,
    now: DateTime<Utc>,
) -> Vec<String> {
    let mut acquired = Vec::new();
    for row in store.list() {
        if row.is_owned_by(&cfg.machine_id) {
            continue;
        }
        let expired = match row.owner_heartbeat {
            None => true,
            Some(last) => now.signed_duration_since(last)
                > chrono::Duration::from_std(cfg.lease_ttl).unwrap_or(chrono::Duration::zero()),
        };
        if !expired {
            continue;
        }
        match store.take_over_ownership(&row.id, &cfg.machine_id, now, cfg.lease_ttl) {
            Ok(_) => {
                info!(deploy_id = %row.id, machine = %cfg.machine_id, "ownership takeover");
                acquired.push(row.id);
            }
            Err(OwnershipError::Contended { .. }) => {
                // Another sweeper won the race between our list() and this
                // acquire_ownership call; nothing to do.
            }
            Err(OwnershipError::NotFound(_)) => {
                // Row was deleted concurrently (namespace cascade); skip.
            }
        }
    }
    acquired
}

/// Runs the sweeper until `cancel` fires, sleeping `sweep_interval` between
/// passes. Never exits on its own — matches the reconciler's "never exit"
/// policy for its background tasks (§4.2).
pub async fn run_sweeper(
    store: Arc<dyn DeploymentStore>,
    cfg: SweeperConfig,
    clock_now: impl Fn() -> DateTime<Utc> + Send + 'static,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(cfg.sweep_interval);
    loop {
        tokio::select! {
            () = cancel.cancelled() => return,
            _ = ticker.tick() => {
                let acquired = sweep_once(store.as_ref(), &cfg, clock_now());
                if !acquired.is_empty() {
                    warn!(count = acquired.len(), "swept stale deployment leases");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::LocalDeploymentStore;
    use meshlink_types::{DeploymentRow, DeploymentStatus, Version};

    fn seeded(id: &str, owner: NodeId, heartbeat: Option<DateTime<Utc>>) -> LocalDeploymentStore {
        let store = LocalDeploymentStore::new();
        store.seed(DeploymentRow {
            id: id.to_string(),
            namespace: "ns".to_string(),
            status: DeploymentStatus::InProgress,
            owner,
            owner_heartbeat: heartbeat,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            version: Version::INITIAL,
        });
        store
    }

    #[test]
    fn sweep_takes_over_expired_lease() {
        let t0 = Utc::now();
        let store = seeded("d1", NodeId::new("a"), Some(t0));
        let cfg = SweeperConfig::new(NodeId::new("b"));
        let later = t0 + chrono::Duration::seconds(10);
        let acquired = sweep_once(&store, &cfg, later);
        assert_eq!(acquired, vec!["d1".to_string()]);
        assert!(store.check_ownership("d1", &NodeId::new("b")).unwrap());
    }

    #[test]
    fn sweep_leaves_fresh_lease_alone() {
        let t0 = Utc::now();
        let store = seeded("d1", NodeId::new("a"), Some(t0));
        let cfg = SweeperConfig::new(NodeId::new("b"));
        let soon = t0 + chrono::Duration::milliseconds(500);
        let acquired = sweep_once(&store, &cfg, soon);
        assert!(acquired.is_empty());
        assert!(store.check_ownership("d1", &NodeId::new("a")).unwrap());
    }

    #[test]
    fn sweep_claims_unowned_deployment() {
        let store = seeded("d1", NodeId::default(), None);
        let cfg = SweeperConfig::new(NodeId::new("b"));
        let acquired = sweep_once(&store, &cfg, Utc::now());
        assert_eq!(acquired, vec!["d1".to_string()]);
    }
}
