//! The `DeploymentStore`: CAS operations over `DeploymentRow` (§4.5).
//! Replication of the underlying table is best-effort and happens outside
//! this crate (e.g. via the registry's gossip path); this store only
//! guarantees atomicity of the ownership transition on the local replica.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use meshlink_types::{DeploymentRow, NodeId, Version};

use crate::error::{OwnershipError, Result};

/// CAS operations on deployment rows, as specified in §4.5.
pub trait DeploymentStore: Send + Sync {
    fn acquire_ownership(
        &self,
        deploy_id: &str,
        machine_id: &NodeId,
        now: DateTime<Utc>,
    ) -> Result<DeploymentRow>;

    /// Like [`DeploymentStore::acquire_ownership`], but also succeeds
    /// against a *different* live owner whose heartbeat is older than
    /// `lease_ttl` (§4.5 "Takeover policy"). The sweeper is the only
    /// caller — a plain claim attempt must never silently steal a live
    /// lease.
    fn take_over_ownership(
        &self,
        deploy_id: &str,
        machine_id: &NodeId,
        now: DateTime<Utc>,
        lease_ttl: Duration,
    ) -> Result<DeploymentRow>;

    fn check_ownership(&self, deploy_id: &str, machine_id: &NodeId) -> Result<bool>;

    fn bump_ownership_heartbeat(
        &self,
        deploy_id: &str,
        machine_id: &NodeId,
        now: DateTime<Utc>,
    ) -> Result<DeploymentRow>;

    fn release_ownership(&self, deploy_id: &str) -> Result<()>;

    fn get(&self, deploy_id: &str) -> Option<DeploymentRow>;

    fn list(&self) -> Vec<DeploymentRow>;
}

/// A single-replica, mutex-guarded deployment table.
#[derive(Debug, Default)]
pub struct LocalDeploymentStore {
    rows: Mutex<HashMap<String, DeploymentRow>>,
}

impl LocalDeploymentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a row outright, bypassing CAS. Used to seed a
    /// deployment before any node has claimed it, and by anti-entropy-style
    /// merges from a replicated source.
    pub fn seed(&self, row: DeploymentRow) {
        self.rows
            .lock()
            .expect("deployment store mutex poisoned")
            .insert(row.id.clone(), row);
    }
}

impl DeploymentStore for LocalDeploymentStore {
    fn acquire_ownership(
        &self,
        deploy_id: &str,
        machine_id: &NodeId,
        now: DateTime<Utc>,
    ) -> Result<DeploymentRow> {
        let mut rows = self.rows.lock().expect("deployment store mutex poisoned");
        let row = rows
            .get_mut(deploy_id)
            .ok_or_else(|| OwnershipError::NotFound(deploy_id.to_string()))?;
        if row.owner.is_empty() || &row.owner == machine_id {
            row.owner = machine_id.clone();
            row.owner_heartbeat = Some(now);
            row.updated_at = now;
            row.version = row.version.next();
            Ok(row.clone())
        } else {
            Err(OwnershipError::Contended {
                deploy_id: deploy_id.to_string(),
            })
        }
    }

    fn take_over_ownership(
        &self,
        deploy_id: &str,
        machine_id: &NodeId,
        now: DateTime<Utc>,
        lease_ttl: Duration,
    ) -> Result<DeploymentRow> {
        let mut rows = self.rows.lock().expect("deployment store mutex poisoned");
        let row = rows
            .get_mut(deploy_id)
            .ok_or_else(|| OwnershipError::NotFound(deploy_id.to_string()))?;
        let expired = match row.owner_heartbeat {
            None => true,
            Some(last) => {
                now.signed_duration_since(last)
                    > chrono::Duration::from_std(lease_ttl).unwrap_or(chrono::Duration::zero())
            }
        };
        if row.owner.is_empty() || &row.owner == machine_id || expired {
            row.owner = machine_id.clone();
            row.owner_heartbeat = Some(now);
            row.updated_at = now;
            row.version = row.version.next();
            Ok(row.clone())
        } else {
            Err(OwnershipError::Contended {
                deploy_id: deploy_id.to_string(),
            })
        }
    }

    fn check_ownership(&self, deploy_id: &str, machine_id: &NodeId) -> Result<bool> {
        let rows = self.rows.lock().expect("deployment store mutex poisoned");
        let row = rows
            .get(deploy_id)
            .ok_or_else(|| OwnershipError::NotFound(deploy_id.to_string()))?;
        Ok(row.is_owned_by(machine_id))
    }

    fn bump_ownership_heartbeat(
        &self,
        deploy_id: &str,
        machine_id: &NodeId,
        now: DateTime<Utc>,
    ) -> Result<DeploymentRow> {
        let mut rows = self.rows.lock().expect("deployment store mutex poisoned");
        let row = rows
            .get_mut(deploy_id)
            .ok_or_else(|| OwnershipError::NotFound(deploy_id.to_string()))?;
        if !row.is_owned_by(machine_id) {
            return Err(OwnershipError::Contended {
                deploy_id: deploy_id.to_string(),
            });
        }
        row.owner_heartbeat = Some(now);
        row.updated_at = now;
        row.version = row.version.next();
        Ok(row.clone())
    }

    fn release_ownership(&self, deploy_id: &str) -> Result<()> {
        let mut rows = self.rows.lock().expect("deployment store mutex poisoned");
        if let Some(row) = rows.get_mut(deploy_id) {
            row.owner = NodeId::default();
            row.owner_heartbeat = None;
            row.version = row.version.next();
        }
        Ok(())
    }

    fn get(&self, deploy_id: &str) -> Option<DeploymentRow> {
        self.rows
            .lock()
            .expect("deployment store mutex poisoned")
            .get(deploy_id)
            .cloned()
    }

    fn list(&self) -> Vec<DeploymentRow> {
        let mut out: Vec<_> = self
            .rows
            .lock()
            .expect("deployment store mutex poisoned")
            .values()
            .cloned()
            .collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshlink_types::DeploymentStatus;

    fn seeded(id: &str) -> LocalDeploymentStore {
        let store = LocalDeploymentStore::new();
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

    #[test]
    fn acquire_missing_deployment_is_not_found() {
        let store = LocalDeploymentStore::new();
        let err = store
            .acquire_ownership("d1", &NodeId::new("a"), Utc::now())
            .unwrap_err();
        assert!(matches!(err, OwnershipError::NotFound(_)));
    }

    #[test]
    fn lease_lifecycle() {
        let store = seeded("d1");
        let a = NodeId::new("a");
        let b = NodeId::new("b");
        let t0 = Utc::now();
        store.acquire_ownership("d1", &a, t0).unwrap();
        assert!(store.check_ownership("d1", &a).unwrap());
        assert!(!store.check_ownership("d1", &b).unwrap());

        let contended = store.acquire_ownership("d1", &b, t0);
        assert!(matches!(contended, Err(OwnershipError::Contended { .. })));

        store.release_ownership("d1").unwrap();
        let t1 = t0 + chrono::Duration::seconds(1);
        store.acquire_ownership("d1", &b, t1).unwrap();
        assert!(store.check_ownership("d1", &b).unwrap());
    }

    #[test]
    fn only_owner_may_renew_heartbeat() {
        let store = seeded("d1");
        let a = NodeId::new("a");
        let b = NodeId::new("b");
        store.acquire_ownership("d1", &a, Utc::now()).unwrap();
        let err = store
            .bump_ownership_heartbeat("d1", &b, Utc::now())
            .unwrap_err();
        assert!(matches!(err, OwnershipError::Contended { .. }));
        store
            .bump_ownership_heartbeat("d1", &a, Utc::now())
            .unwrap();
    }

    #[test]
    fn release_is_idempotent_when_missing() {
        let store = LocalDeploymentStore::new();
        store.release_ownership("ghost").unwrap();
        store.release_ownership("ghost").unwrap();
    }

    #[test]
    fn take_over_steals_an_expired_lease() {
        let store = seeded("d1");
        let a = NodeId::new("a");
        let b = NodeId::new("b");
        let t0 = Utc::now();
        store.acquire_ownership("d1", &a, t0).unwrap();

        let ttl = std::time::Duration::from_secs(3);
        let still_fresh = store.take_over_ownership("d1", &b, t0 + chrono::Duration::seconds(1), ttl);
        assert!(matches!(still_fresh, Err(OwnershipError::Contended { .. })));

        let expired = t0 + chrono::Duration::seconds(10);
        store.take_over_ownership("d1", &b, expired, ttl).unwrap();
        assert!(store.check_ownership("d1", &b).unwrap());
    }

    #[test]
    fn take_over_claims_an_unowned_deployment() {
        let store = seeded("d1");
        let b = NodeId::new("b");
        store
            .take_over_ownership("d1", &b, Utc::now(), std::time::Duration::from_secs(3))
            .unwrap();
        assert!(store.check_ownership("d1", &b).unwrap());
    }
}
