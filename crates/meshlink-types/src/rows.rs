//! The replicated table rows: machines, heartbeats, deployments, containers.

use chrono::{DateTime, Utc};
use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};

use crate::ids::{NodeId, Version};
use crate::network::PublicKey;

/// One cluster member, as gossiped across the cluster.
///
/// `ManagementIP` is deliberately not a stored field: the invariant is that
/// it is always recomputed from `public_key` on read and never trusted from
/// a remote write, so [`MachineRow::management_ip`] derives it on demand
/// rather than caching a value that could be forged or stale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineRow {
    pub id: NodeId,
    pub public_key: PublicKey,
    pub subnet: Ipv4Net,
    pub endpoint: Option<String>,
    pub updated_at: DateTime<Utc>,
    pub version: Version,
}

impl MachineRow {
    pub fn management_ip(&self) -> crate::network::ManagementIp {
        self.public_key.management_ip()
    }
}

/// A per-node liveness beacon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatRow {
    pub node_id: NodeId,
    pub seq: u64,
    pub updated_at: DateTime<Utc>,
}

/// Deployment execution state, as tracked by the current lease owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStatus {
    InProgress,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRow {
    pub id: String,
    pub namespace: String,
    pub status: DeploymentStatus,
    /// Empty means no current owner, mirroring [`NodeId::is_empty`].
    pub owner: NodeId,
    pub owner_heartbeat: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: Version,
}

impl DeploymentRow {
    pub fn is_owned_by(&self, node: &NodeId) -> bool {
        !self.owner.is_empty() && &self.owner == node
    }

    pub fn is_released(&self) -> bool {
        self.owner.is_empty()
    }
}

/// A single container belonging to a deployment, cascade-deleted with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerRow {
    pub id: String,
    pub namespace: String,
    pub deploy_id: String,
    pub service: String,
    pub machine_id: NodeId,
    pub container_name: String,
    pub spec_json: String,
    pub status: String,
    pub version: Version,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
