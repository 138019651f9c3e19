//! [`Node`]: the facade's single entry point, wiring the config, state,
//! registry, platform and reconciler layers together the way an agent
//! entrypoint would, but reusable by anything embedding meshlink as a
//! library (tests, the `meshlink-agent` binary, a future MCP-style
//! surface).

use std::sync::Arc;

use meshlink_config::NetworkConfig;
use meshlink_ownership::{DeploymentStore, LocalDeploymentStore, SweeperConfig};
use meshlink_platform::{Clock, LoggingPlatformOps, PlatformOps, SystemClock};
use meshlink_reconciler::{EventSink, FailureSink, ReconcilerWorker};
use meshlink_registry::{LocalRegistry, Registry};
use meshlink_types::{MachineRow, NodeId, NodeState};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::Result;
use crate::subnet::allocate_subnet;

/// One node's view of the cluster plus everything needed to reconcile it.
///
/// The default wiring (`LocalRegistry`, `LoggingPlatformOps`,
/// `SystemClock`, `LocalDeploymentStore`) is only a correct *single-node*
/// registry — real multi-node replication is a property of whichever
/// `Registry` implementation the caller substitutes via
/// [`Node::with_registry`] (the in-memory `ClusterSimulator` in tests, a
/// Corrosion-backed one in production; both are out of this crate's
/// scope per the port boundary in §6).
pub struct Node {
    config: NetworkConfig,
    state: NodeState,
    registry: Arc<dyn Registry>,
    platform: Arc<dyn PlatformOps>,
    clock: Arc<dyn Clock>,
    deployments: Arc<dyn DeploymentStore>,
}

impl Node {
    pub fn new(config: NetworkConfig, state: NodeState) -> Self {
        Self {
            config,
            state,
            registry: Arc::new(LocalRegistry::new()),
            platform: Arc::new(LoggingPlatformOps),
            clock: Arc::new(SystemClock),
            deployments: Arc::new(LocalDeploymentStore::new()),
        }
    }

    #[must_use]
    pub fn with_registry(mut self, registry: Arc<dyn Registry>) -> Self {
        self.registry = registry;
        self
    }

    #[must_use]
    pub fn with_platform(mut self, platform: Arc<dyn PlatformOps>) -> Self {
        self.platform = platform;
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_deployment_store(mut self, store: Arc<dyn DeploymentStore>) -> Self {
        self.deployments = store;
        self
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    pub fn state(&self) -> &NodeState {
        &self.state
    }

    pub fn self_id(&self) -> NodeId {
        NodeId::new(self.state.node_id.clone())
    }

    pub fn registry(&self) -> Arc<dyn Registry> {
        self.registry.clone()
    }

    pub fn deployments(&self) -> Arc<dyn DeploymentStore> {
        self.deployments.clone()
    }

    /// Ensures the shared schema exists and this node's own CIDR
    /// preference has been reconciled against whatever the cluster
    /// already agreed on (§4.1 "first-writer-wins").
    pub async fn ensure_network_identity(&self) -> Result<ipnet::Ipv4Net> {
        self.registry.ensure_machine_table().await?;
        self.registry.ensure_heartbeat_table().await?;
        self.registry.ensure_network_config_table().await?;
        self.registry.ensure_deployment_table().await?;

        let requested = self.config.network_cidr();
        let cidr = self
            .registry
            .ensure_network_cidr(requested, requested, meshlink_types::default_network_cidr())
            .await?;
        Ok(cidr)
    }

    /// Finds and claims an unused `/24` under `cidr`, publishing this
    /// node's `MachineRow` at version 1. Retries against a freshly listed
    /// snapshot on `Conflict` — another node may win the same candidate
    /// subnet in the same race.
    pub async fn claim_subnet_and_publish(
        &self,
        cidr: ipnet::Ipv4Net,
        public_key: meshlink_types::PublicKey,
        endpoint: Option<String>,
    ) -> Result<MachineRow> {
        loop {
            let existing = self.registry.list_machine_rows().await?;
            let subnet = allocate_subnet(cidr, &existing)?;
            let row = MachineRow {
                id: self.self_id(),
                public_key: public_key.clone(),
                subnet,
                endpoint: endpoint.clone(),
                updated_at: self.clock.now_utc(),
                version: meshlink_types::Version::NONE,
            };
            match self
                .registry
                .upsert_machine(row.clone(), meshlink_types::Version::NONE)
                .await
            {
                Ok(version) => {
                    let mut stored = row;
                    stored.version = version;
                    return Ok(stored);
                }
                Err(meshlink_registry::RegistryError::Conflict { .. }) => continue,
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Builds the reconciler worker for this node (§4.2), wired with the
    /// freshness/ping/NTP trackers the caller has already set up on
    /// itself — the worker only needs the handles to subscribe through.
    pub fn build_worker(&self) -> ReconcilerWorker {
        ReconcilerWorker::new(
            self.registry.clone(),
            self.platform.clone(),
            self.clock.clone(),
            self.config.clone(),
            self.state.clone(),
        )
    }

    pub fn sweeper_config(&self) -> SweeperConfig {
        SweeperConfig::new(self.self_id())
    }

    /// Runs the reconciler worker and the ownership sweeper side by side
    /// until `cancel` fires, mirroring the per-node task set in §5 (main
    /// loop, heartbeat writer, tickers owned by the worker; the sweeper is
    /// this method's own addition). Returns the worker's result; the
    /// sweeper never exits on its own and is aborted on cancellation.
    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        self.run_with(cancel, worker_noop_event_sink(), worker_noop_failure_sink())
            .await
    }

    pub async fn run_with(
        self,
        cancel: CancellationToken,
        on_event: EventSink,
        on_failure: FailureSink,
    ) -> Result<()> {
        let sweeper_cfg = self.sweeper_config();
        let deployments = self.deployments.clone();
        let sweeper_cancel = cancel.clone();
        let sweeper = tokio::spawn(async move {
            meshlink_ownership::run_sweeper(
                deployments,
                sweeper_cfg,
                chrono::Utc::now,
                sweeper_cancel,
            )
            .await;
        });

        info!(node_id = %self.state.node_id, network = %self.config.network, "node starting");
        let worker = self
            .build_worker()
            .with_event_sink(on_event)
            .with_failure_sink(on_failure);
        let result = worker.run(cancel).await;

        sweeper.abort();
        result.map_err(Into::into)
    }
}

fn worker_noop_event_sink() -> EventSink {
    Arc::new(|_event| {})
}

fn worker_noop_failure_sink() -> FailureSink {
    Arc::new(|_err| {})
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine as _;
    use meshlink_types::{Keypair, PublicKey};

    fn sample_config() -> NetworkConfig {
        let mut cfg = NetworkConfig::default();
        cfg.network = "test".to_string();
        cfg.normalize();
        cfg
    }

    fn sample_state(node_id: &str) -> NodeState {
        NodeState::new(
            node_id,
            Keypair {
                public: "pub".into(),
                private: "priv".into(),
            },
            "10.210.1.0/24".parse().unwrap(),
            "plz-test",
            51820,
        )
    }

    fn sample_key(byte: u8) -> PublicKey {
        let encoded = base64::engine::general_purpose::STANDARD.encode([byte; 32]);
        PublicKey::parse(encoded).unwrap()
    }

    #[tokio::test]
    async fn ensure_network_identity_installs_configured_cidr() {
        let mut cfg = sample_config();
        cfg.network_cidr = Some("10.42.0.0/16".to_string());
        let node = Node::new(cfg, sample_state("a"));
        let cidr = node.ensure_network_identity().await.unwrap();
        assert_eq!(cidr, "10.42.0.0/16".parse().unwrap());
    }

    #[tokio::test]
    async fn claim_subnet_and_publish_avoids_collision() {
        let registry = Arc::new(LocalRegistry::new());
        let node_a = Node::new(sample_config(), sample_state("a"))
            .with_registry(registry.clone() as Arc<dyn Registry>);
        let node_b = Node::new(sample_config(), sample_state("b"))
            .with_registry(registry.clone() as Arc<dyn Registry>);

        let cidr = node_a.ensure_network_identity().await.unwrap();
        let row_a = node_a
            .claim_subnet_and_publish(cidr, sample_key(1), None)
            .await
            .unwrap();
        let row_b = node_b
            .claim_subnet_and_publish(cidr, sample_key(2), None)
            .await
            .unwrap();

        assert_ne!(row_a.subnet, row_b.subnet);
    }
}
