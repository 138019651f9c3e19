//! The `PlatformOps` port (§6): idempotent data-plane mutations. The
//! actual WireGuard/iptables/Docker system calls are out of scope (§1);
//! `LoggingPlatformOps` is the trivial implementation every test and the
//! default agent wiring use in their place.

use meshlink_config::NetworkConfig;
use meshlink_types::{NodeState, PublicKey};
use tracing::info;

use crate::error::Result;

/// One desired peer in a WireGuard peer set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerConfig {
    pub public_key: PublicKey,
    pub endpoint: Option<String>,
    pub allowed_prefixes: Vec<String>,
}

/// Idempotent data-plane operations. `apply_peer_config` always receives
/// the full desired peer set, never a delta — implementations must diff
/// against the current WireGuard state themselves.
pub trait PlatformOps: Send + Sync {
    async fn prepare(&self, state: &NodeState) -> Result<()>;
    async fn configure_wireguard(&self, cfg: &NetworkConfig, state: &NodeState) -> Result<()>;
    async fn ensure_docker_network(&self, cfg: &NetworkConfig) -> Result<()>;
    async fn cleanup_docker_network(&self, cfg: &NetworkConfig) -> Result<()>;
    async fn cleanup_wireguard(&self, state: &NodeState) -> Result<()>;
    async fn after_start(&self, state: &NodeState) -> Result<()>;
    async fn after_stop(&self, state: &NodeState) -> Result<()>;
    async fn apply_peer_config(
        &self,
        cfg: &NetworkConfig,
        state: &NodeState,
        peers: &[PeerConfig],
    ) -> Result<()>;
}

/// Logs every call and otherwise does nothing. Useful for the simulator,
/// for unit tests of the reconciler, and as a starting point for a real
/// backend.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingPlatformOps;

impl PlatformOps for LoggingPlatformOps {
    async fn prepare(&self, state: &NodeState) -> Result<()> {
        info!(node_id = %state.node_id, "prepare");
        Ok(())
    }

    async fn configure_wireguard(&self, cfg: &NetworkConfig, state: &NodeState) -> Result<()> {
        info!(interface = %cfg.wg_interface, node_id = %state.node_id, "configure_wireguard");
        Ok(())
    }

    async fn ensure_docker_network(&self, cfg: &NetworkConfig) -> Result<()> {
        info!(network = %cfg.docker_network, "ensure_docker_network");
        Ok(())
    }

    async fn cleanup_docker_network(&self, cfg: &NetworkConfig) -> Result<()> {
        info!(network = %cfg.docker_network, "cleanup_docker_network");
        Ok(())
    }

    async fn cleanup_wireguard(&self, state: &NodeState) -> Result<()> {
        info!(node_id = %state.node_id, "cleanup_wireguard");
        Ok(())
    }

    async fn after_start(&self, state: &NodeState) -> Result<()> {
        info!(node_id = %state.node_id, "after_start");
        Ok(())
    }

    async fn after_stop(&self, state: &NodeState) -> Result<()> {
        info!(node_id = %state.node_id, "after_stop");
        Ok(())
    }

    async fn apply_peer_config(
        &self,
        _cfg: &NetworkConfig,
        state: &NodeState,
        peers: &[PeerConfig],
    ) -> Result<()> {
        info!(node_id = %state.node_id, peer_count = peers.len(), "apply_peer_config");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine as _;
    use ipnet::Ipv4Net;
    use meshlink_types::Keypair;

    fn sample_state() -> NodeState {
        NodeState::new(
            "node-a",
            Keypair {
                public: "pub".into(),
                private: "priv".into(),
            },
            "10.210.0.0/24".parse::<Ipv4Net>().unwrap(),
            "plz-default",
            51820,
        )
    }

    fn sample_key() -> PublicKey {
        let encoded = base64::engine::general_purpose::STANDARD.encode([3u8; 32]);
        PublicKey::parse(encoded).unwrap()
    }

    #[tokio::test]
    async fn logging_ops_is_idempotent_and_always_ok() {
        let ops = LoggingPlatformOps;
        let cfg = NetworkConfig::default();
        let state = sample_state();
        let peers = vec![PeerConfig {
            public_key: sample_key(),
            endpoint: None,
            allowed_prefixes: vec!["10.210.0.0/24".to_string()],
        }];
        ops.apply_peer_config(&cfg, &state, &peers).await.unwrap();
        ops.apply_peer_config(&cfg, &state, &peers).await.unwrap();
    }
}
