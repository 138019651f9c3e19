//! `NetworkConfig`: the single struct threaded through the reconciler, the
//! peer reconciler, and the agent entrypoint.

use std::path::PathBuf;

use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ConfigError, Result};
use crate::hash::{corrosion_api_port, corrosion_gossip_port, wg_interface, wg_port};
use crate::paths::default_data_root;

/// Layered, normalized node configuration. Every field has a sensible
/// zero value; [`NetworkConfig::normalize`] fills in anything left blank
/// by the loader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub network: String,
    pub data_root: PathBuf,

    pub network_cidr: Option<String>,
    pub subnet: Option<String>,
    pub management_ip: Option<String>,
    pub advertise_endpoint: Option<String>,

    pub wg_port: u16,
    pub wg_interface: String,

    pub docker_network: String,
    pub corrosion_name: String,
    pub helper_image: String,
    pub corrosion_image: String,

    pub corrosion_api_port: u16,
    pub corrosion_gossip_port: u16,
    pub corrosion_member_id: String,
    pub corrosion_api_token: String,

    pub bootstrap: Vec<String>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            network: String::new(),
            data_root: default_data_root(),
            network_cidr: None,
            subnet: None,
            management_ip: None,
            advertise_endpoint: None,
            wg_port: 0,
            wg_interface: String::new(),
            docker_network: String::new(),
            corrosion_name: String::new(),
            helper_image: String::new(),
            corrosion_image: String::new(),
            corrosion_api_port: 0,
            corrosion_gossip_port: 0,
            corrosion_member_id: String::new(),
            corrosion_api_token: String::new(),
            bootstrap: Vec::new(),
        }
    }
}

impl NetworkConfig {
    /// Fills in every derived field left blank by the loader. Idempotent:
    /// a config that already carries generated values (member id, token)
    /// is left untouched on re-normalization, so `normalize(normalize(x))
    /// == normalize(x)`.
    pub fn normalize(&mut self) {
        if self.network.is_empty() {
            self.network = "default".to_string();
        }
        if self.wg_port == 0 {
            self.wg_port = wg_port(&self.network);
        }
        if self.corrosion_api_port == 0 {
            self.corrosion_api_port = corrosion_api_port(&self.network);
        }
        if self.corrosion_gossip_port == 0 {
            self.corrosion_gossip_port = corrosion_gossip_port(&self.network);
        }
        if self.wg_interface.is_empty() {
            self.wg_interface = wg_interface(&self.network);
        }
        if self.network_cidr.is_none() {
            self.network_cidr = Some(meshlink_types::default_network_cidr().to_string());
        }
        if self.docker_network.is_empty() {
            self.docker_network = format!("meshlink-{}", self.network);
        }
        if self.corrosion_name.is_empty() {
            self.corrosion_name = format!("meshlink-corrosion-{}", self.network);
        }
        if self.helper_image.is_empty() {
            self.helper_image = "ghcr.io/meshlink/helper:latest".to_string();
        }
        if self.corrosion_image.is_empty() {
            self.corrosion_image = "ghcr.io/meshlink/corrosion:latest".to_string();
        }
        if self.corrosion_member_id.is_empty() {
            self.corrosion_member_id = Uuid::new_v4().to_string();
        }
        if self.corrosion_api_token.is_empty() {
            self.corrosion_api_token = generate_token();
        }
    }

    /// Parses and validates the fields that can't simply default — a bad
    /// CIDR, endpoint, or bootstrap peer is a `Config` error, fatal at
    /// load (§7).
    pub fn validate(&self) -> Result<()> {
        if let Some(cidr) = &self.network_cidr {
            cidr.parse::<Ipv4Net>()
                .map_err(|e| ConfigError::InvalidCidr(cidr.clone(), e.to_string()))?;
        }
        if let Some(endpoint) = &self.advertise_endpoint {
            validate_host_port(endpoint)
                .map_err(|e| ConfigError::InvalidEndpoint(endpoint.clone(), e))?;
        }
        for peer in &self.bootstrap {
            validate_host_port(peer)
                .map_err(|e| ConfigError::InvalidBootstrapPeer(peer.clone(), e))?;
        }
        Ok(())
    }

    pub fn network_cidr(&self) -> Option<Ipv4Net> {
        self.network_cidr.as_ref().and_then(|s| s.parse().ok())
    }
}

fn validate_host_port(value: &str) -> std::result::Result<(), String> {
    let (host, port) = value
        .rsplit_once(':')
        .ok_or_else(|| "missing ':port'".to_string())?;
    if host.is_empty() {
        return Err("empty host".to_string());
    }
    port.parse::<u16>()
        .map_err(|e| format!("invalid port: {e}"))?;
    Ok(())
}

fn generate_token() -> String {
    use rand::RngCore;
    let mut bytes = [0u8; 24];
    rand::thread_rng().fill_bytes(&mut bytes);
    base64_url(&bytes)
}

fn base64_url(bytes: &[u8]) -> String {
    use base64::Engine as _;
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_is_idempotent() {
        let mut cfg = NetworkConfig::default();
        cfg.normalize();
        let once = cfg.clone();
        cfg.normalize();
        assert_eq!(once, cfg);
    }

    #[test]
    fn normalize_fills_defaults() {
        let mut cfg = NetworkConfig::default();
        cfg.normalize();
        assert_eq!(cfg.network, "default");
        assert_eq!(cfg.wg_interface, "plz-default");
        assert!(cfg.wg_port >= 51821 && cfg.wg_port <= 52320);
        assert!(!cfg.corrosion_member_id.is_empty());
        assert!(!cfg.corrosion_api_token.is_empty());
    }

    #[test]
    fn validate_rejects_bad_cidr() {
        let mut cfg = NetworkConfig::default();
        cfg.network_cidr = Some("not-a-cidr".to_string());
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_endpoint() {
        let mut cfg = NetworkConfig::default();
        cfg.advertise_endpoint = Some("no-port-here".to_string());
        assert!(cfg.validate().is_err());
    }
}
