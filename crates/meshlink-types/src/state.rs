//! Local, non-replicated node state (§3 "NodeState").

use ipnet::Ipv4Net;
use rand_core::OsRng;
use serde::{Deserialize, Serialize};
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret};

/// A WireGuard keypair. The private half is kept as opaque base64 text —
/// this crate never touches key material beyond storing and round-tripping
/// it, and never derives anything from the private half.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keypair {
    pub public: String,
    pub private: String,
}

impl Keypair {
    /// Generates a fresh Curve25519 keypair using the OS RNG, the way a
    /// node mints its identity on first `init` (§6 "keypair"). The two
    /// halves are stored as the same base64 text WireGuard itself uses,
    /// so `public` round-trips straight through [`crate::PublicKey::parse`].
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(OsRng);
        let public = X25519PublicKey::from(&secret);
        Self {
            public: encode(public.as_bytes()),
            private: encode(&secret.to_bytes()),
        }
    }
}

fn encode(bytes: &[u8]) -> String {
    use base64::Engine as _;
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

/// Everything a node remembers about itself between restarts. Not
/// replicated; persisted and loaded through the state-store port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeState {
    pub node_id: String,
    pub keypair: Keypair,
    pub subnet: Ipv4Net,
    pub wg_interface: String,
    pub wg_port: u16,
    pub corrosion_member_id: String,
    pub corrosion_api_token: String,
    pub bootstrap_peers: Vec<String>,
    pub running: bool,
}

impl NodeState {
    pub fn new(
        node_id: impl Into<String>,
        keypair: Keypair,
        subnet: Ipv4Net,
        wg_interface: impl Into<String>,
        wg_port: u16,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            keypair,
            subnet,
            wg_interface: wg_interface.into(),
            wg_port,
            corrosion_member_id: String::new(),
            corrosion_api_token: String::new(),
            bootstrap_peers: Vec::new(),
            running: false,
        }
    }
}
