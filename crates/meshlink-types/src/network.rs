//! Deterministic network identity: public keys, management IPs, subnets.

use std::net::{Ipv4Addr, Ipv6Addr};

use ipnet::{Ipv4Net, Ipv6Net};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TypesError};

/// A WireGuard public key, stored as the base64 text form used on the wire
/// and decoded to raw bytes only where a derivation needs them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicKey(String);

impl PublicKey {
    /// Parses and validates a base64-encoded 32-byte Curve25519 key.
    pub fn parse(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        let decoded = decode_base64(&raw)
            .map_err(|e| TypesError::InvalidPublicKey(raw.clone(), e.to_string()))?;
        if decoded.len() != 32 {
            return Err(TypesError::InvalidPublicKey(
                raw,
                format!("expected 32 bytes, got {}", decoded.len()),
            ));
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn bytes(&self) -> [u8; 32] {
        let decoded = decode_base64(&self.0).expect("validated at construction");
        let mut out = [0u8; 32];
        out.copy_from_slice(&decoded);
        out
    }

    /// Derives this key's management IP. Pure function of the key bytes.
    pub fn management_ip(&self) -> ManagementIp {
        ManagementIp::derive(&self.bytes())
    }
}

impl std::fmt::Display for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn decode_base64(raw: &str) -> std::result::Result<Vec<u8>, base64::DecodeError> {
    use base64::Engine as _;
    base64::engine::general_purpose::STANDARD.decode(raw.trim())
}

/// The fixed 48-bit site prefix every management IP is derived within:
/// `fd8c:0000:0000::/48`.
const MANAGEMENT_PREFIX_V6: [u8; 16] = [
    0xfd, 0x8c, 0x00, 0x00, 0x00, 0x00, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
];

/// A deterministic IPv6 address derived from a node's public key, always
/// falling inside `fd8c::/48`.
///
/// The distilled formula (`fd8c:: | first14(pubkey)`) would let key bytes
/// leak into the `/48` site-prefix bits, so the derivation here keeps those
/// six bytes fixed and folds in the first ten key bytes as the host
/// portion. This keeps both halves of the invariant true at once: the
/// address is a pure function of the key, and it always lies in
/// `fd8c::/48`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ManagementIp(Ipv6Addr);

impl ManagementIp {
    pub fn derive(key_bytes: &[u8; 32]) -> Self {
        let mut octets = [0u8; 16];
        octets[..6].copy_from_slice(&MANAGEMENT_PREFIX_V6[..6]);
        octets[6..16].copy_from_slice(&key_bytes[..10]);
        Self(Ipv6Addr::from(octets))
    }

    pub fn addr(&self) -> Ipv6Addr {
        self.0
    }

    /// The site prefix every management IP lies within.
    pub fn site_prefix() -> Ipv6Net {
        Ipv6Net::new(Ipv6Addr::from(MANAGEMENT_PREFIX_V6), 48).expect("valid literal prefix")
    }

    pub fn in_site_prefix(&self) -> bool {
        Self::site_prefix().contains(&self.0)
    }
}

impl std::fmt::Display for ManagementIp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The overlay's IPv4 super-prefix, default `10.210.0.0/16`, from which
/// per-node `/24` subnets are carved.
pub fn default_network_cidr() -> Ipv4Net {
    "10.210.0.0/16".parse().expect("valid literal CIDR")
}

/// Carves the `index`-th `/24` subnet out of `cidr`.
///
/// Index 0 yields the network's own first `/24`; callers reserve index 0
/// for infrastructure use and hand out `index >= 1` to members if desired,
/// but this function does not enforce that policy itself.
pub fn nth_subnet(cidr: Ipv4Net, index: u32) -> Result<Ipv4Net> {
    if cidr.prefix_len() > 24 {
        return Err(TypesError::InvalidCidr(
            cidr.to_string(),
            "network is smaller than a /24".to_string(),
        ));
    }
    let host_bits = 24 - cidr.prefix_len();
    let max_index = 1u32 << host_bits;
    if index >= max_index {
        return Err(TypesError::SubnetExhausted {
            cidr: cidr.to_string(),
            index,
        });
    }
    let base = u32::from(cidr.network());
    let subnet_base = base + (index << 8);
    Ipv4Net::new(Ipv4Addr::from(subnet_base), 24)
        .map_err(|e| TypesError::InvalidCidr(cidr.to_string(), e.to_string()))
}

/// The first usable host address in a `/24`, used to reach a peer's daemon
/// port when no explicit endpoint was advertised.
pub fn subnet_first_host(subnet: Ipv4Net) -> Ipv4Addr {
    let base = u32::from(subnet.network());
    Ipv4Addr::from(base + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key_of(byte: u8) -> PublicKey {
        use base64::Engine as _;
        let raw = [byte; 32];
        let encoded = base64::engine::general_purpose::STANDARD.encode(raw);
        PublicKey::parse(encoded).unwrap()
    }

    #[test]
    fn management_ip_is_deterministic_and_in_prefix() {
        let key = key_of(7);
        let a = key.management_ip();
        let b = key.management_ip();
        assert_eq!(a, b);
        assert!(a.in_site_prefix());
    }

    #[test]
    fn distinct_keys_yield_distinct_ips() {
        assert_ne!(key_of(1).management_ip(), key_of(2).management_ip());
    }

    #[test]
    fn nth_subnet_carves_disjoint_blocks() {
        let cidr = default_network_cidr();
        let s0 = nth_subnet(cidr, 0).unwrap();
        let s1 = nth_subnet(cidr, 1).unwrap();
        assert_ne!(s0, s1);
        assert_eq!(s0.prefix_len(), 24);
    }

    #[test]
    fn nth_subnet_rejects_out_of_range_index() {
        let cidr: Ipv4Net = "10.210.0.0/24".parse().unwrap();
        assert!(nth_subnet(cidr, 1).is_err());
    }

    #[test]
    fn rejects_malformed_key_length() {
        assert!(PublicKey::parse("not-valid-base64!!").is_err());
    }
}
