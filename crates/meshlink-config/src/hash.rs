//! Deterministic derivation of ports and interface names from a network
//! name. Must be stable across processes and platforms, so this avoids
//! `std`'s randomized `HashMap` hasher entirely in favor of a fixed FNV-1a.

const FNV_OFFSET_BASIS: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x100000001b3;

fn fnv1a(input: &str) -> u64 {
    let mut hash = FNV_OFFSET_BASIS;
    for byte in input.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Golden-ratio mixing constant, used to decorrelate the two port ranges
/// derived from the same base hash.
const MIX: u64 = 0x9E37_79B9_7F4A_7C15;

const WG_PORT_RANGE: std::ops::RangeInclusive<u16> = 51821..=52320;
const CORROSION_API_PORT_RANGE: std::ops::RangeInclusive<u16> = 52321..=52820;
const CORROSION_GOSSIP_PORT_RANGE: std::ops::RangeInclusive<u16> = 52821..=53320;

fn fold_into_range(hash: u64, range: std::ops::RangeInclusive<u16>) -> u16 {
    let span = u64::from(*range.end() - *range.start()) + 1;
    *range.start() + (hash % span) as u16
}

/// WireGuard listen port, folded into `[51821, 52320]`.
pub fn wg_port(network: &str) -> u16 {
    fold_into_range(fnv1a(network), WG_PORT_RANGE)
}

/// Corrosion's HTTP API port, disjoint from both other derived ranges.
pub fn corrosion_api_port(network: &str) -> u16 {
    let hash = fnv1a(network) ^ MIX;
    fold_into_range(hash, CORROSION_API_PORT_RANGE)
}

/// Corrosion's gossip port, disjoint from both other derived ranges.
pub fn corrosion_gossip_port(network: &str) -> u16 {
    let hash = fnv1a(network).rotate_left(17);
    fold_into_range(hash, CORROSION_GOSSIP_PORT_RANGE)
}

/// WireGuard interface name, `plz-<network>` truncated to 15 bytes (the
/// Linux `IFNAMSIZ` limit minus the null terminator).
pub fn wg_interface(network: &str) -> String {
    let full = format!("plz-{network}");
    if full.len() <= 15 {
        full
    } else {
        full.chars().take(15).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derivation_is_deterministic() {
        assert_eq!(wg_port("default"), wg_port("default"));
        assert_eq!(corrosion_api_port("default"), corrosion_api_port("default"));
    }

    #[test]
    fn derived_ports_stay_in_disjoint_ranges() {
        let port = wg_port("staging");
        assert!(WG_PORT_RANGE.contains(&port));
        let api = corrosion_api_port("staging");
        assert!(CORROSION_API_PORT_RANGE.contains(&api));
        let gossip = corrosion_gossip_port("staging");
        assert!(CORROSION_GOSSIP_PORT_RANGE.contains(&gossip));
    }

    #[test]
    fn interface_name_respects_ifnamsiz() {
        let name = wg_interface("a-very-long-network-name-indeed");
        assert!(name.len() <= 15);
        assert_eq!(wg_interface("default"), "plz-default");
    }
}
