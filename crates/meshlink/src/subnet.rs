//! Per-node subnet allocation: picks the lowest `/24` index not already
//! claimed by another machine row (§3 "Subnet disjoint across rows").
//!
//! This sits above the `Registry` port rather than inside it — the port
//! itself only offers CAS on a whole row, so "find me an unused subnet"
//! is a client-side loop: list the current rows, pick a candidate, try to
//! win it with an `UpsertMachine` CAS, and retry against a fresh list on
//! `Conflict`.

use std::collections::HashSet;

use ipnet::Ipv4Net;
use meshlink_types::{nth_subnet, MachineRow};

use crate::error::{MeshlinkError, Result};

/// Reserved for infrastructure use (§3's own carving note); member
/// allocation starts at index 1.
const FIRST_MEMBER_INDEX: u32 = 1;

/// Returns the lowest `/24` (by index) under `cidr` not already present in
/// `existing`. Pure over the slice so it is trivially testable without a
/// registry round trip.
pub fn allocate_subnet(cidr: Ipv4Net, existing: &[MachineRow]) -> Result<Ipv4Net> {
    let taken: HashSet<Ipv4Net> = existing.iter().map(|row| row.subnet).collect();
    let mut index = FIRST_MEMBER_INDEX;
    loop {
        let candidate = match nth_subnet(cidr, index) {
            Ok(subnet) => subnet,
            Err(_) => return Err(MeshlinkError::SubnetsExhausted(cidr.to_string())),
        };
        if !taken.contains(&candidate) {
            return Ok(candidate);
        }
        index += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine as _;
    use chrono::Utc;
    use meshlink_types::{NodeId, PublicKey, Version};

    fn row(subnet: &str) -> MachineRow {
        let encoded = base64::engine::general_purpose::STANDARD.encode([4u8; 32]);
        MachineRow {
            id: NodeId::new("m"),
            public_key: PublicKey::parse(encoded).unwrap(),
            subnet: subnet.parse().unwrap(),
            endpoint: None,
            updated_at: Utc::now(),
            version: Version::INITIAL,
        }
    }

    #[test]
    fn first_allocation_skips_the_reserved_index_zero() {
        let cidr: Ipv4Net = "10.210.0.0/16".parse().unwrap();
        let subnet = allocate_subnet(cidr, &[]).unwrap();
        assert_eq!(subnet, "10.210.1.0/24".parse().unwrap());
    }

    #[test]
    fn skips_already_claimed_subnets() {
        let cidr: Ipv4Net = "10.210.0.0/16".parse().unwrap();
        let existing = vec![row("10.210.1.0/24"), row("10.210.2.0/24")];
        let subnet = allocate_subnet(cidr, &existing).unwrap();
        assert_eq!(subnet, "10.210.3.0/24".parse().unwrap());
    }

    #[test]
    fn exhausted_cidr_is_an_error() {
        let cidr: Ipv4Net = "10.210.1.0/24".parse().unwrap();
        let err = allocate_subnet(cidr, &[]).unwrap_err();
        assert!(matches!(err, MeshlinkError::SubnetsExhausted(_)));
    }
}
