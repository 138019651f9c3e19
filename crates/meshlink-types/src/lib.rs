//! Core replicated data model for the overlay control-plane: machine,
//! heartbeat, deployment and container rows, the delta-application rule
//! subscriptions converge by, and the deterministic network identity
//! (management IPs, subnet carving) every node derives the same way.
//!
//! Nothing in this crate talks to a clock, a disk, or the network — it is
//! pure data plus the pure functions over it, so it can be shared unchanged
//! between the production registry and the in-memory cluster simulator.

mod change;
mod error;
mod ids;
mod network;
mod rows;
mod state;

pub use change::{apply_delta, Change, DeletedRef};
pub use error::{Result, TypesError};
pub use ids::{NodeId, Version};
pub use network::{
    default_network_cidr, nth_subnet, subnet_first_host, ManagementIp, PublicKey,
};
pub use rows::{ContainerRow, DeploymentRow, DeploymentStatus, HeartbeatRow, MachineRow};
pub use state::{Keypair, NodeState};

#[cfg(test)]
mod proptests {
    use super::*;
    use base64::Engine as _;
    use proptest::prelude::*;

    fn arb_key_bytes() -> impl Strategy<Value = [u8; 32]> {
        proptest::array::uniform32(any::<u8>())
    }

    proptest! {
        #[test]
        fn management_ip_is_pure_and_in_site_prefix(bytes in arb_key_bytes()) {
            let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
            let key = PublicKey::parse(encoded).unwrap();
            let a = key.management_ip();
            let b = key.management_ip();
            prop_assert_eq!(a, b);
            prop_assert!(a.in_site_prefix());
        }

        #[test]
        fn nth_subnet_never_overlaps_adjacent_index(index in 0u32..254) {
            let cidr = default_network_cidr();
            let a = nth_subnet(cidr, index).unwrap();
            let b = nth_subnet(cidr, index + 1).unwrap();
            prop_assert_ne!(a, b);
            prop_assert!(!a.contains(&b.network()));
        }
    }
}
