//! Single-writer deployment ownership (§4.5): CAS-based lease acquisition
//! over `DeploymentRow`, a takeover sweeper for stale leases, and the
//! supervisor that holds a lease for the duration of a unit of work.

mod error;
mod store;
mod supervisor;
mod sweeper;

pub use error::{OwnershipError, Result};
pub use store::{DeploymentStore, LocalDeploymentStore};
pub use supervisor::supervise;
pub use sweeper::{run_sweeper, sweep_once, SweeperConfig, DEFAULT_LEASE_TTL, DEFAULT_SWEEP_INTERVAL};
