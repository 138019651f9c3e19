//! The `Registry` port (§4.1): the replicated view of machine and
//! heartbeat rows every reconciler worker subscribes to. `LocalRegistry`
//! is the single-replica implementation; the tables it is built on are
//! reused unchanged by the cluster simulator for multi-node tests.

mod error;
mod registry;
mod tables;

pub use error::{RegistryError, Result};
pub use registry::{LocalRegistry, Registry, SUBSCRIPTION_BUFFER};
pub use tables::{HeartbeatTable, MachineTable, NetworkCidrCell};
