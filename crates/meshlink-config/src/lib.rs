//! Layered configuration for a meshlink node: `NetworkConfig`, its
//! idempotent normalization, deterministic port/interface derivation, and
//! the XDG-aware data-root layout the loader reads from.

mod config;
mod error;
mod hash;
mod loader;
mod paths;

pub use config::NetworkConfig;
pub use error::{ConfigError, Result};
pub use hash::{corrosion_api_port, corrosion_gossip_port, wg_interface, wg_port};
pub use loader::load;
pub use paths::{default_data_root, local_toml, project_toml, state_path};
