//! Layered loading: defaults, then `mesh.toml`, then `mesh.local.toml`,
//! then `MESHLINK_`-prefixed environment overrides.

use std::path::Path;

use config::{Config, Environment, File, FileFormat};
use tracing::debug;

use crate::config::NetworkConfig;
use crate::error::Result;
use crate::paths::{local_toml, project_toml};

/// Loads and normalizes a [`NetworkConfig`] for the node rooted at
/// `data_root`, following the precedence in order: built-in defaults,
/// `<data_root>/mesh.toml`, `<data_root>/mesh.local.toml`, then
/// `MESHLINK_*` environment variables (nesting separator `_`).
pub fn load(data_root: &Path) -> Result<NetworkConfig> {
    let defaults = NetworkConfig::default();
    let defaults_toml = toml::to_string(&defaults).expect("defaults always serialize");

    let builder = Config::builder()
        .add_source(File::from_str(&defaults_toml, FileFormat::Toml))
        .add_source(File::from(project_toml(data_root)).required(false))
        .add_source(File::from(local_toml(data_root)).required(false))
        .add_source(Environment::with_prefix("MESHLINK").separator("_"));

    let raw = builder.build()?;
    let mut cfg: NetworkConfig = raw.try_deserialize()?;
    if cfg.data_root.as_os_str().is_empty() {
        cfg.data_root = data_root.to_path_buf();
    }
    cfg.normalize();
    cfg.validate()?;
    debug!(network = %cfg.network, wg_port = cfg.wg_port, "configuration loaded");
    Ok(cfg)
}
