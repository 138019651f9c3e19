//! `init`: bootstraps a node's data directory with a fresh keypair and a
//! normalized, validated configuration.

use std::path::Path;

use anyhow::{bail, Context, Result};
use meshlink_state::{FileStateStore, StateStore};
use meshlink_types::{Keypair, NodeState};

pub fn run(path: &str, network: &str, force: bool) -> Result<()> {
    let data_root = Path::new(path);
    std::fs::create_dir_all(data_root)
        .with_context(|| format!("failed to create data directory {path}"))?;

    let store = FileStateStore::new();
    if !force && store.load(data_root).is_ok() {
        bail!(
            "node already initialized at {path} (use --force to overwrite the existing state)"
        );
    }

    let mut config = meshlink_config::NetworkConfig {
        network: network.to_string(),
        data_root: data_root.to_path_buf(),
        ..meshlink_config::NetworkConfig::default()
    };
    config.normalize();
    config.validate().context("generated configuration is invalid")?;

    let toml = toml::to_string_pretty(&config).context("failed to serialize mesh.toml")?;
    std::fs::write(meshlink_config::project_toml(data_root), toml)
        .context("failed to write mesh.toml")?;

    let keypair = Keypair::generate();
    let node_id = keypair.public.clone();
    let subnet = meshlink_types::nth_subnet(meshlink_types::default_network_cidr(), 1)
        .context("default network CIDR is always large enough for one /24")?;
    let state = NodeState::new(
        node_id,
        keypair,
        subnet,
        config.wg_interface.clone(),
        config.wg_port,
    );
    store
        .save(data_root, &state)
        .context("failed to write state.json")?;

    println!("Initialized meshlink node in {path}");
    println!("  network:   {}", config.network);
    println!("  node id:   {}", state.node_id);
    println!("  wg port:   {}", config.wg_port);
    println!("  interface: {}", config.wg_interface);
    println!();
    println!("Next: meshlinkd up {path}");

    Ok(())
}
