//! `status`: prints this node's local identity and configuration. Purely
//! local — there is no running-agent IPC surface to query (§1 Non-goals).

use std::path::Path;

use anyhow::{Context, Result};
use meshlink_state::{FileStateStore, StateStore};

pub fn run(path: &str) -> Result<()> {
    let data_root = Path::new(path);
    let config = meshlink_config::load(data_root)
        .with_context(|| format!("failed to load configuration from {path}"))?;
    let store = FileStateStore::new();
    let state = store
        .load(data_root)
        .with_context(|| format!("no node state at {path} (run 'meshlinkd init {path}' first)"))?;

    let public_key = meshlink_types::PublicKey::parse(state.keypair.public.clone())
        .context("stored public key is no longer valid")?;

    println!("node id:       {}", state.node_id);
    println!("network:       {}", config.network);
    println!("subnet:        {}", state.subnet);
    println!("management ip: {}", public_key.management_ip());
    println!("wg interface:  {}", state.wg_interface);
    println!("wg port:       {}", state.wg_port);
    println!("running:       {}", state.running);
    if !state.bootstrap_peers.is_empty() {
        println!("bootstrap:     {}", state.bootstrap_peers.join(", "));
    }

    Ok(())
}
