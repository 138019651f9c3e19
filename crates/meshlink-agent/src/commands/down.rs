//! `down`: tears down this node's local data-plane state, optionally
//! purging its persisted identity too.

use std::path::Path;

use anyhow::{Context, Result};
use meshlink::{LoggingPlatformOps, PlatformOps};
use meshlink_state::{FileStateStore, StateStore};

pub async fn run(path: &str, purge: bool) -> Result<()> {
    let data_root = Path::new(path);
    let config = meshlink_config::load(data_root)
        .with_context(|| format!("failed to load configuration from {path}"))?;
    let store = FileStateStore::new();
    let mut state = store
        .load(data_root)
        .with_context(|| format!("no node state at {path}"))?;

    let platform = LoggingPlatformOps;
    platform
        .cleanup_wireguard(&state)
        .await
        .context("failed to clean up the WireGuard interface")?;
    platform
        .cleanup_docker_network(&config)
        .await
        .context("failed to clean up the docker network")?;

    state.running = false;
    store
        .save(data_root, &state)
        .context("failed to persist stopped state")?;

    if purge {
        store
            .delete(data_root)
            .context("failed to delete node state")?;
        println!("Node state at {path} removed.");
    } else {
        println!("Node at {path} torn down (state preserved).");
    }

    Ok(())
}
