//! `up`: claims this node's subnet against the registry and runs the
//! reconciler worker and ownership sweeper until interrupted.

use std::path::Path;

use anyhow::{Context, Result};
use meshlink::Node;
use meshlink_state::{FileStateStore, StateStore};
use meshlink_types::PublicKey;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub async fn run(path: &str) -> Result<()> {
    let data_root = Path::new(path);
    let config = meshlink_config::load(data_root)
        .with_context(|| format!("failed to load configuration from {path}"))?;
    let store = FileStateStore::new();
    let mut state = store
        .load(data_root)
        .with_context(|| format!("no node state at {path} (run 'meshlinkd init {path}' first)"))?;

    let public_key = PublicKey::parse(state.keypair.public.clone())
        .context("stored public key is no longer valid")?;

    let bootstrap = Node::new(config.clone(), state.clone());
    let cidr = bootstrap
        .ensure_network_identity()
        .await
        .context("failed to agree on the network CIDR")?;
    let row = bootstrap
        .claim_subnet_and_publish(cidr, public_key, config.advertise_endpoint.clone())
        .await
        .context("failed to claim a subnet")?;

    if row.subnet != state.subnet {
        state.subnet = row.subnet;
        store
            .save(data_root, &state)
            .context("failed to persist claimed subnet")?;
    }
    state.running = true;
    store.save(data_root, &state).context("failed to persist running state")?;

    info!(node_id = %state.node_id, subnet = %state.subnet, "claimed subnet, starting");
    println!("Node {} running on subnet {}", state.node_id, state.subnet);
    println!("Press Ctrl+C to stop.");

    let node = Node::new(config, state.clone());
    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal_cancel.cancel();
        }
    });

    let result = node.run(cancel).await;

    state.running = false;
    let _ = store.save(data_root, &state);

    result.context("reconciler worker exited with an error")?;
    println!("Node stopped.");
    Ok(())
}
