//! The peer reconciler (§4.4): turns a machine-row snapshot into a
//! WireGuard peer set and applies it idempotently through [`PlatformOps`].

use meshlink_config::NetworkConfig;
use meshlink_platform::{PeerConfig, PlatformOps};
use meshlink_types::{MachineRow, NodeId, NodeState, PublicKey};

use crate::error::{ReconcilerError, Result};

/// Transforms `rows` into a peer set (skipping `self_id`) and applies it via
/// `ops`. Safe to call repeatedly with an unchanged snapshot: platform ops
/// are themselves idempotent, and this function never mutates its input.
///
/// Returns the number of peers applied. Fails the whole reconcile, wrapping
/// the cause, if any row carries a public key that does not parse.
pub async fn reconcile_peers(
    ops: &dyn PlatformOps,
    cfg: &NetworkConfig,
    state: &NodeState,
    self_id: &NodeId,
    rows: &[MachineRow],
) -> Result<usize> {
    let mut peers = Vec::with_capacity(rows.len());
    for row in rows {
        if &row.id == self_id {
            continue;
        }
        let public_key = PublicKey::parse(row.public_key.as_str()).map_err(|source| {
            ReconcilerError::InvalidPeerKey {
                machine_id: row.id.as_str().to_string(),
                source,
            }
        })?;
        let management_ip = row.management_ip();
        peers.push(PeerConfig {
            public_key,
            endpoint: row.endpoint.clone(),
            allowed_prefixes: vec![
                format!("{}/128", management_ip.addr()),
                row.subnet.to_string(),
            ],
        });
    }
    let count = peers.len();
    ops.apply_peer_config(cfg, state, &peers).await?;
    Ok(count)
}
