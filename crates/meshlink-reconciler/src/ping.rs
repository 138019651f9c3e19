//! The ping tracker (§4.7): per-peer TCP connect RTT, refreshed on a tick.
//! `DialFn` is injectable so tests can simulate partitions and synthetic
//! latencies without touching a real socket.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::time::Duration;

use meshlink_types::NodeId;
use tracing::debug;

pub const DIAL_TIMEOUT: Duration = Duration::from_secs(3);

/// Sentinel RTT for an unreachable peer.
pub const UNREACHABLE: i64 = -1;
/// Sentinel RTT for a peer with no ping data yet.
pub const NO_DATA: i64 = 0;

type DialFuture = Pin<Box<dyn Future<Output = std::io::Result<()>> + Send>>;

/// Establishes a TCP connection to `addr`, used only to measure RTT.
pub trait DialFn: Send + Sync {
    fn dial(&self, addr: &str) -> DialFuture;
}

impl<F> DialFn for F
where
    F: Fn(&str) -> DialFuture + Send + Sync,
{
    fn dial(&self, addr: &str) -> DialFuture {
        self(addr)
    }
}

/// Dials a real TCP socket, used in production.
pub struct TcpDialer;

impl DialFn for TcpDialer {
    fn dial(&self, addr: &str) -> DialFuture {
        let addr = addr.to_string();
        Box::pin(async move {
            tokio::net::TcpStream::connect(addr).await?;
            Ok(())
        })
    }
}

/// Per-peer latest-result RTT map. Missing peers are not evicted except via
/// explicit [`PingTracker::remove`].
pub struct PingTracker {
    dialer: Box<dyn DialFn>,
    rtts: Mutex<HashMap<NodeId, i64>>,
}

impl PingTracker {
    pub fn new(dialer: Box<dyn DialFn>) -> Self {
        Self {
            dialer,
            rtts: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_tcp_dialer() -> Self {
        Self::new(Box::new(TcpDialer))
    }

    pub fn remove(&self, id: &NodeId) {
        self.rtts.lock().expect("ping mutex poisoned").remove(id);
    }

    pub fn rtt_of(&self, id: &NodeId) -> i64 {
        self.rtts
            .lock()
            .expect("ping mutex poisoned")
            .get(id)
            .copied()
            .unwrap_or(NO_DATA)
    }

    /// Dials every `(id, addr)` pair concurrently with a 3s timeout and
    /// records the wall-clock elapsed time to connect. `-1` on timeout or
    /// connect failure.
    pub async fn probe_all(&self, peers: &[(NodeId, String)]) {
        let dials = peers.iter().map(|(id, addr)| async move {
            let start = std::time::Instant::now();
            let outcome = tokio::time::timeout(DIAL_TIMEOUT, self.dialer.dial(addr)).await;
            let rtt = match outcome {
                Ok(Ok(())) => i64::try_from(start.elapsed().as_millis()).unwrap_or(i64::MAX),
                Ok(Err(err)) => {
                    debug!(%id, %addr, %err, "ping dial failed");
                    UNREACHABLE
                }
                Err(_) => {
                    debug!(%id, %addr, "ping dial timed out");
                    UNREACHABLE
                }
            };
            (id.clone(), rtt)
        });
        let results = futures::future::join_all(dials).await;
        let mut rtts = self.rtts.lock().expect("ping mutex poisoned");
        for (id, rtt) in results {
            rtts.insert(id, rtt);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synthetic(latencies: HashMap<String, Option<Duration>>) -> PingTracker {
        PingTracker::new(Box::new(move |addr: &str| -> DialFuture {
            let outcome = latencies.get(addr).copied();
            Box::pin(async move {
                match outcome {
                    Some(Some(delay)) => {
                        tokio::time::sleep(delay).await;
                        Ok(())
                    }
                    Some(None) => Err(std::io::Error::other("connection refused")),
                    None => Err(std::io::Error::other("unknown address")),
                }
            })
        }))
    }

    #[tokio::test]
    async fn reachable_peer_gets_nonnegative_rtt() {
        let mut latencies = HashMap::new();
        latencies.insert("10.0.0.1:51820".to_string(), Some(Duration::from_millis(5)));
        let tracker = synthetic(latencies);
        let peers = vec![(NodeId::new("a"), "10.0.0.1:51820".to_string())];
        tracker.probe_all(&peers).await;
        assert!(tracker.rtt_of(&NodeId::new("a")) >= 0);
    }

    #[tokio::test]
    async fn unreachable_peer_is_negative_one() {
        let mut latencies = HashMap::new();
        latencies.insert("10.0.0.2:51820".to_string(), None);
        let tracker = synthetic(latencies);
        let peers = vec![(NodeId::new("b"), "10.0.0.2:51820".to_string())];
        tracker.probe_all(&peers).await;
        assert_eq!(tracker.rtt_of(&NodeId::new("b")), UNREACHABLE);
    }

    #[tokio::test]
    async fn missing_peer_has_no_data_until_probed() {
        let tracker = synthetic(HashMap::new());
        assert_eq!(tracker.rtt_of(&NodeId::new("ghost")), NO_DATA);
    }

    #[tokio::test]
    async fn remove_evicts_entry() {
        let mut latencies = HashMap::new();
        latencies.insert("10.0.0.1:51820".to_string(), Some(Duration::from_millis(1)));
        let tracker = synthetic(latencies);
        let peers = vec![(NodeId::new("a"), "10.0.0.1:51820".to_string())];
        tracker.probe_all(&peers).await;
        tracker.remove(&NodeId::new("a"));
        assert_eq!(tracker.rtt_of(&NodeId::new("a")), NO_DATA);
    }
}
