//! The freshness tracker (§4.6): per-peer wall/monotonic staleness, fed by
//! the heartbeat subscription stream. Kept deliberately independent of the
//! ping tracker's reachability signal (§9) — a peer can be fresh but
//! unreachable, or reachable but stale.
//!
//! Callers supply `now`/`now_wall` explicitly (taken from a
//! [`meshlink_platform::Clock`]) rather than the tracker reading the clock
//! itself, so the boundary behavior in §8 scenario 7 is exercisable without
//! sleeping in tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use meshlink_types::NodeId;

/// Boundary is inclusive of "not stale": exactly `stale_age` old is fresh,
/// one tick past it is stale (§8 scenario 7).
pub const DEFAULT_STALE_AGE: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy)]
struct Entry {
    last_seen: Instant,
    reported_at: DateTime<Utc>,
    local_wall_at_rx: DateTime<Utc>,
}

/// A point-in-time freshness reading for one peer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeerFreshness {
    pub freshness: Duration,
    pub stale: bool,
    pub replication_lag: Duration,
    /// -1 unreachable, 0 no data yet, otherwise the latest ping RTT in ms.
    pub ping_rtt_ms: i64,
}

/// Per-peer liveness, independent of the simulator/registry it is fed by.
/// Safe under a single writer (the heartbeat subscription loop) and
/// concurrent readers (e.g. a status RPC).
pub struct FreshnessTracker {
    stale_age: Duration,
    entries: Mutex<HashMap<NodeId, Entry>>,
}

impl FreshnessTracker {
    pub fn new(stale_age: Duration) -> Self {
        Self {
            stale_age,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Records a heartbeat observation for `id`, ignored for `self_id`
    /// (§4.2 step 8: "RecordSeen(NodeID, parsedTime)" with `id != selfID`).
    pub fn record_seen(
        &self,
        id: &NodeId,
        self_id: &NodeId,
        reported_at: DateTime<Utc>,
        now: Instant,
        now_wall: DateTime<Utc>,
    ) {
        if id == self_id {
            return;
        }
        self.entries.lock().expect("freshness mutex poisoned").insert(
            id.clone(),
            Entry {
                last_seen: now,
                reported_at,
                local_wall_at_rx: now_wall,
            },
        );
    }

    pub fn remove(&self, id: &NodeId) {
        self.entries.lock().expect("freshness mutex poisoned").remove(id);
    }

    /// Returns the current freshness for every tracked peer as of `now`,
    /// with `ping_rtt` filled from `ping_rtt_of` (0 if no reading exists).
    pub fn snapshot(
        &self,
        now: Instant,
        ping_rtt_of: impl Fn(&NodeId) -> i64,
    ) -> HashMap<NodeId, PeerFreshness> {
        let entries = self.entries.lock().expect("freshness mutex poisoned");
        entries
            .iter()
            .map(|(id, entry)| {
                let freshness = now.saturating_duration_since(entry.last_seen);
                let lag_signed = entry.local_wall_at_rx.signed_duration_since(entry.reported_at);
                let replication_lag = lag_signed.to_std().unwrap_or(Duration::ZERO);
                (
                    id.clone(),
                    PeerFreshness {
                        freshness,
                        stale: freshness > self.stale_age,
                        replication_lag,
                        ping_rtt_ms: ping_rtt_of(id),
                    },
                )
            })
            .collect()
    }
}

impl Default for FreshnessTracker {
    fn default() -> Self {
        Self::new(DEFAULT_STALE_AGE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn self_heartbeats_are_never_recorded() {
        let tracker = FreshnessTracker::default();
        let self_id = NodeId::new("self");
        let now = Instant::now();
        tracker.record_seen(&self_id, &self_id, Utc::now(), now, Utc::now());
        assert!(tracker.snapshot(now, |_| 0).is_empty());
    }

    #[test]
    fn remove_drops_entry() {
        let tracker = FreshnessTracker::default();
        let self_id = NodeId::new("self");
        let peer = NodeId::new("peer");
        let now = Instant::now();
        tracker.record_seen(&peer, &self_id, Utc::now(), now, Utc::now());
        assert_eq!(tracker.snapshot(now, |_| 0).len(), 1);
        tracker.remove(&peer);
        assert!(tracker.snapshot(now, |_| 0).is_empty());
    }

    #[test]
    fn freshness_boundary_is_not_stale_exactly_at_stale_age() {
        let tracker = FreshnessTracker::new(Duration::from_secs(3));
        let self_id = NodeId::new("self");
        let peer = NodeId::new("peer");
        let t0 = Instant::now();
        tracker.record_seen(&peer, &self_id, Utc::now(), t0, Utc::now());

        let at_boundary = t0 + Duration::from_secs(3);
        let snap = tracker.snapshot(at_boundary, |_| 0);
        assert!(!snap[&peer].stale, "exactly stale_age old must not be stale");

        let past_boundary = t0 + Duration::from_secs(3) + Duration::from_nanos(1);
        let snap = tracker.snapshot(past_boundary, |_| 0);
        assert!(snap[&peer].stale, "one tick past stale_age must be stale");
    }

    #[test]
    fn replication_lag_clamps_negative_skew_to_zero() {
        let tracker = FreshnessTracker::new(Duration::from_secs(3));
        let self_id = NodeId::new("self");
        let peer = NodeId::new("peer");
        let now = Instant::now();
        // A reported_at in the future (remote clock ahead of us) must clamp
        // to zero rather than produce a negative duration.
        let future = Utc::now() + chrono::Duration::seconds(10);
        tracker.record_seen(&peer, &self_id, future, now, Utc::now());
        let snap = tracker.snapshot(now, |_| 0);
        assert_eq!(snap[&peer].replication_lag, Duration::ZERO);
    }

    #[test]
    fn ping_rtt_is_threaded_through() {
        let tracker = FreshnessTracker::default();
        let self_id = NodeId::new("self");
        let peer = NodeId::new("peer");
        let now = Instant::now();
        tracker.record_seen(&peer, &self_id, Utc::now(), now, Utc::now());
        let snap = tracker.snapshot(now, |id| if *id == peer { 42 } else { 0 });
        assert_eq!(snap[&peer].ping_rtt_ms, 42);
    }
}
