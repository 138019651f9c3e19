//! The reconciliation engine (§4.2–§4.7): subscription handling, delta
//! merge, peer reconciliation, and the freshness/ping/NTP trackers that
//! feed a node's view of its peers.

mod error;
mod freshness;
mod ntp;
mod peer_reconciler;
mod ping;
mod worker;

pub use error::{ReconcilerError, Result};
pub use freshness::{FreshnessTracker, PeerFreshness, DEFAULT_STALE_AGE};
pub use ntp::{NtpChecker, NtpProbe, NtpStatus, CHECK_INTERVAL as NTP_CHECK_INTERVAL, HEALTHY_THRESHOLD as NTP_HEALTHY_THRESHOLD};
pub use peer_reconciler::reconcile_peers;
pub use ping::{DialFn, PingTracker, TcpDialer, DIAL_TIMEOUT, NO_DATA, UNREACHABLE};
pub use worker::{
    EventSink, FailureSink, ReconcilerWorker, WorkerEvent, FULL_RECONCILE_INTERVAL,
    HEARTBEAT_INTERVAL, PING_INTERVAL,
};
