//! The NTP checker (§4.2 step 4): a self-clock-skew estimator run against
//! an external time pool. The probe itself is injectable so tests never
//! touch the network.

use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};

/// A peer's clock is considered healthy within 500ms of the pool (§4.2).
pub const HEALTHY_THRESHOLD: Duration = Duration::from_millis(500);

/// Re-checked every 60s after the initial check at startup (§4.2 step 4).
pub const CHECK_INTERVAL: Duration = Duration::from_secs(60);

type ProbeFuture = Pin<Box<dyn Future<Output = Result<i64, String>> + Send>>;

/// Queries an external time source and returns the signed offset in
/// milliseconds (positive: local clock ahead; negative: local clock
/// behind).
pub trait NtpProbe: Send + Sync {
    fn offset_ms(&self) -> ProbeFuture;
}

impl<F> NtpProbe for F
where
    F: Fn() -> ProbeFuture + Send + Sync,
{
    fn offset_ms(&self) -> ProbeFuture {
        self()
    }
}

/// The latest NTP check result, set atomically by [`NtpChecker::check`].
#[derive(Debug, Clone, PartialEq)]
pub struct NtpStatus {
    pub offset_ms: i64,
    pub healthy: bool,
    pub checked_at: DateTime<Utc>,
    pub error: Option<String>,
}

impl NtpStatus {
    fn unknown() -> Self {
        Self {
            offset_ms: 0,
            healthy: true,
            checked_at: Utc::now(),
            error: None,
        }
    }
}

pub struct NtpChecker {
    probe: Box<dyn NtpProbe>,
    status: Mutex<NtpStatus>,
}

impl NtpChecker {
    pub fn new(probe: Box<dyn NtpProbe>) -> Self {
        Self {
            probe,
            status: Mutex::new(NtpStatus::unknown()),
        }
    }

    /// Runs one check and atomically replaces the stored status, regardless
    /// of whether the probe succeeded — a failed probe still records
    /// `error` and `checked_at` so staleness of the *check itself* is
    /// observable.
    pub async fn check(&self) {
        let result = self.probe.offset_ms().await;
        let status = match result {
            Ok(offset_ms) => NtpStatus {
                offset_ms,
                healthy: offset_ms.unsigned_abs() < HEALTHY_THRESHOLD.as_millis() as u64,
                checked_at: Utc::now(),
                error: None,
            },
            Err(err) => NtpStatus {
                offset_ms: 0,
                healthy: false,
                checked_at: Utc::now(),
                error: Some(err),
            },
        };
        *self.status.lock().expect("ntp mutex poisoned") = status;
    }

    pub fn status(&self) -> NtpStatus {
        self.status.lock().expect("ntp mutex poisoned").clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed_offset(offset_ms: i64) -> Box<dyn NtpProbe> {
        Box::new(move || -> ProbeFuture { Box::pin(async move { Ok(offset_ms) }) })
    }

    fn always_fails() -> Box<dyn NtpProbe> {
        Box::new(|| -> ProbeFuture { Box::pin(async { Err("pool unreachable".to_string()) }) })
    }

    #[tokio::test]
    async fn small_offset_is_healthy() {
        let checker = NtpChecker::new(fixed_offset(100));
        checker.check().await;
        let status = checker.status();
        assert!(status.healthy);
        assert_eq!(status.offset_ms, 100);
    }

    #[tokio::test]
    async fn large_offset_is_unhealthy() {
        let checker = NtpChecker::new(fixed_offset(600));
        checker.check().await;
        assert!(!checker.status().healthy);
    }

    #[tokio::test]
    async fn offset_exactly_at_threshold_is_healthy() {
        let checker = NtpChecker::new(fixed_offset(499));
        checker.check().await;
        assert!(checker.status().healthy);
    }

    #[tokio::test]
    async fn probe_failure_is_recorded_and_unhealthy() {
        let checker = NtpChecker::new(always_fails());
        checker.check().await;
        let status = checker.status();
        assert!(!status.healthy);
        assert!(status.error.is_some());
    }
}
