//! The `Clock` port (§6): virtualizable so tests control elapsed time
//! without sleeping.

use std::time::{Instant, SystemTime};

use chrono::{DateTime, Utc};

pub trait Clock: Send + Sync {
    fn now(&self) -> SystemTime;
    fn now_monotonic(&self) -> Instant;

    fn now_utc(&self) -> DateTime<Utc> {
        DateTime::<Utc>::from(self.now())
    }
}

/// The real wall/monotonic clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }

    fn now_monotonic(&self) -> Instant {
        Instant::now()
    }
}

/// A clock tests can move forward deterministically, without touching
/// the OS clock. `advance` moves both the wall and monotonic readings by
/// the same duration, preserving their relative offset.
#[derive(Debug, Clone)]
pub struct VirtualClock {
    wall: std::sync::Arc<std::sync::Mutex<SystemTime>>,
    monotonic: std::sync::Arc<std::sync::Mutex<Instant>>,
}

impl VirtualClock {
    pub fn new(start: SystemTime) -> Self {
        Self {
            wall: std::sync::Arc::new(std::sync::Mutex::new(start)),
            monotonic: std::sync::Arc::new(std::sync::Mutex::new(Instant::now())),
        }
    }

    pub fn advance(&self, delta: std::time::Duration) {
        let mut wall = self.wall.lock().expect("virtual clock poisoned");
        *wall += delta;
        let mut monotonic = self.monotonic.lock().expect("virtual clock poisoned");
        *monotonic += delta;
    }
}

impl Clock for VirtualClock {
    fn now(&self) -> SystemTime {
        *self.wall.lock().expect("virtual clock poisoned")
    }

    fn now_monotonic(&self) -> Instant {
        *self.monotonic.lock().expect("virtual clock poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn virtual_clock_advances_both_readings() {
        let clock = VirtualClock::new(SystemTime::UNIX_EPOCH);
        let t0 = clock.now_monotonic();
        clock.advance(Duration::from_secs(3));
        assert_eq!(
            clock.now().duration_since(SystemTime::UNIX_EPOCH).unwrap(),
            Duration::from_secs(3)
        );
        assert!(clock.now_monotonic() >= t0 + Duration::from_secs(3));
    }
}
