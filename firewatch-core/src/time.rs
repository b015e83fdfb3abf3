//! Time management for the monitor
//!
//! Readings are stamped with the moment they reach the monitor, and the
//! link status (online/offline) is a plain comparison between that stamp and
//! the caller's current time. The core never reads a clock on its own; the
//! host passes `now` in, which keeps every operation deterministic in tests.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Timestamp in milliseconds since epoch (or device boot for monotonic)
pub type Timestamp = u64;

/// Source of time for the system
pub trait TimeSource {
    /// Get current timestamp in milliseconds
    fn now(&self) -> Timestamp;

    /// Check if this source provides wall clock time (vs monotonic)
    fn is_wall_clock(&self) -> bool;
}

impl<T: TimeSource + ?Sized> TimeSource for Arc<T> {
    fn now(&self) -> Timestamp {
        (**self).now()
    }

    fn is_wall_clock(&self) -> bool {
        (**self).is_wall_clock()
    }
}

/// Wall clock time source backed by `std::time::SystemTime`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTime;

impl TimeSource for SystemTime {
    fn now(&self) -> Timestamp {
        use std::time::{SystemTime as StdSystemTime, UNIX_EPOCH};

        StdSystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as Timestamp
    }

    fn is_wall_clock(&self) -> bool {
        true
    }
}

/// Manually driven time source for tests and replays
///
/// Interior mutability lets one clock be shared (through an `Arc`) between
/// the code under test and the test driving it.
#[derive(Debug, Default)]
pub struct FixedTime {
    timestamp: AtomicU64,
}

impl FixedTime {
    /// Create a clock frozen at `timestamp`
    pub fn new(timestamp: Timestamp) -> Self {
        Self {
            timestamp: AtomicU64::new(timestamp),
        }
    }

    /// Jump to an absolute time
    pub fn set(&self, timestamp: Timestamp) {
        self.timestamp.store(timestamp, Ordering::SeqCst);
    }

    /// Move the clock forward
    pub fn advance(&self, ms: u64) {
        self.timestamp.fetch_add(ms, Ordering::SeqCst);
    }
}

impl TimeSource for FixedTime {
    fn now(&self) -> Timestamp {
        self.timestamp.load(Ordering::SeqCst)
    }

    fn is_wall_clock(&self) -> bool {
        false
    }
}

/// Milliseconds elapsed from `earlier` to `later`, zero if the clock went backwards
pub fn elapsed_ms(earlier: Timestamp, later: Timestamp) -> u64 {
    later.saturating_sub(earlier)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_time_advances() {
        let time = FixedTime::new(1000);
        assert_eq!(time.now(), 1000);

        time.advance(500);
        assert_eq!(time.now(), 1500);

        time.set(42);
        assert_eq!(time.now(), 42);
    }

    #[test]
    fn shared_clock_sees_updates() {
        let clock = Arc::new(FixedTime::new(0));
        let observer = Arc::clone(&clock);

        clock.advance(10_000);
        assert_eq!(observer.now(), 10_000);
        assert!(!observer.is_wall_clock());
    }

    #[test]
    fn elapsed_saturates_on_backwards_clock() {
        assert_eq!(elapsed_ms(1000, 1500), 500);
        assert_eq!(elapsed_ms(1500, 1000), 0);
    }

    #[test]
    fn system_time_is_wall_clock() {
        let clock = SystemTime;
        assert!(clock.is_wall_clock());
        assert!(clock.now() > 0);
    }
}
