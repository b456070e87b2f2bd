//! Process-wide monotonic microsecond clock.
//!
//! The epoch is captured on first use; all framework timestamps and delays
//! are microsecond offsets from it. [`Deadline`] converts an offset back into
//! an absolute point that a timed condition wait can target.

use std::sync::OnceLock;
use std::time::{Duration, Instant};

static EPOCH: OnceLock<Instant> = OnceLock::new();

fn epoch() -> Instant {
    *EPOCH.get_or_init(Instant::now)
}

/// Microseconds elapsed since the process epoch.
///
/// Monotonic non-decreasing for the lifetime of the process.
pub fn now_us() -> u64 {
    epoch().elapsed().as_micros() as u64
}

/// An absolute point in monotonic time that a timed wait can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Deadline(Instant);

impl Deadline {
    /// Deadline `timeout_ms` milliseconds from now.
    pub fn after_ms(timeout_ms: u64) -> Self {
        Deadline(Instant::now() + Duration::from_millis(timeout_ms))
    }

    /// Converts an offset from the process epoch back to an absolute deadline.
    pub fn from_offset_us(offset_us: u64) -> Self {
        Deadline(epoch() + Duration::from_micros(offset_us))
    }

    /// Time left until the deadline; zero once it has passed.
    pub fn remaining(&self) -> Duration {
        self.0.saturating_duration_since(Instant::now())
    }

    pub fn has_passed(&self) -> bool {
        self.remaining().is_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn now_us_is_monotonic() {
        let mut prev = now_us();
        for _ in 0..1000 {
            let cur = now_us();
            assert!(cur >= prev);
            prev = cur;
        }
    }

    #[test]
    fn offset_deadline_round_trips() {
        let deadline = Deadline::from_offset_us(now_us() + 50_000);
        let left = deadline.remaining();
        assert!(left <= Duration::from_millis(50));
        assert!(left > Duration::from_millis(40));
    }

    #[test]
    fn elapsed_deadline_has_passed() {
        let deadline = Deadline::from_offset_us(now_us().saturating_sub(1));
        assert!(deadline.has_passed());
        assert_eq!(deadline.remaining(), Duration::ZERO);
    }

    #[test]
    fn future_deadline_from_ms() {
        let deadline = Deadline::after_ms(20);
        assert!(!deadline.has_passed());
        assert!(deadline.remaining() <= Duration::from_millis(20));
    }
}
