//! Deadline waits against the monotonic clock.
//!
//! `thread::sleep` on Windows has a granularity of roughly 15 ms unless the
//! system timer resolution is raised, which is far too coarse for 1 ms press
//! cycles.  Everything in the timing engine therefore waits for an absolute
//! [`Instant`] deadline through one of the two functions below, and no other
//! code in the workspace busy-waits.

use std::thread;
use std::time::{Duration, Instant};

/// Remaining time below which [`wait_until`] stops sleeping and polls.
pub const SPIN_THRESHOLD: Duration = Duration::from_millis(2);

/// Polls the clock until `deadline` has passed.
///
/// Burns a core for the whole wait; reserved for sub-millisecond holds.
pub fn spin_until(deadline: Instant) {
    while Instant::now() < deadline {
        std::hint::spin_loop();
    }
}

/// Sleeps until shortly before `deadline`, then polls the rest.
pub fn wait_until(deadline: Instant) {
    loop {
        let now = Instant::now();
        if now >= deadline {
            return;
        }
        let remaining = deadline - now;
        if remaining > SPIN_THRESHOLD {
            thread::sleep(remaining - SPIN_THRESHOLD);
        } else {
            spin_until(deadline);
            return;
        }
    }
}

/// Waits `duration` from now using [`wait_until`].
pub fn pause(duration: Duration) {
    wait_until(Instant::now() + duration);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spin_until_never_returns_before_deadline() {
        // Arrange
        let deadline = Instant::now() + Duration::from_millis(3);

        // Act
        spin_until(deadline);

        // Assert
        assert!(Instant::now() >= deadline);
    }

    #[test]
    fn test_wait_until_never_returns_before_deadline() {
        let deadline = Instant::now() + Duration::from_millis(12);
        wait_until(deadline);
        assert!(Instant::now() >= deadline);
    }

    #[test]
    fn test_wait_until_past_deadline_returns_immediately() {
        let start = Instant::now();
        wait_until(start);
        assert!(start.elapsed() < Duration::from_millis(50));
    }
}
