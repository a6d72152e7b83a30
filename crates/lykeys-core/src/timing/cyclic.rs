//! Rapid press/release cycling.
//!
//! A [`CyclicPress`] presses one key for `hold`, releases it, waits
//! `interval`, and repeats until its optional total duration elapses or the
//! run flag is cleared.  Cycle deadlines are scheduled from the previous
//! deadline rather than from "now", so per-cycle jitter does not accumulate
//! into drift over a long run.

use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::domain::{InjectError, InputAction};
use crate::keymap::KeyCode;

use super::{precise, InjectionSink, RunFlag, RunOutcome};

/// Minimum spacing between progress callbacks.
pub const STATUS_INTERVAL: Duration = Duration::from_secs(1);

/// Progress snapshot handed to the status callback.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PressStatus {
    pub elapsed: Duration,
    pub presses: u64,
    /// Presses per second over `elapsed`.
    pub rate: f64,
    /// Set on the last snapshot of a run.
    pub finished: bool,
}

impl PressStatus {
    fn new(elapsed: Duration, presses: u64, finished: bool) -> Self {
        Self {
            elapsed,
            presses,
            rate: rate(presses, elapsed),
            finished,
        }
    }
}

/// Outcome of a finished run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PressReport {
    pub presses: u64,
    pub elapsed: Duration,
    pub outcome: RunOutcome,
}

impl PressReport {
    pub fn rate(&self) -> f64 {
        rate(self.presses, self.elapsed)
    }
}

/// Parameters of one rapid-press test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CyclicPress {
    pub key: KeyCode,
    pub hold: Duration,
    pub interval: Duration,
    /// `None` runs until cancelled.
    pub duration: Option<Duration>,
}

impl CyclicPress {
    /// An unbounded run.
    pub fn new(key: KeyCode, hold: Duration, interval: Duration) -> Self {
        Self {
            key,
            hold,
            interval,
            duration: None,
        }
    }

    /// Bounds the run to `total`; a zero duration means unbounded.
    pub fn with_duration(mut self, total: Duration) -> Self {
        self.duration = (!total.is_zero()).then_some(total);
        self
    }

    /// Time from one key-down to the next.
    pub fn period(&self) -> Duration {
        self.hold + self.interval
    }

    /// Runs the cycle on the calling thread.
    ///
    /// `on_status` is called at most once per [`STATUS_INTERVAL`] while
    /// running, and once more with `finished` set when the run ends.  When
    /// the duration is reached the final snapshot reports exactly that
    /// duration.
    ///
    /// # Errors
    ///
    /// Returns the sink's error if the readiness check before a cycle or any
    /// emit fails.  The run is aborted; presses made so far are lost with it.
    pub fn run<S, F>(
        &self,
        sink: &mut S,
        flag: &RunFlag,
        mut on_status: F,
    ) -> Result<PressReport, InjectError>
    where
        S: InjectionSink + ?Sized,
        F: FnMut(PressStatus),
    {
        info!(
            key = %self.key,
            hold_us = self.hold.as_micros() as u64,
            interval_us = self.interval.as_micros() as u64,
            duration_ms = self.duration.map(|d| d.as_millis() as u64),
            "rapid press started"
        );

        let period = self.period();
        let start = Instant::now();
        let mut throttle = StatusThrottle::new(start, STATUS_INTERVAL);
        let mut cycle_start = start;
        let mut presses: u64 = 0;

        loop {
            if !flag.is_running() {
                let elapsed = start.elapsed();
                on_status(PressStatus::new(elapsed, presses, true));
                info!(presses, elapsed_ms = elapsed.as_millis() as u64, "rapid press cancelled");
                return Ok(PressReport {
                    presses,
                    elapsed,
                    outcome: RunOutcome::Cancelled,
                });
            }

            let now = Instant::now();
            let elapsed = now - start;
            if let Some(total) = self.duration {
                if elapsed >= total {
                    on_status(PressStatus::new(total, presses, true));
                    info!(presses, "rapid press completed");
                    return Ok(PressReport {
                        presses,
                        elapsed: total,
                        outcome: RunOutcome::Completed,
                    });
                }
            }
            if throttle.ready(now) {
                on_status(PressStatus::new(elapsed, presses, false));
            }

            sink.check_ready()?;
            sink.emit(InputAction::KeyDown(self.key))?;
            precise::spin_until(cycle_start + self.hold);
            sink.emit(InputAction::KeyUp(self.key))?;
            presses += 1;

            let next = cycle_start + period;
            precise::spin_until(next);

            // Fell more than a whole period behind (preempted): restart the
            // schedule from now instead of firing a burst of late cycles.
            let now = Instant::now();
            cycle_start = if now.saturating_duration_since(next) > period {
                debug!(late_us = (now - next).as_micros() as u64, "rapid press resynchronised");
                now
            } else {
                next
            };
        }
    }
}

/// Lets a callback through at most once per interval.
#[derive(Debug, Clone, Copy)]
pub struct StatusThrottle {
    interval: Duration,
    last: Instant,
}

impl StatusThrottle {
    pub fn new(start: Instant, interval: Duration) -> Self {
        Self {
            interval,
            last: start,
        }
    }

    /// Returns `true` and re-arms when at least one interval has passed.
    pub fn ready(&mut self, now: Instant) -> bool {
        if now.saturating_duration_since(self.last) >= self.interval {
            self.last = now;
            true
        } else {
            false
        }
    }
}

fn rate(presses: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        presses as f64 / secs
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DeviceStatus;
    use crate::timing::recording::RecordingSink;

    const KEY: KeyCode = KeyCode(0x41);

    /// Clears the run flag after a fixed number of key-ups.
    struct StopAfter {
        inner: RecordingSink,
        flag: RunFlag,
        releases_left: usize,
    }

    impl InjectionSink for StopAfter {
        fn check_ready(&mut self) -> Result<(), InjectError> {
            self.inner.check_ready()
        }

        fn emit(&mut self, action: InputAction) -> Result<(), InjectError> {
            if let InputAction::KeyUp(_) = action {
                self.releases_left = self.releases_left.saturating_sub(1);
                if self.releases_left == 0 {
                    self.flag.stop();
                }
            }
            self.inner.emit(action)
        }
    }

    #[test]
    fn test_with_zero_duration_is_unbounded() {
        let press = CyclicPress::new(KEY, Duration::from_millis(1), Duration::from_millis(1))
            .with_duration(Duration::ZERO);
        assert_eq!(press.duration, None);
    }

    #[test]
    fn test_bounded_run_reports_exact_duration_and_alternates_down_up() {
        // Arrange
        let press = CyclicPress::new(KEY, Duration::from_millis(1), Duration::from_millis(1))
            .with_duration(Duration::from_millis(200));
        let mut sink = RecordingSink::new();
        let flag = RunFlag::new();
        let mut statuses = Vec::new();

        // Act
        let report = press.run(&mut sink, &flag, |s| statuses.push(s)).unwrap();

        // Assert
        assert_eq!(report.outcome, RunOutcome::Completed);
        assert_eq!(report.elapsed, Duration::from_millis(200));
        assert!(report.presses >= 50 && report.presses <= 101, "{}", report.presses);

        let last = statuses.last().copied().unwrap();
        assert!(last.finished);
        assert_eq!(last.elapsed, Duration::from_millis(200));
        assert_eq!(last.presses, report.presses);

        let actions = sink.actions();
        assert_eq!(actions.len() as u64, report.presses * 2);
        for pair in actions.chunks(2) {
            assert_eq!(pair, [InputAction::KeyDown(KEY), InputAction::KeyUp(KEY)]);
        }
    }

    #[test]
    fn test_key_up_never_precedes_hold_time() {
        let hold = Duration::from_millis(2);
        let press = CyclicPress::new(KEY, hold, Duration::from_millis(1))
            .with_duration(Duration::from_millis(30));
        let mut sink = RecordingSink::new();

        press.run(&mut sink, &RunFlag::new(), |_| {}).unwrap();

        for pair in sink.events.chunks(2) {
            let (down_at, _) = pair[0];
            let (up_at, _) = pair[1];
            assert!(up_at - down_at >= hold - Duration::from_micros(100));
        }
    }

    #[test]
    fn test_cleared_flag_stops_before_next_cycle() {
        // Arrange
        let flag = RunFlag::new();
        let mut sink = StopAfter {
            inner: RecordingSink::new(),
            flag: flag.clone(),
            releases_left: 5,
        };
        let press = CyclicPress::new(KEY, Duration::ZERO, Duration::from_micros(100));

        // Act
        let report = press.run(&mut sink, &flag, |_| {}).unwrap();

        // Assert
        assert_eq!(report.outcome, RunOutcome::Cancelled);
        assert_eq!(report.presses, 5);
        let actions = sink.inner.actions();
        assert_eq!(actions.len(), 10);
        assert_eq!(actions.last(), Some(&InputAction::KeyUp(KEY)));
    }

    #[test]
    fn test_flag_cleared_before_start_emits_nothing() {
        let flag = RunFlag::new();
        flag.stop();
        let mut sink = RecordingSink::new();
        let mut finals = 0;

        let report = CyclicPress::new(KEY, Duration::ZERO, Duration::ZERO)
            .run(&mut sink, &flag, |s| {
                if s.finished {
                    finals += 1;
                }
            })
            .unwrap();

        assert_eq!(report.presses, 0);
        assert_eq!(report.outcome, RunOutcome::Cancelled);
        assert!(sink.events.is_empty());
        assert_eq!(finals, 1);
    }

    #[test]
    fn test_device_fault_aborts_run_after_completed_pairs() {
        // Arrange
        let mut sink = RecordingSink::faulting_after(3);
        let press = CyclicPress::new(KEY, Duration::ZERO, Duration::from_micros(50));

        // Act
        let err = press.run(&mut sink, &RunFlag::new(), |_| {}).unwrap_err();

        // Assert
        assert_eq!(err, InjectError::DeviceFault(DeviceStatus::Error));
        assert_eq!(sink.actions().len(), 6);
    }

    #[test]
    fn test_throttle_fires_at_most_once_per_interval() {
        let start = Instant::now();
        let mut throttle = StatusThrottle::new(start, Duration::from_secs(1));

        assert!(!throttle.ready(start + Duration::from_millis(999)));
        assert!(throttle.ready(start + Duration::from_millis(1000)));
        assert!(!throttle.ready(start + Duration::from_millis(1500)));
        assert!(throttle.ready(start + Duration::from_millis(2001)));
    }

    #[test]
    fn test_report_rate_is_presses_per_second() {
        let report = PressReport {
            presses: 500,
            elapsed: Duration::from_secs(2),
            outcome: RunOutcome::Completed,
        };
        assert!((report.rate() - 250.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_rate_with_zero_elapsed_is_zero() {
        assert_eq!(rate(10, Duration::ZERO), 0.0);
    }
}
