//! Interpolated mouse motion.
//!
//! The planners in this module are lazy iterators of [`TimedAction`]s: they
//! compute the next step only when asked, and [`run_motion`] waits for each
//! step's deadline before emitting it.
//!
//! - [`RelativeGlide`] splits a displacement into equal linear steps.  Each
//!   step's delta is the difference of two rounded cumulative positions, so
//!   the steps always sum exactly to the requested displacement.
//! - [`AbsoluteGlide`] moves between two screen positions along an ease-out
//!   curve `p' = p·(2−p)` (fast start, gentle landing) and always lands on
//!   the target.
//! - [`Orbit`] circles the cursor around a centre forever, clamping every
//!   tick to at most [`ORBIT_MAX_STEP`] pixels per axis.

use std::time::{Duration, Instant};

use tracing::debug;

use crate::domain::{InjectError, InputAction, TimedAction};

use super::{precise, InjectionSink, RunFlag, RunOutcome};

pub const RELATIVE_STEPS: u32 = 10;
pub const RELATIVE_STEP_DELAY: Duration = Duration::from_millis(20);
pub const ABSOLUTE_STEPS: u32 = 20;
pub const ABSOLUTE_STEP_DELAY: Duration = Duration::from_millis(10);
pub const ORBIT_TICK: Duration = Duration::from_millis(16);
/// Largest per-axis delta of one orbit tick.
pub const ORBIT_MAX_STEP: i32 = 5;
/// Radians advanced per tick per unit of speed.
pub const ORBIT_SPEED_FACTOR: f64 = 0.01;
/// Orbit radius as a fraction of the configured range.
pub const ORBIT_RADIUS_FACTOR: f64 = 0.5;

/// Quadratic ease-out.
pub fn ease_out(p: f64) -> f64 {
    p * (2.0 - p)
}

fn scaled(total: i32, fraction: f64) -> i32 {
    (f64::from(total) * fraction).round() as i32
}

// ── Relative glide ───────────────────────────────────────────────────────────

/// Linear relative move split into equal steps.
#[derive(Debug, Clone)]
pub struct RelativeGlide {
    dx: i32,
    dy: i32,
    steps: u32,
    delay: Duration,
    step: u32,
}

impl RelativeGlide {
    /// [`RELATIVE_STEPS`] steps, [`RELATIVE_STEP_DELAY`] apart.
    pub fn new(dx: i32, dy: i32) -> Self {
        Self::with_timing(dx, dy, RELATIVE_STEPS, RELATIVE_STEP_DELAY)
    }

    /// Custom step count (at least one) and spacing.
    pub fn with_timing(dx: i32, dy: i32, steps: u32, delay: Duration) -> Self {
        Self {
            dx,
            dy,
            steps: steps.max(1),
            delay,
            step: 0,
        }
    }

    fn offset_at(&self, step: u32) -> (i32, i32) {
        let fraction = f64::from(step) / f64::from(self.steps);
        (scaled(self.dx, fraction), scaled(self.dy, fraction))
    }
}

impl Iterator for RelativeGlide {
    type Item = TimedAction;

    fn next(&mut self) -> Option<TimedAction> {
        if self.step >= self.steps {
            return None;
        }
        let (px, py) = self.offset_at(self.step);
        self.step += 1;
        let (x, y) = self.offset_at(self.step);
        Some(TimedAction::new(
            InputAction::MoveRelative {
                dx: x - px,
                dy: y - py,
            },
            self.delay * (self.step - 1),
        ))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = (self.steps - self.step) as usize;
        (left, Some(left))
    }
}

// ── Absolute glide ───────────────────────────────────────────────────────────

/// Eased move between two absolute screen positions.
#[derive(Debug, Clone)]
pub struct AbsoluteGlide {
    from: (i32, i32),
    to: (i32, i32),
    steps: u32,
    delay: Duration,
    step: u32,
}

impl AbsoluteGlide {
    /// [`ABSOLUTE_STEPS`] steps, [`ABSOLUTE_STEP_DELAY`] apart.
    pub fn new(from: (i32, i32), to: (i32, i32)) -> Self {
        Self::with_timing(from, to, ABSOLUTE_STEPS, ABSOLUTE_STEP_DELAY)
    }

    pub fn with_timing(from: (i32, i32), to: (i32, i32), steps: u32, delay: Duration) -> Self {
        Self {
            from,
            to,
            steps: steps.max(1),
            delay,
            step: 0,
        }
    }
}

impl Iterator for AbsoluteGlide {
    type Item = TimedAction;

    fn next(&mut self) -> Option<TimedAction> {
        if self.step >= self.steps {
            return None;
        }
        self.step += 1;
        let eased = ease_out(f64::from(self.step) / f64::from(self.steps));
        let x = self.from.0 + scaled(self.to.0 - self.from.0, eased);
        let y = self.from.1 + scaled(self.to.1 - self.from.1, eased);
        Some(TimedAction::new(
            InputAction::MoveAbsolute { x, y },
            self.delay * (self.step - 1),
        ))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = (self.steps - self.step) as usize;
        (left, Some(left))
    }
}

// ── Orbit ────────────────────────────────────────────────────────────────────

/// Endless circular motion around a centre point.
///
/// The cursor starts at the centre and spirals out to the circle because
/// every tick is clamped; the clamped remainder is caught up on later ticks.
#[derive(Debug, Clone)]
pub struct Orbit {
    center: (i32, i32),
    radius: f64,
    angle_step: f64,
    angle: f64,
    cursor: (i32, i32),
    tick: u32,
    delay: Duration,
}

impl Orbit {
    /// An orbit whose angle advances `speed·0.01` rad per tick on a circle
    /// of radius `range·0.5`.
    pub fn new(center: (i32, i32), speed: f64, range: f64) -> Self {
        Self {
            center,
            radius: range * ORBIT_RADIUS_FACTOR,
            angle_step: speed * ORBIT_SPEED_FACTOR,
            angle: 0.0,
            cursor: center,
            tick: 0,
            delay: ORBIT_TICK,
        }
    }

    pub fn with_tick(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Where the orbit believes the cursor is after the emitted moves.
    pub fn cursor(&self) -> (i32, i32) {
        self.cursor
    }
}

impl Iterator for Orbit {
    type Item = TimedAction;

    fn next(&mut self) -> Option<TimedAction> {
        self.angle += self.angle_step;
        let target_x = self.center.0 + (self.radius * self.angle.cos()) as i32;
        let target_y = self.center.1 + (self.radius * self.angle.sin()) as i32;
        let dx = (target_x - self.cursor.0).clamp(-ORBIT_MAX_STEP, ORBIT_MAX_STEP);
        let dy = (target_y - self.cursor.1).clamp(-ORBIT_MAX_STEP, ORBIT_MAX_STEP);
        self.cursor = (self.cursor.0 + dx, self.cursor.1 + dy);

        let offset = self.delay.saturating_mul(self.tick);
        self.tick = self.tick.saturating_add(1);
        Some(TimedAction::new(InputAction::MoveRelative { dx, dy }, offset))
    }
}

// ── Runner ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotionReport {
    /// Actions actually emitted (zero-length moves are skipped).
    pub emitted: u32,
    pub outcome: RunOutcome,
}

/// Plays `plan` through `sink`, waiting for each step's offset from the
/// moment the call began.
///
/// The flag is checked before each step and again once its deadline has
/// arrived, so a cancelled run never emits another action.
///
/// # Errors
///
/// Returns the first readiness or emit error; the remaining steps are
/// dropped.
pub fn run_motion<I, S>(plan: I, sink: &mut S, flag: &RunFlag) -> Result<MotionReport, InjectError>
where
    I: IntoIterator<Item = TimedAction>,
    S: InjectionSink + ?Sized,
{
    let origin = Instant::now();
    let mut emitted = 0;
    for step in plan {
        if !flag.is_running() {
            return Ok(cancelled(emitted));
        }
        precise::wait_until(origin + step.offset);
        if !flag.is_running() {
            return Ok(cancelled(emitted));
        }
        if step.action.is_noop() {
            continue;
        }
        sink.check_ready()?;
        sink.emit(step.action)?;
        emitted += 1;
    }
    debug!(emitted, "motion completed");
    Ok(MotionReport {
        emitted,
        outcome: RunOutcome::Completed,
    })
}

fn cancelled(emitted: u32) -> MotionReport {
    debug!(emitted, "motion cancelled");
    MotionReport {
        emitted,
        outcome: RunOutcome::Cancelled,
    }
}
