//! Background injection workers and the control-thread message type.
//!
//! Every sequence that injects input runs on its own OS thread (the timing
//! engine busy-waits, which must never happen on the async runtime).  A
//! worker owns an [`InputTranslator`], and through it the session's single
//! injector lease, for exactly as long as it runs.  Progress and completion
//! are reported back to the control thread as [`ControlEvent`]s; the lease is
//! dropped before `WorkerFinished` is sent, so the control thread can start
//! the next worker as soon as it sees the completion.

use std::fmt;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use lykeys_core::keymap::MouseButton;
use lykeys_core::timing::motion::run_motion;
use lykeys_core::timing::strokes::{click, press_key, type_text, DEFAULT_HOLD};
use lykeys_core::timing::{
    AbsoluteGlide, CyclicPress, MotionReport, Orbit, PressReport, PressStatus, RelativeGlide,
};
use lykeys_core::{InjectError, InjectionSink, InputAction, RunFlag, RunOutcome};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use super::command::{Corner, Demo};
use super::input_translator::InputTranslator;

/// Delay before a demo starts, to let the operator focus a target window.
pub const DEMO_LEAD_IN: Duration = Duration::from_secs(3);

/// Gap between keys in the key demo.
pub const DEMO_KEY_GAP: Duration = Duration::from_millis(500);

/// Gap between corners in the mouse demo.
pub const DEMO_CORNER_GAP: Duration = Duration::from_millis(500);

/// Keys pressed by the key demo.
pub const DEMO_KEYS: [&str; 5] = ["w", "a", "s", "d", "enter"];

/// Sentence typed by the text demo.
pub const DEMO_TEXT: &str = "Hello, World!";

/// Slice used for cancellable sleeps.
const CANCEL_POLL: Duration = Duration::from_millis(10);

// ── Messages ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerKind {
    RapidPress,
    Motion,
    /// The hotkey-toggled orbit.
    AutoMove,
    /// One-shot presses, clicks, typing and demos.
    Sequence,
}

impl fmt::Display for WorkerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerKind::RapidPress => f.write_str("rapid press"),
            WorkerKind::Motion => f.write_str("motion"),
            WorkerKind::AutoMove => f.write_str("auto move"),
            WorkerKind::Sequence => f.write_str("sequence"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WorkerReport {
    Press(PressReport),
    Motion(MotionReport),
    Sequence(RunOutcome),
}

impl WorkerReport {
    pub fn outcome(&self) -> RunOutcome {
        match self {
            WorkerReport::Press(report) => report.outcome,
            WorkerReport::Motion(report) => report.outcome,
            WorkerReport::Sequence(outcome) => *outcome,
        }
    }
}

/// Everything the control thread reacts to.
#[derive(Debug)]
pub enum ControlEvent {
    /// A raw operator command line.
    Command(String),
    /// The auto-motion hotkey fired.
    HotkeyTriggered,
    /// Throttled progress from the rapid press worker.
    PressProgress(PressStatus),
    WorkerFinished {
        id: u64,
        kind: WorkerKind,
        result: Result<WorkerReport, InjectError>,
    },
    Shutdown,
}

// ── Handle ────────────────────────────────────────────────────────────────────

/// Owner side of a running worker.
#[derive(Debug)]
pub struct WorkerHandle {
    id: u64,
    kind: WorkerKind,
    flag: RunFlag,
    thread: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn kind(&self) -> WorkerKind {
        self.kind
    }

    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Asks the worker to stop at its next iteration.
    pub fn cancel(&self) {
        self.flag.stop();
    }

    /// Cancels the worker and waits for its thread.
    pub fn stop(mut self) {
        self.cancel();
        self.join();
    }

    fn join(&mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!(kind = %self.kind, "worker thread panicked");
            }
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.cancel();
        self.join();
    }
}

/// Runs `job` on a new thread with `sink`, reporting completion on `events`
/// under `id`.
pub fn spawn_worker<F>(
    id: u64,
    kind: WorkerKind,
    mut sink: InputTranslator,
    events: UnboundedSender<ControlEvent>,
    job: F,
) -> std::io::Result<WorkerHandle>
where
    F: FnOnce(&mut InputTranslator, &RunFlag, &UnboundedSender<ControlEvent>) -> Result<WorkerReport, InjectError>
        + Send
        + 'static,
{
    let flag = RunFlag::new();
    let worker_flag = flag.clone();
    let thread = thread::Builder::new()
        .name(format!("lykeys-{}", kind.to_string().replace(' ', "-")))
        .spawn(move || {
            debug!(id, %kind, "worker started");
            let result = job(&mut sink, &worker_flag, &events);
            drop(sink);
            if let Err(e) = &result {
                warn!(%kind, error = %e, "worker aborted");
            }
            let _ = events.send(ControlEvent::WorkerFinished { id, kind, result });
        })?;
    Ok(WorkerHandle {
        id,
        kind,
        flag,
        thread: Some(thread),
    })
}

// ── Jobs ──────────────────────────────────────────────────────────────────────

/// Cyclic press test; progress goes out as [`ControlEvent::PressProgress`].
pub fn rapid_press_job(
    press: CyclicPress,
) -> impl FnOnce(&mut InputTranslator, &RunFlag, &UnboundedSender<ControlEvent>) -> Result<WorkerReport, InjectError>
       + Send
       + 'static {
    move |sink, flag, events| {
        press
            .run(sink, flag, |status| {
                let _ = events.send(ControlEvent::PressProgress(status));
            })
            .map(WorkerReport::Press)
    }
}

/// A motion plan, still to be built.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MotionPlan {
    Relative { dx: i32, dy: i32 },
    Absolute { from: (i32, i32), to: (i32, i32) },
    /// Single absolute jump.
    Jump { to: (i32, i32) },
    Orbit { center: (i32, i32), speed: f64, range: f64 },
}

impl MotionPlan {
    pub fn corner(corner: Corner, screen: (i32, i32)) -> Self {
        MotionPlan::Jump {
            to: corner.target(screen),
        }
    }
}

pub fn motion_job(
    plan: MotionPlan,
) -> impl FnOnce(&mut InputTranslator, &RunFlag, &UnboundedSender<ControlEvent>) -> Result<WorkerReport, InjectError>
       + Send
       + 'static {
    move |sink, flag, _events| {
        let report = run_plan(plan, sink, flag)?;
        Ok(WorkerReport::Motion(report))
    }
}

fn run_plan<S>(plan: MotionPlan, sink: &mut S, flag: &RunFlag) -> Result<MotionReport, InjectError>
where
    S: InjectionSink + ?Sized,
{
    match plan {
        MotionPlan::Relative { dx, dy } => run_motion(RelativeGlide::new(dx, dy), sink, flag),
        MotionPlan::Absolute { from, to } => run_motion(AbsoluteGlide::new(from, to), sink, flag),
        MotionPlan::Jump { to } => {
            if !flag.is_running() {
                return Ok(MotionReport {
                    emitted: 0,
                    outcome: RunOutcome::Cancelled,
                });
            }
            sink.check_ready()?;
            sink.emit(InputAction::MoveAbsolute { x: to.0, y: to.1 })?;
            Ok(MotionReport {
                emitted: 1,
                outcome: RunOutcome::Completed,
            })
        }
        MotionPlan::Orbit { center, speed, range } => {
            info!(?center, speed, range, "orbit started");
            run_motion(Orbit::new(center, speed, range), sink, flag)
        }
    }
}

/// A one-shot input sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum Sequence {
    Press { key: String, hold: Duration },
    Type(String),
    Click(MouseButton),
    Wheel(i32),
    Demo { demo: Demo, screen: Option<(i32, i32)> },
}

pub fn sequence_job(
    sequence: Sequence,
) -> impl FnOnce(&mut InputTranslator, &RunFlag, &UnboundedSender<ControlEvent>) -> Result<WorkerReport, InjectError>
       + Send
       + 'static {
    move |sink, flag, _events| run_sequence(&sequence, sink, flag).map(WorkerReport::Sequence)
}

/// Plays a one-shot sequence through `sink`.
pub fn run_sequence<S>(sequence: &Sequence, sink: &mut S, flag: &RunFlag) -> Result<RunOutcome, InjectError>
where
    S: InjectionSink + ?Sized,
{
    match sequence {
        Sequence::Press { key, hold } => press_key(sink, key, *hold)?,
        Sequence::Type(text) => {
            type_text(sink, text, DEFAULT_HOLD)?;
        }
        Sequence::Click(button) => click(sink, *button, DEFAULT_HOLD)?,
        Sequence::Wheel(delta) => {
            if let Some(action) = InputAction::wheel(*delta) {
                sink.check_ready()?;
                sink.emit(action)?;
            }
        }
        Sequence::Demo { demo, screen } => return run_demo(*demo, *screen, sink, flag),
    }
    Ok(RunOutcome::Completed)
}

fn run_demo<S>(
    demo: Demo,
    screen: Option<(i32, i32)>,
    sink: &mut S,
    flag: &RunFlag,
) -> Result<RunOutcome, InjectError>
where
    S: InjectionSink + ?Sized,
{
    info!(%demo, lead_in_s = DEMO_LEAD_IN.as_secs(), "demo starting");
    if !sleep_unless_cancelled(DEMO_LEAD_IN, flag) {
        return Ok(RunOutcome::Cancelled);
    }
    match demo {
        Demo::Keys => {
            for (i, name) in DEMO_KEYS.iter().enumerate() {
                if i > 0 && !sleep_unless_cancelled(DEMO_KEY_GAP, flag) {
                    return Ok(RunOutcome::Cancelled);
                }
                press_key(sink, name, DEFAULT_HOLD)?;
            }
        }
        Demo::Text => {
            // Never stopped mid-string.
            if !flag.is_running() {
                return Ok(RunOutcome::Cancelled);
            }
            type_text(sink, DEMO_TEXT, DEFAULT_HOLD)?;
        }
        Demo::Mouse => {
            let screen = screen.unwrap_or((1920, 1080));
            let corners = [
                Corner::TopLeft,
                Corner::TopRight,
                Corner::BottomRight,
                Corner::BottomLeft,
            ];
            for (i, corner) in corners.into_iter().enumerate() {
                if i > 0 && !sleep_unless_cancelled(DEMO_CORNER_GAP, flag) {
                    return Ok(RunOutcome::Cancelled);
                }
                let report = run_plan(MotionPlan::corner(corner, screen), sink, flag)?;
                if report.outcome == RunOutcome::Cancelled {
                    return Ok(RunOutcome::Cancelled);
                }
            }
        }
    }
    info!(%demo, "demo finished");
    Ok(RunOutcome::Completed)
}

/// Sleeps for `duration` in short slices.  Returns `false` if the flag was
/// cleared first.
fn sleep_unless_cancelled(duration: Duration, flag: &RunFlag) -> bool {
    let deadline = Instant::now() + duration;
    loop {
        if !flag.is_running() {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        thread::sleep(CANCEL_POLL.min(deadline - now));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lykeys_core::timing::recording::RecordingSink;
    use lykeys_core::KeyCode;

    #[test]
    fn test_corner_jump_is_single_absolute_move() {
        // Arrange
        let mut sink = RecordingSink::new();

        // Act
        let report = run_plan(
            MotionPlan::corner(Corner::BottomRight, (1920, 1080)),
            &mut sink,
            &RunFlag::new(),
        )
        .unwrap();

        // Assert
        assert_eq!(report.emitted, 1);
        assert_eq!(
            sink.actions(),
            vec![InputAction::MoveAbsolute { x: 1919, y: 1079 }]
        );
    }

    #[test]
    fn test_cancelled_jump_emits_nothing() {
        let mut sink = RecordingSink::new();
        let flag = RunFlag::new();
        flag.stop();

        let report = run_plan(MotionPlan::Jump { to: (5, 5) }, &mut sink, &flag).unwrap();

        assert_eq!(report.outcome, RunOutcome::Cancelled);
        assert!(sink.actions().is_empty());
    }

    #[test]
    fn test_wheel_sequence_picks_direction_from_sign() {
        let mut sink = RecordingSink::new();

        run_sequence(&Sequence::Wheel(-240), &mut sink, &RunFlag::new()).unwrap();

        assert_eq!(
            sink.actions(),
            vec![InputAction::Wheel {
                direction: lykeys_core::WheelDirection::Down,
                delta: 240
            }]
        );
    }

    #[test]
    fn test_press_sequence_wraps_shift_for_symbol() {
        let mut sink = RecordingSink::new();
        let seq = Sequence::Press {
            key: "!".to_string(),
            hold: Duration::from_millis(1),
        };

        run_sequence(&seq, &mut sink, &RunFlag::new()).unwrap();

        let actions = sink.actions();
        assert_eq!(actions.first(), Some(&InputAction::KeyDown(KeyCode::SHIFT)));
        assert_eq!(actions.last(), Some(&InputAction::KeyUp(KeyCode::SHIFT)));
        assert_eq!(actions.len(), 4);
    }

    #[test]
    fn test_demo_cancelled_during_lead_in_injects_nothing() {
        let mut sink = RecordingSink::new();
        let flag = RunFlag::new();
        let stopper = flag.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            stopper.stop();
        });

        let started = Instant::now();
        let outcome = run_sequence(
            &Sequence::Demo {
                demo: Demo::Keys,
                screen: None,
            },
            &mut sink,
            &flag,
        )
        .unwrap();
        handle.join().unwrap();

        assert_eq!(outcome, RunOutcome::Cancelled);
        assert!(sink.actions().is_empty());
        assert!(started.elapsed() < DEMO_LEAD_IN);
    }
}
