//! Precise timing engine.
//!
//! Two kinds of sequences are driven from here:
//!
//! - [`cyclic`] – rapid press/release cycles with sub-millisecond holds and a
//!   throttled status callback.
//! - [`motion`] – interpolated mouse glides and the circular orbit routine.
//!
//! [`strokes`] adds the one-shot helpers (press a key, type a string, click a
//! button) the console and demos use.
//!
//! The engine never touches the driver directly.  Every event goes through an
//! [`InjectionSink`]; the tester crate binds one to the loaded driver, tests
//! bind [`recording::RecordingSink`].
//!
//! # Cancellation
//!
//! Long-running sequences take a [`RunFlag`].  The flag is polled once per
//! iteration, before the next action is emitted, so a sequence never stops
//! between a key-down and its key-up.

pub mod cyclic;
pub mod motion;
pub mod precise;
pub mod recording;
pub mod strokes;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::domain::{InjectError, InputAction};

pub use cyclic::{CyclicPress, PressReport, PressStatus};
pub use motion::{AbsoluteGlide, MotionReport, Orbit, RelativeGlide};

/// The timing engine's view of the injection device.
pub trait InjectionSink {
    /// Re-validates that the driver is responsive.
    ///
    /// Returns [`InjectError::DeviceFault`] once the driver stops reporting
    /// ready.
    fn check_ready(&mut self) -> Result<(), InjectError>;

    /// Injects one action.
    fn emit(&mut self, action: InputAction) -> Result<(), InjectError>;
}

impl<S: InjectionSink + ?Sized> InjectionSink for &mut S {
    fn check_ready(&mut self) -> Result<(), InjectError> {
        (**self).check_ready()
    }

    fn emit(&mut self, action: InputAction) -> Result<(), InjectError> {
        (**self).emit(action)
    }
}

impl<S: InjectionSink + ?Sized> InjectionSink for Box<S> {
    fn check_ready(&mut self) -> Result<(), InjectError> {
        (**self).check_ready()
    }

    fn emit(&mut self, action: InputAction) -> Result<(), InjectError> {
        (**self).emit(action)
    }
}

/// Shared cooperative cancellation flag.
///
/// Clones observe the same flag.  A new flag starts in the running state.
#[derive(Debug, Clone)]
pub struct RunFlag(Arc<AtomicBool>);

impl RunFlag {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn is_running(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Requests a stop at the next iteration boundary.
    pub fn stop(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Default for RunFlag {
    fn default() -> Self {
        Self::new()
    }
}

/// How a sequence ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The sequence ran to its natural end.
    Completed,
    /// The run flag was cleared.
    Cancelled,
}
