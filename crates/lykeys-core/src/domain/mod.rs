//! Domain vocabulary for the LyKeys tester.
//!
//! This module contains pure data with no infrastructure dependencies.
//!
//! # What lives here? (for beginners)
//!
//! The tester talks to a driver that can do a handful of things: press and
//! release a key, press and release a mouse button, move the cursor, and
//! scroll the wheel.  [`InputAction`] names exactly those things, so every
//! other layer (the timing engine, the hotkey routines, the real driver
//! adapter, the test doubles) speaks the same small language.
//!
//! [`DeviceStatus`] is the driver's own health report, and [`InjectError`]
//! is what goes wrong while injecting.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::keymap::{KeyCode, MouseButton};

/// Direction of a wheel tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WheelDirection {
    Up,
    Down,
}

/// One injected device event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputAction {
    KeyDown(KeyCode),
    KeyUp(KeyCode),
    ButtonDown(MouseButton),
    ButtonUp(MouseButton),
    /// Cursor displacement in pixels.
    MoveRelative { dx: i32, dy: i32 },
    /// Cursor position in screen pixels.
    MoveAbsolute { x: i32, y: i32 },
    Wheel { direction: WheelDirection, delta: u16 },
}

impl InputAction {
    /// Signed wheel tick: positive scrolls up, negative scrolls down.
    ///
    /// A zero delta yields `None`.
    pub fn wheel(delta: i32) -> Option<Self> {
        let magnitude = u16::try_from(delta.unsigned_abs()).unwrap_or(u16::MAX);
        match delta.signum() {
            1 => Some(InputAction::Wheel {
                direction: WheelDirection::Up,
                delta: magnitude,
            }),
            -1 => Some(InputAction::Wheel {
                direction: WheelDirection::Down,
                delta: magnitude,
            }),
            _ => None,
        }
    }

    /// A zero-length relative move; the timing engine skips these.
    pub fn is_noop(&self) -> bool {
        matches!(self, InputAction::MoveRelative { dx: 0, dy: 0 })
    }
}

impl fmt::Display for InputAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputAction::KeyDown(code) => write!(f, "key down {code}"),
            InputAction::KeyUp(code) => write!(f, "key up {code}"),
            InputAction::ButtonDown(button) => write!(f, "{button} button down"),
            InputAction::ButtonUp(button) => write!(f, "{button} button up"),
            InputAction::MoveRelative { dx, dy } => write!(f, "move by ({dx}, {dy})"),
            InputAction::MoveAbsolute { x, y } => write!(f, "move to ({x}, {y})"),
            InputAction::Wheel { direction, delta } => write!(f, "wheel {direction:?} {delta}"),
        }
    }
}

/// An action scheduled at an offset from the start of its sequence.
///
/// Produced lazily by the planners in [`crate::timing`] and consumed as soon
/// as its deadline arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimedAction {
    pub action: InputAction,
    pub offset: Duration,
}

impl TimedAction {
    pub const fn new(action: InputAction, offset: Duration) -> Self {
        Self { action, offset }
    }
}

/// Health reported by the driver's `GetDriverStatus` entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceStatus {
    /// The driver has not answered a status query yet.
    Unknown,
    Ready,
    Error,
}

impl DeviceStatus {
    /// Decodes the raw status integer (0 unknown, 1 ready, 2 error).
    ///
    /// Any other value is treated as an error.
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            0 => DeviceStatus::Unknown,
            1 => DeviceStatus::Ready,
            _ => DeviceStatus::Error,
        }
    }

    pub fn is_ready(self) -> bool {
        self == DeviceStatus::Ready
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            DeviceStatus::Unknown => "unknown",
            DeviceStatus::Ready => "ready",
            DeviceStatus::Error => "error",
        };
        f.write_str(text)
    }
}

/// Errors raised while injecting input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InjectError {
    /// The driver stopped reporting ready.  Aborts the running sequence only.
    #[error("device fault: driver status is {0}")]
    DeviceFault(DeviceStatus),

    /// The injector lease was revoked because the session unloaded.
    #[error("driver session is no longer loaded")]
    SessionClosed,

    #[error("unknown key: {0:?}")]
    UnknownKey(String),

    /// A driver entry point reported failure.
    #[error("driver call {call} failed")]
    Driver { call: &'static str },
}
