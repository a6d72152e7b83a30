//! # lykeys-core
//!
//! Shared, OS-independent building blocks for the LyKeys driver tester.
//!
//! This crate has zero dependencies on OS APIs, the driver library, or UI
//! frameworks. Everything here can be compiled and tested on any platform.
//!
//! # Architecture overview
//!
//! The tester drives a privileged keyboard/mouse injection driver. Three
//! pieces of that job are pure logic and live here:
//!
//! - **`keymap`** – The key/button catalog: symbolic names such as `"enter"`,
//!   `"F8"` or `"?"` translated to the Windows Virtual-Key codes the driver
//!   accepts, plus the shift classification for punctuation symbols.
//!
//! - **`timing`** – The precise timing engine. Rapid press cycles and
//!   interpolated mouse motion are scheduled against a monotonic clock and
//!   injected through the [`timing::InjectionSink`] trait, so the engine
//!   never knows whether it talks to the real driver or a test double.
//!
//! - **`hotkey`** – Hotkey bindings (single keys and chords), the pressed-key
//!   set, and the matching rules used by the global capture hook.
//!
//! - **`domain`** – The small vocabulary shared by all of the above: injected
//!   actions, driver status values, and the injection error type.

pub mod domain;
pub mod hotkey;
pub mod keymap;
pub mod timing;

pub use domain::{DeviceStatus, InjectError, InputAction, TimedAction, WheelDirection};
pub use hotkey::{BindingTable, HotkeyBinding, HotkeyCallback, HotkeyDispatcher, KeyTransition};
pub use keymap::{KeyCatalog, KeyCode, KeyStroke, MouseButton};
pub use timing::{InjectionSink, RunFlag, RunOutcome};
