//! Infrastructure layer for the test console.
//!
//! Contains OS-facing adapters: the driver library binding, privilege
//! elevation, the keyboard hook, screen metrics, file-system storage, and the
//! console bridge that turns operator commands into application calls.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `lykeys_core`, but MUST NOT be imported by the domain layer.

pub mod driver;
pub mod elevation;
pub mod input_capture;
pub mod screen;
pub mod storage;
pub mod ui_bridge;
