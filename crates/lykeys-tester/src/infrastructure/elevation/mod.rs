//! Administrator privilege check and elevated relaunch.
//!
//! Loading a kernel driver needs administrator rights.  The session asks a
//! [`PrivilegeBroker`] whether it has them and, at most once, asks it to
//! relaunch the executable through the UAC prompt.

use crate::application::driver_session::PrivilegeBroker;

pub mod mock;

#[cfg(target_os = "windows")]
pub mod windows;

/// The broker for the current platform.
///
/// Off Windows there is nothing to elevate: the process reports itself as
/// elevated and the driver loader is what fails.
pub fn platform_broker() -> Box<dyn PrivilegeBroker> {
    #[cfg(target_os = "windows")]
    {
        Box::new(windows::ShellElevation::new())
    }
    #[cfg(not(target_os = "windows"))]
    {
        Box::new(mock::MockElevation::elevated())
    }
}
