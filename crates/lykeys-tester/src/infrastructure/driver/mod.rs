//! Access to the user-mode driver library.
//!
//! The library (`lykeysdll.dll`) exports a flat C surface: load and unload the
//! kernel driver, bind the device handle, and one entry point per key, button,
//! motion and wheel primitive.  [`DriverLoader`] implementations open it and
//! hand back a [`DriverApi`].
//!
//! | Module    | Used by          | Backing                                 |
//! |-----------|------------------|-----------------------------------------|
//! | `windows` | the binary       | `LoadLibraryW` + `GetProcAddress`       |
//! | `mock`    | tests            | in-memory call recording                |
//!
//! On other platforms [`platform_loader`] returns a loader that always fails,
//! so the console still starts and reports a load error.

use crate::application::driver_session::DriverLoader;

pub mod mock;

#[cfg(target_os = "windows")]
pub mod windows;

/// The loader for the current platform.
pub fn platform_loader() -> Box<dyn DriverLoader> {
    #[cfg(target_os = "windows")]
    {
        Box::new(windows::WindowsDriverLoader::new())
    }
    #[cfg(not(target_os = "windows"))]
    {
        Box::new(unsupported::UnsupportedLoader)
    }
}

#[cfg(not(target_os = "windows"))]
mod unsupported {
    use std::path::Path;
    use std::sync::Arc;

    use crate::application::driver_session::{DriverApi, DriverFault, DriverLoader};

    /// Loader for platforms without the driver.
    pub(super) struct UnsupportedLoader;

    impl DriverLoader for UnsupportedLoader {
        fn open(&self, dll_path: &Path) -> Result<Arc<dyn DriverApi>, DriverFault> {
            Err(DriverFault::Library {
                path: dll_path.to_path_buf(),
                reason: "the driver is only available on Windows".to_string(),
            })
        }
    }
}
