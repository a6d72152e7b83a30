//! Primary-screen size and cursor position.
//!
//! Corner moves need the screen size and the orbit centres on the cursor.
//! Both come from the OS through [`ScreenMetrics`].

use thiserror::Error;

pub mod mock;

#[cfg(target_os = "windows")]
pub mod windows;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScreenError {
    #[error("platform API error: {0}")]
    PlatformError(String),

    #[error("screen metrics are not available on this platform")]
    Unsupported,
}

pub trait ScreenMetrics: Send + Sync {
    /// Cursor position in screen pixels.
    fn cursor_position(&self) -> Result<(i32, i32), ScreenError>;

    /// Width and height of the primary screen in pixels.
    fn screen_size(&self) -> Result<(i32, i32), ScreenError>;
}

/// The metrics source for the current platform.
pub fn platform_metrics() -> Box<dyn ScreenMetrics> {
    #[cfg(target_os = "windows")]
    {
        Box::new(windows::WindowsScreenMetrics::new())
    }
    #[cfg(not(target_os = "windows"))]
    {
        Box::new(UnsupportedMetrics)
    }
}

#[cfg(not(target_os = "windows"))]
struct UnsupportedMetrics;

#[cfg(not(target_os = "windows"))]
impl ScreenMetrics for UnsupportedMetrics {
    fn cursor_position(&self) -> Result<(i32, i32), ScreenError> {
        Err(ScreenError::Unsupported)
    }

    fn screen_size(&self) -> Result<(i32, i32), ScreenError> {
        Err(ScreenError::Unsupported)
    }
}
