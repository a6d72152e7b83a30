//! Windows screen metrics via `GetSystemMetrics` / `GetCursorPos`.

#![cfg(target_os = "windows")]

use windows::Win32::Foundation::POINT;
use windows::Win32::UI::WindowsAndMessaging::{
    GetCursorPos, GetSystemMetrics, SM_CXSCREEN, SM_CYSCREEN,
};

use super::{ScreenError, ScreenMetrics};

pub struct WindowsScreenMetrics;

impl WindowsScreenMetrics {
    pub fn new() -> Self {
        Self
    }
}

impl Default for WindowsScreenMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ScreenMetrics for WindowsScreenMetrics {
    fn cursor_position(&self) -> Result<(i32, i32), ScreenError> {
        let mut point = POINT::default();
        // SAFETY: `point` is a valid, writable POINT for the duration of the call.
        unsafe { GetCursorPos(&mut point) }
            .map_err(|e| ScreenError::PlatformError(e.message()))?;
        Ok((point.x, point.y))
    }

    fn screen_size(&self) -> Result<(i32, i32), ScreenError> {
        // SAFETY: GetSystemMetrics only reads system configuration.
        let (w, h) = unsafe { (GetSystemMetrics(SM_CXSCREEN), GetSystemMetrics(SM_CYSCREEN)) };
        if w <= 0 || h <= 0 {
            return Err(ScreenError::PlatformError(
                "GetSystemMetrics returned no primary screen".to_string(),
            ));
        }
        Ok((w, h))
    }
}
