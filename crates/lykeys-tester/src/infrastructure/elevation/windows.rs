//! Windows elevation via `IsUserAnAdmin` and `ShellExecuteW("runas")`.
//!
//! # Safety
//!
//! This module uses `unsafe` code exclusively for Windows API FFI calls.
//! All `unsafe` blocks are annotated with `// SAFETY:` comments.

#![cfg(target_os = "windows")]

use std::ffi::OsStr;
use std::os::windows::ffi::OsStrExt;

use tracing::{info, warn};
use windows::core::PCWSTR;
use windows::Win32::UI::Shell::{IsUserAnAdmin, ShellExecuteW};
use windows::Win32::UI::WindowsAndMessaging::SW_SHOWNORMAL;

use crate::application::driver_session::PrivilegeBroker;

/// `ShellExecuteW` results at or below this value are error codes.
const SHELL_EXECUTE_ERROR_MAX: isize = 32;

pub struct ShellElevation;

impl ShellElevation {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ShellElevation {
    fn default() -> Self {
        Self::new()
    }
}

fn wide(text: &OsStr) -> Vec<u16> {
    text.encode_wide().chain(std::iter::once(0)).collect()
}

/// Quotes each argument for the relaunched command line.
fn join_args(args: impl Iterator<Item = String>) -> String {
    args.map(|a| format!("\"{}\"", a.replace('"', "\\\"")))
        .collect::<Vec<_>>()
        .join(" ")
}

impl PrivilegeBroker for ShellElevation {
    fn is_elevated(&self) -> bool {
        // SAFETY: IsUserAnAdmin takes no arguments and only reads the process token.
        unsafe { IsUserAnAdmin() }.as_bool()
    }

    fn relaunch_elevated(&self) -> Result<(), i32> {
        let exe = std::env::current_exe().map_err(|e| {
            warn!(error = %e, "cannot locate current executable");
            e.raw_os_error().unwrap_or(-1)
        })?;
        let verb = wide(OsStr::new("runas"));
        let file = wide(exe.as_os_str());
        let params = wide(OsStr::new(&join_args(std::env::args().skip(1))));

        // SAFETY: every string is NUL-terminated UTF-16 that outlives the call;
        // no owner window is passed.
        let result = unsafe {
            ShellExecuteW(
                None,
                PCWSTR(verb.as_ptr()),
                PCWSTR(file.as_ptr()),
                PCWSTR(params.as_ptr()),
                PCWSTR::null(),
                SW_SHOWNORMAL,
            )
        };
        let code = result.0 as isize;
        if code <= SHELL_EXECUTE_ERROR_MAX {
            warn!(code, "elevated relaunch failed");
            return Err(code as i32);
        }
        info!(exe = %exe.display(), "elevated instance launched");
        Ok(())
    }
}
