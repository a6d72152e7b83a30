//! Windows driver library binding via `LoadLibraryW` / `GetProcAddress`.
//!
//! Every export is resolved when the library is opened, so a library missing
//! an entry point fails at load time with [`DriverFault::MissingExport`]
//! instead of on first use.  The exports use the C calling convention and
//! take narrow (ANSI) strings; `bool` results are read as a byte.
//!
//! # Safety
//!
//! This module uses `unsafe` code exclusively for Windows API FFI calls and
//! for calling the resolved exports.  All `unsafe` blocks are annotated with
//! `// SAFETY:` comments.

#![cfg(target_os = "windows")]

use std::ffi::{c_char, CString};
use std::os::windows::ffi::OsStrExt;
use std::path::Path;
use std::sync::Arc;

use lykeys_core::keymap::MouseButton;
use lykeys_core::WheelDirection;
use tracing::{debug, warn};
use windows::core::{PCSTR, PCWSTR};
use windows::Win32::Foundation::{FreeLibrary, GetLastError, ERROR_ACCESS_DENIED, HMODULE};
use windows::Win32::System::LibraryLoader::{GetProcAddress, LoadLibraryW};

use crate::application::driver_session::{DriverApi, DriverFault, DriverLoader};

// ── Export signatures ─────────────────────────────────────────────────────────

type LoadFn = unsafe extern "C" fn(*const c_char, *const c_char) -> u8;
type UnloadFn = unsafe extern "C" fn(*const c_char) -> u8;
type FlagFn = unsafe extern "C" fn() -> u8;
type VoidFn = unsafe extern "C" fn();
type KeyFn = unsafe extern "C" fn(u16);
type MoveFn = unsafe extern "C" fn(i32, i32);
type WheelFn = unsafe extern "C" fn(u16);
type StatusFn = unsafe extern "C" fn() -> i32;
type TickFn = unsafe extern "C" fn() -> u64;

/// Down/up entry points for one mouse button.
#[derive(Clone, Copy)]
struct ButtonPair {
    down: VoidFn,
    up: VoidFn,
}

#[derive(Clone, Copy)]
struct Exports {
    load: LoadFn,
    unload: UnloadFn,
    set_handle: FlagFn,
    key_down: KeyFn,
    key_up: KeyFn,
    left: ButtonPair,
    right: ButtonPair,
    middle: ButtonPair,
    x1: ButtonPair,
    x2: ButtonPair,
    move_relative: MoveFn,
    move_absolute: MoveFn,
    wheel_up: WheelFn,
    wheel_down: WheelFn,
    check_status: VoidFn,
    driver_status: StatusFn,
    last_check: TickFn,
}

// ── Loader ────────────────────────────────────────────────────────────────────

/// Opens the driver library from a path on disk.
pub struct WindowsDriverLoader;

impl WindowsDriverLoader {
    pub fn new() -> Self {
        Self
    }
}

impl Default for WindowsDriverLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DriverLoader for WindowsDriverLoader {
    fn open(&self, dll_path: &Path) -> Result<Arc<dyn DriverApi>, DriverFault> {
        let wide: Vec<u16> = dll_path
            .as_os_str()
            .encode_wide()
            .chain(std::iter::once(0))
            .collect();

        // SAFETY: `wide` is a NUL-terminated UTF-16 string that outlives the call.
        let module = unsafe { LoadLibraryW(PCWSTR(wide.as_ptr())) }.map_err(|e| {
            DriverFault::Library {
                path: dll_path.to_path_buf(),
                reason: e.message(),
            }
        })?;

        match resolve_exports(module) {
            Ok(exports) => {
                debug!(path = %dll_path.display(), "driver library opened");
                Ok(Arc::new(DriverLibrary { module, exports }))
            }
            Err(fault) => {
                // SAFETY: `module` was returned by LoadLibraryW above and is not used again.
                if let Err(e) = unsafe { FreeLibrary(module) } {
                    warn!(error = %e, "FreeLibrary failed after incomplete export table");
                }
                Err(fault)
            }
        }
    }
}

fn resolve_exports(module: HMODULE) -> Result<Exports, DriverFault> {
    let pair = |down: &'static str, up: &'static str| -> Result<ButtonPair, DriverFault> {
        Ok(ButtonPair {
            down: export(module, down)?,
            up: export(module, up)?,
        })
    };
    Ok(Exports {
        load: export(module, "LoadNTDriver")?,
        unload: export(module, "UnloadNTDriver")?,
        set_handle: export(module, "SetHandle")?,
        key_down: export(module, "KeyDown")?,
        key_up: export(module, "KeyUp")?,
        left: pair("MouseLeftButtonDown", "MouseLeftButtonUp")?,
        right: pair("MouseRightButtonDown", "MouseRightButtonUp")?,
        middle: pair("MouseMiddleButtonDown", "MouseMiddleButtonUp")?,
        x1: pair("MouseXButton1Down", "MouseXButton1Up")?,
        x2: pair("MouseXButton2Down", "MouseXButton2Up")?,
        move_relative: export(module, "MouseMoveRELATIVE")?,
        move_absolute: export(module, "MouseMoveABSOLUTE")?,
        wheel_up: export(module, "MouseWheelUp")?,
        wheel_down: export(module, "MouseWheelDown")?,
        check_status: export(module, "CheckDeviceStatus")?,
        driver_status: export(module, "GetDriverStatus")?,
        last_check: export(module, "GetLastCheckTime")?,
    })
}

/// Resolves one export as a function pointer of type `F`.
///
/// `F` must be an `unsafe extern "C" fn` type matching the export.
fn export<F: Copy>(module: HMODULE, name: &'static str) -> Result<F, DriverFault> {
    let symbol = CString::new(name).map_err(|_| DriverFault::MissingExport(name))?;
    // SAFETY: `module` is a live library handle and `symbol` is NUL-terminated.
    let proc = unsafe { GetProcAddress(module, PCSTR(symbol.as_ptr().cast())) }
        .ok_or(DriverFault::MissingExport(name))?;
    // SAFETY: function pointers share one size and representation; the
    // caller names the signature the library documents for this export.
    Ok(unsafe { std::mem::transmute_copy::<_, F>(&proc) })
}

// ── Library ───────────────────────────────────────────────────────────────────

/// An opened driver library.  Freed on drop.
struct DriverLibrary {
    module: HMODULE,
    exports: Exports,
}

// SAFETY: HMODULE is a process-wide module handle, valid on any thread; the
// session serialises calls through its single injector lease.
unsafe impl Send for DriverLibrary {}
// SAFETY: see above.
unsafe impl Sync for DriverLibrary {}

impl DriverLibrary {
    fn flag(ok: u8, call: &'static str) -> Result<(), DriverFault> {
        if ok != 0 {
            Ok(())
        } else {
            Err(DriverFault::CallFailed(call))
        }
    }

    fn button_pair(&self, button: MouseButton) -> ButtonPair {
        match button {
            MouseButton::Left => self.exports.left,
            MouseButton::Right => self.exports.right,
            MouseButton::Middle => self.exports.middle,
            MouseButton::X1 => self.exports.x1,
            MouseButton::X2 => self.exports.x2,
        }
    }
}

fn narrow(text: &str, call: &'static str) -> Result<CString, DriverFault> {
    CString::new(text).map_err(|_| DriverFault::CallFailed(call))
}

impl DriverApi for DriverLibrary {
    fn load_driver(&self, name: &str, sys_path: &Path) -> Result<(), DriverFault> {
        let name = narrow(name, "LoadNTDriver")?;
        let path = narrow(&sys_path.to_string_lossy(), "LoadNTDriver")?;
        // SAFETY: both arguments are NUL-terminated and outlive the call.
        let ok = unsafe { (self.exports.load)(name.as_ptr(), path.as_ptr()) };
        if ok != 0 {
            return Ok(());
        }
        // SAFETY: reads the calling thread's last-error value only.
        if unsafe { GetLastError() } == ERROR_ACCESS_DENIED {
            Err(DriverFault::AccessDenied)
        } else {
            Err(DriverFault::CallFailed("LoadNTDriver"))
        }
    }

    fn unload_driver(&self, name: &str) -> Result<(), DriverFault> {
        let name = narrow(name, "UnloadNTDriver")?;
        // SAFETY: `name` is NUL-terminated and outlives the call.
        let ok = unsafe { (self.exports.unload)(name.as_ptr()) };
        Self::flag(ok, "UnloadNTDriver")
    }

    fn bind_handle(&self) -> Result<(), DriverFault> {
        // SAFETY: export takes no arguments.
        let ok = unsafe { (self.exports.set_handle)() };
        Self::flag(ok, "SetHandle")
    }

    fn key_down(&self, code: u16) -> Result<(), DriverFault> {
        // SAFETY: plain value argument.
        unsafe { (self.exports.key_down)(code) };
        Ok(())
    }

    fn key_up(&self, code: u16) -> Result<(), DriverFault> {
        // SAFETY: plain value argument.
        unsafe { (self.exports.key_up)(code) };
        Ok(())
    }

    fn button(&self, button: MouseButton, pressed: bool) -> Result<(), DriverFault> {
        let pair = self.button_pair(button);
        let entry = if pressed { pair.down } else { pair.up };
        // SAFETY: export takes no arguments.
        unsafe { entry() };
        Ok(())
    }

    fn move_relative(&self, dx: i32, dy: i32) -> Result<(), DriverFault> {
        // SAFETY: plain value arguments.
        unsafe { (self.exports.move_relative)(dx, dy) };
        Ok(())
    }

    fn move_absolute(&self, x: i32, y: i32) -> Result<(), DriverFault> {
        // SAFETY: plain value arguments.
        unsafe { (self.exports.move_absolute)(x, y) };
        Ok(())
    }

    fn wheel(&self, direction: WheelDirection, delta: u16) -> Result<(), DriverFault> {
        let entry = match direction {
            WheelDirection::Up => self.exports.wheel_up,
            WheelDirection::Down => self.exports.wheel_down,
        };
        // SAFETY: plain value argument.
        unsafe { entry(delta) };
        Ok(())
    }

    fn check_device_status(&self) -> Result<(), DriverFault> {
        // SAFETY: export takes no arguments.
        unsafe { (self.exports.check_status)() };
        Ok(())
    }

    fn driver_status(&self) -> i32 {
        // SAFETY: export takes no arguments.
        unsafe { (self.exports.driver_status)() }
    }

    fn last_check_time(&self) -> u64 {
        // SAFETY: export takes no arguments.
        unsafe { (self.exports.last_check)() }
    }
}

impl Drop for DriverLibrary {
    fn drop(&mut self) {
        // SAFETY: the module was loaded by this value and no export is called after drop.
        if let Err(e) = unsafe { FreeLibrary(self.module) } {
            warn!(error = %e, "FreeLibrary failed");
        }
    }
}
