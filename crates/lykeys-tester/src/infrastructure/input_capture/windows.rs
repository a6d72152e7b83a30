//! Windows low-level keyboard hook implementation.
//!
//! Installs `WH_KEYBOARD_LL` from the listener's capture thread and runs a
//! Win32 message loop there; the hook procedure is called from inside
//! `GetMessageW` on that same thread.  `wake` posts `WM_QUIT` to the thread
//! to end the loop.
//!
//! Only one hook may be installed per process: the hook procedure reaches its
//! sink through a process-wide slot.
//!
//! # Safety
//!
//! This module uses `unsafe` code exclusively for Windows API FFI calls.
//! All `unsafe` blocks are annotated with `// SAFETY:` comments.

#![cfg(target_os = "windows")]

use std::ffi::c_void;
use std::sync::atomic::{AtomicIsize, AtomicU32, Ordering};
use std::sync::{Mutex, PoisonError};

use lykeys_core::{KeyCode, KeyTransition};
use tracing::{debug, warn};
use windows::Win32::Foundation::{LPARAM, LRESULT, WPARAM};
use windows::Win32::System::Threading::GetCurrentThreadId;
use windows::Win32::UI::WindowsAndMessaging::{
    CallNextHookEx, DispatchMessageW, GetMessageW, PeekMessageW, PostThreadMessageW,
    SetWindowsHookExW, TranslateMessage, UnhookWindowsHookEx, HC_ACTION, HHOOK, KBDLLHOOKSTRUCT,
    MSG, PM_NOREMOVE, WH_KEYBOARD_LL, WM_KEYDOWN, WM_KEYUP, WM_QUIT, WM_SYSKEYDOWN, WM_SYSKEYUP,
};

use super::{CaptureHook, HookError, KeySink};

/// Sink of the installed hook.  `Some` while a hook is installed.
static SINK: Mutex<Option<KeySink>> = Mutex::new(None);

pub struct WindowsKeyboardHook {
    /// Raw `HHOOK`, 0 when not installed.
    hook: AtomicIsize,
    /// Capture thread id, 0 when not installed.
    thread_id: AtomicU32,
}

impl WindowsKeyboardHook {
    pub fn new() -> Self {
        Self {
            hook: AtomicIsize::new(0),
            thread_id: AtomicU32::new(0),
        }
    }
}

impl Default for WindowsKeyboardHook {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureHook for WindowsKeyboardHook {
    fn install(&self, sink: KeySink) -> Result<(), HookError> {
        let mut slot = SINK.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            return Err(HookError::AlreadyInstalled);
        }

        // Create this thread's message queue so a WM_QUIT posted before the
        // pump starts is not lost.
        let mut msg = MSG::default();
        // SAFETY: `msg` is a valid, writable MSG; PM_NOREMOVE leaves the queue untouched.
        let _ = unsafe { PeekMessageW(&mut msg, None, 0, 0, PM_NOREMOVE) };
        // SAFETY: GetCurrentThreadId has no preconditions.
        let thread_id = unsafe { GetCurrentThreadId() };

        // SAFETY: the hook procedure has the HOOKPROC signature and lives for
        // the whole program; this thread runs a message loop until uninstall.
        let hook = unsafe { SetWindowsHookExW(WH_KEYBOARD_LL, Some(keyboard_hook_proc), None, 0) }
            .map_err(|e| HookError::InstallFailed(e.message()))?;

        *slot = Some(sink);
        self.hook.store(hook.0 as isize, Ordering::SeqCst);
        self.thread_id.store(thread_id, Ordering::SeqCst);
        debug!(thread_id, "keyboard hook installed");
        Ok(())
    }

    fn pump(&self) {
        let mut msg = MSG::default();
        // SAFETY: Standard Win32 GetMessage/DispatchMessage loop pattern.
        // GetMessageW returns 0 on WM_QUIT and -1 on error; both end the loop.
        unsafe {
            while GetMessageW(&mut msg, None, 0, 0).0 > 0 {
                let _ = TranslateMessage(&msg);
                DispatchMessageW(&msg);
            }
        }
    }

    fn uninstall(&self) -> Result<(), HookError> {
        let raw = self.hook.swap(0, Ordering::SeqCst);
        self.thread_id.store(0, Ordering::SeqCst);
        *SINK.lock().unwrap_or_else(PoisonError::into_inner) = None;
        if raw == 0 {
            return Ok(());
        }
        // SAFETY: `raw` was returned by SetWindowsHookExW and is unhooked only once.
        unsafe { UnhookWindowsHookEx(HHOOK(raw as *mut c_void)) }
            .map_err(|e| HookError::UninstallFailed(e.message()))
    }

    fn wake(&self) {
        let thread_id = self.thread_id.load(Ordering::SeqCst);
        if thread_id == 0 {
            return;
        }
        // SAFETY: posting to a thread id only queues a message; no pointers are passed.
        if let Err(e) = unsafe { PostThreadMessageW(thread_id, WM_QUIT, WPARAM(0), LPARAM(0)) } {
            warn!(error = %e, "failed to wake capture thread");
        }
    }
}

/// Low-level keyboard hook callback.
///
/// # Safety
///
/// This function is called by Windows from the capture thread, inside
/// `GetMessageW`.  It must return quickly (< ~300ms) to avoid hook removal
/// by the OS.
unsafe extern "system" fn keyboard_hook_proc(
    n_code: i32,
    w_param: WPARAM,
    l_param: LPARAM,
) -> LRESULT {
    if n_code == HC_ACTION as i32 {
        // SAFETY: l_param points to a KBDLLHOOKSTRUCT when n_code == HC_ACTION.
        let kbs = &*(l_param.0 as *const KBDLLHOOKSTRUCT);
        let code = KeyCode(kbs.vkCode as u8);

        let transition = match w_param.0 as u32 {
            WM_KEYDOWN | WM_SYSKEYDOWN => Some(KeyTransition::Down(code)),
            WM_KEYUP | WM_SYSKEYUP => Some(KeyTransition::Up(code)),
            _ => None,
        };
        if let Some(transition) = transition {
            if let Some(sink) = SINK
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .as_mut()
            {
                sink(transition);
            }
        }
    }

    // SAFETY: Key events are never swallowed; forward to the next hook in the chain.
    CallNextHookEx(None, n_code, w_param, l_param)
}
