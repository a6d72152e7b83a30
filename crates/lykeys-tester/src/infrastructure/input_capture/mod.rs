//! Global hotkey capture.
//!
//! On Windows, this installs a low-level keyboard hook (WH_KEYBOARD_LL) on a
//! dedicated thread that owns a Win32 message loop.  Each key edge is fed to a
//! [`HotkeyDispatcher`] on that same thread and the callbacks of any binding
//! that fires run there too, synchronously.
//!
//! # Lifecycle
//!
//! ```text
//! start() ── spawn "lykeys-hotkey" ── install ── pump until woken ── uninstall ── done
//!   ▲                                    │
//!   └──── install error returned ◀───────┘
//! stop()  ── running = false ── wake ── wait for done (1 s) ── join
//! ```
//!
//! The capture thread reports the outcome of `uninstall` on the done
//! channel, so a hook that could not be removed is an error from `stop()`.
//!
//! The hook callbacks must complete within ~300ms or Windows will remove the
//! hook, so callbacks registered here should only post a message and return.
//!
//! # Testability
//!
//! The [`CaptureHook`] trait separates the OS hook from the listener, so
//! tests drive the same listener with [`mock::MockCaptureHook`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, PoisonError, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use lykeys_core::{BindingTable, HotkeyBinding, HotkeyCallback, HotkeyDispatcher, KeyTransition};
use thiserror::Error;
use tracing::{debug, info, warn};

pub mod mock;

#[cfg(target_os = "windows")]
pub mod windows;

/// How long `stop()` waits for the capture thread to finish.
pub const STOP_TIMEOUT: Duration = Duration::from_secs(1);

/// Receives every key edge the hook observes, on the capture thread.
pub type KeySink = Box<dyn FnMut(KeyTransition) + Send>;

/// Error type for hotkey capture operations.
#[derive(Debug, Error)]
pub enum HookError {
    #[error("hotkey listener is already running")]
    AlreadyRunning,

    /// Another listener in this process holds the system hook.
    #[error("a keyboard hook is already installed in this process")]
    AlreadyInstalled,

    #[error("failed to install keyboard hook: {0}")]
    InstallFailed(String),

    #[error("failed to remove keyboard hook: {0}")]
    UninstallFailed(String),

    #[error("capture thread did not stop within {0:?}")]
    StopTimedOut(Duration),

    #[error("capture thread exited unexpectedly")]
    ThreadExited,

    #[error("failed to spawn capture thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("global hotkeys are not supported on this platform")]
    Unsupported,
}

/// An OS keyboard hook.
///
/// `install`, `pump` and `uninstall` are called in that order on the capture
/// thread; `wake` is called from any other thread to make `pump` return.
pub trait CaptureHook: Send + Sync {
    /// Installs the hook; every subsequent key edge goes to `sink`.
    fn install(&self, sink: KeySink) -> Result<(), HookError>;

    /// Delivers events until [`CaptureHook::wake`] is called.
    fn pump(&self);

    fn uninstall(&self) -> Result<(), HookError>;

    /// Makes a running (or the next) `pump` return.
    fn wake(&self);
}

/// The hook for the current platform.
pub fn platform_hook() -> Arc<dyn CaptureHook> {
    #[cfg(target_os = "windows")]
    {
        Arc::new(windows::WindowsKeyboardHook::new())
    }
    #[cfg(not(target_os = "windows"))]
    {
        Arc::new(UnsupportedHook)
    }
}

#[cfg(not(target_os = "windows"))]
struct UnsupportedHook;

#[cfg(not(target_os = "windows"))]
impl CaptureHook for UnsupportedHook {
    fn install(&self, _sink: KeySink) -> Result<(), HookError> {
        Err(HookError::Unsupported)
    }

    fn pump(&self) {}

    fn uninstall(&self) -> Result<(), HookError> {
        Ok(())
    }

    fn wake(&self) {}
}

// ── Listener ──────────────────────────────────────────────────────────────────

/// Runs a [`CaptureHook`] on a background thread and dispatches bindings.
pub struct HotkeyListener {
    hook: Arc<dyn CaptureHook>,
    bindings: Arc<RwLock<BindingTable>>,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
    done_rx: Option<mpsc::Receiver<Result<(), HookError>>>,
}

impl HotkeyListener {
    pub fn new(hook: Arc<dyn CaptureHook>) -> Self {
        Self {
            hook,
            bindings: Arc::new(RwLock::new(BindingTable::new())),
            running: Arc::new(AtomicBool::new(false)),
            thread: None,
            done_rx: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Adds or replaces a binding.  Takes effect immediately, even while
    /// the listener runs.
    pub fn register(&self, binding: HotkeyBinding, callback: HotkeyCallback) {
        info!(%binding, "hotkey registered");
        self.bindings
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .register(binding, callback);
    }

    pub fn unregister(&self, binding: &HotkeyBinding) -> bool {
        self.bindings
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .unregister(binding)
    }

    pub fn is_registered(&self, binding: &HotkeyBinding) -> bool {
        self.bindings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(binding)
    }

    /// Spawns the capture thread and waits until the hook is installed.
    ///
    /// # Errors
    ///
    /// [`HookError::AlreadyRunning`] if started twice; otherwise the hook's
    /// install error, in which case no thread is left behind.
    pub fn start(&mut self) -> Result<(), HookError> {
        if self.is_running() {
            return Err(HookError::AlreadyRunning);
        }
        self.reap();

        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), HookError>>();
        let (done_tx, done_rx) = mpsc::channel::<Result<(), HookError>>();
        let hook = Arc::clone(&self.hook);
        let bindings = Arc::clone(&self.bindings);
        let running = Arc::clone(&self.running);

        let thread = thread::Builder::new()
            .name("lykeys-hotkey".to_string())
            .spawn(move || {
                let mut dispatcher = HotkeyDispatcher::new();
                let sink: KeySink = Box::new(move |transition| {
                    let fired = {
                        let table = bindings.read().unwrap_or_else(PoisonError::into_inner);
                        dispatcher.handle(transition, &table)
                    };
                    for callback in fired {
                        callback();
                    }
                });

                if let Err(e) = hook.install(sink) {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
                running.store(true, Ordering::SeqCst);
                let _ = ready_tx.send(Ok(()));

                hook.pump();

                let teardown = hook.uninstall();
                if let Err(e) = &teardown {
                    warn!(error = %e, "hook teardown failed");
                }
                running.store(false, Ordering::SeqCst);
                let _ = done_tx.send(teardown);
                debug!("capture thread finished");
            })?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                info!("hotkey listener started");
                self.thread = Some(thread);
                self.done_rx = Some(done_rx);
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread.join();
                Err(HookError::ThreadExited)
            }
        }
    }

    /// Stops the capture thread.  Callable any number of times; a no-op if
    /// the listener was never started.
    ///
    /// # Errors
    ///
    /// [`HookError::StopTimedOut`] when the thread does not finish in
    /// [`STOP_TIMEOUT`]; the thread is then left detached.  The hook's
    /// uninstall error otherwise.  Either way the listener counts as stopped
    /// and may be started again.
    pub fn stop(&mut self) -> Result<(), HookError> {
        let Some(thread) = self.thread.take() else {
            return Ok(());
        };
        let done_rx = self.done_rx.take();
        self.running.store(false, Ordering::SeqCst);
        self.hook.wake();

        let teardown = match done_rx {
            Some(rx) => match rx.recv_timeout(STOP_TIMEOUT) {
                Ok(result) => result,
                Err(RecvTimeoutError::Disconnected) => Ok(()),
                Err(RecvTimeoutError::Timeout) => {
                    warn!(timeout = ?STOP_TIMEOUT, "capture thread did not stop");
                    return Err(HookError::StopTimedOut(STOP_TIMEOUT));
                }
            },
            None => Ok(()),
        };
        if thread.join().is_err() {
            warn!("capture thread panicked");
        }
        teardown?;
        info!("hotkey listener stopped");
        Ok(())
    }

    /// Joins a thread that already exited on its own.
    fn reap(&mut self) {
        if let Some(thread) = self.thread.take() {
            self.done_rx = None;
            let _ = thread.join();
        }
    }
}

impl Drop for HotkeyListener {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!(error = %e, "hotkey listener stop on drop failed");
        }
    }
}
