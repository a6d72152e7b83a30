//! Mock keyboard hook for unit testing.
//!
//! Allows tests to inject synthetic [`KeyTransition`]s without requiring
//! a running Windows message loop or OS hooks.  Injected edges are queued and
//! delivered by `pump` on the listener's capture thread, exactly like the
//! real hook delivers them.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::Duration;

use lykeys_core::KeyTransition;

use super::{CaptureHook, HookError, KeySink};

#[derive(Default)]
struct State {
    queue: VecDeque<KeyTransition>,
    sink: Option<KeySink>,
    woken: bool,
    /// A transition is being handled outside the lock.
    delivering: bool,
}

/// A mock implementation of [`CaptureHook`] that allows tests to inject events.
pub struct MockCaptureHook {
    state: Mutex<State>,
    changed: Condvar,
    fail_install: bool,
    fail_uninstall: bool,
    installs: AtomicU32,
    uninstalls: AtomicU32,
}

impl MockCaptureHook {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            changed: Condvar::new(),
            fail_install: false,
            fail_uninstall: false,
            installs: AtomicU32::new(0),
            uninstalls: AtomicU32::new(0),
        }
    }

    /// A hook whose `install` always fails.
    pub fn failing() -> Self {
        Self {
            fail_install: true,
            ..Self::new()
        }
    }

    /// A hook whose `uninstall` reports failure after detaching the sink.
    pub fn failing_uninstall() -> Self {
        Self {
            fail_uninstall: true,
            ..Self::new()
        }
    }

    /// Queues a key edge, as if observed by the OS hook.
    pub fn inject(&self, transition: KeyTransition) {
        let mut state = self.state.lock().expect("lock poisoned");
        state.queue.push_back(transition);
        self.changed.notify_all();
    }

    /// Blocks until every injected edge has been handled, or `timeout`.
    ///
    /// Returns `false` on timeout.
    pub fn wait_drained(&self, timeout: Duration) -> bool {
        let state = self.state.lock().expect("lock poisoned");
        let (_state, result) = self
            .changed
            .wait_timeout_while(state, timeout, |s| !s.queue.is_empty() || s.delivering)
            .expect("lock poisoned");
        !result.timed_out()
    }

    pub fn installs(&self) -> u32 {
        self.installs.load(Ordering::SeqCst)
    }

    pub fn uninstalls(&self) -> u32 {
        self.uninstalls.load(Ordering::SeqCst)
    }
}

impl Default for MockCaptureHook {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureHook for MockCaptureHook {
    fn install(&self, sink: KeySink) -> Result<(), HookError> {
        if self.fail_install {
            return Err(HookError::InstallFailed("mock hook refused".to_string()));
        }
        let mut state = self.state.lock().expect("lock poisoned");
        if state.sink.is_some() {
            return Err(HookError::AlreadyInstalled);
        }
        state.sink = Some(sink);
        state.woken = false;
        self.installs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn pump(&self) {
        let mut state = self.state.lock().expect("lock poisoned");
        loop {
            state = self
                .changed
                .wait_while(state, |s| s.queue.is_empty() && !s.woken)
                .expect("lock poisoned");
            if state.woken {
                return;
            }
            let Some(transition) = state.queue.pop_front() else {
                continue;
            };
            let Some(mut sink) = state.sink.take() else {
                continue;
            };
            state.delivering = true;
            drop(state);

            sink(transition);

            state = self.state.lock().expect("lock poisoned");
            state.sink = Some(sink);
            state.delivering = false;
            self.changed.notify_all();
        }
    }

    fn uninstall(&self) -> Result<(), HookError> {
        let mut state = self.state.lock().expect("lock poisoned");
        state.sink = None;
        state.queue.clear();
        self.uninstalls.fetch_add(1, Ordering::SeqCst);
        self.changed.notify_all();
        if self.fail_uninstall {
            return Err(HookError::UninstallFailed("mock hook stuck".to_string()));
        }
        Ok(())
    }

    fn wake(&self) {
        let mut state = self.state.lock().expect("lock poisoned");
        state.woken = true;
        self.changed.notify_all();
    }
}
