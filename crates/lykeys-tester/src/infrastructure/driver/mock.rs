//! Mock driver library for unit testing.
//!
//! [`MockDriver`] records every entry point called, by export name, with its
//! integer arguments.  Failures are switched on per entry point so tests can
//! drive the session and translator error paths without a kernel driver.
//!
//! ```ignore
//! let driver = Arc::new(MockDriver::new());
//! let loader = MockDriverLoader::new(Arc::clone(&driver));
//! let mut session = DriverSession::new(Box::new(loader), broker);
//! session.initialize()?;
//! assert_eq!(
//!     driver.calls(),
//!     vec!["UnloadNTDriver", "LoadNTDriver", "SetHandle", "CheckDeviceStatus"]
//! );
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI32, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use lykeys_core::keymap::MouseButton;
use lykeys_core::WheelDirection;

use crate::application::driver_session::{DriverApi, DriverFault, DriverLoader};

/// One recorded call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub export: &'static str,
    pub args: Vec<i64>,
}

#[derive(Debug, Default)]
struct Failures {
    load: Option<DriverFault>,
    bind: bool,
    unload: bool,
    /// Injection exports that report failure.
    calls: Vec<&'static str>,
}

/// In-memory stand-in for the driver library.
#[derive(Debug)]
pub struct MockDriver {
    log: Mutex<Vec<RecordedCall>>,
    failures: Mutex<Failures>,
    status: AtomicI32,
    binds: AtomicU32,
    /// `SetHandle` count at which the status flips to ready; 0 never.
    ready_after_binds: AtomicU32,
}

impl MockDriver {
    /// A driver whose every call succeeds and whose status is ready (1).
    pub fn new() -> Self {
        Self {
            log: Mutex::new(Vec::new()),
            failures: Mutex::new(Failures::default()),
            status: AtomicI32::new(1),
            binds: AtomicU32::new(0),
            ready_after_binds: AtomicU32::new(0),
        }
    }

    /// Export names called so far, in order.
    pub fn calls(&self) -> Vec<&'static str> {
        self.log
            .lock()
            .expect("lock poisoned")
            .iter()
            .map(|c| c.export)
            .collect()
    }

    /// Calls with their arguments, in order.
    pub fn recorded(&self) -> Vec<RecordedCall> {
        self.log.lock().expect("lock poisoned").clone()
    }

    /// How many times `export` was called.
    pub fn count(&self, export: &str) -> usize {
        self.log
            .lock()
            .expect("lock poisoned")
            .iter()
            .filter(|c| c.export == export)
            .count()
    }

    pub fn clear_calls(&self) {
        self.log.lock().expect("lock poisoned").clear();
    }

    pub fn fail_load_with(&self, fault: DriverFault) {
        self.failures.lock().expect("lock poisoned").load = Some(fault);
    }

    pub fn fail_bind(&self) {
        self.failures.lock().expect("lock poisoned").bind = true;
    }

    pub fn fail_unload(&self) {
        self.failures.lock().expect("lock poisoned").unload = true;
    }

    /// Makes an injection export (e.g. `"KeyDown"`) report failure.
    pub fn fail_call(&self, export: &'static str) {
        self.failures.lock().expect("lock poisoned").calls.push(export);
    }

    pub fn clear_failures(&self) {
        *self.failures.lock().expect("lock poisoned") = Failures::default();
    }

    /// Sets the raw value `GetDriverStatus` returns.
    pub fn set_status(&self, raw: i32) {
        self.status.store(raw, Ordering::SeqCst);
    }

    /// Reports ready once `SetHandle` has been called `binds` times.
    pub fn ready_after_binds(&self, binds: u32) {
        self.ready_after_binds.store(binds, Ordering::SeqCst);
    }

    fn record(&self, export: &'static str, args: &[i64]) {
        self.log.lock().expect("lock poisoned").push(RecordedCall {
            export,
            args: args.to_vec(),
        });
    }

    fn injection(&self, export: &'static str, args: &[i64]) -> Result<(), DriverFault> {
        self.record(export, args);
        if self
            .failures
            .lock()
            .expect("lock poisoned")
            .calls
            .contains(&export)
        {
            Err(DriverFault::CallFailed(export))
        } else {
            Ok(())
        }
    }
}

impl Default for MockDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl DriverApi for MockDriver {
    fn load_driver(&self, _name: &str, _sys_path: &Path) -> Result<(), DriverFault> {
        self.record("LoadNTDriver", &[]);
        match &self.failures.lock().expect("lock poisoned").load {
            Some(fault) => Err(fault.clone()),
            None => Ok(()),
        }
    }

    fn unload_driver(&self, _name: &str) -> Result<(), DriverFault> {
        self.record("UnloadNTDriver", &[]);
        if self.failures.lock().expect("lock poisoned").unload {
            Err(DriverFault::CallFailed("UnloadNTDriver"))
        } else {
            Ok(())
        }
    }

    fn bind_handle(&self) -> Result<(), DriverFault> {
        self.record("SetHandle", &[]);
        if self.failures.lock().expect("lock poisoned").bind {
            return Err(DriverFault::CallFailed("SetHandle"));
        }
        let binds = self.binds.fetch_add(1, Ordering::SeqCst) + 1;
        let ready_after = self.ready_after_binds.load(Ordering::SeqCst);
        if ready_after != 0 && binds >= ready_after {
            self.status.store(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn key_down(&self, code: u16) -> Result<(), DriverFault> {
        self.injection("KeyDown", &[i64::from(code)])
    }

    fn key_up(&self, code: u16) -> Result<(), DriverFault> {
        self.injection("KeyUp", &[i64::from(code)])
    }

    fn button(&self, button: MouseButton, pressed: bool) -> Result<(), DriverFault> {
        let export = match (button, pressed) {
            (MouseButton::Left, true) => "MouseLeftButtonDown",
            (MouseButton::Left, false) => "MouseLeftButtonUp",
            (MouseButton::Right, true) => "MouseRightButtonDown",
            (MouseButton::Right, false) => "MouseRightButtonUp",
            (MouseButton::Middle, true) => "MouseMiddleButtonDown",
            (MouseButton::Middle, false) => "MouseMiddleButtonUp",
            (MouseButton::X1, true) => "MouseXButton1Down",
            (MouseButton::X1, false) => "MouseXButton1Up",
            (MouseButton::X2, true) => "MouseXButton2Down",
            (MouseButton::X2, false) => "MouseXButton2Up",
        };
        self.injection(export, &[])
    }

    fn move_relative(&self, dx: i32, dy: i32) -> Result<(), DriverFault> {
        self.injection("MouseMoveRELATIVE", &[i64::from(dx), i64::from(dy)])
    }

    fn move_absolute(&self, x: i32, y: i32) -> Result<(), DriverFault> {
        self.injection("MouseMoveABSOLUTE", &[i64::from(x), i64::from(y)])
    }

    fn wheel(&self, direction: WheelDirection, delta: u16) -> Result<(), DriverFault> {
        let export = match direction {
            WheelDirection::Up => "MouseWheelUp",
            WheelDirection::Down => "MouseWheelDown",
        };
        self.injection(export, &[i64::from(delta)])
    }

    fn check_device_status(&self) -> Result<(), DriverFault> {
        self.record("CheckDeviceStatus", &[]);
        Ok(())
    }

    fn driver_status(&self) -> i32 {
        self.status.load(Ordering::SeqCst)
    }

    fn last_check_time(&self) -> u64 {
        self.record("GetLastCheckTime", &[]);
        42
    }
}

/// Loader that hands out a shared [`MockDriver`].
#[derive(Debug)]
pub struct MockDriverLoader {
    driver: Arc<MockDriver>,
    opened: Mutex<Vec<PathBuf>>,
    fault: Option<DriverFault>,
}

impl MockDriverLoader {
    pub fn new(driver: Arc<MockDriver>) -> Self {
        Self {
            driver,
            opened: Mutex::new(Vec::new()),
            fault: None,
        }
    }

    /// A loader whose every `open` fails with `fault`.
    pub fn failing(fault: DriverFault) -> Self {
        Self {
            driver: Arc::new(MockDriver::new()),
            opened: Mutex::new(Vec::new()),
            fault: Some(fault),
        }
    }

    /// Paths passed to `open`, in order.
    pub fn opened(&self) -> Vec<PathBuf> {
        self.opened.lock().expect("lock poisoned").clone()
    }
}

impl DriverLoader for MockDriverLoader {
    fn open(&self, dll_path: &Path) -> Result<Arc<dyn DriverApi>, DriverFault> {
        self.opened
            .lock()
            .expect("lock poisoned")
            .push(dll_path.to_path_buf());
        match &self.fault {
            Some(fault) => Err(fault.clone()),
            None => Ok(Arc::clone(&self.driver) as Arc<dyn DriverApi>),
        }
    }
}
