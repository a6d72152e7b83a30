//! DriverSession: the load/unload lifecycle of the injection driver.
//!
//! The session is the sole owner of the driver handle.  It sequences
//! privilege elevation, loading the kernel driver, binding the device handle,
//! and unloading, and it hands out at most one [`InjectorLease`] at a time so
//! that only one worker ever injects through the handle.
//!
//! # State machine
//!
//! ```text
//!                 initialize() without privilege
//!  Uninitialized ───────────────────────────────▶ NeedsElevation ──▶ (relaunched, process exits)
//!       │                                              │
//!       │ initialize() with privilege                  │ initialize() with privilege
//!       ▼                                              ▼
//!    Loading ◀─────────────────────────────────────────┘
//!       │ load + bind ok,           │ load/bind failed, or
//!       │ device reports ready      │ device still not ready after a re-bind
//!       ▼                           ▼
//!     Ready ── unload() ──▶ Unloading ──▶ Uninitialized      Error(reason)
//! ```
//!
//! `unload()` from any state ends in `Uninitialized` with the handle
//! released.  A failed load lands in `Error` and needs an explicit retry;
//! elevation is attempted at most once per session, never in a loop.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use lykeys_core::keymap::MouseButton;
use lykeys_core::{DeviceStatus, InjectError, WheelDirection};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Service name the kernel driver is registered under.
pub const DRIVER_NAME: &str = "lykeys";

/// Pause between re-binding the handle and re-reading the device status.
pub const READY_CONFIRM_DELAY: Duration = Duration::from_millis(500);

// ── Seams ─────────────────────────────────────────────────────────────────────

/// Failure reported by the driver library.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DriverFault {
    /// The OS refused the operation for lack of privilege.
    #[error("access denied")]
    AccessDenied,

    #[error("could not open driver library {path}: {reason}")]
    Library { path: PathBuf, reason: String },

    #[error("driver library does not export {0}")]
    MissingExport(&'static str),

    /// An entry point returned its failure value.
    #[error("{0} reported failure")]
    CallFailed(&'static str),
}

/// The flat function surface of the user-mode driver library.
///
/// The production implementation calls the library's exports through FFI;
/// tests use [`crate::infrastructure::driver::mock::MockDriver`].  The
/// surface has no reentrancy guarantee, which is why the session only ever
/// lets one lease holder call it.
pub trait DriverApi: Send + Sync {
    /// `LoadNTDriver(name, sys_path)`.
    fn load_driver(&self, name: &str, sys_path: &Path) -> Result<(), DriverFault>;
    /// `UnloadNTDriver(name)`.
    fn unload_driver(&self, name: &str) -> Result<(), DriverFault>;
    /// `SetHandle()`: binds the library to the device the driver created.
    fn bind_handle(&self) -> Result<(), DriverFault>;

    fn key_down(&self, code: u16) -> Result<(), DriverFault>;
    fn key_up(&self, code: u16) -> Result<(), DriverFault>;
    fn button(&self, button: MouseButton, pressed: bool) -> Result<(), DriverFault>;
    fn move_relative(&self, dx: i32, dy: i32) -> Result<(), DriverFault>;
    fn move_absolute(&self, x: i32, y: i32) -> Result<(), DriverFault>;
    fn wheel(&self, direction: WheelDirection, delta: u16) -> Result<(), DriverFault>;

    /// `CheckDeviceStatus()`: asks the driver to refresh its status.
    fn check_device_status(&self) -> Result<(), DriverFault>;
    /// `GetDriverStatus()`: raw status, see [`DeviceStatus::from_raw`].
    fn driver_status(&self) -> i32;
    /// `GetLastCheckTime()`: tick count of the last status refresh.
    fn last_check_time(&self) -> u64;
}

/// Opens the driver library from disk.
pub trait DriverLoader: Send + Sync {
    fn open(&self, dll_path: &Path) -> Result<Arc<dyn DriverApi>, DriverFault>;
}

/// Privilege check and elevated relaunch.
#[cfg_attr(test, mockall::automock)]
pub trait PrivilegeBroker: Send + Sync {
    /// Whether the current process runs with administrator rights.
    fn is_elevated(&self) -> bool;

    /// Relaunches the current executable with elevation.
    ///
    /// Returns the OS error code when the relaunch could not be started
    /// (including the user declining the prompt).
    fn relaunch_elevated(&self) -> Result<(), i32>;
}

// ── State ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    NeedsElevation,
    Loading,
    Ready,
    Unloading,
    Error(String),
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Uninitialized => f.write_str("uninitialized"),
            SessionState::NeedsElevation => f.write_str("needs elevation"),
            SessionState::Loading => f.write_str("loading"),
            SessionState::Ready => f.write_str("ready"),
            SessionState::Unloading => f.write_str("unloading"),
            SessionState::Error(reason) => write!(f, "error: {reason}"),
        }
    }
}

/// Result of a successful [`DriverSession::initialize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitOutcome {
    /// The driver is loaded and the handle bound.
    Ready,
    /// An elevated copy of the process was launched; this one should exit.
    Restarting,
}

/// The two binaries the session needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverPaths {
    /// User-mode library exposing the entry points.
    pub dll: PathBuf,
    /// Kernel driver image.
    pub sys: PathBuf,
}

/// User-facing class of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Privilege,
    Load,
    Device,
    Session,
}

impl ErrorCategory {
    /// Classifies an injection error.
    pub fn of_inject(err: &InjectError) -> Self {
        match err {
            InjectError::UnknownKey(_) => ErrorCategory::Configuration,
            InjectError::SessionClosed => ErrorCategory::Session,
            InjectError::DeviceFault(_) | InjectError::Driver { .. } => ErrorCategory::Device,
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ErrorCategory::Configuration => "configuration",
            ErrorCategory::Privilege => "privilege",
            ErrorCategory::Load => "load",
            ErrorCategory::Device => "device",
            ErrorCategory::Session => "session",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("driver paths are not configured")]
    PathsNotConfigured,

    #[error("{kind} file not found: {path}")]
    MissingFile { kind: &'static str, path: PathBuf },

    #[error("driver paths cannot change while the driver is loaded")]
    PathsLocked,

    #[error("administrator privileges are required and elevation failed (code {0})")]
    ElevationFailed(i32),

    #[error("administrator privileges are required; elevation was already attempted")]
    ElevationExhausted,

    #[error("driver load failed: {0}")]
    Load(DriverFault),

    #[error("binding the driver handle failed: {0}")]
    Bind(DriverFault),

    /// The driver loaded and bound, but the device never reported ready.
    #[error("device not ready after binding (status {0})")]
    DeviceNotReady(DeviceStatus),

    #[error("driver is not loaded")]
    NotReady,

    #[error("another sequence is already injecting")]
    InjectorBusy,
}

impl SessionError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            SessionError::PathsNotConfigured
            | SessionError::MissingFile { .. }
            | SessionError::PathsLocked => ErrorCategory::Configuration,
            SessionError::ElevationFailed(_) | SessionError::ElevationExhausted => {
                ErrorCategory::Privilege
            }
            SessionError::Load(DriverFault::AccessDenied) => ErrorCategory::Privilege,
            SessionError::Load(_) | SessionError::Bind(_) => ErrorCategory::Load,
            SessionError::DeviceNotReady(_) => ErrorCategory::Device,
            SessionError::NotReady | SessionError::InjectorBusy => ErrorCategory::Session,
        }
    }
}

// ── Lease ─────────────────────────────────────────────────────────────────────

#[derive(Debug)]
struct LeaseFlags {
    revoked: AtomicBool,
    held: AtomicBool,
}

/// Exclusive right to inject through the driver handle.
///
/// Dropping the lease returns it to the session.  Once the session unloads,
/// every call through a surviving lease fails with
/// [`InjectError::SessionClosed`].
pub struct InjectorLease {
    driver: Arc<dyn DriverApi>,
    flags: Arc<LeaseFlags>,
}

impl InjectorLease {
    /// The driver, unless the session has unloaded since the lease was taken.
    pub fn driver(&self) -> Result<&dyn DriverApi, InjectError> {
        if self.flags.revoked.load(Ordering::SeqCst) {
            Err(InjectError::SessionClosed)
        } else {
            Ok(self.driver.as_ref())
        }
    }

    pub fn is_revoked(&self) -> bool {
        self.flags.revoked.load(Ordering::SeqCst)
    }
}

impl Drop for InjectorLease {
    fn drop(&mut self) {
        self.flags.held.store(false, Ordering::SeqCst);
    }
}

impl fmt::Debug for InjectorLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InjectorLease")
            .field("revoked", &self.is_revoked())
            .finish()
    }
}

// ── Session ───────────────────────────────────────────────────────────────────

pub struct DriverSession {
    loader: Box<dyn DriverLoader>,
    broker: Box<dyn PrivilegeBroker>,
    state: SessionState,
    paths: Option<DriverPaths>,
    /// Present iff `state == Ready`.
    handle: Option<Arc<dyn DriverApi>>,
    lease: Option<Arc<LeaseFlags>>,
    elevation_attempted: bool,
}

impl DriverSession {
    pub fn new(loader: Box<dyn DriverLoader>, broker: Box<dyn PrivilegeBroker>) -> Self {
        Self {
            loader,
            broker,
            state: SessionState::Uninitialized,
            paths: None,
            handle: None,
            lease: None,
            elevation_attempted: false,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == SessionState::Ready
    }

    pub fn paths(&self) -> Option<&DriverPaths> {
        self.paths.as_ref()
    }

    pub fn has_privilege(&self) -> bool {
        self.broker.is_elevated()
    }

    /// Relaunches the process elevated.  Allowed once per session.
    pub fn request_elevation(&mut self) -> Result<(), SessionError> {
        if self.elevation_attempted {
            return Err(SessionError::ElevationExhausted);
        }
        self.elevation_attempted = true;
        info!("requesting elevated relaunch");
        self.broker
            .relaunch_elevated()
            .map_err(SessionError::ElevationFailed)
    }

    /// Validates and stores the library and driver paths.
    ///
    /// # Errors
    ///
    /// [`SessionError::PathsLocked`] while a driver is loaded, and
    /// [`SessionError::MissingFile`] when either path is not a file.
    pub fn configure_paths(
        &mut self,
        dll: impl Into<PathBuf>,
        sys: impl Into<PathBuf>,
    ) -> Result<(), SessionError> {
        if matches!(
            self.state,
            SessionState::Loading | SessionState::Ready | SessionState::Unloading
        ) {
            return Err(SessionError::PathsLocked);
        }
        let paths = DriverPaths {
            dll: dll.into(),
            sys: sys.into(),
        };
        if !paths.dll.is_file() {
            return Err(SessionError::MissingFile {
                kind: "driver library",
                path: paths.dll,
            });
        }
        if !paths.sys.is_file() {
            return Err(SessionError::MissingFile {
                kind: "driver image",
                path: paths.sys,
            });
        }
        debug!(dll = %paths.dll.display(), sys = %paths.sys.display(), "driver paths configured");
        self.paths = Some(paths);
        Ok(())
    }

    /// Brings the session to `Ready`, or relaunches elevated.
    ///
    /// Idempotent once `Ready`.  From `Error`, this is the explicit retry.
    ///
    /// After binding, the device must report ready.  If it does not, the
    /// handle is bound once more and the status re-read after
    /// [`READY_CONFIRM_DELAY`]; a device still not ready unloads the driver
    /// and fails with [`SessionError::DeviceNotReady`].
    pub fn initialize(&mut self) -> Result<InitOutcome, SessionError> {
        if self.is_ready() {
            return Ok(InitOutcome::Ready);
        }
        let paths = self.paths.clone().ok_or(SessionError::PathsNotConfigured)?;

        if !self.has_privilege() {
            self.state = SessionState::NeedsElevation;
            return self.elevate();
        }

        self.state = SessionState::Loading;
        info!(dll = %paths.dll.display(), "loading driver");

        let driver = match self.loader.open(&paths.dll) {
            Ok(driver) => driver,
            Err(fault) => return Err(self.fail(SessionError::Load(fault))),
        };

        // A previous run may have left the service registered.
        if let Err(fault) = driver.unload_driver(DRIVER_NAME) {
            debug!(%fault, "stale driver unload skipped");
        }

        match driver.load_driver(DRIVER_NAME, &paths.sys) {
            Ok(()) => {}
            Err(DriverFault::AccessDenied) if !self.elevation_attempted => {
                warn!("driver load denied; retrying with elevation");
                drop(driver);
                self.state = SessionState::NeedsElevation;
                return self.elevate();
            }
            Err(fault) => return Err(self.fail(SessionError::Load(fault))),
        }

        if let Err(fault) = driver.bind_handle() {
            discard(driver.as_ref(), "bind");
            return Err(self.fail(SessionError::Bind(fault)));
        }

        if let Err(err) = confirm_ready(driver.as_ref()) {
            discard(driver.as_ref(), "readiness check");
            return Err(self.fail(err));
        }

        self.handle = Some(driver);
        self.state = SessionState::Ready;
        info!("driver ready");
        Ok(InitOutcome::Ready)
    }

    /// Unloads the driver and releases the handle.
    ///
    /// Always ends in `Uninitialized`.  Outstanding leases are revoked first;
    /// unload failures are logged and otherwise ignored.
    pub fn unload(&mut self) {
        if let Some(flags) = self.lease.take() {
            flags.revoked.store(true, Ordering::SeqCst);
        }
        if let Some(driver) = self.handle.take() {
            self.state = SessionState::Unloading;
            info!("unloading driver");
            if let Err(fault) = driver.unload_driver(DRIVER_NAME) {
                warn!(%fault, "driver unload failed; handle released anyway");
            }
        }
        self.state = SessionState::Uninitialized;
    }

    /// Process-teardown release.  Same as [`DriverSession::unload`].
    pub fn cleanup(&mut self) {
        self.unload();
    }

    /// Takes the single injection lease.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotReady`] outside `Ready`, and
    /// [`SessionError::InjectorBusy`] while another lease is held.
    pub fn acquire_injector(&mut self) -> Result<InjectorLease, SessionError> {
        let driver = match (&self.state, &self.handle) {
            (SessionState::Ready, Some(driver)) => Arc::clone(driver),
            _ => return Err(SessionError::NotReady),
        };
        if let Some(flags) = &self.lease {
            if flags.held.load(Ordering::SeqCst) {
                return Err(SessionError::InjectorBusy);
            }
        }
        let flags = Arc::new(LeaseFlags {
            revoked: AtomicBool::new(false),
            held: AtomicBool::new(true),
        });
        self.lease = Some(Arc::clone(&flags));
        Ok(InjectorLease { driver, flags })
    }

    /// Whether a lease is currently held.
    pub fn injector_busy(&self) -> bool {
        self.lease
            .as_ref()
            .is_some_and(|flags| flags.held.load(Ordering::SeqCst))
    }

    /// Refreshes and reads the driver's status.
    pub fn driver_status(&self) -> Result<DeviceStatus, SessionError> {
        Ok(read_status(self.ready_handle()?.as_ref()))
    }

    /// Tick count of the driver's last status refresh.
    pub fn last_check_time(&self) -> Result<u64, SessionError> {
        Ok(self.ready_handle()?.last_check_time())
    }

    // ── Helpers ─────────────────────────────────────────────────────────────

    fn ready_handle(&self) -> Result<&Arc<dyn DriverApi>, SessionError> {
        match (&self.state, &self.handle) {
            (SessionState::Ready, Some(driver)) => Ok(driver),
            _ => Err(SessionError::NotReady),
        }
    }

    fn elevate(&mut self) -> Result<InitOutcome, SessionError> {
        match self.request_elevation() {
            Ok(()) => Ok(InitOutcome::Restarting),
            Err(err) => Err(self.fail(err)),
        }
    }

    fn fail(&mut self, err: SessionError) -> SessionError {
        warn!(category = %err.category(), "{err}");
        self.handle = None;
        self.state = SessionState::Error(err.to_string());
        err
    }
}

/// Reads the device status after a bind, re-binding once if it is not ready.
fn confirm_ready(driver: &dyn DriverApi) -> Result<(), SessionError> {
    let status = read_status(driver);
    if status.is_ready() {
        return Ok(());
    }
    debug!(%status, "device not ready after bind; binding again");
    driver.bind_handle().map_err(SessionError::Bind)?;
    thread::sleep(READY_CONFIRM_DELAY);
    let status = read_status(driver);
    if status.is_ready() {
        Ok(())
    } else {
        Err(SessionError::DeviceNotReady(status))
    }
}

fn read_status(driver: &dyn DriverApi) -> DeviceStatus {
    if let Err(fault) = driver.check_device_status() {
        debug!(%fault, "status refresh failed");
    }
    DeviceStatus::from_raw(driver.driver_status())
}

/// Unloads a driver that loaded but never became usable.
fn discard(driver: &dyn DriverApi, stage: &str) {
    if let Err(unload) = driver.unload_driver(DRIVER_NAME) {
        warn!(%unload, "unloading after failed {stage} also failed");
    }
}

impl Drop for DriverSession {
    fn drop(&mut self) {
        self.cleanup();
    }
}

impl fmt::Debug for DriverSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriverSession")
            .field("state", &self.state)
            .field("paths", &self.paths)
            .field("elevation_attempted", &self.elevation_attempted)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::driver::mock::{MockDriver, MockDriverLoader};
    use uuid::Uuid;

    struct Fixture {
        dir: PathBuf,
        driver: Arc<MockDriver>,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = std::env::temp_dir().join(format!("lykeys_session_{}", Uuid::new_v4()));
            std::fs::create_dir_all(&dir).unwrap();
            std::fs::write(dir.join("lykeysdll.dll"), b"dll").unwrap();
            std::fs::write(dir.join("lykeys.sys"), b"sys").unwrap();
            Self {
                dir,
                driver: Arc::new(MockDriver::new()),
            }
        }

        fn session(&self, elevated: bool) -> DriverSession {
            let mut broker = MockPrivilegeBroker::new();
            broker.expect_is_elevated().return_const(elevated);
            broker.expect_relaunch_elevated().returning(|| Ok(()));
            self.session_with(broker)
        }

        fn session_with(&self, broker: MockPrivilegeBroker) -> DriverSession {
            let loader = MockDriverLoader::new(Arc::clone(&self.driver));
            let mut session = DriverSession::new(Box::new(loader), Box::new(broker));
            session
                .configure_paths(self.dir.join("lykeysdll.dll"), self.dir.join("lykeys.sys"))
                .unwrap();
            session
        }
    }

    impl Drop for Fixture {
        fn drop(&mut self) {
            std::fs::remove_dir_all(&self.dir).ok();
        }
    }

    #[test]
    fn test_initialize_with_privilege_reaches_ready() {
        // Arrange
        let fx = Fixture::new();
        let mut session = fx.session(true);

        // Act
        let outcome = session.initialize().unwrap();

        // Assert
        assert_eq!(outcome, InitOutcome::Ready);
        assert!(session.is_ready());
        assert_eq!(
            fx.driver.calls(),
            vec!["UnloadNTDriver", "LoadNTDriver", "SetHandle", "CheckDeviceStatus"]
        );
    }

    #[test]
    fn test_initialize_twice_is_idempotent() {
        let fx = Fixture::new();
        let mut session = fx.session(true);

        session.initialize().unwrap();
        session.initialize().unwrap();

        assert_eq!(fx.driver.count("LoadNTDriver"), 1);
    }

    #[test]
    fn test_initialize_without_paths_is_configuration_error() {
        let mut broker = MockPrivilegeBroker::new();
        broker.expect_is_elevated().never();
        let loader = MockDriverLoader::new(Arc::new(MockDriver::new()));
        let mut session = DriverSession::new(Box::new(loader), Box::new(broker));

        let err = session.initialize().unwrap_err();

        assert_eq!(err, SessionError::PathsNotConfigured);
        assert_eq!(err.category(), ErrorCategory::Configuration);
        assert_eq!(session.state(), &SessionState::Uninitialized);
    }

    #[test]
    fn test_initialize_without_privilege_relaunches_once() {
        // Arrange
        let fx = Fixture::new();
        let mut broker = MockPrivilegeBroker::new();
        broker.expect_is_elevated().return_const(false);
        broker.expect_relaunch_elevated().times(1).returning(|| Ok(()));
        let mut session = fx.session_with(broker);

        // Act
        let first = session.initialize();
        let second = session.initialize();

        // Assert
        assert_eq!(first, Ok(InitOutcome::Restarting));
        assert_eq!(second, Err(SessionError::ElevationExhausted));
        assert!(matches!(session.state(), SessionState::Error(_)));
        assert!(fx.driver.calls().is_empty());
    }

    #[test]
    fn test_declined_elevation_is_privilege_error() {
        let fx = Fixture::new();
        let mut broker = MockPrivilegeBroker::new();
        broker.expect_is_elevated().return_const(false);
        broker.expect_relaunch_elevated().returning(|| Err(1223));
        let mut session = fx.session_with(broker);

        let err = session.initialize().unwrap_err();

        assert_eq!(err, SessionError::ElevationFailed(1223));
        assert_eq!(err.category(), ErrorCategory::Privilege);
    }

    #[test]
    fn test_access_denied_on_load_requests_elevation() {
        let fx = Fixture::new();
        fx.driver.fail_load_with(DriverFault::AccessDenied);
        let mut session = fx.session(true);

        let outcome = session.initialize().unwrap();

        assert_eq!(outcome, InitOutcome::Restarting);
        assert_eq!(session.state(), &SessionState::NeedsElevation);
    }

    #[test]
    fn test_load_failure_lands_in_error_and_retry_succeeds() {
        // Arrange
        let fx = Fixture::new();
        fx.driver.fail_load_with(DriverFault::CallFailed("LoadNTDriver"));
        let mut session = fx.session(true);

        // Act
        let err = session.initialize().unwrap_err();

        // Assert
        assert_eq!(err.category(), ErrorCategory::Load);
        assert!(matches!(session.state(), SessionState::Error(_)));
        assert!(matches!(
            session.acquire_injector(),
            Err(SessionError::NotReady)
        ));

        fx.driver.clear_failures();
        assert_eq!(session.initialize(), Ok(InitOutcome::Ready));
    }

    #[test]
    fn test_bind_failure_unloads_partial_driver() {
        let fx = Fixture::new();
        fx.driver.fail_bind();
        let mut session = fx.session(true);

        let err = session.initialize().unwrap_err();

        assert!(matches!(err, SessionError::Bind(_)));
        assert_eq!(fx.driver.count("UnloadNTDriver"), 2);
        assert!(!session.is_ready());
    }

    #[test]
    fn test_device_never_ready_unloads_and_lands_in_error() {
        // Arrange
        let fx = Fixture::new();
        fx.driver.set_status(2);
        let mut session = fx.session(true);

        // Act
        let err = session.initialize().unwrap_err();

        // Assert
        assert_eq!(err, SessionError::DeviceNotReady(DeviceStatus::Error));
        assert_eq!(err.category(), ErrorCategory::Device);
        assert!(matches!(session.state(), SessionState::Error(_)));
        assert_eq!(session.acquire_injector().unwrap_err(), SessionError::NotReady);
        assert_eq!(
            fx.driver.calls(),
            vec![
                "UnloadNTDriver",
                "LoadNTDriver",
                "SetHandle",
                "CheckDeviceStatus",
                "SetHandle",
                "CheckDeviceStatus",
                "UnloadNTDriver",
            ]
        );
    }

    #[test]
    fn test_device_ready_after_rebind_reaches_ready() {
        let fx = Fixture::new();
        fx.driver.set_status(0);
        fx.driver.ready_after_binds(2);
        let mut session = fx.session(true);

        let outcome = session.initialize();

        assert_eq!(outcome, Ok(InitOutcome::Ready));
        assert!(session.is_ready());
        assert_eq!(fx.driver.count("SetHandle"), 2);
        assert_eq!(fx.driver.count("UnloadNTDriver"), 1);
    }

    #[test]
    fn test_unload_from_any_state_ends_uninitialized() {
        let fx = Fixture::new();

        let mut fresh = fx.session(true);
        fresh.unload();
        assert_eq!(fresh.state(), &SessionState::Uninitialized);

        let mut ready = fx.session(true);
        ready.initialize().unwrap();
        ready.unload();
        ready.unload();
        assert_eq!(ready.state(), &SessionState::Uninitialized);

        fx.driver.fail_load_with(DriverFault::CallFailed("LoadNTDriver"));
        let mut failed = fx.session(true);
        failed.initialize().unwrap_err();
        failed.unload();
        assert_eq!(failed.state(), &SessionState::Uninitialized);
    }

    #[test]
    fn test_unload_failure_is_not_fatal() {
        let fx = Fixture::new();
        let mut session = fx.session(true);
        session.initialize().unwrap();
        fx.driver.fail_unload();

        session.unload();

        assert_eq!(session.state(), &SessionState::Uninitialized);
        assert!(matches!(session.driver_status(), Err(SessionError::NotReady)));
    }

    #[test]
    fn test_second_lease_is_rejected_until_first_drops() {
        // Arrange
        let fx = Fixture::new();
        let mut session = fx.session(true);
        session.initialize().unwrap();

        // Act
        let first = session.acquire_injector().unwrap();
        let second = session.acquire_injector();

        // Assert
        assert!(matches!(second, Err(SessionError::InjectorBusy)));
        assert!(session.injector_busy());
        drop(first);
        assert!(!session.injector_busy());
        assert!(session.acquire_injector().is_ok());
    }

    #[test]
    fn test_unload_revokes_outstanding_lease() {
        let fx = Fixture::new();
        let mut session = fx.session(true);
        session.initialize().unwrap();
        let lease = session.acquire_injector().unwrap();

        session.unload();

        assert!(lease.is_revoked());
        assert!(matches!(lease.driver(), Err(InjectError::SessionClosed)));
    }

    #[test]
    fn test_configure_paths_rejects_missing_files_and_locks_while_ready() {
        let fx = Fixture::new();
        let mut session = fx.session(true);

        let missing = session.configure_paths(fx.dir.join("nope.dll"), fx.dir.join("lykeys.sys"));
        assert!(matches!(missing, Err(SessionError::MissingFile { .. })));

        session.initialize().unwrap();
        let locked =
            session.configure_paths(fx.dir.join("lykeysdll.dll"), fx.dir.join("lykeys.sys"));
        assert_eq!(locked, Err(SessionError::PathsLocked));
    }

    #[test]
    fn test_driver_status_reports_raw_status() {
        let fx = Fixture::new();
        let mut session = fx.session(true);
        session.initialize().unwrap();
        fx.driver.clear_calls();

        assert_eq!(session.driver_status(), Ok(DeviceStatus::Ready));
        assert_eq!(fx.driver.count("CheckDeviceStatus"), 1);
    }

    #[test]
    fn test_drop_unloads_loaded_driver() {
        let fx = Fixture::new();
        let mut session = fx.session(true);
        session.initialize().unwrap();

        drop(session);

        assert_eq!(fx.driver.count("UnloadNTDriver"), 2);
    }
}
