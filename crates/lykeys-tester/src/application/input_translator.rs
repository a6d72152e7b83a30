//! InputTranslator: the timing engine's sink bound to a loaded driver.
//!
//! Maps each [`InputAction`] to one driver entry point and re-validates the
//! driver before sequences through [`InjectionSink::check_ready`].
//!
//! # Readiness polling
//!
//! The driver refreshes its status on `CheckDeviceStatus`, which is not free,
//! so a confirmed `Ready` is trusted for [`READY_CHECK_INTERVAL`].  An
//! `Unknown` status is transient: it is re-polled on the next call and only
//! becomes a fault after [`MAX_UNKNOWN_POLLS`] consecutive readings.  An
//! `Error` status is a fault immediately.

use std::time::{Duration, Instant};

use lykeys_core::{DeviceStatus, InjectError, InjectionSink, InputAction};
use tracing::{debug, warn};

use super::driver_session::{DriverApi, DriverFault, InjectorLease};

/// How long a `Ready` reading is trusted.
pub const READY_CHECK_INTERVAL: Duration = Duration::from_secs(1);

/// Consecutive `Unknown` readings tolerated before they count as a fault.
pub const MAX_UNKNOWN_POLLS: u32 = 3;

pub struct InputTranslator {
    lease: InjectorLease,
    last_ready: Option<Instant>,
    unknown_streak: u32,
}

impl InputTranslator {
    pub fn new(lease: InjectorLease) -> Self {
        Self {
            lease,
            last_ready: None,
            unknown_streak: 0,
        }
    }

    fn driver(&self) -> Result<&dyn DriverApi, InjectError> {
        self.lease.driver()
    }

    fn poll_status(&mut self) -> Result<(), InjectError> {
        let driver = self.driver()?;
        driver.check_device_status().map_err(call_error)?;
        let status = DeviceStatus::from_raw(driver.driver_status());
        match status {
            DeviceStatus::Ready => {
                self.unknown_streak = 0;
                self.last_ready = Some(Instant::now());
                Ok(())
            }
            DeviceStatus::Unknown => {
                self.unknown_streak += 1;
                self.last_ready = None;
                if self.unknown_streak > MAX_UNKNOWN_POLLS {
                    warn!(polls = self.unknown_streak, "driver status stayed unknown");
                    Err(InjectError::DeviceFault(status))
                } else {
                    debug!(polls = self.unknown_streak, "driver status unknown; re-polling next time");
                    Ok(())
                }
            }
            DeviceStatus::Error => {
                self.last_ready = None;
                warn!("driver reports error status");
                Err(InjectError::DeviceFault(status))
            }
        }
    }
}

fn call_error(fault: DriverFault) -> InjectError {
    match fault {
        DriverFault::CallFailed(call) | DriverFault::MissingExport(call) => {
            InjectError::Driver { call }
        }
        DriverFault::AccessDenied | DriverFault::Library { .. } => {
            InjectError::DeviceFault(DeviceStatus::Error)
        }
    }
}

impl InjectionSink for InputTranslator {
    fn check_ready(&mut self) -> Result<(), InjectError> {
        if self.lease.is_revoked() {
            return Err(InjectError::SessionClosed);
        }
        match self.last_ready {
            Some(at) if at.elapsed() < READY_CHECK_INTERVAL => Ok(()),
            _ => self.poll_status(),
        }
    }

    fn emit(&mut self, action: InputAction) -> Result<(), InjectError> {
        let driver = self.driver()?;
        let result = match action {
            InputAction::KeyDown(code) => driver.key_down(code.driver_code()),
            InputAction::KeyUp(code) => driver.key_up(code.driver_code()),
            InputAction::ButtonDown(button) => driver.button(button, true),
            InputAction::ButtonUp(button) => driver.button(button, false),
            InputAction::MoveRelative { dx, dy } => driver.move_relative(dx, dy),
            InputAction::MoveAbsolute { x, y } => driver.move_absolute(x, y),
            InputAction::Wheel { direction, delta } => driver.wheel(direction, delta),
        };
        result.map_err(call_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::driver_session::DriverSession;
    use crate::infrastructure::driver::mock::{MockDriver, MockDriverLoader};
    use crate::infrastructure::elevation::mock::MockElevation;
    use lykeys_core::keymap::MouseButton;
    use lykeys_core::{KeyCode, WheelDirection};
    use std::path::PathBuf;
    use std::sync::Arc;
    use uuid::Uuid;

    struct Fixture {
        dir: PathBuf,
        driver: Arc<MockDriver>,
        session: DriverSession,
    }

    impl Fixture {
        fn ready() -> Self {
            let dir = std::env::temp_dir().join(format!("lykeys_translator_{}", Uuid::new_v4()));
            std::fs::create_dir_all(&dir).unwrap();
            std::fs::write(dir.join("lykeysdll.dll"), b"dll").unwrap();
            std::fs::write(dir.join("lykeys.sys"), b"sys").unwrap();
            let driver = Arc::new(MockDriver::new());
            let mut session = DriverSession::new(
                Box::new(MockDriverLoader::new(Arc::clone(&driver))),
                Box::new(MockElevation::elevated()),
            );
            session
                .configure_paths(dir.join("lykeysdll.dll"), dir.join("lykeys.sys"))
                .unwrap();
            session.initialize().unwrap();
            driver.clear_calls();
            Self { dir, driver, session }
        }

        fn translator(&mut self) -> InputTranslator {
            InputTranslator::new(self.session.acquire_injector().unwrap())
        }
    }

    impl Drop for Fixture {
        fn drop(&mut self) {
            std::fs::remove_dir_all(&self.dir).ok();
        }
    }

    #[test]
    fn test_each_action_maps_to_its_entry_point() {
        // Arrange
        let mut fx = Fixture::ready();
        let mut t = fx.translator();

        // Act
        t.emit(InputAction::KeyDown(KeyCode(0x41))).unwrap();
        t.emit(InputAction::KeyUp(KeyCode(0x41))).unwrap();
        t.emit(InputAction::ButtonDown(MouseButton::X2)).unwrap();
        t.emit(InputAction::ButtonUp(MouseButton::X2)).unwrap();
        t.emit(InputAction::MoveRelative { dx: 5, dy: -5 }).unwrap();
        t.emit(InputAction::MoveAbsolute { x: 1, y: 1079 }).unwrap();
        t.emit(InputAction::Wheel { direction: WheelDirection::Up, delta: 120 })
            .unwrap();

        // Assert
        assert_eq!(
            fx.driver.calls(),
            vec![
                "KeyDown",
                "KeyUp",
                "MouseXButton2Down",
                "MouseXButton2Up",
                "MouseMoveRELATIVE",
                "MouseMoveABSOLUTE",
                "MouseWheelUp",
            ]
        );
        let recorded = fx.driver.recorded();
        assert_eq!(recorded[0].args, vec![0x41]);
        assert_eq!(recorded[5].args, vec![1, 1079]);
        assert_eq!(recorded[6].args, vec![120]);
    }

    #[test]
    fn test_ready_status_is_trusted_between_polls() {
        let mut fx = Fixture::ready();
        let mut t = fx.translator();

        t.check_ready().unwrap();
        t.check_ready().unwrap();
        t.check_ready().unwrap();

        assert_eq!(fx.driver.count("CheckDeviceStatus"), 1);
    }

    #[test]
    fn test_unknown_status_is_repolled_then_faults() {
        // Arrange
        let mut fx = Fixture::ready();
        fx.driver.set_status(0);
        let mut t = fx.translator();

        // Act
        let tolerated: Vec<_> = (0..MAX_UNKNOWN_POLLS).map(|_| t.check_ready()).collect();
        let fault = t.check_ready();

        // Assert
        assert!(tolerated.iter().all(Result::is_ok));
        assert_eq!(fault, Err(InjectError::DeviceFault(DeviceStatus::Unknown)));
        assert_eq!(
            fx.driver.count("CheckDeviceStatus"),
            MAX_UNKNOWN_POLLS as usize + 1
        );
    }

    #[test]
    fn test_unknown_streak_resets_on_ready() {
        let mut fx = Fixture::ready();
        fx.driver.set_status(0);
        let mut t = fx.translator();
        for _ in 0..MAX_UNKNOWN_POLLS {
            t.check_ready().unwrap();
        }

        fx.driver.set_status(1);
        t.check_ready().unwrap();

        assert_eq!(t.unknown_streak, 0);
    }

    #[test]
    fn test_error_status_faults_immediately() {
        let mut fx = Fixture::ready();
        fx.driver.set_status(2);
        let mut t = fx.translator();

        assert_eq!(
            t.check_ready(),
            Err(InjectError::DeviceFault(DeviceStatus::Error))
        );
    }

    #[test]
    fn test_failed_entry_point_names_the_call() {
        let mut fx = Fixture::ready();
        fx.driver.fail_call("KeyUp");
        let mut t = fx.translator();

        let err = t.emit(InputAction::KeyUp(KeyCode(0x41))).unwrap_err();

        assert_eq!(err, InjectError::Driver { call: "KeyUp" });
    }

    #[test]
    fn test_unload_closes_translator() {
        let mut fx = Fixture::ready();
        let mut t = fx.translator();

        fx.session.unload();

        assert_eq!(t.check_ready(), Err(InjectError::SessionClosed));
        assert_eq!(
            t.emit(InputAction::KeyDown(KeyCode(0x41))),
            Err(InjectError::SessionClosed)
        );
    }
}
