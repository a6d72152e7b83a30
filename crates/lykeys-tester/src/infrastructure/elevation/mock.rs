//! Mock privilege broker.
//!
//! Also serves as the broker on platforms without UAC.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crate::application::driver_session::PrivilegeBroker;

/// `ERROR_CANCELLED`: the user declined the elevation prompt.
pub const ELEVATION_DECLINED: i32 = 1223;

#[derive(Debug, Default)]
pub struct MockElevation {
    elevated: AtomicBool,
    /// When `true`, `relaunch_elevated` fails with [`ELEVATION_DECLINED`].
    pub should_fail: AtomicBool,
    relaunches: AtomicU32,
}

impl MockElevation {
    pub fn elevated() -> Self {
        Self {
            elevated: AtomicBool::new(true),
            ..Self::default()
        }
    }

    pub fn unelevated() -> Self {
        Self::default()
    }

    /// How many relaunches were requested.
    pub fn relaunches(&self) -> u32 {
        self.relaunches.load(Ordering::SeqCst)
    }
}

impl PrivilegeBroker for MockElevation {
    fn is_elevated(&self) -> bool {
        self.elevated.load(Ordering::SeqCst)
    }

    fn relaunch_elevated(&self) -> Result<(), i32> {
        self.relaunches.fetch_add(1, Ordering::SeqCst);
        if self.should_fail.load(Ordering::SeqCst) {
            Err(ELEVATION_DECLINED)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_elevation_counts_relaunches_and_can_decline() {
        // Arrange
        let broker = MockElevation::unelevated();
        broker.should_fail.store(true, Ordering::SeqCst);

        // Act
        let result = broker.relaunch_elevated();

        // Assert
        assert!(!broker.is_elevated());
        assert_eq!(result, Err(ELEVATION_DECLINED));
        assert_eq!(broker.relaunches(), 1);
    }
}
