//! In-memory [`InjectionSink`] that records what it was asked to inject.
//!
//! Used by unit tests here, by the tester crate's tests, and by the
//! benchmarks.  It can be told to start faulting after a number of readiness
//! checks to exercise abort paths.

use std::time::Instant;

use crate::domain::{DeviceStatus, InjectError, InputAction};

use super::InjectionSink;

#[derive(Debug, Default)]
pub struct RecordingSink {
    /// Every emitted action with the instant it arrived.
    pub events: Vec<(Instant, InputAction)>,
    /// Number of `check_ready` calls so far.
    pub checks: usize,
    /// When set, `check_ready` fails once `checks` exceeds this value.
    pub fault_after_checks: Option<usize>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose `check_ready` succeeds `n` times and then faults.
    pub fn faulting_after(n: usize) -> Self {
        Self {
            fault_after_checks: Some(n),
            ..Self::default()
        }
    }

    /// The recorded actions without timestamps.
    pub fn actions(&self) -> Vec<InputAction> {
        self.events.iter().map(|(_, action)| *action).collect()
    }
}

impl InjectionSink for RecordingSink {
    fn check_ready(&mut self) -> Result<(), InjectError> {
        self.checks += 1;
        match self.fault_after_checks {
            Some(limit) if self.checks > limit => Err(InjectError::DeviceFault(DeviceStatus::Error)),
            _ => Ok(()),
        }
    }

    fn emit(&mut self, action: InputAction) -> Result<(), InjectError> {
        self.events.push((Instant::now(), action));
        Ok(())
    }
}
