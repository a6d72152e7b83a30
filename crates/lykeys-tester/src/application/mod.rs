//! Application layer of the test console.
//!
//! Use cases here depend on traits ([`driver_session::DriverApi`],
//! [`driver_session::PrivilegeBroker`], the timing engine's
//! `InjectionSink`) rather than on OS calls, so each one is unit-testable
//! with the mocks in `infrastructure`.
//!
//! # Sub-modules
//!
//! - **`driver_session`** – The load/unload state machine and sole owner of
//!   the driver handle; hands out one injector lease at a time.
//!
//! - **`input_translator`** – Binds a lease to the timing engine: maps each
//!   input action to its driver entry point and re-validates readiness.
//!
//! - **`workers`** – Runs injection sequences on their own threads and
//!   reports back to the control thread as messages.
//!
//! - **`command`** – Parses operator command lines.

pub mod command;
pub mod driver_session;
pub mod input_translator;
pub mod workers;
