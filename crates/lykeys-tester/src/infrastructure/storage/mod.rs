//! Storage infrastructure: configuration file persistence.
//!
//! The `config` sub-module reads the console settings at startup, falling
//! back to defaults for anything missing or malformed, and writes them back
//! when the operator runs `save`.

pub mod config;
