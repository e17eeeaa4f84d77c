//! Prelude module - commonly used types for convenient import.
//!
//! Use `use collectfs_telemetry::prelude::*;` to import all essential types.

pub use crate::{
    LogConfig, LogFormat, LogGuard, LogTarget, TelemetryError, TelemetryResult, setup_logging,
};
