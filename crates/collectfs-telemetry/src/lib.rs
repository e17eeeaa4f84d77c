//! collectfs telemetry - logging for the collectfs filesystem.
//!
//! This crate provides:
//! - A [`LogConfig`] builder covering level, format and output target
//! - Daily rolling, non-blocking log files for daemonized mounts
//! - Integration with the tracing ecosystem
//!
//! # Example
//!
//! ```rust,no_run
//! use collectfs_telemetry::{LogConfig, LogFormat, LogTarget, setup_logging};
//!
//! # fn main() -> Result<(), collectfs_telemetry::TelemetryError> {
//! let config = LogConfig::new("debug")
//!     .with_format(LogFormat::Compact)
//!     .with_target(LogTarget::Stderr)
//!     .with_directive("fuse3=warn");
//!
//! // Keep the guard alive until shutdown so buffered records are flushed.
//! let _guard = setup_logging(&config)?;
//! tracing::info!("mounted");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod error;
mod logging;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{DEFAULT_FILE_PREFIX, LogConfig, LogFormat, LogGuard, LogTarget, setup_logging};
