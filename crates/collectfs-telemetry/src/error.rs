//! Logging setup errors.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Reasons logging could not be installed.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// A level or directive string is not a valid filter.
    #[error("invalid log filter '{filter}': {reason}")]
    InvalidFilter {
        /// The offending level or directive.
        filter: String,
        /// Parser message.
        reason: String,
    },

    /// The log directory could not be created.
    #[error("cannot create log directory {}: {source}", path.display())]
    LogDir {
        /// Requested directory.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// A global subscriber is already installed.
    #[error("logging already initialized: {0}")]
    AlreadyInitialized(String),
}

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
