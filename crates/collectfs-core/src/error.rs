//! Archival error types.

use std::path::PathBuf;

use nix::errno::Errno;
use thiserror::Error;

use crate::wrap::OpError;

/// Errors that abort a collection attempt.
///
/// "Nothing to save" is not an error: absent paths and non-regular entries
/// are reported through [`CollectOutcome`](crate::CollectOutcome).
#[derive(Debug, Error)]
pub enum CollectError {
    /// Composing the real path would reach the configured maximum length.
    #[error("path too long: {len} bytes (maximum is {max})")]
    PathTooLong {
        /// Length in bytes the composed path would have.
        len: usize,
        /// Configured maximum; a path must stay strictly below it.
        max: usize,
    },

    /// A segment of the trash tree is occupied by something that is not a directory.
    #[error("trash path segment exists but is not a directory: {}", path.display())]
    NotADirectory {
        /// The conflicting real path.
        path: PathBuf,
    },

    /// A backing-store call failed.
    #[error(transparent)]
    Storage(#[from] OpError),

    /// The local time could not be read or formatted.
    #[error("clock error: {0}")]
    Clock(String),

    /// No free archive name was found within the attempt bound.
    #[error("no free archive name after {attempts} attempts")]
    NameAllocationExhausted {
        /// Number of candidate names tried.
        attempts: usize,
    },

    /// Configuration was rejected.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl CollectError {
    /// The positive errno reported to the filesystem client.
    #[must_use]
    pub fn errno(&self) -> i32 {
        match self {
            Self::PathTooLong { .. } => Errno::ENAMETOOLONG as i32,
            Self::NotADirectory { .. } => Errno::ENOTDIR as i32,
            Self::Storage(op) => op.errno(),
            Self::Clock(_) => Errno::EIO as i32,
            Self::NameAllocationExhausted { .. } => Errno::EEXIST as i32,
            Self::Config(_) => Errno::EINVAL as i32,
        }
    }

    /// The negated errno expected by the filesystem protocol.
    #[must_use]
    pub fn negated(&self) -> i32 {
        self.errno().saturating_neg()
    }
}

/// Convenience result type for archival operations.
pub type CollectResult<T> = Result<T, CollectError>;
