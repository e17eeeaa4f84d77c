//! Uniform wrapping of backing-store calls.
//!
//! Every syscall made on behalf of a filesystem operation goes through
//! [`wrap_op`]. A failure is logged with the operation name and path, and the
//! original [`io::Error`] is kept so the caller can both answer the host with a
//! negated errno and report the full detail.

use std::io;
use std::path::{Path, PathBuf};

use nix::errno::Errno;
use thiserror::Error;

/// A failed backing-store call.
#[derive(Debug, Error)]
#[error("{op} failed on {}: {source}", path.display())]
pub struct OpError {
    /// Name of the operation that failed (e.g. `"unlink"`, `"collect (rename)"`).
    pub op: &'static str,
    /// Real path the call was made against.
    pub path: PathBuf,
    /// The error reported by the operating system.
    #[source]
    pub source: io::Error,
}

impl OpError {
    /// Build an error for a call that failed with a known errno.
    #[must_use]
    pub fn from_errno(op: &'static str, path: impl Into<PathBuf>, errno: Errno) -> Self {
        Self {
            op,
            path: path.into(),
            source: io::Error::from_raw_os_error(errno as i32),
        }
    }

    /// The positive errno describing this failure.
    ///
    /// Errors that carry no OS code (synthesised by the standard library) map
    /// to `EIO`.
    #[must_use]
    pub fn errno(&self) -> i32 {
        self.source.raw_os_error().unwrap_or(Errno::EIO as i32)
    }

    /// The negated errno expected by the filesystem protocol.
    #[must_use]
    pub fn negated(&self) -> i32 {
        self.errno().saturating_neg()
    }
}

/// Convenience result type for wrapped backing-store calls.
pub type OpResult<T> = Result<T, OpError>;

/// Pass a successful result through unchanged, or record the failure.
///
/// # Errors
///
/// Returns an [`OpError`] carrying `op`, `path` and the original error when
/// `result` is an error.
pub fn wrap_op<T>(op: &'static str, path: &Path, result: io::Result<T>) -> OpResult<T> {
    result.map_err(|source| wrap_err(op, path, source))
}

/// Record an error that has already been observed.
#[must_use]
pub fn wrap_err(op: &'static str, path: &Path, source: io::Error) -> OpError {
    tracing::debug!(op, path = %path.display(), error = %source, "backing store call failed");
    OpError {
        op,
        path: path.to_path_buf(),
        source,
    }
}
