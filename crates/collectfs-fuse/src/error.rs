//! Error types and errno translation for the gateway.
//!
//! Handlers answer with a [`nix::errno::Errno`]; the session layer turns it
//! into the binding's reply code.

use std::io;
use std::path::{Path, PathBuf};

use collectfs_core::{CollectError, OpError, wrap_op};
use nix::errno::Errno;
use thiserror::Error;

/// Errors raised while mounting or serving a filesystem session.
#[derive(Debug, Error)]
pub enum MountError {
    /// The kernel refused the mount.
    #[error("failed to mount {}: {source}", path.display())]
    Mount {
        /// Requested mount point.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// The session ended with an error.
    #[error("filesystem session failed: {0}")]
    Session(#[source] io::Error),

    /// Unmounting after a shutdown signal failed.
    #[error("failed to unmount {}: {source}", path.display())]
    Unmount {
        /// Mount point being released.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// Installing a signal handler failed.
    #[error("failed to install signal handler: {0}")]
    Signal(#[source] io::Error),
}

/// Result type for mount operations.
pub type MountResult<T> = Result<T, MountError>;

/// Result type of a filesystem operation handler.
pub type OpReply<T> = Result<T, Errno>;

/// The errno answered for a failed collection.
#[must_use]
pub fn collect_errno(err: &CollectError) -> Errno {
    Errno::from_raw(err.errno())
}

/// The errno answered for a failed backing-store call.
#[must_use]
pub fn op_errno(err: &OpError) -> Errno {
    Errno::from_raw(err.errno())
}

/// Translate a handler errno into the binding's reply code.
#[must_use]
pub fn to_fuse(errno: Errno) -> fuse3::Errno {
    fuse3::Errno::from(errno as i32)
}

/// Wrap a standard-library call made on behalf of a filesystem operation.
pub(crate) fn sys<T>(op: &'static str, path: &Path, result: io::Result<T>) -> OpReply<T> {
    wrap_op(op, path, result).map_err(|e| op_errno(&e))
}

/// Wrap a `nix` call made on behalf of a filesystem operation.
pub(crate) fn sys_nix<T>(op: &'static str, path: &Path, result: nix::Result<T>) -> OpReply<T> {
    sys(op, path, result.map_err(io::Error::from))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_errno() {
        let err = CollectError::PathTooLong { len: 9000, max: 4096 };
        assert_eq!(collect_errno(&err), Errno::ENAMETOOLONG);
    }

    #[test]
    fn test_sys_keeps_os_error() {
        let err = sys::<()>(
            "unlink",
            Path::new("/data/x"),
            Err(io::Error::from_raw_os_error(nix::libc::EPERM)),
        )
        .unwrap_err();
        assert_eq!(err, Errno::EPERM);
    }

    #[test]
    fn test_sys_without_os_code_is_eio() {
        let err = sys::<()>("read", Path::new("/data/x"), Err(io::Error::other("short"))).unwrap_err();
        assert_eq!(err, Errno::EIO);
    }

    #[test]
    fn test_sys_nix() {
        let err = sys_nix::<()>("mknod", Path::new("/data/x"), Err(Errno::EEXIST)).unwrap_err();
        assert_eq!(err, Errno::EEXIST);
    }

    #[test]
    fn test_mount_error_display() {
        let err = MountError::Mount {
            path: PathBuf::from("/mnt/c"),
            source: io::Error::from_raw_os_error(nix::libc::EACCES),
        };
        assert!(err.to_string().starts_with("failed to mount /mnt/c"));
    }
}
