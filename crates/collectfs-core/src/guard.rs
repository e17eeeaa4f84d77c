//! What a clobbering operation does after its target has been collected.
//!
//! The guard is independent of any filesystem binding: the gateway asks it
//! for a [`Disposition`] before every clobbering call and acts on the answer.

use std::ffi::OsStr;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::collect::{CollectOutcome, Collector};
use crate::error::CollectResult;
use crate::names::restore;

/// Operations that can destroy the content of an existing file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClobberOp {
    /// Removing a name.
    Unlink,
    /// Renaming onto an existing destination.
    Rename,
    /// Creating a hard link onto an existing destination.
    Link,
    /// Creating a symbolic link onto an existing destination.
    Symlink,
    /// Opening with `O_TRUNC`.
    OpenTruncate,
}

impl ClobberOp {
    /// Short lowercase name used in log records.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unlink => "unlink",
            Self::Rename => "rename",
            Self::Link => "link",
            Self::Symlink => "symlink",
            Self::OpenTruncate => "open (truncate)",
        }
    }
}

impl fmt::Display for ClobberOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the gateway continues after the guard ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// The operation is already complete; answer success without touching storage.
    Satisfied,
    /// Nothing was saved; perform the real operation unchanged.
    Proceed,
    /// The target was saved; perform the real operation, and put the file
    /// back if it fails.
    Saved {
        /// Real path of the archived copy.
        archived: PathBuf,
    },
    /// Create an empty regular file with `mode` at the target, then perform
    /// the real operation.
    Recreate {
        /// Permission bits of the collected file.
        mode: u32,
        /// Real path of the archived copy.
        archived: PathBuf,
    },
}

impl Disposition {
    /// Where the collected file went, if one was collected and the real
    /// operation still has to run.
    #[must_use]
    pub fn archived(&self) -> Option<&Path> {
        match self {
            Self::Saved { archived } | Self::Recreate { archived, .. } => Some(archived),
            Self::Satisfied | Self::Proceed => None,
        }
    }
}

/// Collects a target before a clobbering call and decides what happens next.
#[derive(Debug, Clone)]
pub struct ClobberGuard<C> {
    collector: C,
}

impl<C: Collector> ClobberGuard<C> {
    /// Create a guard over a collector.
    pub fn new(collector: C) -> Self {
        Self { collector }
    }

    /// The collector consulted by this guard.
    pub fn collector(&self) -> &C {
        &self.collector
    }

    /// Collect `virtual_path` ahead of `op`.
    ///
    /// # Errors
    ///
    /// Propagates the collection failure. The caller must not perform the
    /// real operation and should answer with the error's errno.
    pub fn before(&self, op: ClobberOp, virtual_path: &OsStr) -> CollectResult<Disposition> {
        let outcome = self.collector.collect(virtual_path).inspect_err(|e| {
            tracing::warn!(
                op = op.as_str(),
                path = %Path::new(virtual_path).display(),
                error = %e,
                "aborting clobbering operation"
            );
        })?;

        let disposition = match (op, outcome) {
            (ClobberOp::Unlink, CollectOutcome::Collected { .. }) => Disposition::Satisfied,
            (ClobberOp::OpenTruncate, CollectOutcome::Collected { mode, archived }) => {
                Disposition::Recreate {
                    mode: mode & 0o7777,
                    archived,
                }
            },
            (_, CollectOutcome::Collected { archived, .. }) => Disposition::Saved { archived },
            (_, CollectOutcome::NotCollectable { .. } | CollectOutcome::DoesNotExist) => {
                Disposition::Proceed
            },
        };
        tracing::trace!(op = op.as_str(), ?disposition, "guard");
        Ok(disposition)
    }

    /// Undo a collection after the real operation failed.
    ///
    /// The archived file is renamed back to `real` unless something else now
    /// occupies it, in which case it stays in the trash. Anything at `real`
    /// that the caller created as part of the operation must be removed first.
    pub fn rollback(&self, op: ClobberOp, disposition: &Disposition, real: &Path) {
        let Some(archived) = disposition.archived() else {
            return;
        };
        match restore(archived, real) {
            Ok(()) => tracing::info!(
                op = op.as_str(),
                path = %real.display(),
                from = %archived.display(),
                "restored after failed operation"
            ),
            Err(e) => tracing::error!(
                op = op.as_str(),
                path = %real.display(),
                archived = %archived.display(),
                error = %e,
                "cannot restore collected file, it stays in the trash"
            ),
        }
    }
}
