//! Collision-free archive names.
//!
//! Candidate 0 is `<name>.<timestamp>`; candidate `k > 0` appends a four-digit
//! disambiguator, `<name>.<timestamp>-0001`, `-0002` and so on. The search is
//! bounded by [`MAX_CANDIDATES`].

use std::ffi::{OsStr, OsString};
use std::io;
use std::path::{Path, PathBuf};

use nix::errno::Errno;

use crate::config::EngineConfig;
use crate::error::{CollectError, CollectResult};
use crate::path::concat_bounded;
use crate::wrap::{wrap_err, wrap_op};

/// Number of candidate names tried before giving up.
pub const MAX_CANDIDATES: usize = 10_000;

/// Build candidate `k` for `base` archived at `timestamp`.
#[must_use]
pub fn candidate_name(base: &OsStr, timestamp: &str, k: usize) -> OsString {
    let mut name = base.to_os_string();
    name.push(".");
    name.push(timestamp);
    if k > 0 {
        name.push(format!("-{k:04}"));
    }
    name
}

/// Picks archive names that do not exist yet in a trash directory.
#[derive(Debug, Clone, Copy)]
pub struct NameAllocator {
    max_path: usize,
    max_candidates: usize,
    exclusive: bool,
}

impl NameAllocator {
    /// Create an allocator honouring the configured path limit.
    #[must_use]
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            max_path: config.max_path(),
            max_candidates: MAX_CANDIDATES,
            exclusive: true,
        }
    }

    /// Override the number of candidates tried.
    #[must_use]
    pub fn with_max_candidates(mut self, max_candidates: usize) -> Self {
        self.max_candidates = max_candidates;
        self
    }

    /// Choose whether [`move_into`](Self::move_into) starts with exclusive
    /// renames. When off, each name is checked for absence before a plain rename.
    #[must_use]
    pub fn with_exclusive(mut self, exclusive: bool) -> Self {
        self.exclusive = exclusive;
        self
    }

    fn candidate_path(
        &self,
        dir: &Path,
        base: &OsStr,
        timestamp: &str,
        k: usize,
    ) -> CollectResult<PathBuf> {
        let mut suffix = OsString::from("/");
        suffix.push(candidate_name(base, timestamp, k));
        concat_bounded(dir, &suffix, self.max_path)
    }

    /// Find the first candidate with no entry in `dir`.
    ///
    /// This is a lookup only: nothing is reserved, so a concurrent caller may
    /// claim the same name before it is used. [`move_into`](Self::move_into)
    /// does not have that gap.
    ///
    /// # Errors
    ///
    /// - [`CollectError::PathTooLong`] if a candidate would exceed the limit
    /// - [`CollectError::Storage`] if the lookup fails for a reason other than absence
    /// - [`CollectError::NameAllocationExhausted`] if every candidate exists
    pub fn allocate(&self, dir: &Path, base: &OsStr, timestamp: &str) -> CollectResult<PathBuf> {
        for k in 0..self.max_candidates {
            let dest = self.candidate_path(dir, base, timestamp, k)?;
            if !exists(&dest)? {
                return Ok(dest);
            }
        }
        Err(CollectError::NameAllocationExhausted {
            attempts: self.max_candidates,
        })
    }

    /// Move `source` into `dir` under the first free candidate name.
    ///
    /// Each candidate is claimed with an exclusive rename that fails instead
    /// of replacing an existing entry, so two callers archiving the same name
    /// in the same second end up under distinct names. Filesystems that
    /// reject the exclusive flag fall back to check-then-rename.
    ///
    /// # Errors
    ///
    /// As for [`allocate`](Self::allocate), plus [`CollectError::Storage`] if the
    /// rename itself fails.
    pub fn move_into(
        &self,
        source: &Path,
        dir: &Path,
        base: &OsStr,
        timestamp: &str,
    ) -> CollectResult<PathBuf> {
        let mut exclusive = self.exclusive;
        for k in 0..self.max_candidates {
            let dest = self.candidate_path(dir, base, timestamp, k)?;

            if exclusive {
                match rename_noreplace(source, &dest) {
                    Ok(()) => return Ok(dest),
                    Err(Errno::EEXIST) => continue,
                    Err(Errno::EINVAL | Errno::ENOSYS) => {
                        tracing::debug!(
                            dir = %dir.display(),
                            "exclusive rename unsupported, probing names instead"
                        );
                        exclusive = false;
                    },
                    Err(errno) => {
                        return Err(wrap_err("collect (rename)", source, io::Error::from(errno)).into());
                    },
                }
            }

            if exists(&dest)? {
                continue;
            }
            wrap_op("collect (rename)", source, std::fs::rename(source, &dest))?;
            return Ok(dest);
        }
        Err(CollectError::NameAllocationExhausted {
            attempts: self.max_candidates,
        })
    }
}

/// Move an archived file back to `original`, never replacing an entry there.
///
/// # Errors
///
/// Returns [`CollectError::Storage`] if something now occupies `original`
/// (`EEXIST`) or the rename fails. The archived file then stays in the trash.
pub fn restore(archived: &Path, original: &Path) -> CollectResult<()> {
    match rename_noreplace(archived, original) {
        Ok(()) => Ok(()),
        Err(Errno::EINVAL | Errno::ENOSYS) => {
            if exists(original)? {
                return Err(wrap_err("restore", original, io::Error::from(Errno::EEXIST)).into());
            }
            wrap_op("restore", archived, std::fs::rename(archived, original))?;
            Ok(())
        },
        Err(errno) => Err(wrap_err("restore", archived, io::Error::from(errno)).into()),
    }
}

fn exists(path: &Path) -> CollectResult<bool> {
    match std::fs::symlink_metadata(path) {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(wrap_err("collect (lookup)", path, e).into()),
    }
}

#[cfg(all(target_os = "linux", target_env = "gnu"))]
fn rename_noreplace(source: &Path, dest: &Path) -> Result<(), Errno> {
    use nix::fcntl::{RenameFlags, renameat2};
    renameat2(None, source, None, dest, RenameFlags::RENAME_NOREPLACE)
}

#[cfg(not(all(target_os = "linux", target_env = "gnu")))]
fn rename_noreplace(_source: &Path, _dest: &Path) -> Result<(), Errno> {
    Err(Errno::ENOSYS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const TS: &str = "2024-01-01.10:00:00";

    fn allocator() -> NameAllocator {
        NameAllocator::new(&EngineConfig::with_root_unchecked("/unused"))
    }

    #[test]
    fn test_candidate_names() {
        let base = OsStr::new("report.txt");
        assert_eq!(candidate_name(base, TS, 0), "report.txt.2024-01-01.10:00:00");
        assert_eq!(candidate_name(base, TS, 1), "report.txt.2024-01-01.10:00:00-0001");
        assert_eq!(candidate_name(base, TS, 42), "report.txt.2024-01-01.10:00:00-0042");
        assert_eq!(candidate_name(base, TS, 9999), "report.txt.2024-01-01.10:00:00-9999");
    }

    #[test]
    fn test_allocate_skips_existing() {
        let dir = tempfile::tempdir().unwrap();
        let base = OsStr::new("a");

        let first = allocator().allocate(dir.path(), base, TS).unwrap();
        assert_eq!(first, dir.path().join("a.2024-01-01.10:00:00"));

        fs::write(&first, b"1").unwrap();
        fs::write(dir.path().join("a.2024-01-01.10:00:00-0001"), b"2").unwrap();
        let third = allocator().allocate(dir.path(), base, TS).unwrap();
        assert_eq!(third, dir.path().join("a.2024-01-01.10:00:00-0002"));
    }

    #[test]
    fn test_allocate_counts_dangling_symlink_as_taken() {
        let dir = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink("/nonexistent", dir.path().join("a.2024-01-01.10:00:00"))
            .unwrap();
        let dest = allocator().allocate(dir.path(), OsStr::new("a"), TS).unwrap();
        assert_eq!(dest, dir.path().join("a.2024-01-01.10:00:00-0001"));
    }

    #[test]
    fn test_allocate_exhaustion_is_bounded() {
        let dir = tempfile::tempdir().unwrap();
        for k in 0..3 {
            fs::write(dir.path().join(candidate_name(OsStr::new("a"), TS, k)), b"").unwrap();
        }
        let err = allocator()
            .with_max_candidates(3)
            .allocate(dir.path(), OsStr::new("a"), TS)
            .unwrap_err();
        assert!(matches!(err, CollectError::NameAllocationExhausted { attempts: 3 }));
    }

    #[test]
    fn test_move_into_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let trash = dir.path().join("trash");
        fs::create_dir(&trash).unwrap();
        let taken = trash.join("a.2024-01-01.10:00:00");
        fs::write(&taken, b"older").unwrap();

        let source = dir.path().join("a");
        fs::write(&source, b"newer").unwrap();

        let dest = allocator()
            .move_into(&source, &trash, OsStr::new("a"), TS)
            .unwrap();
        assert_eq!(dest, trash.join("a.2024-01-01.10:00:00-0001"));
        assert_eq!(fs::read(&taken).unwrap(), b"older");
        assert_eq!(fs::read(&dest).unwrap(), b"newer");
        assert!(!source.exists());
    }

    #[test]
    fn test_check_then_rename_fallback_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let trash = dir.path().join("trash");
        fs::create_dir(&trash).unwrap();
        for k in 0..2 {
            fs::write(trash.join(candidate_name(OsStr::new("a"), TS, k)), format!("old {k}")).unwrap();
        }
        let source = dir.path().join("a");
        fs::write(&source, b"newest").unwrap();

        let dest = allocator()
            .with_exclusive(false)
            .move_into(&source, &trash, OsStr::new("a"), TS)
            .unwrap();
        assert_eq!(dest, trash.join("a.2024-01-01.10:00:00-0002"));
        assert_eq!(fs::read(&dest).unwrap(), b"newest");
        for k in 0..2 {
            let kept = fs::read_to_string(trash.join(candidate_name(OsStr::new("a"), TS, k))).unwrap();
            assert_eq!(kept, format!("old {k}"));
        }
        assert!(!source.exists());
    }

    #[test]
    fn test_move_into_exhaustion_keeps_source() {
        for exclusive in [true, false] {
            let dir = tempfile::tempdir().unwrap();
            let trash = dir.path().join("trash");
            fs::create_dir(&trash).unwrap();
            for k in 0..3 {
                fs::write(trash.join(candidate_name(OsStr::new("a"), TS, k)), b"taken").unwrap();
            }
            let source = dir.path().join("a");
            fs::write(&source, b"keep").unwrap();

            let err = allocator()
                .with_max_candidates(3)
                .with_exclusive(exclusive)
                .move_into(&source, &trash, OsStr::new("a"), TS)
                .unwrap_err();
            assert!(
                matches!(err, CollectError::NameAllocationExhausted { attempts: 3 }),
                "exclusive={exclusive}: {err}"
            );
            assert_eq!(err.errno(), Errno::EEXIST as i32);
            assert_eq!(fs::read(&source).unwrap(), b"keep");
            assert_eq!(fs::read_dir(&trash).unwrap().count(), 3);
        }
    }

    #[test]
    fn test_restore_puts_file_back() {
        let dir = tempfile::tempdir().unwrap();
        let archived = dir.path().join("a.2024-01-01.10:00:00");
        let original = dir.path().join("a");
        fs::write(&archived, b"saved").unwrap();

        restore(&archived, &original).unwrap();
        assert_eq!(fs::read(&original).unwrap(), b"saved");
        assert!(!archived.exists());
    }

    #[test]
    fn test_restore_never_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let archived = dir.path().join("a.2024-01-01.10:00:00");
        let original = dir.path().join("a");
        fs::write(&archived, b"saved").unwrap();
        fs::write(&original, b"newcomer").unwrap();

        let err = restore(&archived, &original).unwrap_err();
        assert_eq!(err.errno(), Errno::EEXIST as i32);
        assert_eq!(fs::read(&original).unwrap(), b"newcomer");
        assert_eq!(fs::read(&archived).unwrap(), b"saved");
    }

    #[test]
    fn test_move_into_rejects_long_candidates() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("a");
        fs::write(&source, b"x").unwrap();

        let limit = dir.path().as_os_str().len().saturating_add(8);
        let alloc = NameAllocator::new(
            &EngineConfig::with_root_unchecked("/unused").with_max_path(limit),
        );
        let err = alloc
            .move_into(&source, dir.path(), OsStr::new("a"), TS)
            .unwrap_err();
        assert!(matches!(err, CollectError::PathTooLong { .. }));
        assert!(source.exists());
    }

    #[test]
    fn test_move_into_missing_source_is_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = allocator()
            .move_into(&dir.path().join("gone"), dir.path(), OsStr::new("gone"), TS)
            .unwrap_err();
        assert!(matches!(err, CollectError::Storage(_)));
        assert_eq!(err.errno(), Errno::ENOENT as i32);
    }
}
