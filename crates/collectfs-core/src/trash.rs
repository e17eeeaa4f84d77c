//! Lazily created mirror of the original tree under the trash root.

use std::ffi::OsStr;
use std::fs::DirBuilder;
use std::io;
use std::os::unix::fs::DirBuilderExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::error::{CollectError, CollectResult};
use crate::path::{check_len, segments};
use crate::wrap::{wrap_err, wrap_op};

/// Mode of directories created inside the trash tree.
pub const TRASH_DIR_MODE: u32 = 0o700;

/// Builds `<root>/<trash name>/<virtual dir>` one segment at a time.
#[derive(Debug, Clone)]
pub struct TrashPathBuilder {
    config: Arc<EngineConfig>,
}

impl TrashPathBuilder {
    /// Create a builder over the given configuration.
    #[must_use]
    pub fn new(config: Arc<EngineConfig>) -> Self {
        Self { config }
    }

    /// The real trash directory mirroring `virtual_dir`, without creating it.
    ///
    /// # Errors
    ///
    /// Returns [`CollectError::PathTooLong`] if the mirrored path would reach
    /// the configured maximum.
    pub fn trash_dir_for(&self, virtual_dir: &OsStr) -> CollectResult<PathBuf> {
        let mut dir = self.config.trash_root();
        for segment in segments(virtual_dir) {
            dir.push(segment);
        }
        check_len(dir.as_os_str().len(), self.config.max_path())?;
        Ok(dir)
    }

    /// Ensure every directory between the trash root and `virtual_dir` exists.
    ///
    /// Missing segments are created with mode `0700`. A segment that another
    /// caller creates concurrently counts as success once it is confirmed to
    /// be a directory. Returns the real path of the deepest directory.
    ///
    /// # Errors
    ///
    /// - [`CollectError::PathTooLong`] before any storage access if the path is too long
    /// - [`CollectError::NotADirectory`] if a segment is occupied by a non-directory,
    ///   including a symlink; the conflicting entry is left untouched
    /// - [`CollectError::Storage`] if a metadata query or `mkdir` fails otherwise
    pub fn ensure_trash_dir(&self, virtual_dir: &OsStr) -> CollectResult<PathBuf> {
        let target = self.trash_dir_for(virtual_dir)?;
        tracing::trace!(path = %target.display(), "ensuring trash directory");

        let mut prefix = self.config.root().to_path_buf();
        prefix.push(self.config.trash_name());
        ensure_segment(&prefix)?;
        for segment in segments(virtual_dir) {
            prefix.push(segment);
            ensure_segment(&prefix)?;
        }
        Ok(target)
    }
}

fn ensure_segment(path: &Path) -> CollectResult<()> {
    match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(not_a_directory(path)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => create_segment(path),
        Err(e) => Err(wrap_err("trash (stat)", path, e).into()),
    }
}

fn create_segment(path: &Path) -> CollectResult<()> {
    match DirBuilder::new().mode(TRASH_DIR_MODE).create(path) {
        Ok(()) => {
            tracing::debug!(path = %path.display(), "created trash directory");
            Ok(())
        },
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            // Lost a creation race; accept it only if the winner made a directory.
            let meta = wrap_op("trash (stat)", path, std::fs::symlink_metadata(path))?;
            if meta.is_dir() {
                Ok(())
            } else {
                Err(not_a_directory(path))
            }
        },
        Err(e) => Err(wrap_err("trash (mkdir)", path, e).into()),
    }
}

fn not_a_directory(path: &Path) -> CollectError {
    tracing::warn!(path = %path.display(), "file exists but is not a directory");
    CollectError::NotADirectory {
        path: path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    fn builder(root: &Path) -> TrashPathBuilder {
        TrashPathBuilder::new(Arc::new(EngineConfig::new(root).unwrap()))
    }

    #[test]
    fn test_creates_missing_segments() {
        let dir = tempfile::tempdir().unwrap();
        let b = builder(dir.path());

        let made = b.ensure_trash_dir(OsStr::new("/docs/2024")).unwrap();
        let root = std::fs::canonicalize(dir.path()).unwrap();
        assert_eq!(made, root.join(".trash/docs/2024"));
        assert!(made.is_dir());

        let mode = std::fs::metadata(root.join(".trash/docs")).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, TRASH_DIR_MODE);
    }

    #[test]
    fn test_top_level_uses_trash_root() {
        let dir = tempfile::tempdir().unwrap();
        let made = builder(dir.path()).ensure_trash_dir(OsStr::new("")).unwrap();
        assert!(made.ends_with(".trash"));
        assert!(made.is_dir());
    }

    #[test]
    fn test_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let b = builder(dir.path());
        b.ensure_trash_dir(OsStr::new("/a/b")).unwrap();
        b.ensure_trash_dir(OsStr::new("/a/b")).unwrap();
        b.ensure_trash_dir(OsStr::new("/a")).unwrap();
    }

    #[test]
    fn test_file_in_the_way_is_a_conflict() {
        let dir = tempfile::tempdir().unwrap();
        let b = builder(dir.path());
        std::fs::create_dir(dir.path().join(".trash")).unwrap();
        std::fs::write(dir.path().join(".trash/docs"), b"keep me").unwrap();

        let err = b.ensure_trash_dir(OsStr::new("/docs/sub")).unwrap_err();
        assert!(matches!(err, CollectError::NotADirectory { .. }));
        assert_eq!(std::fs::read(dir.path().join(".trash/docs")).unwrap(), b"keep me");
        assert!(!dir.path().join(".trash/docs/sub").exists());
    }

    #[test]
    fn test_symlink_in_the_way_is_a_conflict() {
        let dir = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join(".trash")).unwrap();

        let err = builder(dir.path()).ensure_trash_dir(OsStr::new("/docs")).unwrap_err();
        assert!(matches!(err, CollectError::NotADirectory { .. }));
        assert!(!outside.path().join("docs").exists());
    }

    #[test]
    fn test_too_long_fails_before_touching_storage() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = EngineConfig::new(dir.path()).unwrap().with_max_path(16);
        let b = TrashPathBuilder::new(Arc::new(cfg));

        let err = b.ensure_trash_dir(OsStr::new("/some/deep/dir")).unwrap_err();
        assert!(matches!(err, CollectError::PathTooLong { .. }));
        assert!(!dir.path().join(".trash").exists());
    }
}
