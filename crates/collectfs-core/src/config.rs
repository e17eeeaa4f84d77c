//! Engine configuration.
//!
//! The configuration is built once at startup and never changes afterwards.
//! Components receive it as an `Arc<EngineConfig>` at construction time.

use std::path::{Path, PathBuf};

use crate::error::{CollectError, CollectResult};

/// Default trash folder name at the filesystem root.
pub const DEFAULT_TRASH_NAME: &str = ".trash";

/// Default maximum real path length in bytes (platform `PATH_MAX`).
#[allow(clippy::cast_sign_loss)]
pub const DEFAULT_MAX_PATH: usize = nix::libc::PATH_MAX as usize;

/// Immutable configuration shared by every component of the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    root: PathBuf,
    trash_name: String,
    max_path: usize,
    collect_open_truncate: bool,
}

impl EngineConfig {
    /// Create a configuration for an existing root directory.
    ///
    /// The root is canonicalized so that every composed path is absolute and
    /// free of symlinks above the backing store.
    ///
    /// # Errors
    ///
    /// Returns [`CollectError::Config`] if the root cannot be canonicalized or
    /// is not a directory.
    pub fn new(root: impl AsRef<Path>) -> CollectResult<Self> {
        let root = root.as_ref();
        let canonical = std::fs::canonicalize(root).map_err(|e| {
            CollectError::Config(format!("root path {}: {e}", root.display()))
        })?;
        if !canonical.is_dir() {
            return Err(CollectError::Config(format!(
                "root path must be a directory: {}",
                canonical.display()
            )));
        }
        Ok(Self::with_root_unchecked(canonical))
    }

    /// Create a configuration without touching the filesystem.
    ///
    /// The caller guarantees `root` is an absolute, canonical directory path.
    #[must_use]
    pub fn with_root_unchecked(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            trash_name: DEFAULT_TRASH_NAME.to_string(),
            max_path: DEFAULT_MAX_PATH,
            collect_open_truncate: true,
        }
    }

    /// Override the trash folder name.
    ///
    /// # Errors
    ///
    /// Returns [`CollectError::Config`] if the name is not a single path segment.
    pub fn with_trash_name(mut self, name: impl Into<String>) -> CollectResult<Self> {
        let name = name.into();
        validate_trash_name(&name)?;
        self.trash_name = name;
        Ok(self)
    }

    /// Override the maximum real path length.
    #[must_use]
    pub fn with_max_path(mut self, max_path: usize) -> Self {
        self.max_path = max_path;
        self
    }

    /// Enable or disable collection of files truncated during open.
    #[must_use]
    pub fn with_collect_open_truncate(mut self, enabled: bool) -> Self {
        self.collect_open_truncate = enabled;
        self
    }

    /// Canonical root of the backing store.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Name of the trash folder directly below the root.
    #[must_use]
    pub fn trash_name(&self) -> &str {
        &self.trash_name
    }

    /// Real paths must stay strictly shorter than this many bytes.
    #[must_use]
    pub fn max_path(&self) -> usize {
        self.max_path
    }

    /// Whether files truncated by an open request should be collected.
    #[must_use]
    pub fn collect_open_truncate(&self) -> bool {
        self.collect_open_truncate
    }

    /// Real path of the trash root (`<root>/<trash name>`).
    #[must_use]
    pub fn trash_root(&self) -> PathBuf {
        self.root.join(&self.trash_name)
    }
}

/// Check that a trash name is a single, ordinary path segment.
///
/// # Errors
///
/// Returns [`CollectError::Config`] for empty names, names containing `/`,
/// and the special segments `.` and `..`.
pub fn validate_trash_name(name: &str) -> CollectResult<()> {
    if name.is_empty() {
        return Err(CollectError::Config("trash name must not be empty".into()));
    }
    if name.contains('/') {
        return Err(CollectError::Config(
            "trash name must be a directory at the filesystem root - a path is not allowed".into(),
        ));
    }
    if name == "." || name == ".." {
        return Err(CollectError::Config(format!(
            "trash name must not be '{name}'"
        )));
    }
    Ok(())
}
