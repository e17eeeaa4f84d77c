//! Bounded composition of virtual paths into backing-store paths.
//!
//! Virtual paths are the slash-separated, root-relative paths handed to the
//! filesystem by the host (`/docs/report.txt`). A real path is the canonical
//! root with the virtual path appended byte for byte. Composition never
//! touches the filesystem: the length check happens before any syscall.

use std::ffi::{OsStr, OsString};
use std::os::unix::ffi::{OsStrExt, OsStringExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::error::{CollectError, CollectResult};

/// Check that a path of `len` bytes fits below `max`.
///
/// # Errors
///
/// Returns [`CollectError::PathTooLong`] when `len >= max`.
pub fn check_len(len: usize, max: usize) -> CollectResult<()> {
    if len >= max {
        return Err(CollectError::PathTooLong { len, max });
    }
    Ok(())
}

/// Append `suffix` to `base` without inserting a separator.
///
/// # Errors
///
/// Returns [`CollectError::PathTooLong`] if the result would not stay below `max`.
pub fn concat_bounded(base: &Path, suffix: &OsStr, max: usize) -> CollectResult<PathBuf> {
    let base = base.as_os_str().as_bytes();
    let suffix = suffix.as_bytes();
    check_len(base.len().saturating_add(suffix.len()), max)?;

    let mut bytes = Vec::with_capacity(base.len().saturating_add(suffix.len()));
    bytes.extend_from_slice(base);
    bytes.extend_from_slice(suffix);
    Ok(PathBuf::from(OsString::from_vec(bytes)))
}

/// Join a virtual directory and an entry name into a virtual path.
#[must_use]
pub fn join_virtual(parent: &OsStr, name: &OsStr) -> OsString {
    let parent = parent.as_bytes();
    let mut bytes = Vec::with_capacity(parent.len().saturating_add(name.len()).saturating_add(1));
    bytes.extend_from_slice(parent);
    if !parent.ends_with(b"/") {
        bytes.push(b'/');
    }
    bytes.extend_from_slice(name.as_bytes());
    OsString::from_vec(bytes)
}

/// Split a virtual path into its directory part and final segment.
///
/// `/docs/report.txt` splits into `/docs` and `report.txt`; a top-level entry
/// `/report.txt` has an empty directory part.
#[must_use]
pub fn split_virtual(virtual_path: &OsStr) -> (&OsStr, &OsStr) {
    let bytes = virtual_path.as_bytes();
    match bytes.iter().rposition(|b| *b == b'/') {
        Some(idx) => (
            OsStr::from_bytes(&bytes[..idx]),
            OsStr::from_bytes(&bytes[idx.saturating_add(1)..]),
        ),
        None => (OsStr::new(""), virtual_path),
    }
}

/// Iterate over the non-empty segments of a virtual directory path.
///
/// Empty segments (repeated or leading slashes) and `.` are skipped.
pub fn segments(virtual_dir: &OsStr) -> impl Iterator<Item = &OsStr> {
    virtual_dir
        .as_bytes()
        .split(|b| *b == b'/')
        .filter(|s| !s.is_empty() && *s != b".")
        .map(OsStr::from_bytes)
}

/// Resolves virtual paths against the configured root.
#[derive(Debug, Clone)]
pub struct PathResolver {
    config: Arc<EngineConfig>,
}

impl PathResolver {
    /// Create a resolver over the given configuration.
    #[must_use]
    pub fn new(config: Arc<EngineConfig>) -> Self {
        Self { config }
    }

    /// The configuration this resolver composes against.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Compose the real path for a virtual path.
    ///
    /// # Errors
    ///
    /// Returns [`CollectError::PathTooLong`] if `root + virtual_path` would reach
    /// the configured maximum. No storage access happens in either case.
    pub fn resolve(&self, virtual_path: &OsStr) -> CollectResult<PathBuf> {
        let real = concat_bounded(self.config.root(), virtual_path, self.config.max_path())?;
        tracing::trace!(
            root = %self.config.root().display(),
            path = %Path::new(virtual_path).display(),
            real = %real.display(),
            "resolved path"
        );
        Ok(real)
    }

    /// Compose the real path for `name` inside the virtual directory `parent`.
    ///
    /// # Errors
    ///
    /// Returns [`CollectError::PathTooLong`] as for [`resolve`](Self::resolve).
    pub fn resolve_child(&self, parent: &OsStr, name: &OsStr) -> CollectResult<PathBuf> {
        self.resolve(&join_virtual(parent, name))
    }
}
