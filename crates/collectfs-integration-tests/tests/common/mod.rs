//! Shared fixture for integration tests.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDate;
use collectfs_core::{Archiver, EngineConfig, FixedClock};
use collectfs_fuse::Gateway;
use tempfile::TempDir;

/// The instant every fixture clock is frozen at.
#[allow(dead_code)]
pub const STAMP: &str = "2024-01-01.10:00:00";

/// A clock reading 2024-01-01 10:00:00.
#[allow(dead_code)]
pub fn fixed_clock() -> FixedClock {
    let time = NaiveDate::from_ymd_opt(2024, 1, 1)
        .and_then(|d| d.and_hms_opt(10, 0, 0))
        .unwrap();
    FixedClock(time)
}

/// A temporary backing store and the configuration rooted at it.
///
/// The tempdir is removed when the fixture is dropped.
#[allow(dead_code)]
pub struct Fixture {
    /// Shared engine configuration.
    pub config: Arc<EngineConfig>,
    _dir: TempDir,
}

#[allow(dead_code)]
impl Fixture {
    /// A fixture with the default trash name and path limit.
    pub fn new() -> Self {
        Self::with(|config| config)
    }

    /// A fixture whose configuration is adjusted by `tweak`.
    pub fn with(tweak: impl FnOnce(EngineConfig) -> EngineConfig) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = EngineConfig::new(dir.path()).unwrap();
        Self {
            config: Arc::new(tweak(config)),
            _dir: dir,
        }
    }

    /// Real path of a virtual path.
    pub fn real(&self, virtual_path: &str) -> PathBuf {
        self.config.root().join(virtual_path.trim_start_matches('/'))
    }

    /// Real path of a virtual path inside the trash tree.
    pub fn trash(&self, virtual_path: &str) -> PathBuf {
        self.config
            .trash_root()
            .join(virtual_path.trim_start_matches('/'))
    }

    /// Create a regular file, and its parents, at a virtual path.
    pub fn write(&self, virtual_path: &str, contents: &str) -> PathBuf {
        let real = self.real(virtual_path);
        if let Some(parent) = real.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&real, contents).unwrap();
        real
    }

    /// Sorted entry names of a trash directory, empty if it does not exist.
    pub fn trash_listing(&self, virtual_dir: &str) -> Vec<String> {
        let Ok(entries) = fs::read_dir(self.trash(virtual_dir)) else {
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    /// An archiver frozen at [`STAMP`].
    pub fn archiver(&self) -> Archiver<FixedClock> {
        Archiver::with_clock(Arc::clone(&self.config), fixed_clock())
    }

    /// A gateway archiving at [`STAMP`].
    pub fn gateway(&self) -> Gateway<Archiver<FixedClock>> {
        Gateway::with_collector(Arc::clone(&self.config), self.archiver())
    }
}
