//! Moving about-to-be-clobbered files into the trash.

use std::ffi::OsStr;
use std::io;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::clock::{Clock, SystemClock, format_timestamp};
use crate::config::EngineConfig;
use crate::error::{CollectError, CollectResult};
use crate::names::NameAllocator;
use crate::path::{PathResolver, split_virtual};
use crate::trash::TrashPathBuilder;
use crate::wrap::wrap_err;

/// What a collection attempt did with the entry at a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectOutcome {
    /// A regular file was moved into the trash.
    Collected {
        /// Mode bits of the file before it was moved.
        mode: u32,
        /// Real path of the archived copy.
        archived: PathBuf,
    },
    /// The entry exists but is not a regular file and was left alone.
    NotCollectable {
        /// Mode bits of the entry.
        mode: u32,
    },
    /// Nothing exists at the path.
    DoesNotExist,
}

impl CollectOutcome {
    /// Whether a file was moved into the trash.
    #[must_use]
    pub fn is_collected(&self) -> bool {
        matches!(self, Self::Collected { .. })
    }
}

/// Something that can save the entry at a virtual path before it is clobbered.
pub trait Collector: Send + Sync {
    /// Save the regular file at `virtual_path`, if there is one.
    ///
    /// # Errors
    ///
    /// Returns a [`CollectError`] when the file should have been saved but
    /// could not be. The caller must then abort the clobbering operation.
    fn collect(&self, virtual_path: &OsStr) -> CollectResult<CollectOutcome>;
}

/// The archival engine.
///
/// Regular files are renamed to
/// `<root>/<trash>/<dir>/<name>.<YYYY-MM-DD.HH:MM:SS>[-NNNN]`. Each call makes a
/// single attempt; no step is retried.
#[derive(Debug, Clone)]
pub struct Archiver<C = SystemClock> {
    resolver: PathResolver,
    trash: TrashPathBuilder,
    names: NameAllocator,
    clock: C,
}

impl Archiver<SystemClock> {
    /// Create an archiver using the system clock.
    #[must_use]
    pub fn new(config: Arc<EngineConfig>) -> Self {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> Archiver<C> {
    /// Create an archiver with an explicit time source.
    #[must_use]
    pub fn with_clock(config: Arc<EngineConfig>, clock: C) -> Self {
        let names = NameAllocator::new(&config);
        Self {
            resolver: PathResolver::new(Arc::clone(&config)),
            trash: TrashPathBuilder::new(config),
            names,
            clock,
        }
    }

    /// Replace the name allocator (e.g. to change the attempt bound).
    #[must_use]
    pub fn with_names(mut self, names: NameAllocator) -> Self {
        self.names = names;
        self
    }

    /// The resolver used to compose real paths.
    #[must_use]
    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    fn archive(&self, real: &Path, virtual_path: &OsStr) -> CollectResult<PathBuf> {
        let timestamp = format_timestamp(&self.clock.now()?);
        let (virtual_dir, name) = split_virtual(virtual_path);
        if name.is_empty() {
            return Err(CollectError::Config(format!(
                "cannot collect a path without a file name: {}",
                Path::new(virtual_path).display()
            )));
        }
        let dir = self.trash.ensure_trash_dir(virtual_dir)?;
        self.names.move_into(real, &dir, name, &timestamp)
    }
}

impl<C: Clock> Collector for Archiver<C> {
    fn collect(&self, virtual_path: &OsStr) -> CollectResult<CollectOutcome> {
        tracing::trace!(path = %Path::new(virtual_path).display(), "collect");
        let real = self.resolver.resolve(virtual_path).inspect_err(|e| {
            tracing::error!(path = %Path::new(virtual_path).display(), error = %e, "full path name too long to collect");
        })?;

        let meta = match std::fs::symlink_metadata(&real) {
            Ok(meta) => meta,
            Err(e) if is_absent(&e) => {
                tracing::trace!(path = %real.display(), "no file to collect");
                return Ok(CollectOutcome::DoesNotExist);
            },
            Err(e) => return Err(wrap_err("collect (stat)", &real, e).into()),
        };

        let mode = meta.mode();
        if !meta.file_type().is_file() {
            tracing::trace!(path = %real.display(), mode = format_args!("{mode:o}"), "not collectable");
            return Ok(CollectOutcome::NotCollectable { mode });
        }

        match self.archive(&real, virtual_path) {
            Ok(archived) => {
                tracing::info!(
                    path = %real.display(),
                    dest = %archived.display(),
                    "collected"
                );
                Ok(CollectOutcome::Collected { mode, archived })
            },
            Err(e) => {
                tracing::error!(path = %real.display(), error = %e, "collect failed");
                Err(e)
            },
        }
    }
}

impl<T: Collector + ?Sized> Collector for Arc<T> {
    fn collect(&self, virtual_path: &OsStr) -> CollectResult<CollectOutcome> {
        (**self).collect(virtual_path)
    }
}

/// Errors that mean "there is no entry here".
fn is_absent(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::NotFound
        || e.raw_os_error() == Some(nix::errno::Errno::ENOTDIR as i32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use chrono::NaiveDate;
    use std::fs;

    fn at(h: u32, m: u32, s: u32) -> FixedClock {
        FixedClock(
            NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_opt(h, m, s)
                .unwrap(),
        )
    }

    fn setup() -> (tempfile::TempDir, PathBuf, Archiver<FixedClock>) {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Arc::new(EngineConfig::new(dir.path()).unwrap());
        let root = cfg.root().to_path_buf();
        (dir, root, Archiver::with_clock(cfg, at(10, 0, 0)))
    }

    #[test]
    fn test_collects_regular_file() {
        let (_dir, root, archiver) = setup();
        fs::create_dir(root.join("docs")).unwrap();
        fs::write(root.join("docs/report.txt"), b"quarterly").unwrap();

        let outcome = archiver.collect(OsStr::new("/docs/report.txt")).unwrap();
        let CollectOutcome::Collected { archived, mode } = outcome else {
            panic!("expected Collected, got {outcome:?}");
        };
        assert_eq!(archived, root.join(".trash/docs/report.txt.2024-01-01.10:00:00"));
        assert_eq!(mode & 0o170_000, 0o100_000);
        assert_eq!(fs::read(&archived).unwrap(), b"quarterly");
        assert!(!root.join("docs/report.txt").exists());
    }

    #[test]
    fn test_top_level_file_lands_in_trash_root() {
        let (_dir, root, archiver) = setup();
        fs::write(root.join("a.txt"), b"x").unwrap();

        let outcome = archiver.collect(OsStr::new("/a.txt")).unwrap();
        assert_eq!(
            outcome,
            CollectOutcome::Collected {
                mode: fs::symlink_metadata(root.join(".trash/a.txt.2024-01-01.10:00:00"))
                    .unwrap()
                    .mode(),
                archived: root.join(".trash/a.txt.2024-01-01.10:00:00"),
            }
        );
    }

    #[test]
    fn test_missing_path_does_not_exist() {
        let (_dir, root, archiver) = setup();
        assert_eq!(
            archiver.collect(OsStr::new("/nope")).unwrap(),
            CollectOutcome::DoesNotExist
        );
        assert_eq!(
            archiver.collect(OsStr::new("/nodir/nope")).unwrap(),
            CollectOutcome::DoesNotExist
        );
        assert!(!root.join(".trash").exists());
    }

    #[test]
    fn test_directory_and_symlink_not_collectable() {
        let (_dir, root, archiver) = setup();
        fs::create_dir(root.join("d")).unwrap();
        fs::write(root.join("target"), b"t").unwrap();
        std::os::unix::fs::symlink(root.join("target"), root.join("link")).unwrap();

        assert!(matches!(
            archiver.collect(OsStr::new("/d")).unwrap(),
            CollectOutcome::NotCollectable { .. }
        ));
        assert!(matches!(
            archiver.collect(OsStr::new("/link")).unwrap(),
            CollectOutcome::NotCollectable { .. }
        ));
        assert!(root.join("d").is_dir());
        assert!(fs::symlink_metadata(root.join("link")).unwrap().file_type().is_symlink());
        assert!(!root.join(".trash").exists());
    }

    #[test]
    fn test_same_second_gets_disambiguator() {
        let (_dir, root, archiver) = setup();
        fs::write(root.join("f"), b"one").unwrap();
        archiver.collect(OsStr::new("/f")).unwrap();
        fs::write(root.join("f"), b"two").unwrap();
        let outcome = archiver.collect(OsStr::new("/f")).unwrap();

        let CollectOutcome::Collected { archived, .. } = outcome else {
            panic!("expected Collected");
        };
        assert_eq!(archived, root.join(".trash/f.2024-01-01.10:00:00-0001"));
        assert_eq!(fs::read(root.join(".trash/f.2024-01-01.10:00:00")).unwrap(), b"one");
        assert_eq!(fs::read(&archived).unwrap(), b"two");
    }

    #[test]
    fn test_conflict_in_trash_tree_is_error_and_file_stays() {
        let (_dir, root, archiver) = setup();
        fs::create_dir(root.join("docs")).unwrap();
        fs::write(root.join("docs/r"), b"keep").unwrap();
        fs::create_dir(root.join(".trash")).unwrap();
        fs::write(root.join(".trash/docs"), b"blocker").unwrap();

        let err = archiver.collect(OsStr::new("/docs/r")).unwrap_err();
        assert!(matches!(err, CollectError::NotADirectory { .. }));
        assert_eq!(fs::read(root.join("docs/r")).unwrap(), b"keep");
    }

    #[test]
    fn test_path_too_long_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = EngineConfig::new(dir.path()).unwrap();
        let max = cfg.root().as_os_str().len().saturating_add(4);
        let archiver = Archiver::with_clock(Arc::new(cfg.with_max_path(max)), at(0, 0, 0));

        let err = archiver.collect(OsStr::new("/much-too-long")).unwrap_err();
        assert!(matches!(err, CollectError::PathTooLong { .. }));
    }
}
