//! Open file and directory handles.

use std::collections::HashMap;
use std::ffi::OsString;
use std::fs::File;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use fuse3::FileType;

/// One entry captured when a directory was opened.
#[derive(Debug, Clone)]
pub struct DirSnapshotEntry {
    /// Entry name.
    pub name: OsString,
    /// Entry type.
    pub kind: FileType,
}

/// An open directory: its real path and the listing taken at `opendir`.
#[derive(Debug)]
pub struct DirHandle {
    /// Real path of the directory.
    pub path: PathBuf,
    /// Entries other than `.` and `..`, in backing-store order.
    pub entries: Vec<DirSnapshotEntry>,
}

/// An open file and the real path it was opened at.
#[derive(Debug)]
pub struct FileHandle {
    /// Real path at open time.
    pub path: PathBuf,
    /// The open backing-store file.
    pub file: File,
}

#[derive(Debug, Clone)]
enum Handle {
    File(Arc<FileHandle>),
    Dir(Arc<DirHandle>),
}

/// Maps file handles handed to the host onto open backing-store objects.
///
/// The lock is held only while the map is touched; callers get an `Arc`
/// and perform I/O after it is released.
#[derive(Debug)]
pub struct HandleTable {
    next: AtomicU64,
    entries: Mutex<HashMap<u64, Handle>>,
}

impl Default for HandleTable {
    fn default() -> Self {
        Self::new()
    }
}

impl HandleTable {
    /// Create an empty table. Handle numbers start at 1.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<u64, Handle>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn insert(&self, handle: Handle) -> u64 {
        let fh = self.next.fetch_add(1, Ordering::Relaxed);
        self.lock().insert(fh, handle);
        fh
    }

    /// Register a file opened at `path`.
    pub fn insert_file(&self, path: PathBuf, file: File) -> u64 {
        self.insert(Handle::File(Arc::new(FileHandle { path, file })))
    }

    /// Register an open directory.
    pub fn insert_dir(&self, dir: DirHandle) -> u64 {
        self.insert(Handle::Dir(Arc::new(dir)))
    }

    /// The open file behind `fh`, if it is one.
    pub fn file(&self, fh: u64) -> Option<Arc<FileHandle>> {
        match self.lock().get(&fh) {
            Some(Handle::File(file)) => Some(Arc::clone(file)),
            _ => None,
        }
    }

    /// The open directory behind `fh`, if it is one.
    pub fn dir(&self, fh: u64) -> Option<Arc<DirHandle>> {
        match self.lock().get(&fh) {
            Some(Handle::Dir(dir)) => Some(Arc::clone(dir)),
            _ => None,
        }
    }

    /// Forget `fh`. The object closes once the last in-flight user drops it.
    pub fn remove(&self, fh: u64) -> bool {
        self.lock().remove(&fh).is_some()
    }

    /// Number of open handles.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no handles are open.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
