//! Operation handlers over the backing store.
//!
//! Every handler resolves its virtual paths first, so an over-long path is
//! answered with `ENAMETOOLONG` before any storage access. Clobbering handlers
//! consult the [`ClobberGuard`] and act on its [`Disposition`]; everything
//! else passes straight through to the backing store.
//!
//! Handlers are synchronous; [`CollectFs`](crate::CollectFs) runs them on
//! the blocking thread pool.

use std::ffi::{OsStr, OsString};
use std::fs::{self, File, FileTimes, OpenOptions, Permissions};
use std::io;
use std::os::unix::ffi::{OsStrExt, OsStringExt};
use std::os::unix::fs::{DirBuilderExt, FileExt, OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use collectfs_core::path::join_virtual;
use collectfs_core::{
    Archiver, ClobberGuard, ClobberOp, Collector, Disposition, EngineConfig, PathResolver, wrap_err,
};
use fuse3::path::reply::{DirectoryEntry, FileAttr, ReplyStatFs};
use fuse3::{FileType, SetAttr, Timestamp};
use nix::errno::Errno;
use nix::libc;
use nix::sys::stat::{Mode, SFlag, UtimensatFlags, mknod, utimensat};
use nix::sys::time::TimeSpec;
use nix::unistd::{AccessFlags, access, mkfifo};

use crate::attr::{file_attr, file_type};
use crate::error::{OpReply, collect_errno, op_errno, sys, sys_nix};
use crate::handles::{DirHandle, DirSnapshotEntry, FileHandle, HandleTable};

/// Attribute changes requested by `setattr`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttrChange {
    /// New permission bits.
    pub mode: Option<u32>,
    /// New owner.
    pub uid: Option<u32>,
    /// New group.
    pub gid: Option<u32>,
    /// New length.
    pub size: Option<u64>,
    /// New access time as seconds and nanoseconds since the epoch.
    pub atime: Option<(i64, u32)>,
    /// New modification time as seconds and nanoseconds since the epoch.
    pub mtime: Option<(i64, u32)>,
}

impl From<&SetAttr> for AttrChange {
    fn from(set: &SetAttr) -> Self {
        let time = |t: Timestamp| (t.sec, t.nsec);
        Self {
            mode: set.mode,
            uid: set.uid,
            gid: set.gid,
            size: set.size,
            atime: set.atime.map(time),
            mtime: set.mtime.map(time),
        }
    }
}

/// Answer to an extended-attribute query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XattrReply {
    /// The caller asked for the size only.
    Size(u32),
    /// The attribute value or NUL-separated name list.
    Data(Vec<u8>),
}

/// Passthrough handlers with collection in front of every clobbering call.
#[derive(Debug)]
pub struct Gateway<C = Archiver> {
    config: Arc<EngineConfig>,
    resolver: PathResolver,
    guard: ClobberGuard<C>,
    handles: HandleTable,
    open_truncate: OnceLock<bool>,
}

impl Gateway<Archiver> {
    /// Create a gateway that archives with the system clock.
    #[must_use]
    pub fn new(config: Arc<EngineConfig>) -> Self {
        let archiver = Archiver::new(Arc::clone(&config));
        Self::with_collector(config, archiver)
    }
}

impl<C: Collector> Gateway<C> {
    /// Create a gateway over an explicit collector.
    pub fn with_collector(config: Arc<EngineConfig>, collector: C) -> Self {
        Self {
            resolver: PathResolver::new(Arc::clone(&config)),
            config,
            guard: ClobberGuard::new(collector),
            handles: HandleTable::new(),
            open_truncate: OnceLock::new(),
        }
    }

    /// The configuration this gateway serves.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The open-handle table.
    pub fn handles(&self) -> &HandleTable {
        &self.handles
    }

    /// Record whether truncating opens are collected.
    ///
    /// Only the first call has an effect; later calls return the recorded
    /// value. Collection is active only if the host delivers `O_TRUNC` with
    /// the open request and the configuration asks for it.
    pub fn negotiate_open_truncate(&self, host_delivers_trunc: bool) -> bool {
        *self
            .open_truncate
            .get_or_init(|| host_delivers_trunc && self.config.collect_open_truncate())
    }

    /// Whether truncating opens are collected. False until negotiated.
    pub fn collects_open_truncate(&self) -> bool {
        self.open_truncate.get().copied().unwrap_or(false)
    }

    fn real(&self, path: &OsStr) -> OpReply<PathBuf> {
        self.resolver.resolve(path).map_err(|e| collect_errno(&e))
    }

    fn child(&self, parent: &OsStr, name: &OsStr) -> OpReply<(OsString, PathBuf)> {
        let path = join_virtual(parent, name);
        let real = self.real(&path)?;
        Ok((path, real))
    }

    fn guard(&self, op: ClobberOp, path: &OsStr) -> OpReply<Disposition> {
        self.guard.before(op, path).map_err(|e| collect_errno(&e))
    }

    fn open_file(&self, fh: u64) -> OpReply<Arc<FileHandle>> {
        self.handles.file(fh).ok_or(Errno::EBADF)
    }

    fn open_dir(&self, fh: u64) -> OpReply<Arc<DirHandle>> {
        self.handles.dir(fh).ok_or(Errno::EBADF)
    }

    fn stat_real(op: &'static str, real: &Path) -> OpReply<FileAttr> {
        sys(op, real, fs::symlink_metadata(real)).map(|meta| file_attr(&meta))
    }

    /// Attributes of the entry at `path`, without following a final symlink.
    pub fn stat(&self, path: &OsStr) -> OpReply<FileAttr> {
        Self::stat_real("getattr", &self.real(path)?)
    }

    /// Look up `name` in `parent`.
    pub fn lookup(&self, parent: &OsStr, name: &OsStr) -> OpReply<FileAttr> {
        let (_, real) = self.child(parent, name)?;
        Self::stat_real("lookup", &real)
    }

    /// Attributes by open handle when one is given, else by path.
    pub fn getattr(&self, path: Option<&OsStr>, fh: Option<u64>) -> OpReply<FileAttr> {
        if let Some(open) = fh.and_then(|fh| self.handles.file(fh)) {
            return sys("getattr", &open.path, open.file.metadata()).map(|meta| file_attr(&meta));
        }
        self.stat(path.ok_or(Errno::ENOENT)?)
    }

    /// Apply attribute changes by path, or by open handle when the file has
    /// no path any more.
    pub fn setattr(
        &self,
        path: Option<&OsStr>,
        fh: Option<u64>,
        change: &AttrChange,
    ) -> OpReply<FileAttr> {
        if let Some(path) = path {
            let real = self.real(path)?;
            set_by_path(&real, change)?;
            return Self::stat_real("setattr", &real);
        }
        let open = self.open_file(fh.ok_or(Errno::EBADF)?)?;
        set_by_handle(&open, change)?;
        sys("setattr", &open.path, open.file.metadata()).map(|meta| file_attr(&meta))
    }

    /// Target of the symlink at `path`.
    pub fn readlink(&self, path: &OsStr) -> OpReply<Vec<u8>> {
        let real = self.real(path)?;
        sys("readlink", &real, fs::read_link(&real)).map(|t| t.into_os_string().into_vec())
    }

    /// Create a regular file, FIFO or device node.
    pub fn mknod(&self, parent: &OsStr, name: &OsStr, mode: u32, rdev: u32) -> OpReply<FileAttr> {
        let (_, real) = self.child(parent, name)?;
        let kind = mode & libc::S_IFMT;
        let perm = mode & 0o7777;
        if kind == 0 || kind == libc::S_IFREG {
            let created = OpenOptions::new()
                .write(true)
                .create_new(true)
                .mode(perm)
                .open(&real);
            sys("mknod", &real, created)?;
        } else if kind == libc::S_IFIFO {
            sys_nix("mknod", &real, mkfifo(&real, Mode::from_bits_truncate(perm)))?;
        } else {
            let made = mknod(
                &real,
                SFlag::from_bits_truncate(kind),
                Mode::from_bits_truncate(perm),
                libc::dev_t::from(rdev),
            );
            sys_nix("mknod", &real, made)?;
        }
        Self::stat_real("mknod", &real)
    }

    /// Create a directory.
    pub fn mkdir(&self, parent: &OsStr, name: &OsStr, mode: u32) -> OpReply<FileAttr> {
        let (_, real) = self.child(parent, name)?;
        let made = fs::DirBuilder::new().mode(mode & 0o7777).create(&real);
        sys("mkdir", &real, made)?;
        Self::stat_real("mkdir", &real)
    }

    /// Remove a name, collecting a regular file instead of deleting it.
    pub fn unlink(&self, parent: &OsStr, name: &OsStr) -> OpReply<()> {
        let (path, real) = self.child(parent, name)?;
        let disposition = self.guard(ClobberOp::Unlink, &path)?;
        if disposition == Disposition::Satisfied {
            return Ok(());
        }
        let removed = sys("unlink", &real, fs::remove_file(&real));
        self.settle(ClobberOp::Unlink, &disposition, &real, removed)
    }

    /// Remove an empty directory.
    pub fn rmdir(&self, parent: &OsStr, name: &OsStr) -> OpReply<()> {
        let (_, real) = self.child(parent, name)?;
        sys("rmdir", &real, fs::remove_dir(&real))
    }

    /// Rename, collecting a regular file that occupies the destination.
    ///
    /// Nothing is collected when the source is missing, when source and
    /// destination are the same path, or when the source is a directory
    /// (which cannot replace a file). If the rename fails after collection the
    /// destination is put back.
    pub fn rename(
        &self,
        parent: &OsStr,
        name: &OsStr,
        new_parent: &OsStr,
        new_name: &OsStr,
    ) -> OpReply<()> {
        let (from_path, from) = self.child(parent, name)?;
        let (to_path, to) = self.child(new_parent, new_name)?;

        let source = sys("rename", &from, fs::symlink_metadata(&from))?;
        let disposition = if from_path != to_path && !source.is_dir() {
            self.guard(ClobberOp::Rename, &to_path)?
        } else {
            Disposition::Proceed
        };
        let renamed = sys("rename", &from, fs::rename(&from, &to));
        self.settle(ClobberOp::Rename, &disposition, &to, renamed)
    }

    /// Create a hard link, collecting a regular file at the new name.
    ///
    /// Directories cannot be hard linked; that is refused before anything is
    /// collected.
    pub fn link(&self, path: &OsStr, new_parent: &OsStr, new_name: &OsStr) -> OpReply<FileAttr> {
        let source = self.real(path)?;
        let (to_path, to) = self.child(new_parent, new_name)?;

        let meta = sys("link", &source, fs::symlink_metadata(&source))?;
        if path == to_path.as_os_str() {
            return Err(Errno::EEXIST);
        }
        if meta.is_dir() {
            return Err(Errno::EPERM);
        }
        let disposition = self.guard(ClobberOp::Link, &to_path)?;
        let linked = sys("link", &to, fs::hard_link(&source, &to));
        self.settle(ClobberOp::Link, &disposition, &to, linked)?;
        Self::stat_real("link", &to)
    }

    /// Create a symlink pointing at `target`, collecting a regular file at the
    /// link path.
    pub fn symlink(&self, parent: &OsStr, name: &OsStr, target: &OsStr) -> OpReply<FileAttr> {
        let (path, real) = self.child(parent, name)?;
        let disposition = self.guard(ClobberOp::Symlink, &path)?;
        let made = sys("symlink", &real, std::os::unix::fs::symlink(target, &real));
        self.settle(ClobberOp::Symlink, &disposition, &real, made)?;
        Self::stat_real("symlink", &real)
    }

    /// Open an existing file.
    ///
    /// When truncating opens are collected and `flags` carries `O_TRUNC`, a
    /// regular file at `path` is collected first and an empty file with the
    /// same permissions takes its place. A caller without the access the open
    /// asks for is refused before collection; if the open still fails, the
    /// placeholder is removed and the original put back.
    pub fn open(&self, path: &OsStr, flags: u32) -> OpReply<u64> {
        let real = self.real(path)?;
        let flags = open_flags(flags);

        let disposition = if flags & libc::O_TRUNC != 0 && self.collects_open_truncate() {
            check_open_access(&real, flags)?;
            self.guard(ClobberOp::OpenTruncate, path)?
        } else {
            Disposition::Proceed
        };

        let opened = open_collected(&disposition, &real, &open_options(flags));
        let file = self.settle(ClobberOp::OpenTruncate, &disposition, &real, opened)?;
        Ok(self.handles.insert_file(real, file))
    }

    /// Create and open a file.
    ///
    /// A regular file already present at the name is collected first when
    /// `flags` carries `O_TRUNC` and truncating opens are collected.
    pub fn create(
        &self,
        parent: &OsStr,
        name: &OsStr,
        mode: u32,
        flags: u32,
    ) -> OpReply<(u64, FileAttr)> {
        let (path, real) = self.child(parent, name)?;
        let flags = open_flags(flags);

        let disposition = if flags & libc::O_TRUNC != 0 && self.config.collect_open_truncate() {
            self.guard(ClobberOp::OpenTruncate, &path)?
        } else {
            Disposition::Proceed
        };

        let mut options = open_options(flags | libc::O_CREAT);
        options.mode(mode & 0o7777);
        let created = sys("create", &real, options.open(&real));
        let file = self.settle(ClobberOp::OpenTruncate, &disposition, &real, created)?;
        let attr = sys("create", &real, file.metadata()).map(|meta| file_attr(&meta))?;
        Ok((self.handles.insert_file(real, file), attr))
    }

    /// Pass `result` through, putting a collected file back if it failed.
    fn settle<T>(
        &self,
        op: ClobberOp,
        disposition: &Disposition,
        real: &Path,
        result: OpReply<T>,
    ) -> OpReply<T> {
        if result.is_err() {
            self.guard.rollback(op, disposition, real);
        }
        result
    }

    /// Read up to `size` bytes at `offset`. Short only at end of file.
    pub fn read(&self, fh: u64, offset: u64, size: u32) -> OpReply<Vec<u8>> {
        let open = self.open_file(fh)?;
        let mut buf = vec![0u8; usize::try_from(size).map_err(|_| Errno::EINVAL)?];
        let mut filled = 0usize;
        while filled < buf.len() {
            let at = offset.saturating_add(u64::try_from(filled).map_err(|_| Errno::EINVAL)?);
            match open.file.read_at(&mut buf[filled..], at) {
                Ok(0) => break,
                Ok(n) => filled = filled.saturating_add(n),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {},
                Err(e) => return Err(op_errno(&wrap_err("read", &open.path, e))),
            }
        }
        buf.truncate(filled);
        Ok(buf)
    }

    /// Write all of `data` at `offset`.
    pub fn write(&self, fh: u64, offset: u64, data: &[u8]) -> OpReply<u32> {
        let open = self.open_file(fh)?;
        sys("write", &open.path, open.file.write_all_at(data, offset))?;
        u32::try_from(data.len()).map_err(|_| Errno::EFBIG)
    }

    /// Flush by closing a duplicate of the descriptor.
    pub fn flush(&self, fh: u64) -> OpReply<()> {
        let open = self.open_file(fh)?;
        sys("flush", &open.path, open.file.try_clone()).map(drop)
    }

    /// Forget an open file.
    pub fn release(&self, fh: u64) -> OpReply<()> {
        self.handles.remove(fh);
        Ok(())
    }

    /// Synchronize file data, and metadata unless `datasync`.
    pub fn fsync(&self, fh: u64, datasync: bool) -> OpReply<()> {
        let open = self.open_file(fh)?;
        if datasync {
            sys("fsync", &open.path, open.file.sync_data())
        } else {
            sys("fsync", &open.path, open.file.sync_all())
        }
    }

    /// Open a directory and capture its listing.
    pub fn opendir(&self, path: &OsStr) -> OpReply<u64> {
        let real = self.real(path)?;
        let mut entries = Vec::new();
        for entry in sys("opendir", &real, fs::read_dir(&real))? {
            let entry = sys("readdir", &real, entry)?;
            let kind = sys("readdir", &entry.path(), entry.file_type())?;
            entries.push(DirSnapshotEntry {
                name: entry.file_name(),
                kind: file_type(kind),
            });
        }
        Ok(self.handles.insert_dir(DirHandle {
            path: real,
            entries,
        }))
    }

    /// Entries of an open directory after `offset`, starting with `.` and `..`.
    ///
    /// Each entry's offset is the offset to resume after it.
    pub fn readdir(&self, fh: u64, offset: i64) -> OpReply<Vec<DirectoryEntry>> {
        let dir = self.open_dir(fh)?;
        let dots = [".", ".."]
            .into_iter()
            .map(|name| (OsString::from(name), FileType::Directory));
        let listed = dir.entries.iter().map(|e| (e.name.clone(), e.kind));

        let skip = usize::try_from(offset).unwrap_or(0);
        Ok(dots
            .chain(listed)
            .enumerate()
            .skip(skip)
            .map(|(idx, (name, kind))| DirectoryEntry {
                kind,
                name,
                offset: i64::try_from(idx).unwrap_or(i64::MAX).saturating_add(1),
            })
            .collect())
    }

    /// Forget an open directory.
    pub fn releasedir(&self, fh: u64) -> OpReply<()> {
        self.handles.remove(fh);
        Ok(())
    }

    /// Synchronize an open directory.
    pub fn fsyncdir(&self, fh: u64, datasync: bool) -> OpReply<()> {
        let dir = self.open_dir(fh)?;
        let file = sys("fsyncdir", &dir.path, File::open(&dir.path))?;
        if datasync {
            sys("fsyncdir", &dir.path, file.sync_data())
        } else {
            sys("fsyncdir", &dir.path, file.sync_all())
        }
    }

    /// Statistics of the filesystem holding `path`.
    pub fn statfs(&self, path: &OsStr) -> OpReply<ReplyStatFs> {
        let real = self.real(path)?;
        let stats = sys_nix("statfs", &real, nix::sys::statvfs::statvfs(&real))?;
        Ok(ReplyStatFs {
            blocks: stats.blocks(),
            bfree: stats.blocks_free(),
            bavail: stats.blocks_available(),
            files: stats.files(),
            ffree: stats.files_free(),
            bsize: u32::try_from(stats.block_size()).unwrap_or(u32::MAX),
            namelen: u32::try_from(stats.name_max()).unwrap_or(u32::MAX),
            frsize: u32::try_from(stats.fragment_size()).unwrap_or(u32::MAX),
        })
    }

    /// Check access permissions for `path`.
    pub fn access(&self, path: &OsStr, mask: u32) -> OpReply<()> {
        let real = self.real(path)?;
        let mask = i32::try_from(mask).map_err(|_| Errno::EINVAL)?;
        sys_nix("access", &real, access(&real, AccessFlags::from_bits_truncate(mask)))
    }

    /// Set an extended attribute, honouring `XATTR_CREATE` and `XATTR_REPLACE`.
    pub fn setxattr(&self, path: &OsStr, name: &OsStr, value: &[u8], flags: u32) -> OpReply<()> {
        let real = self.real(path)?;
        let flags = i32::try_from(flags).map_err(|_| Errno::EINVAL)?;
        if flags & (libc::XATTR_CREATE | libc::XATTR_REPLACE) != 0 {
            let present = sys("setxattr", &real, xattr::get(&real, name))?.is_some();
            if present && flags & libc::XATTR_CREATE != 0 {
                return Err(Errno::EEXIST);
            }
            if !present && flags & libc::XATTR_REPLACE != 0 {
                return Err(Errno::ENODATA);
            }
        }
        sys("setxattr", &real, xattr::set(&real, name, value))
    }

    /// Read an extended attribute.
    pub fn getxattr(&self, path: &OsStr, name: &OsStr, size: u32) -> OpReply<XattrReply> {
        let real = self.real(path)?;
        let value = sys("getxattr", &real, xattr::get(&real, name))?.ok_or(Errno::ENODATA)?;
        sized_reply(value, size)
    }

    /// List extended attribute names, NUL-separated.
    pub fn listxattr(&self, path: &OsStr, size: u32) -> OpReply<XattrReply> {
        let real = self.real(path)?;
        let mut names = Vec::new();
        for name in sys("listxattr", &real, xattr::list(&real))? {
            names.extend_from_slice(name.as_bytes());
            names.push(0);
        }
        sized_reply(names, size)
    }

    /// Remove an extended attribute.
    pub fn removexattr(&self, path: &OsStr, name: &OsStr) -> OpReply<()> {
        let real = self.real(path)?;
        sys("removexattr", &real, xattr::remove(&real, name))
    }
}

/// Size-query protocol shared by `getxattr` and `listxattr`.
fn sized_reply(data: Vec<u8>, size: u32) -> OpReply<XattrReply> {
    let len = u32::try_from(data.len()).map_err(|_| Errno::E2BIG)?;
    if size == 0 {
        Ok(XattrReply::Size(len))
    } else if len > size {
        Err(Errno::ERANGE)
    } else {
        Ok(XattrReply::Data(data))
    }
}

#[allow(clippy::cast_possible_wrap)]
fn open_flags(flags: u32) -> i32 {
    flags as i32
}

fn open_options(flags: i32) -> OpenOptions {
    let mut options = OpenOptions::new();
    match flags & libc::O_ACCMODE {
        libc::O_WRONLY => {
            options.write(true);
        },
        libc::O_RDWR => {
            options.read(true).write(true);
        },
        _ => {
            options.read(true);
        },
    }
    options.custom_flags(flags & !libc::O_ACCMODE);
    options
}

/// Refuse a truncating open the caller could not perform anyway.
fn check_open_access(real: &Path, flags: i32) -> OpReply<()> {
    let mut wanted = AccessFlags::W_OK;
    if flags & libc::O_ACCMODE != libc::O_WRONLY {
        wanted |= AccessFlags::R_OK;
    }
    match access(real, wanted) {
        Ok(()) | Err(Errno::ENOENT) => Ok(()),
        Err(errno) => {
            tracing::debug!(path = %real.display(), %errno, "truncating open refused before collection");
            Err(errno)
        },
    }
}

/// Open `real`, first recreating it empty if the guard asked for that.
fn open_collected(disposition: &Disposition, real: &Path, options: &OpenOptions) -> OpReply<File> {
    let Disposition::Recreate { mode, .. } = disposition else {
        return sys("open", real, options.open(real));
    };
    recreate_empty(real, *mode)?;
    sys("open", real, options.open(real)).inspect_err(|_| {
        // The placeholder must go before the original can be put back.
        if let Err(e) = fs::remove_file(real) {
            tracing::warn!(path = %real.display(), error = %e, "cannot remove placeholder");
        }
    })
}

/// Put an empty regular file with `mode` at a path that was just emptied.
fn recreate_empty(real: &Path, mode: u32) -> OpReply<()> {
    let file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(mode)
        .open(real);
    let file = sys("open (recreate)", real, file)?;
    sys(
        "open (recreate)",
        real,
        file.set_permissions(Permissions::from_mode(mode)),
    )
}

pub(crate) fn system_time((sec, nsec): (i64, u32)) -> SystemTime {
    let offset = Duration::new(sec.unsigned_abs(), nsec);
    if sec >= 0 {
        UNIX_EPOCH.checked_add(offset).unwrap_or(UNIX_EPOCH)
    } else {
        UNIX_EPOCH.checked_sub(offset).unwrap_or(UNIX_EPOCH)
    }
}

fn timespec(time: Option<(i64, u32)>) -> TimeSpec {
    time.map_or(TimeSpec::UTIME_OMIT, |(sec, nsec)| {
        TimeSpec::new(sec, i64::from(nsec))
    })
}

fn set_by_path(real: &Path, change: &AttrChange) -> OpReply<()> {
    if let Some(mode) = change.mode {
        let perms = Permissions::from_mode(mode & 0o7777);
        sys("chmod", real, fs::set_permissions(real, perms))?;
    }
    if change.uid.is_some() || change.gid.is_some() {
        sys(
            "chown",
            real,
            std::os::unix::fs::lchown(real, change.uid, change.gid),
        )?;
    }
    if let Some(size) = change.size {
        let len = i64::try_from(size).map_err(|_| Errno::EFBIG)?;
        sys_nix("truncate", real, nix::unistd::truncate(real, len))?;
    }
    if change.atime.is_some() || change.mtime.is_some() {
        let set = utimensat(
            None,
            real,
            &timespec(change.atime),
            &timespec(change.mtime),
            UtimensatFlags::NoFollowSymlink,
        );
        sys_nix("utimens", real, set)?;
    }
    Ok(())
}

fn set_by_handle(open: &FileHandle, change: &AttrChange) -> OpReply<()> {
    let path = &open.path;
    if let Some(mode) = change.mode {
        let perms = Permissions::from_mode(mode & 0o7777);
        sys("chmod", path, open.file.set_permissions(perms))?;
    }
    if change.uid.is_some() || change.gid.is_some() {
        sys(
            "chown",
            path,
            std::os::unix::fs::fchown(&open.file, change.uid, change.gid),
        )?;
    }
    if let Some(size) = change.size {
        sys("truncate", path, open.file.set_len(size))?;
    }
    if change.atime.is_some() || change.mtime.is_some() {
        let mut times = FileTimes::new();
        if let Some(atime) = change.atime {
            times = times.set_accessed(system_time(atime));
        }
        if let Some(mtime) = change.mtime {
            times = times.set_modified(system_time(mtime));
        }
        sys("utimens", path, open.file.set_times(times))?;
    }
    Ok(())
}
