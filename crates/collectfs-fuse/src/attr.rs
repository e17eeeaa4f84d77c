//! Conversion of backing-store metadata into FUSE attributes.

use std::fs::{self, Metadata};
use std::os::unix::fs::{FileTypeExt, MetadataExt};
use std::time::{Duration, SystemTime};

use fuse3::path::reply::FileAttr;
use fuse3::FileType;

/// How long the kernel may cache entries and attributes.
pub const TTL: Duration = Duration::from_secs(1);

/// Map a standard file type onto the FUSE one.
#[must_use]
pub fn file_type(ft: fs::FileType) -> FileType {
    if ft.is_dir() {
        FileType::Directory
    } else if ft.is_symlink() {
        FileType::Symlink
    } else if ft.is_fifo() {
        FileType::NamedPipe
    } else if ft.is_socket() {
        FileType::Socket
    } else if ft.is_block_device() {
        FileType::BlockDevice
    } else if ft.is_char_device() {
        FileType::CharDevice
    } else {
        FileType::RegularFile
    }
}

fn timestamp(sec: i64, nsec: i64) -> SystemTime {
    crate::gateway::system_time((sec, u32::try_from(nsec).unwrap_or(0)))
}

/// Attributes reported for an entry with the given metadata.
#[must_use]
pub fn file_attr(meta: &Metadata) -> FileAttr {
    FileAttr {
        size: meta.size(),
        blocks: meta.blocks(),
        atime: timestamp(meta.atime(), meta.atime_nsec()),
        mtime: timestamp(meta.mtime(), meta.mtime_nsec()),
        ctime: timestamp(meta.ctime(), meta.ctime_nsec()),
        kind: file_type(meta.file_type()),
        perm: u16::try_from(meta.mode() & 0o7777).unwrap_or(0),
        nlink: u32::try_from(meta.nlink()).unwrap_or(u32::MAX),
        uid: meta.uid(),
        gid: meta.gid(),
        rdev: u32::try_from(meta.rdev()).unwrap_or(0),
        blksize: u32::try_from(meta.blksize()).unwrap_or(4096),
    }
}
