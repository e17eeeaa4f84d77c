//! The `fuse3` path filesystem in front of the [`Gateway`].

use std::ffi::{OsStr, OsString};
use std::num::NonZeroU32;
use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use collectfs_core::{Archiver, Collector, EngineConfig};
use fuse3::path::prelude::*;
use fuse3::path::reply::{DirectoryEntryPlus, ReplyXAttr};
use fuse3::{Errno, SetAttr};

use crate::attr::TTL;
use crate::error::{OpReply, to_fuse};
use crate::gateway::{AttrChange, Gateway, XattrReply};

/// Largest write the kernel may send in one request.
const MAX_WRITE: NonZeroU32 = match NonZeroU32::new(128 * 1024) {
    Some(v) => v,
    None => NonZeroU32::MIN,
};

/// The mounted filesystem.
#[derive(Debug)]
pub struct CollectFs<C = Archiver> {
    gateway: Arc<Gateway<C>>,
}

impl CollectFs<Archiver> {
    /// Create a filesystem that archives with the system clock.
    #[must_use]
    pub fn new(config: Arc<EngineConfig>) -> Self {
        Self::from_gateway(Gateway::new(config))
    }
}

impl<C: Collector> CollectFs<C> {
    /// Serve an existing gateway.
    pub fn from_gateway(gateway: Gateway<C>) -> Self {
        Self {
            gateway: Arc::new(gateway),
        }
    }

    /// The handlers behind this filesystem.
    pub fn gateway(&self) -> &Gateway<C> {
        &self.gateway
    }
}

impl<C: Collector + 'static> CollectFs<C> {
    /// Run a handler on the blocking pool, off the session's async workers.
    async fn blocking<T, F>(&self, handler: F) -> Result<T, Errno>
    where
        T: Send + 'static,
        F: FnOnce(&Gateway<C>) -> OpReply<T> + Send + 'static,
    {
        let gateway = Arc::clone(&self.gateway);
        match tokio::task::spawn_blocking(move || handler(&gateway)).await {
            Ok(reply) => reply.map_err(to_fuse),
            Err(e) => {
                tracing::error!(error = %e, "handler task failed");
                Err(to_fuse(nix::errno::Errno::EIO))
            },
        }
    }
}

fn xattr_reply(reply: XattrReply) -> ReplyXAttr {
    match reply {
        XattrReply::Size(len) => ReplyXAttr::Size(len),
        XattrReply::Data(data) => ReplyXAttr::Data(Bytes::from(data)),
    }
}

fn owned(s: &OsStr) -> OsString {
    s.to_os_string()
}

fn path_arg(path: Option<&OsStr>) -> std::borrow::Cow<'_, str> {
    path.map_or("-".into(), |p| Path::new(p).to_string_lossy())
}

impl<C: Collector + 'static> PathFilesystem for CollectFs<C> {
    async fn init(&self, _req: Request) -> Result<ReplyInit, Errno> {
        // fuse3 negotiates atomic O_TRUNC delivery with the kernel during the handshake.
        let enabled = self.gateway.negotiate_open_truncate(true);
        tracing::info!(
            root = %self.gateway.config().root().display(),
            trash = self.gateway.config().trash_name(),
            collect_open_truncate = enabled,
            "filesystem initialized"
        );
        Ok(ReplyInit {
            max_write: MAX_WRITE,
        })
    }

    async fn destroy(&self, _req: Request) {
        tracing::info!(open_handles = self.gateway.handles().len(), "filesystem destroyed");
    }

    async fn lookup(&self, _req: Request, parent: &OsStr, name: &OsStr) -> Result<ReplyEntry, Errno> {
        tracing::trace!(parent = %Path::new(parent).display(), name = %Path::new(name).display(), "lookup");
        let (parent, name) = (owned(parent), owned(name));
        let attr = self.blocking(move |gw| gw.lookup(&parent, &name)).await?;
        Ok(ReplyEntry { ttl: TTL, attr })
    }

    async fn getattr(
        &self,
        _req: Request,
        path: Option<&OsStr>,
        fh: Option<u64>,
        _flags: u32,
    ) -> Result<ReplyAttr, Errno> {
        tracing::trace!(path = %path_arg(path), ?fh, "getattr");
        let path = path.map(owned);
        let attr = self
            .blocking(move |gw| gw.getattr(path.as_deref(), fh))
            .await?;
        Ok(ReplyAttr { ttl: TTL, attr })
    }

    async fn setattr(
        &self,
        _req: Request,
        path: Option<&OsStr>,
        fh: Option<u64>,
        set_attr: SetAttr,
    ) -> Result<ReplyAttr, Errno> {
        tracing::trace!(path = %path_arg(path), ?fh, "setattr");
        let path = path.map(owned);
        let change = AttrChange::from(&set_attr);
        let attr = self
            .blocking(move |gw| gw.setattr(path.as_deref(), fh, &change))
            .await?;
        Ok(ReplyAttr { ttl: TTL, attr })
    }

    async fn readlink(&self, _req: Request, path: &OsStr) -> Result<ReplyData, Errno> {
        tracing::trace!(path = %Path::new(path).display(), "readlink");
        let path = owned(path);
        let target = self.blocking(move |gw| gw.readlink(&path)).await?;
        Ok(Bytes::from(target).into())
    }

    async fn symlink(
        &self,
        _req: Request,
        parent: &OsStr,
        name: &OsStr,
        link_path: &OsStr,
    ) -> Result<ReplyEntry, Errno> {
        tracing::trace!(parent = %Path::new(parent).display(), name = %Path::new(name).display(), "symlink");
        let (parent, name, target) = (owned(parent), owned(name), owned(link_path));
        let attr = self
            .blocking(move |gw| gw.symlink(&parent, &name, &target))
            .await?;
        Ok(ReplyEntry { ttl: TTL, attr })
    }

    async fn mknod(
        &self,
        _req: Request,
        parent: &OsStr,
        name: &OsStr,
        mode: u32,
        rdev: u32,
    ) -> Result<ReplyEntry, Errno> {
        tracing::trace!(parent = %Path::new(parent).display(), name = %Path::new(name).display(), mode = format_args!("{mode:o}"), "mknod");
        let (parent, name) = (owned(parent), owned(name));
        let attr = self
            .blocking(move |gw| gw.mknod(&parent, &name, mode, rdev))
            .await?;
        Ok(ReplyEntry { ttl: TTL, attr })
    }

    async fn mkdir(
        &self,
        _req: Request,
        parent: &OsStr,
        name: &OsStr,
        mode: u32,
        _umask: u32,
    ) -> Result<ReplyEntry, Errno> {
        tracing::trace!(parent = %Path::new(parent).display(), name = %Path::new(name).display(), "mkdir");
        let (parent, name) = (owned(parent), owned(name));
        let attr = self
            .blocking(move |gw| gw.mkdir(&parent, &name, mode))
            .await?;
        Ok(ReplyEntry { ttl: TTL, attr })
    }

    async fn unlink(&self, _req: Request, parent: &OsStr, name: &OsStr) -> Result<(), Errno> {
        tracing::trace!(parent = %Path::new(parent).display(), name = %Path::new(name).display(), "unlink");
        let (parent, name) = (owned(parent), owned(name));
        self.blocking(move |gw| gw.unlink(&parent, &name)).await
    }

    async fn rmdir(&self, _req: Request, parent: &OsStr, name: &OsStr) -> Result<(), Errno> {
        tracing::trace!(parent = %Path::new(parent).display(), name = %Path::new(name).display(), "rmdir");
        let (parent, name) = (owned(parent), owned(name));
        self.blocking(move |gw| gw.rmdir(&parent, &name)).await
    }

    async fn rename(
        &self,
        _req: Request,
        origin_parent: &OsStr,
        origin_name: &OsStr,
        parent: &OsStr,
        name: &OsStr,
    ) -> Result<(), Errno> {
        tracing::trace!(
            from = %Path::new(origin_parent).join(origin_name).display(),
            to = %Path::new(parent).join(name).display(),
            "rename"
        );
        let (from_parent, from_name) = (owned(origin_parent), owned(origin_name));
        let (to_parent, to_name) = (owned(parent), owned(name));
        self.blocking(move |gw| gw.rename(&from_parent, &from_name, &to_parent, &to_name))
            .await
    }

    async fn link(
        &self,
        _req: Request,
        path: &OsStr,
        new_parent: &OsStr,
        new_name: &OsStr,
    ) -> Result<ReplyEntry, Errno> {
        tracing::trace!(path = %Path::new(path).display(), to = %Path::new(new_parent).join(new_name).display(), "link");
        let (path, new_parent, new_name) = (owned(path), owned(new_parent), owned(new_name));
        let attr = self
            .blocking(move |gw| gw.link(&path, &new_parent, &new_name))
            .await?;
        Ok(ReplyEntry { ttl: TTL, attr })
    }

    async fn open(&self, _req: Request, path: &OsStr, flags: u32) -> Result<ReplyOpen, Errno> {
        tracing::trace!(path = %Path::new(path).display(), flags = format_args!("{flags:#o}"), "open");
        let path = owned(path);
        let fh = self.blocking(move |gw| gw.open(&path, flags)).await?;
        Ok(ReplyOpen { fh, flags: 0 })
    }

    async fn read(
        &self,
        _req: Request,
        _path: Option<&OsStr>,
        fh: u64,
        offset: u64,
        size: u32,
    ) -> Result<ReplyData, Errno> {
        let data = self.blocking(move |gw| gw.read(fh, offset, size)).await?;
        Ok(Bytes::from(data).into())
    }

    async fn write(
        &self,
        _req: Request,
        _path: Option<&OsStr>,
        fh: u64,
        offset: u64,
        data: &[u8],
        _write_flags: u32,
        _flags: u32,
    ) -> Result<ReplyWrite, Errno> {
        let data = data.to_vec();
        let written = self
            .blocking(move |gw| gw.write(fh, offset, &data))
            .await?;
        Ok(ReplyWrite { written })
    }

    async fn release(
        &self,
        _req: Request,
        _path: Option<&OsStr>,
        fh: u64,
        _flags: u32,
        _lock_owner: u64,
        _flush: bool,
    ) -> Result<(), Errno> {
        self.blocking(move |gw| gw.release(fh)).await
    }

    async fn fsync(
        &self,
        _req: Request,
        _path: Option<&OsStr>,
        fh: u64,
        datasync: bool,
    ) -> Result<(), Errno> {
        self.blocking(move |gw| gw.fsync(fh, datasync)).await
    }

    async fn setxattr(
        &self,
        _req: Request,
        path: &OsStr,
        name: &OsStr,
        value: &[u8],
        flags: u32,
        position: u32,
    ) -> Result<(), Errno> {
        if position != 0 {
            return Err(Errno::from(nix::libc::EINVAL));
        }
        let (path, name, value) = (owned(path), owned(name), value.to_vec());
        self.blocking(move |gw| gw.setxattr(&path, &name, &value, flags))
            .await
    }

    async fn getxattr(
        &self,
        _req: Request,
        path: &OsStr,
        name: &OsStr,
        size: u32,
    ) -> Result<ReplyXAttr, Errno> {
        let (path, name) = (owned(path), owned(name));
        self.blocking(move |gw| gw.getxattr(&path, &name, size))
            .await
            .map(xattr_reply)
    }

    async fn listxattr(&self, _req: Request, path: &OsStr, size: u32) -> Result<ReplyXAttr, Errno> {
        let path = owned(path);
        self.blocking(move |gw| gw.listxattr(&path, size))
            .await
            .map(xattr_reply)
    }

    async fn removexattr(&self, _req: Request, path: &OsStr, name: &OsStr) -> Result<(), Errno> {
        let (path, name) = (owned(path), owned(name));
        self.blocking(move |gw| gw.removexattr(&path, &name)).await
    }

    async fn flush(
        &self,
        _req: Request,
        _path: Option<&OsStr>,
        fh: u64,
        _lock_owner: u64,
    ) -> Result<(), Errno> {
        self.blocking(move |gw| gw.flush(fh)).await
    }

    async fn access(&self, _req: Request, path: &OsStr, mask: u32) -> Result<(), Errno> {
        let path = owned(path);
        self.blocking(move |gw| gw.access(&path, mask)).await
    }

    async fn create(
        &self,
        _req: Request,
        parent: &OsStr,
        name: &OsStr,
        mode: u32,
        flags: u32,
    ) -> Result<ReplyCreated, Errno> {
        tracing::trace!(parent = %Path::new(parent).display(), name = %Path::new(name).display(), "create");
        let (parent, name) = (owned(parent), owned(name));
        let (fh, attr) = self
            .blocking(move |gw| gw.create(&parent, &name, mode, flags))
            .await?;
        Ok(ReplyCreated {
            ttl: TTL,
            attr,
            generation: 0,
            fh,
            flags: 0,
        })
    }

    async fn opendir(&self, _req: Request, path: &OsStr, flags: u32) -> Result<ReplyOpen, Errno> {
        tracing::trace!(path = %Path::new(path).display(), "opendir");
        let path = owned(path);
        let fh = self.blocking(move |gw| gw.opendir(&path)).await?;
        Ok(ReplyOpen { fh, flags })
    }

    type DirEntryStream<'a>
        = futures_util::stream::Iter<std::vec::IntoIter<fuse3::Result<DirectoryEntry>>>
    where
        Self: 'a;
    type DirEntryPlusStream<'a>
        = futures_util::stream::Iter<std::vec::IntoIter<fuse3::Result<DirectoryEntryPlus>>>
    where
        Self: 'a;

    async fn readdir<'a>(
        &'a self,
        _req: Request,
        _path: &'a OsStr,
        fh: u64,
        offset: i64,
    ) -> Result<ReplyDirectory<Self::DirEntryStream<'a>>, Errno> {
        let entries: Vec<fuse3::Result<DirectoryEntry>> = self
            .blocking(move |gw| gw.readdir(fh, offset))
            .await?
            .into_iter()
            .map(Ok)
            .collect();
        Ok(ReplyDirectory {
            entries: futures_util::stream::iter(entries),
        })
    }

    async fn releasedir(
        &self,
        _req: Request,
        _path: &OsStr,
        fh: u64,
        _flags: u32,
    ) -> Result<(), Errno> {
        self.blocking(move |gw| gw.releasedir(fh)).await
    }

    async fn fsyncdir(
        &self,
        _req: Request,
        _path: &OsStr,
        fh: u64,
        datasync: bool,
    ) -> Result<(), Errno> {
        self.blocking(move |gw| gw.fsyncdir(fh, datasync)).await
    }

    async fn statfs(&self, _req: Request, path: &OsStr) -> Result<ReplyStatFs, Errno> {
        let path = owned(path);
        self.blocking(move |gw| gw.statfs(&path)).await
    }
}
