//! Mount session lifecycle.

use std::path::Path;

use collectfs_core::Collector;
use fuse3::MountOptions;
use fuse3::path::Session;
use nix::unistd::{getgid, getuid};
use tokio::signal::unix::{SignalKind, signal};

use crate::error::{MountError, MountResult};
use crate::fs::CollectFs;

/// Name the filesystem is mounted under.
pub const FS_NAME: &str = "collectfs";

/// Mount options forwarded with `-o`, minus those the binding models itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MountFlags {
    /// `ro`
    pub read_only: bool,
    /// `allow_other`
    pub allow_other: bool,
    /// `allow_root`
    pub allow_root: bool,
    /// `default_permissions`
    pub default_permissions: bool,
    /// `nonempty`
    pub nonempty: bool,
    /// Everything else, passed to the kernel verbatim.
    pub custom: Vec<String>,
}

impl MountFlags {
    /// Parse `-o` arguments; each may hold several comma-separated options.
    pub fn parse<S: AsRef<str>>(args: &[S]) -> Self {
        let mut flags = Self::default();
        for option in args
            .iter()
            .flat_map(|arg| arg.as_ref().split(','))
            .map(str::trim)
            .filter(|o| !o.is_empty())
        {
            match option {
                "ro" => flags.read_only = true,
                "rw" => flags.read_only = false,
                "allow_other" => flags.allow_other = true,
                "allow_root" => flags.allow_root = true,
                "default_permissions" => flags.default_permissions = true,
                "nonempty" => flags.nonempty = true,
                other => flags.custom.push(other.to_string()),
            }
        }
        flags
    }

    /// Binding options for a mount owned by the calling user.
    #[must_use]
    pub fn to_options(&self) -> MountOptions {
        let mut options = MountOptions::default();
        options
            .fs_name(FS_NAME)
            .uid(getuid().as_raw())
            .gid(getgid().as_raw())
            .read_only(self.read_only)
            .allow_other(self.allow_other)
            .allow_root(self.allow_root)
            .default_permissions(self.default_permissions)
            .nonempty(self.nonempty);
        if !self.custom.is_empty() {
            options.custom_options(self.custom.join(","));
        }
        options
    }
}

/// Options the binding understands, for `--help-fuse`.
pub const MOUNT_OPTIONS_HELP: &str = "\
Mount options (-o opt[,opt...]):
    ro                     mount read-only
    rw                     mount read-write (default)
    allow_other            allow access by other users
    allow_root             allow access by root
    default_permissions    let the kernel check permissions
    nonempty               allow mounting over a non-empty directory
    <other>                passed to the kernel unchanged
";

/// Resolves when SIGINT or SIGTERM arrives, yielding the signal name.
async fn shutdown_signal() -> MountResult<&'static str> {
    let mut terminate = signal(SignalKind::terminate()).map_err(MountError::Signal)?;
    tokio::select! {
        res = tokio::signal::ctrl_c() => res.map(|()| "SIGINT").map_err(MountError::Signal),
        _ = terminate.recv() => Ok("SIGTERM"),
    }
}

/// Mount `fs` at `mount_point` and serve it until the session ends or a
/// shutdown signal arrives, then unmount.
///
/// # Errors
///
/// Returns a [`MountError`] if mounting, serving or unmounting fails.
pub async fn mount<C>(fs: CollectFs<C>, mount_point: &Path, flags: &MountFlags) -> MountResult<()>
where
    C: Collector + 'static,
{
    let mut handle = Session::new(flags.to_options())
        .mount_with_unprivileged(fs, mount_point)
        .await
        .map_err(|source| MountError::Mount {
            path: mount_point.to_path_buf(),
            source,
        })?;
    tracing::info!(mount_point = %mount_point.display(), "mounted");

    let session = &mut handle;
    tokio::select! {
        res = session => {
            res.map_err(MountError::Session)?;
            tracing::info!(mount_point = %mount_point.display(), "session ended");
        },
        sig = shutdown_signal() => {
            tracing::info!(signal = sig?, "shutdown requested, unmounting");
            handle.unmount().await.map_err(|source| MountError::Unmount {
                path: mount_point.to_path_buf(),
                source,
            })?;
        },
    }
    Ok(())
}
