//! Startup validation, run before the process detaches.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use collectfs_core::EngineConfig;
use nix::unistd::{geteuid, getuid};

use crate::cli::{Cli, TRACE_ENV};

/// Everything needed to mount, checked and canonicalized.
#[derive(Debug)]
pub(crate) struct Startup {
    pub(crate) config: EngineConfig,
    pub(crate) mount_point: PathBuf,
    /// Absolute, so it survives the working directory change on detach.
    pub(crate) log_dir: Option<PathBuf>,
    pub(crate) trace: bool,
}

/// Fail when either the real or the effective user is root.
pub(crate) fn refuse_superuser() -> Result<()> {
    if getuid().is_root() || geteuid().is_root() {
        bail!("refusing to run with superuser privileges");
    }
    Ok(())
}

fn existing_dir(path: &Path, what: &str) -> Result<PathBuf> {
    let canonical =
        std::fs::canonicalize(path).with_context(|| format!("{what} {}", path.display()))?;
    if !canonical.is_dir() {
        bail!("{what} must be a directory: {}", canonical.display());
    }
    Ok(canonical)
}

/// Check the root, the mount point and the trash name, in that order.
pub(crate) fn validate(cli: &Cli) -> Result<Startup> {
    validate_with_env(cli, std::env::var_os(TRACE_ENV).as_deref())
}

fn validate_with_env(cli: &Cli, trace_env: Option<&OsStr>) -> Result<Startup> {
    let (Some(root), Some(mount_point)) = (&cli.root, &cli.mount_point) else {
        bail!("both ROOT_DIR and MOUNT_POINT are required");
    };

    let root = existing_dir(root, "root path")?;
    let mount_point = existing_dir(mount_point, "mount point")?;
    if root == mount_point {
        bail!(
            "root path and mount point must be different directories: {}",
            root.display()
        );
    }

    let config = EngineConfig::with_root_unchecked(root)
        .with_trash_name(cli.trash_name.as_str())
        .context("COLLECTFS_TRASH")?;
    let log_dir = cli
        .log_dir
        .as_deref()
        .map(std::path::absolute)
        .transpose()
        .context("log directory")?;
    Ok(Startup {
        config,
        mount_point,
        log_dir,
        trace: cli.trace || trace_env.is_some(),
    })
}
