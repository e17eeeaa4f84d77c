//! Command-line arguments.

use std::path::PathBuf;

use clap::{ArgAction, Parser};
use collectfs_core::DEFAULT_TRASH_NAME;

/// collectfs - a filesystem that archives files before they are clobbered
#[derive(Debug, Parser)]
#[command(name = "collectfs")]
#[command(author, version, about, long_about = None)]
pub(crate) struct Cli {
    /// Directory holding the real files
    #[arg(value_name = "ROOT_DIR", required_unless_present = "help_fuse")]
    pub(crate) root: Option<PathBuf>,

    /// Where to mount the filesystem
    #[arg(value_name = "MOUNT_POINT", required_unless_present = "help_fuse")]
    pub(crate) mount_point: Option<PathBuf>,

    /// Print the mount options understood by the FUSE binding
    #[arg(short = 'H', long = "help-fuse")]
    pub(crate) help_fuse: bool,

    /// Log every filesystem operation (also on while COLLECTFS_TRACE is set)
    #[arg(short, long)]
    pub(crate) trace: bool,

    /// Stay in the foreground and log to stderr
    #[arg(short, long)]
    pub(crate) foreground: bool,

    /// Mount options, comma separated (may be repeated)
    #[arg(short = 'o', value_name = "OPTIONS", action = ArgAction::Append)]
    pub(crate) options: Vec<String>,

    /// Directory for log files when running in the background
    #[arg(long, value_name = "DIR", env = "COLLECTFS_LOG_DIR")]
    pub(crate) log_dir: Option<PathBuf>,

    /// Name of the trash folder at the filesystem root
    #[arg(long = "trash-name", value_name = "NAME", env = "COLLECTFS_TRASH", default_value = DEFAULT_TRASH_NAME)]
    pub(crate) trash_name: String,
}

/// Setting this variable, to any value, turns on `--trace`.
pub(crate) const TRACE_ENV: &str = "COLLECTFS_TRACE";
