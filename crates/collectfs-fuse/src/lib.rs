//! collectfs FUSE gateway - a passthrough filesystem that never loses a
//! clobbered file.
//!
//! This crate provides:
//! - [`Gateway`]: synchronous handlers for every filesystem operation, with
//!   collection in front of unlink, rename, link, symlink and truncating opens
//! - [`CollectFs`]: the `fuse3` path filesystem serving a gateway
//! - [`mount`]: the mount session lifecycle with signal-driven unmount

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

pub mod attr;
pub mod error;
pub mod fs;
pub mod gateway;
pub mod handles;
pub mod mount;

pub use error::{MountError, MountResult, OpReply, collect_errno, op_errno, to_fuse};
pub use fs::CollectFs;
pub use gateway::{AttrChange, Gateway, XattrReply};
pub use handles::HandleTable;
pub use mount::{FS_NAME, MOUNT_OPTIONS_HELP, MountFlags, mount};
