//! Prelude module - commonly used types for convenient import.
//!
//! Use `use collectfs_fuse::prelude::*;` to import all essential types.

pub use crate::{CollectFs, Gateway, MountError, MountFlags, MountResult, OpReply, mount};
