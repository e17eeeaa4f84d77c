//! collectfs core - the archival engine behind the collectfs filesystem.
//!
//! This crate provides:
//! - Bounded composition of virtual paths into backing-store paths
//! - Collision-free archive names with a bounded disambiguation search
//! - The lazily created trash tree mirroring the original directories
//! - The [`Archiver`], which moves a file aside before it is clobbered
//! - The [`ClobberGuard`], mapping collection outcomes to what the
//!   filesystem does next
//!
//! # Example
//!
//! ```rust,no_run
//! use std::ffi::OsStr;
//! use std::sync::Arc;
//!
//! use collectfs_core::prelude::*;
//!
//! # fn main() -> Result<(), collectfs_core::CollectError> {
//! let config = Arc::new(EngineConfig::new("/data")?);
//! let guard = ClobberGuard::new(Archiver::new(config));
//!
//! match guard.before(ClobberOp::Unlink, OsStr::new("/docs/report.txt"))? {
//!     Disposition::Satisfied => println!("saved to the trash"),
//!     Disposition::Proceed => println!("nothing to save"),
//!     Disposition::Saved { .. } | Disposition::Recreate { .. } => unreachable!(),
//! }
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

pub mod clock;
pub mod collect;
pub mod config;
pub mod error;
pub mod guard;
pub mod names;
pub mod path;
pub mod trash;
pub mod wrap;

pub use clock::{Clock, FixedClock, SystemClock, format_timestamp};
pub use collect::{Archiver, CollectOutcome, Collector};
pub use config::{DEFAULT_MAX_PATH, DEFAULT_TRASH_NAME, EngineConfig, validate_trash_name};
pub use error::{CollectError, CollectResult};
pub use guard::{ClobberGuard, ClobberOp, Disposition};
pub use names::{MAX_CANDIDATES, NameAllocator, restore};
pub use path::PathResolver;
pub use trash::TrashPathBuilder;
pub use wrap::{OpError, OpResult, wrap_err, wrap_op};
