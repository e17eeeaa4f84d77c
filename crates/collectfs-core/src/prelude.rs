//! Prelude module - commonly used types for convenient import.
//!
//! Use `use collectfs_core::prelude::*;` to import all essential types.

// Configuration
pub use crate::EngineConfig;

// Engine
pub use crate::{Archiver, ClobberGuard, ClobberOp, CollectOutcome, Collector, Disposition};

// Building blocks
pub use crate::{Clock, NameAllocator, PathResolver, SystemClock, TrashPathBuilder};

// Errors
pub use crate::{CollectError, CollectResult, OpError, OpResult, wrap_op};
