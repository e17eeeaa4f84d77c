//! Time source for archive names.

use chrono::{Local, NaiveDateTime};

use crate::error::CollectResult;

/// Format of the timestamp appended to archived file names.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d.%H:%M:%S";

/// Supplies the local wall-clock time at one-second resolution.
pub trait Clock: Send + Sync {
    /// Current local time.
    ///
    /// # Errors
    ///
    /// Returns [`CollectError::Clock`](crate::CollectError::Clock) if the time
    /// cannot be obtained.
    fn now(&self) -> CollectResult<NaiveDateTime>;
}

/// The system's local clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> CollectResult<NaiveDateTime> {
        Ok(Local::now().naive_local())
    }
}

/// A clock frozen at a fixed instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> CollectResult<NaiveDateTime> {
        Ok(self.0)
    }
}

/// Render a time as `YYYY-MM-DD.HH:MM:SS`.
#[must_use]
pub fn format_timestamp(time: &NaiveDateTime) -> String {
    time.format(TIMESTAMP_FORMAT).to_string()
}
