//! Virtual simulation clock
//!
//! The simulator advances time in whole-second steps. Every component that
//! needs "now" holds a clone of the same [`VirtualClock`]; clones share the
//! underlying counter.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Duration, Utc};

use crate::traits::Clock;

/// 2000-01-01T00:00:00Z in milliseconds since the Unix epoch
pub const SIMULATION_EPOCH_MILLIS: i64 = 946_684_800_000;

/// Shared, manually advanced clock
#[derive(Debug, Clone)]
pub struct VirtualClock {
    millis: Arc<AtomicI64>,
}

impl VirtualClock {
    /// Create a clock positioned at the simulation epoch
    pub fn new() -> Self {
        Self::starting_at_millis(SIMULATION_EPOCH_MILLIS)
    }

    pub fn starting_at(start: DateTime<Utc>) -> Self {
        Self::starting_at_millis(start.timestamp_millis())
    }

    fn starting_at_millis(millis: i64) -> Self {
        Self {
            millis: Arc::new(AtomicI64::new(millis)),
        }
    }

    /// Move time forward by whole seconds
    pub fn advance_secs(&self, seconds: i64) {
        self.advance(Duration::seconds(seconds));
    }

    pub fn advance(&self, by: Duration) {
        self.millis.fetch_add(by.num_milliseconds(), Ordering::SeqCst);
    }

    /// Time elapsed since the simulation epoch
    pub fn elapsed(&self) -> Duration {
        Duration::milliseconds(self.millis.load(Ordering::SeqCst) - SIMULATION_EPOCH_MILLIS)
    }
}

impl Default for VirtualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for VirtualClock {
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.millis.load(Ordering::SeqCst)).unwrap_or_default()
    }
}

/// Convert fractional seconds to a duration, rounding to whole seconds
pub fn whole_seconds(seconds: f64) -> Duration {
    Duration::seconds(seconds.round() as i64)
}
