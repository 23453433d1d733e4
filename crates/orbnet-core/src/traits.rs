//! Core traits for orbnet
//!
//! ## Key Traits
//!
//! - [`Clock`]: Time abstraction so every component reads one virtual clock
//! - [`StatisticsSink`]: Receiver for link and protocol counters

use chrono::{DateTime, Duration, Utc};

use crate::message::Message;
use crate::stats::DropReason;

/// Time abstraction for testability
///
/// All protocol timestamps are computed against this clock, never against
/// wall-clock time.
pub trait Clock: Send + Sync {
    /// Get the current virtual datetime
    fn now(&self) -> DateTime<Utc>;

    /// A point `offset` into the future of the current time
    fn future(&self, offset: Duration) -> DateTime<Utc> {
        self.now() + offset
    }
}

/// Sink for simulation statistics
///
/// Every method has a no-op default so sinks only override the counters
/// they care about.
pub trait StatisticsSink: Send + Sync {
    /// A message left a link layer toward at least one neighbor
    fn link_sent(&self, _message: &Message) {}

    /// A message was accepted into a receive queue
    fn link_received(&self, _message: &Message) {}

    /// A message was lost on a link (probability or full buffer)
    fn link_dropped(&self, _message: &Message) {}

    /// A message reached the link layer with no TTL left
    fn ttl_expired(&self, _message: &Message) {}

    /// A DATA message was injected by the traffic generator
    fn data_sent(&self, _message: &Message) {}

    /// A DATA message reached its destination
    fn data_delivered(&self, _message: &Message) {}

    /// A DATA message was discarded by the protocol
    fn data_dropped(&self, _message: &Message, _reason: DropReason) {}

    /// A routing message was handed to the link layer
    fn control_sent(&self, _message: &Message) {}

    /// A routing message was taken off a receive queue
    fn control_received(&self, _message: &Message) {}

    /// A routing message could not be forwarded
    fn control_dropped(&self, _message: &Message, _reason: DropReason) {}

    /// A node started a fresh route discovery
    fn discovery_started(&self) {}
}
