//! Flooding baseline
//!
//! [`FloodingRouter`] keeps no routes at all: every DATA message is
//! broadcast to all neighbors and each node rebroadcasts what it has not
//! seen before. It gives a delivery-rate ceiling to compare AODV against.

use std::collections::{BTreeSet, VecDeque};

use chrono::{DateTime, Duration, Utc};
use orbnet_core::{Clock, Message, NodeAddress, VirtualClock};
use orbnet_transport::{LinkLayer, NetworkTopology};
use tracing::trace;

use crate::entry::RouteEntry;
use crate::error::{RoutingError, RoutingResult};
use crate::layer::NetworkLayer;

/// How long a seen message suppresses its duplicates
pub const DUPLICATE_HOLD_SECS: i64 = 90;

/// Identity of a flooded message
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct FloodKey {
    source: NodeAddress,
    destination: NodeAddress,
    size: usize,
}

impl FloodKey {
    fn of(message: &Message) -> Self {
        Self {
            source: message.source.clone(),
            destination: message.destination.clone(),
            size: message.payload.size(),
        }
    }
}

/// Flooding routing layer of a single node
pub struct FloodingRouter<T: NetworkTopology> {
    local: NodeAddress,
    link: LinkLayer<T>,
    clock: VirtualClock,
    seen: BTreeSet<FloodKey>,
    /// Seen keys in insertion order with their release time
    releases: VecDeque<(DateTime<Utc>, FloodKey)>,
}

impl<T: NetworkTopology> FloodingRouter<T> {
    pub fn new(link: LinkLayer<T>, clock: VirtualClock) -> Self {
        Self {
            local: link.address().clone(),
            link,
            clock,
            seen: BTreeSet::new(),
            releases: VecDeque::new(),
        }
    }

    /// Number of message keys currently suppressing duplicates
    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }

    /// Record a key; returns false if it was already held
    fn remember(&mut self, message: &Message) -> bool {
        let key = FloodKey::of(message);
        if self.seen.contains(&key) {
            return false;
        }
        let release = self.clock.future(Duration::seconds(DUPLICATE_HOLD_SECS));
        self.releases.push_back((release, key.clone()));
        self.seen.insert(key);
        true
    }
}

impl<T: NetworkTopology> NetworkLayer for FloodingRouter<T> {
    fn local_address(&self) -> &NodeAddress {
        &self.local
    }

    fn perform_maintenance(&mut self) -> RoutingResult<()> {
        let now = self.clock.now();
        while let Some((release, _)) = self.releases.front() {
            if now <= *release {
                break;
            }
            if let Some((_, key)) = self.releases.pop_front() {
                self.seen.remove(&key);
            }
        }
        Ok(())
    }

    fn get_incoming_message(&mut self) -> RoutingResult<Option<Message>> {
        let Some(message) = self.link.incoming() else {
            return Ok(None);
        };

        if !self.remember(&message) {
            trace!(node = %self.local, source = %message.source, "Duplicate suppressed");
            return Ok(None);
        }

        if message.destination == self.local {
            return Ok(Some(message));
        }

        self.send_data_message(message)?;
        Ok(None)
    }

    fn incoming_count(&self) -> usize {
        self.link.incoming_count()
    }

    fn send_data_message(&mut self, message: Message) -> RoutingResult<()> {
        if !message.is_data() {
            return Err(RoutingError::DataOnly(message.kind()));
        }
        self.remember(&message);
        self.link.send(&message, &NodeAddress::broadcast())?;
        Ok(())
    }

    fn routes(&self) -> Vec<RouteEntry> {
        Vec::new()
    }
}
