//! Shared radio medium
//!
//! The [`Medium`] owns the topology and one bounded receive queue per node.
//! Link layers hold an `Arc<Medium<T>>` plus their own node index, so a
//! transmission is simply a push into the receiver's queue.
//!
//! Reception is lossy: every delivery is accepted with the configured
//! probability, and only while the receiver's queue has room.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use orbnet_core::{Message, NodeAddress, StatisticsSink};
use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{TransportError, TransportResult};
use crate::link::LinkLayer;
use crate::topology::{NetworkTopology, NodeIndex};

/// Link reception settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinkConfig {
    /// Chance that a transmitted copy arrives, 0.0 to 1.0
    pub reception_probability: f64,
    /// Maximum number of queued messages per node
    pub buffer_size: usize,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            reception_probability: 1.0,
            buffer_size: 50,
        }
    }
}

impl LinkConfig {
    /// Build from a percentage as found in simulation configuration files
    pub fn from_percent(reception_percent: u32, buffer_size: usize) -> Self {
        Self {
            reception_probability: f64::from(reception_percent.min(100)) / 100.0,
            buffer_size,
        }
    }
}

struct Inbox {
    queue: VecDeque<Message>,
    rng: StdRng,
}

/// Topology plus per-node receive queues
pub struct Medium<T: NetworkTopology> {
    topology: RwLock<T>,
    inboxes: Vec<Mutex<Inbox>>,
    index: BTreeMap<NodeAddress, NodeIndex>,
    config: LinkConfig,
    stats: Arc<dyn StatisticsSink>,
}

impl<T: NetworkTopology> Medium<T> {
    /// Create a medium over `topology`
    ///
    /// Each receive queue gets its own RNG derived from `seed`, so runs with
    /// the same seed drop the same messages.
    pub fn new(topology: T, config: LinkConfig, stats: Arc<dyn StatisticsSink>, seed: u64) -> TransportResult<Self> {
        if !(0.0..=1.0).contains(&config.reception_probability) {
            return Err(TransportError::InvalidProbability(config.reception_probability));
        }

        let count = topology.node_count();
        let index = (0..count).map(|node| (topology.address(node), node)).collect();
        let inboxes = (0..count)
            .map(|node| {
                Mutex::new(Inbox {
                    queue: VecDeque::with_capacity(config.buffer_size),
                    rng: StdRng::seed_from_u64(seed.wrapping_add(node as u64)),
                })
            })
            .collect();

        Ok(Self {
            topology: RwLock::new(topology),
            inboxes,
            index,
            config,
            stats,
        })
    }

    /// Create the link layer for `node`
    pub fn link(self: &Arc<Self>, node: NodeIndex) -> TransportResult<LinkLayer<T>> {
        if node >= self.inboxes.len() {
            return Err(TransportError::UnknownNode(node));
        }
        Ok(LinkLayer::new(Arc::clone(self), node))
    }

    pub fn topology(&self) -> RwLockReadGuard<'_, T> {
        self.topology.read()
    }

    pub fn topology_mut(&self) -> RwLockWriteGuard<'_, T> {
        self.topology.write()
    }

    pub fn node_count(&self) -> usize {
        self.inboxes.len()
    }

    pub fn index_of(&self, address: &NodeAddress) -> Option<NodeIndex> {
        self.index.get(address).copied()
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    pub fn stats(&self) -> &Arc<dyn StatisticsSink> {
        &self.stats
    }

    /// Offer a message to the receive queue of `node`
    ///
    /// Returns whether the message was accepted.
    pub fn deliver(&self, node: NodeIndex, message: Message) -> bool {
        let Some(inbox) = self.inboxes.get(node) else {
            self.stats.link_dropped(&message);
            return false;
        };

        let mut inbox = inbox.lock();
        let received = inbox.rng.random_bool(self.config.reception_probability);
        if received && inbox.queue.len() < self.config.buffer_size {
            self.stats.link_received(&message);
            inbox.queue.push_back(message);
            true
        } else {
            trace!(node, kind = %message.kind(), queued = inbox.queue.len(), "Message lost on link");
            self.stats.link_dropped(&message);
            false
        }
    }

    /// Take the oldest queued message for `node`
    pub fn dequeue(&self, node: NodeIndex) -> Option<Message> {
        self.inboxes.get(node)?.lock().queue.pop_front()
    }

    /// Number of messages waiting for `node`
    pub fn queued(&self, node: NodeIndex) -> usize {
        self.inboxes.get(node).map_or(0, |inbox| inbox.lock().queue.len())
    }

    /// Advance the topology by one position step
    pub fn position_tick(&self) {
        self.topology.write().position_tick();
    }
}
