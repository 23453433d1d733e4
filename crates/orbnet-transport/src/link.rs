//! Per-node link layer
//!
//! Sends copies of messages to neighbors resolved from the shared
//! [`Medium`]. Expected link conditions (TTL exhausted, next hop out of
//! range) are reported through [`LinkOutcome`], not as errors.

use std::sync::Arc;

use orbnet_core::{Message, NodeAddress};
use tracing::{debug, trace, warn};

use crate::error::TransportResult;
use crate::geometry::propagation_delay_ms;
use crate::medium::Medium;
use crate::topology::{NetworkTopology, NodeIndex};

/// Result of handing a message to the link layer
#[derive(Debug, Clone, PartialEq)]
pub enum LinkOutcome {
    /// The message left toward the requested neighbor(s)
    Delivered,
    /// The message had no TTL left and was dropped
    TtlExpired,
    /// The requested next hop is not currently a neighbor
    NextHopNotFound {
        /// The copy that could not be sent
        message: Message,
        missing: NodeAddress,
    },
}

#[derive(Debug, Clone)]
struct NeighborCache {
    epoch: usize,
    neighbors: Vec<(NodeIndex, NodeAddress)>,
}

/// Link layer of a single node
pub struct LinkLayer<T: NetworkTopology> {
    node: NodeIndex,
    address: NodeAddress,
    medium: Arc<Medium<T>>,
    cache: Option<NeighborCache>,
}

impl<T: NetworkTopology> LinkLayer<T> {
    pub(crate) fn new(medium: Arc<Medium<T>>, node: NodeIndex) -> Self {
        let address = medium.topology().address(node);
        Self {
            node,
            address,
            medium,
            cache: None,
        }
    }

    pub fn node(&self) -> NodeIndex {
        self.node
    }

    pub fn address(&self) -> &NodeAddress {
        &self.address
    }

    pub fn medium(&self) -> &Arc<Medium<T>> {
        &self.medium
    }

    /// Offer a message to this node's receive queue
    pub fn receive(&self, message: Message) -> bool {
        self.medium.deliver(self.node, message)
    }

    /// Take the next received message, if any
    pub fn incoming(&self) -> Option<Message> {
        self.medium.dequeue(self.node)
    }

    pub fn incoming_count(&self) -> usize {
        self.medium.queued(self.node)
    }

    /// Current neighbor addresses
    pub fn neighbors(&mut self) -> Vec<NodeAddress> {
        self.resolve().into_iter().map(|(_, address)| address).collect()
    }

    /// Transmit a copy of `message` toward `next_hop`
    ///
    /// The copy is stamped with this node as previous hop and one TTL unit
    /// is consumed. Broadcasts (by destination or next hop) reach every
    /// current neighbor; unicasts reach only `next_hop`.
    pub fn send(&mut self, message: &Message, next_hop: &NodeAddress) -> TransportResult<LinkOutcome> {
        let mut outgoing = message.clone();
        let stats = Arc::clone(self.medium.stats());

        if outgoing.ttl <= 0 {
            debug!(
                node = %self.address,
                kind = %outgoing.kind(),
                dest = %outgoing.destination,
                "TTL reached 0, dropping message"
            );
            stats.ttl_expired(&outgoing);
            return Ok(LinkOutcome::TtlExpired);
        }

        outgoing.previous_hop = self.address.clone();
        outgoing.decrement_ttl()?;

        let neighbors = self.resolve();

        if outgoing.destination.is_broadcast() || next_hop.is_broadcast() {
            trace!(
                node = %self.address,
                kind = %outgoing.kind(),
                neighbors = neighbors.len(),
                "Broadcasting message"
            );
            for (index, _) in &neighbors {
                let mut copy = outgoing.clone();
                copy.add_propagation_delay(self.delay_to(*index));
                self.medium.deliver(*index, copy);
            }
        } else {
            let Some((index, _)) = neighbors.iter().find(|(_, address)| address == next_hop) else {
                warn!(
                    node = %self.address,
                    next_hop = %next_hop,
                    kind = %outgoing.kind(),
                    "Next hop is not a neighbor"
                );
                return Ok(LinkOutcome::NextHopNotFound {
                    message: outgoing,
                    missing: next_hop.clone(),
                });
            };

            trace!(
                node = %self.address,
                next_hop = %next_hop,
                kind = %outgoing.kind(),
                dest = %outgoing.destination,
                "Sending message"
            );
            let mut copy = outgoing.clone();
            copy.add_propagation_delay(self.delay_to(*index));
            self.medium.deliver(*index, copy);
        }

        stats.link_sent(&outgoing);
        Ok(LinkOutcome::Delivered)
    }

    fn delay_to(&self, neighbor: NodeIndex) -> f64 {
        let topology = self.medium.topology();
        propagation_delay_ms(&topology.location(self.node), &topology.location(neighbor))
    }

    fn resolve(&mut self) -> Vec<(NodeIndex, NodeAddress)> {
        let topology = self.medium.topology();
        let epoch = topology.epoch(self.node);

        if let Some(cache) = &self.cache {
            if cache.epoch == epoch {
                return cache.neighbors.clone();
            }
        }

        let neighbors: Vec<_> = topology
            .neighbors(self.node)
            .into_iter()
            .map(|index| (index, topology.address(index)))
            .collect();
        self.cache = Some(NeighborCache {
            epoch,
            neighbors: neighbors.clone(),
        });
        neighbors
    }
}
