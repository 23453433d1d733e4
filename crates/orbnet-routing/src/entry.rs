//! Routing table entries

use chrono::{DateTime, Utc};
use orbnet_core::{NodeAddress, SequenceNumber};
use serde::{Deserialize, Serialize};

/// Route toward a single destination
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteEntry {
    pub destination: NodeAddress,
    pub sequence: SequenceNumber,
    /// Whether `sequence` was learned from the destination itself
    pub valid_sequence: bool,
    pub hop_count: u32,
    pub next_hop: NodeAddress,
    pub valid: bool,
    pub expires_at: DateTime<Utc>,
    /// Neighbors that forward through this node toward `destination`
    pub precursors: Vec<NodeAddress>,
}

impl RouteEntry {
    /// One-hop route to a neighbor whose sequence number is unknown
    pub fn neighbor(address: NodeAddress, expires_at: DateTime<Utc>) -> Self {
        Self {
            destination: address.clone(),
            sequence: 0,
            valid_sequence: false,
            hop_count: 1,
            next_hop: address,
            valid: true,
            expires_at,
            precursors: Vec::new(),
        }
    }

    /// Add a precursor unless already present
    pub fn add_precursor(&mut self, precursor: NodeAddress) -> bool {
        if self.precursors.contains(&precursor) {
            return false;
        }
        self.precursors.push(precursor);
        true
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}
