//! Statistics plumbing shared by every layer

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::traits::StatisticsSink;

/// Why the protocol discarded a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DropReason {
    /// Route discovery gave up on the destination
    DestinationUnreachable,
    /// An intermediate node had no active route to forward on
    NoActiveForwardingRoute,
    /// The chosen next hop is no longer a neighbor
    NextHopUnavailable,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::DestinationUnreachable => write!(f, "destination unreachable"),
            DropReason::NoActiveForwardingRoute => write!(f, "no active forwarding route"),
            DropReason::NextHopUnavailable => write!(f, "next hop unavailable"),
        }
    }
}

/// Sink that ignores everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullStatistics;

impl StatisticsSink for NullStatistics {}
