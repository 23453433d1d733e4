//! Messages exchanged between satellites
//!
//! A [`Message`] is an envelope (destination, source, previous hop, TTL,
//! hop count, accumulated propagation delay) around a typed [`Payload`].
//! Messages are copied whenever they are re-sent, so every queue holds its
//! own instance.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::address::NodeAddress;
use crate::error::{MessageError, MessageResult};

/// Envelope overhead added to every payload
pub const MESSAGE_HEADER_SIZE: usize = 20;

/// Fixed per-hop processing delay in milliseconds
pub const PROCESSING_DELAY_MS: f64 = 10.0;

/// Destination sequence number as carried by the protocol
pub type SequenceNumber = i32;

/// Discriminant of a [`Payload`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MessageKind {
    Data,
    Rreq,
    Rrep,
    Rerr,
    RrepAck,
    Hello,
}

impl MessageKind {
    /// Whether this kind belongs to the routing protocol
    pub fn is_control(&self) -> bool {
        !matches!(self, MessageKind::Data)
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MessageKind::Data => "DATA",
            MessageKind::Rreq => "RREQ",
            MessageKind::Rrep => "RREP",
            MessageKind::Rerr => "RERR",
            MessageKind::RrepAck => "RREPACK",
            MessageKind::Hello => "HELLO",
        };
        f.write_str(name)
    }
}

/// Application payload of a given size
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPayload {
    pub size: usize,
}

/// Route request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rreq {
    pub join: bool,
    pub repair: bool,
    pub gratuitous: bool,
    pub destination_only: bool,
    /// The originator has no known sequence number for the destination
    pub unknown_sequence: bool,
    pub hop_count: u32,
    pub rreq_id: u32,
    pub destination: NodeAddress,
    pub destination_seq: SequenceNumber,
    pub originator: NodeAddress,
    pub originator_seq: SequenceNumber,
}

impl Rreq {
    pub const SIZE: usize = 24;
}

/// Route reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rrep {
    pub repair: bool,
    pub ack_required: bool,
    pub prefix_size: u8,
    pub hop_count: u32,
    pub destination: NodeAddress,
    pub destination_seq: SequenceNumber,
    pub originator: NodeAddress,
    /// Absolute expiry of the advertised route
    pub lifetime: DateTime<Utc>,
}

impl Rrep {
    pub const SIZE: usize = 20;

    /// A reply with every flag cleared
    pub fn new(
        hop_count: u32,
        destination: NodeAddress,
        destination_seq: SequenceNumber,
        originator: NodeAddress,
        lifetime: DateTime<Utc>,
    ) -> Self {
        Self {
            repair: false,
            ack_required: false,
            prefix_size: 0,
            hop_count,
            destination,
            destination_seq,
            originator,
            lifetime,
        }
    }
}

/// One destination listed in a route error
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnreachableDestination {
    pub address: NodeAddress,
    pub sequence: SequenceNumber,
}

impl UnreachableDestination {
    pub fn new(address: NodeAddress, sequence: SequenceNumber) -> Self {
        Self { address, sequence }
    }
}

/// Route error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rerr {
    pub no_delete: bool,
    pub destinations: Vec<UnreachableDestination>,
}

impl Rerr {
    pub fn new(destinations: Vec<UnreachableDestination>) -> Self {
        Self {
            no_delete: false,
            destinations,
        }
    }

    pub fn size(&self) -> usize {
        12 + 8 * self.destinations.len()
    }
}

/// Neighbor liveness beacon
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hello {
    pub destination: NodeAddress,
    pub destination_seq: SequenceNumber,
    pub lifetime: DateTime<Utc>,
}

impl Hello {
    pub const SIZE: usize = 20;

    /// A HELLO always describes a one-hop route
    pub fn hop_count(&self) -> u32 {
        0
    }
}

/// Typed message body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Data(DataPayload),
    Rreq(Rreq),
    Rrep(Rrep),
    Rerr(Rerr),
    RrepAck,
    Hello(Hello),
}

impl Payload {
    pub fn kind(&self) -> MessageKind {
        match self {
            Payload::Data(_) => MessageKind::Data,
            Payload::Rreq(_) => MessageKind::Rreq,
            Payload::Rrep(_) => MessageKind::Rrep,
            Payload::Rerr(_) => MessageKind::Rerr,
            Payload::RrepAck => MessageKind::RrepAck,
            Payload::Hello(_) => MessageKind::Hello,
        }
    }

    /// Size of the payload in bytes
    pub fn size(&self) -> usize {
        match self {
            Payload::Data(data) => data.size,
            Payload::Rreq(_) => Rreq::SIZE,
            Payload::Rrep(_) => Rrep::SIZE,
            Payload::Rerr(rerr) => rerr.size(),
            Payload::RrepAck => 2,
            Payload::Hello(_) => Hello::SIZE,
        }
    }
}

/// A message travelling through the constellation
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub destination: NodeAddress,
    pub source: NodeAddress,
    /// Last node that transmitted this copy
    pub previous_hop: NodeAddress,
    pub ttl: i32,
    hop_count: u32,
    propagation_delay_ms: f64,
    pub payload: Payload,
}

impl Message {
    pub fn new(payload: Payload, destination: NodeAddress, source: NodeAddress, ttl: i32) -> Self {
        Self {
            previous_hop: source.clone(),
            destination,
            source,
            ttl,
            hop_count: 0,
            propagation_delay_ms: 0.0,
            payload,
        }
    }

    /// A DATA message of `size` payload bytes
    pub fn data(destination: NodeAddress, source: NodeAddress, size: usize, ttl: i32) -> Self {
        Self::new(Payload::Data(DataPayload { size }), destination, source, ttl)
    }

    pub fn kind(&self) -> MessageKind {
        self.payload.kind()
    }

    pub fn is_data(&self) -> bool {
        matches!(self.payload, Payload::Data(_))
    }

    /// Total size: header plus payload
    pub fn size(&self) -> usize {
        MESSAGE_HEADER_SIZE + self.payload.size()
    }

    /// Number of link transmissions this copy has been through
    pub fn hop_count(&self) -> u32 {
        self.hop_count
    }

    /// Consume one unit of TTL for a transmission
    ///
    /// Fails without modifying the message when no TTL is left.
    pub fn decrement_ttl(&mut self) -> MessageResult<()> {
        if self.ttl <= 0 {
            return Err(MessageError::TtlUnderflow { ttl: self.ttl });
        }
        self.ttl -= 1;
        self.hop_count += 1;
        Ok(())
    }

    pub fn add_propagation_delay(&mut self, delay_ms: f64) {
        self.propagation_delay_ms += delay_ms;
    }

    pub fn propagation_delay_ms(&self) -> f64 {
        self.propagation_delay_ms
    }

    pub fn processing_delay_ms(&self) -> f64 {
        self.hop_count as f64 * PROCESSING_DELAY_MS
    }

    pub fn end_to_end_delay_ms(&self) -> f64 {
        self.propagation_delay_ms + self.processing_delay_ms()
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} -> {} (prev {}, ttl {}, hops {})",
            self.kind(),
            self.source,
            self.destination,
            self.previous_hop,
            self.ttl,
            self.hop_count
        )
    }
}
