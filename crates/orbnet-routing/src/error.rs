//! Routing error types
//!
//! Only broken caller contracts are errors here. Link failures and
//! unreachable destinations are handled inside the protocol.

use orbnet_core::{MessageError, MessageKind, NodeAddress};
use orbnet_transport::TransportError;
use thiserror::Error;

/// Fatal routing errors
#[derive(Debug, Error)]
pub enum RoutingError {
    /// A non-DATA payload was handed to the DATA path
    #[error("Only DATA messages can be sent as data, got {0}")]
    DataOnly(MessageKind),

    /// A DATA payload was handed to the control path
    #[error("DATA messages cannot be sent on the control path")]
    ControlOnly,

    /// Message kind the protocol does not handle
    #[error("{0} handling is not supported")]
    Unsupported(MessageKind),

    /// Route entry the protocol guarantees to exist is missing
    #[error("No routing entry for {0}")]
    MissingRoute(NodeAddress),

    /// Message invariant violated
    #[error("Message error: {0}")]
    Message(#[from] MessageError),

    /// Link layer failure
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Routing table export failed
    #[error("Export failed: {0}")]
    Io(#[from] std::io::Error),

    /// Routing table serialization failed
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for routing operations
pub type RoutingResult<T> = Result<T, RoutingError>;
