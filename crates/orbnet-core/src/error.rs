//! Error types for orbnet

use thiserror::Error;

/// Errors raised by message invariants
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessageError {
    #[error("TTL would underflow (current TTL {ttl})")]
    TtlUnderflow { ttl: i32 },
}

/// Errors related to node addressing
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("Invalid satellite address: {0}")]
    InvalidFormat(String),
}

/// Result type alias for message operations
pub type MessageResult<T> = Result<T, MessageError>;
