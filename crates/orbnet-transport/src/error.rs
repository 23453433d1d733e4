//! Transport layer error types

use orbnet_core::MessageError;
use thiserror::Error;

use crate::topology::NodeIndex;

/// Unified transport error type
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Constellation needs at least one orbit and one satellite (got {orbits}x{sats_per_orbit})")]
    InvalidShape { orbits: usize, sats_per_orbit: usize },

    #[error("Reception probability {0} is outside 0..=1")]
    InvalidProbability(f64),

    #[error("Unknown node index {0}")]
    UnknownNode(NodeIndex),

    #[error("Message error: {0}")]
    Message(#[from] MessageError),
}

/// Result type alias for transport operations
pub type TransportResult<T> = Result<T, TransportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TransportError::InvalidShape {
            orbits: 0,
            sats_per_orbit: 4,
        };
        assert!(err.to_string().contains("0x4"));

        let err: TransportError = MessageError::TtlUnderflow { ttl: 0 }.into();
        assert!(matches!(err, TransportError::Message(_)));
    }
}
