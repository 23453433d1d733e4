//! Simulation error types

use orbnet_routing::RoutingError;
use orbnet_transport::TransportError;
use thiserror::Error;

use crate::config::ConfigError;

/// Errors that abort a simulation run
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// A routing layer broke its contract; the run cannot continue
    #[error("Routing error: {0}")]
    Routing(#[from] RoutingError),

    #[error("Export failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for simulation operations
pub type SimResult<T> = Result<T, SimulationError>;
