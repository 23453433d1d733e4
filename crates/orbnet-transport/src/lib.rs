//! # orbnet transport
//!
//! Radio medium for the orbnet constellation simulator.
//!
//! ## Modules
//!
//! - [`topology`]: neighbor resolution over the rotating orbital grid
//! - [`geometry`]: satellite coordinates and propagation delay
//! - [`medium`]: shared topology plus bounded, lossy receive queues
//! - [`link`]: per-node link layer with TTL handling and unicast/broadcast
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use orbnet_core::NullStatistics;
//! use orbnet_transport::{ConstellationShape, LinkConfig, Medium, OrbitalTopology};
//!
//! let shape = ConstellationShape::new(6, 11, true)?;
//! let topology = OrbitalTopology::new(shape, 780.0);
//! let medium = Arc::new(Medium::new(topology, LinkConfig::default(), Arc::new(NullStatistics), 42)?);
//! let mut link = medium.link(0)?;
//! ```

pub mod error;
pub mod geometry;
pub mod link;
pub mod medium;
pub mod topology;

pub use error::{TransportError, TransportResult};
pub use geometry::{Coordinate, initial_coordinate, propagation_delay_ms};
pub use link::{LinkLayer, LinkOutcome};
pub use medium::{LinkConfig, Medium};
pub use topology::{
    ConstellationShape, Direction, NetworkTopology, Neighbor, NodeIndex, OrbitalTopology, SlotPosition,
    StaticTopology, resolve_neighbors, seam_slot,
};
