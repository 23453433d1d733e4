//! # orbnet simulation
//!
//! Tick-driven simulation of AODV routing over a rotating satellite
//! constellation.
//!
//! ## Overview
//!
//! Satellites sit on a grid of orbits. Each one links to its in-orbit
//! predecessor and successor and to the same slot in the adjacent orbits;
//! links across the seam between the first and last orbit are optional and
//! drift as the counter-rotating orbits pass each other.
//!
//! Every tick each satellite runs routing maintenance, drains its receive
//! queue, and may originate a DATA message to a random other satellite.
//! Counters for every link and protocol event are collected and exported
//! as JSON.
//!
//! ## Architecture
//!
//! - **Config** (`config.rs`): JSON configuration and derived tick counts
//! - **Constellation** (`constellation.rs`): satellites and the shared medium
//! - **Simulation** (`simulation.rs`): the tick loop and iteration batches
//! - **Stats** (`stats.rs`): statistics sink, snapshots, and summaries
//! - **Export** (`export.rs`): result files
//!
//! ## Example
//!
//! ```rust,ignore
//! use orbnet_simulation::{SimConfig, Simulation};
//!
//! let config = SimConfig {
//!     orbits: 3,
//!     sats_per_orbit: 6,
//!     seed: Some(42),
//!     ..Default::default()
//! };
//!
//! let mut sim = Simulation::new(config)?;
//! let stats = sim.run()?;
//! println!("delivery rate {:.2}", stats.delivery_rate());
//! ```

pub mod config;
pub mod constellation;
pub mod error;
pub mod export;
pub mod simulation;
pub mod stats;

#[cfg(test)]
mod integration_scenarios;

pub use config::{ConfigError, LayerKind, SimConfig};
pub use constellation::{Constellation, Satellite};
pub use error::{SimResult, SimulationError};
pub use simulation::{IterationReport, RunOutcome, Simulation, run_iterations};
pub use stats::{RunSummary, SimStats, Snapshot, StatsCollector};
