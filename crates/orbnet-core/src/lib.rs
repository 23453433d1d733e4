//! # orbnet core
//!
//! Core types, traits, and errors shared by the orbnet crates.
//!
//! ## Key Traits
//!
//! - [`Clock`]: Virtual time abstraction
//! - [`StatisticsSink`]: Receiver for link and protocol counters
//!
//! ## Key Types
//!
//! - [`NodeAddress`]: `R{orbit}S{slot}` satellite address or broadcast
//! - [`Message`]: Envelope around a typed [`Payload`]
//! - [`VirtualClock`]: Shared, manually advanced simulation clock

pub mod address;
pub mod clock;
pub mod error;
pub mod message;
pub mod stats;
pub mod traits;

pub use address::*;
pub use clock::*;
pub use error::*;
pub use message::*;
pub use stats::*;
pub use traits::*;
