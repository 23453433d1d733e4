//! # orbnet routing
//!
//! Routing layers for the orbnet constellation simulator.
//!
//! The main implementation is AODV (RFC 3561): routes are discovered on
//! demand with RREQ/RREP, kept fresh by use, and torn down with RERR when a
//! link breaks. A flooding layer serves as a baseline.
//!
//! ## Core Components
//!
//! - [`AodvRouter`]: per-node protocol engine
//! - [`RoutingTable`]: routes, sequence number, and RREQ id of one node
//! - [`DiscoveryEngine`]: buffered RREQs with expanding ring retries
//! - [`AodvParameters`]: RFC constants derived from the constellation shape
//! - [`FloodingRouter`]: broadcast-everything baseline
//!
//! Both routers implement [`NetworkLayer`], the contract the orchestrator
//! drives once per tick.
//!
//! ## Example
//!
//! ```rust,ignore
//! use orbnet_core::{Message, VirtualClock};
//! use orbnet_routing::{AodvConfig, AodvParameters, AodvRouter, NetworkLayer};
//!
//! let params = AodvParameters::new(30, 5, 11, 6, true);
//! let mut router = AodvRouter::new(medium.link(0)?, clock.clone(), params, AodvConfig::default());
//!
//! router.send_data_message(Message::data("R3S4".into(), "R0S0".into(), 1024, 8))?;
//! router.perform_maintenance()?;
//! // routing messages are consumed and yield None, so drain by count
//! while router.incoming_count() > 0 {
//!     if let Some(delivered) = router.get_incoming_message()? {
//!         println!("{delivered}");
//!     }
//! }
//! ```

pub mod discovery;
pub mod entry;
pub mod error;
pub mod flooding;
pub mod layer;
pub mod params;
pub mod router;
pub mod table;

pub use discovery::{BufferedRreqAttempt, DiscoveryEngine};
pub use entry::RouteEntry;
pub use error::{RoutingError, RoutingResult};
pub use flooding::{DUPLICATE_HOLD_SECS, FloodingRouter};
pub use layer::NetworkLayer;
pub use params::{AodvConfig, AodvParameters, net_diameter};
pub use router::AodvRouter;
pub use table::RoutingTable;
