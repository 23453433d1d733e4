//! Network layer contract
//!
//! Every routing layer the orchestrator can drive implements
//! [`NetworkLayer`]. The trait is object safe so a constellation can hold
//! `Box<dyn NetworkLayer>` regardless of the protocol.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use orbnet_core::{Message, NodeAddress};

use crate::entry::RouteEntry;
use crate::error::RoutingResult;

/// Routing layer of a single node
pub trait NetworkLayer: Send {
    /// Address of the node this layer runs on
    fn local_address(&self) -> &NodeAddress;

    /// Per-tick housekeeping
    fn perform_maintenance(&mut self) -> RoutingResult<()>;

    /// Process one received message
    ///
    /// Returns the message only when it is DATA that has arrived at its
    /// destination. `Ok(None)` covers both an empty queue and a message that
    /// was consumed or forwarded.
    fn get_incoming_message(&mut self) -> RoutingResult<Option<Message>>;

    /// Number of messages waiting in the receive queue
    fn incoming_count(&self) -> usize;

    /// Originate or forward a DATA message
    fn send_data_message(&mut self, message: Message) -> RoutingResult<()>;

    /// Current routes, in destination order
    fn routes(&self) -> Vec<RouteEntry>;

    /// Write the routing table to `<dir>/<address>-routing-table.json`
    fn export_routing_table(&self, dir: &Path) -> RoutingResult<PathBuf> {
        let path = dir.join(format!("{}-routing-table.json", self.local_address()));
        let writer = BufWriter::new(File::create(&path)?);
        serde_json::to_writer_pretty(writer, &self.routes())?;
        Ok(path)
    }
}
