//! AODV router
//!
//! The [`AodvRouter`] is the per-node protocol state machine. It owns the
//! node's link layer, routing table, and discovery engine, and implements
//! [`NetworkLayer`] so the orchestrator can drive it like any other
//! routing layer.
//!
//! ## Message Handling
//!
//! 1. **DATA for this node**: handed back to the caller
//! 2. **DATA in transit**: forwarded along an active route, or answered with
//!    a RERR to the previous hop when no route exists
//! 3. **Control**: RREQ, RREP, RERR, and HELLO update the routing table and
//!    may emit further control messages; parked DATA is retried afterwards
//!
//! DATA for a destination without an active route is parked until the route
//! discovery it triggers either succeeds or exhausts its retries.

use std::mem;
use std::sync::Arc;

use orbnet_core::{
    Clock, DropReason, Hello, Message, MessageKind, NodeAddress, Payload, Rerr, Rrep, Rreq, StatisticsSink,
    UnreachableDestination, VirtualClock,
};
use orbnet_transport::{LinkLayer, LinkOutcome, NetworkTopology};
use tracing::{debug, info, trace};

use crate::discovery::{BufferedRreqAttempt, DiscoveryEngine};
use crate::entry::RouteEntry;
use crate::error::{RoutingError, RoutingResult};
use crate::layer::NetworkLayer;
use crate::params::{AodvConfig, AodvParameters};
use crate::table::RoutingTable;

/// AODV routing layer of a single node
pub struct AodvRouter<T: NetworkTopology> {
    local: NodeAddress,
    link: LinkLayer<T>,
    table: RoutingTable,
    discovery: DiscoveryEngine,
    /// DATA waiting for a route discovery to finish
    parked: Vec<Message>,
    params: AodvParameters,
    config: AodvConfig,
    /// TTL stamped on originated messages
    ttl: i32,
    clock: VirtualClock,
    stats: Arc<dyn StatisticsSink>,
}

impl<T: NetworkTopology> AodvRouter<T> {
    /// Create a router on top of `link`
    ///
    /// Statistics go to the sink of the link's medium.
    pub fn new(link: LinkLayer<T>, clock: VirtualClock, params: AodvParameters, config: AodvConfig) -> Self {
        let local = link.address().clone();
        let stats = Arc::clone(link.medium().stats());
        Self {
            table: RoutingTable::new(local.clone(), clock.clone(), &params),
            discovery: DiscoveryEngine::new(local.clone(), clock.clone(), params, config),
            ttl: config.effective_ttl(&params),
            local,
            link,
            parked: Vec::new(),
            params,
            config,
            clock,
            stats,
        }
    }

    pub fn table(&self) -> &RoutingTable {
        &self.table
    }

    pub fn discovery(&self) -> &DiscoveryEngine {
        &self.discovery
    }

    /// DATA messages waiting for a route
    pub fn parked(&self) -> &[Message] {
        &self.parked
    }

    pub fn params(&self) -> &AodvParameters {
        &self.params
    }

    fn broadcast() -> NodeAddress {
        NodeAddress::broadcast()
    }

    /// Hand a control message to the link layer
    ///
    /// A unicast toward a vanished neighbor is dropped and answered with a
    /// broadcast RERR naming that neighbor.
    fn send_control(&mut self, message: Message, next_hop: &NodeAddress) -> RoutingResult<()> {
        if message.is_data() {
            return Err(RoutingError::ControlOnly);
        }

        self.stats.control_sent(&message);
        match self.link.send(&message, next_hop)? {
            LinkOutcome::Delivered | LinkOutcome::TtlExpired => Ok(()),
            LinkOutcome::NextHopNotFound { message, missing } => {
                self.stats.control_dropped(&message, DropReason::NextHopUnavailable);
                let sequence = self.table.get(&missing).map_or(0, |entry| entry.sequence);
                let rerr = Message::new(
                    Payload::Rerr(Rerr::new(vec![UnreachableDestination::new(missing, sequence)])),
                    Self::broadcast(),
                    self.local.clone(),
                    self.ttl,
                );
                self.send_control(rerr, &Self::broadcast())
            }
        }
    }

    /// Hand a DATA message to the link layer
    ///
    /// When the next hop has vanished, every route through it is invalidated
    /// and the precursors of the first lost destination are notified.
    fn transmit_data(&mut self, message: Message, next_hop: &NodeAddress) -> RoutingResult<()> {
        match self.link.send(&message, next_hop)? {
            LinkOutcome::Delivered | LinkOutcome::TtlExpired => Ok(()),
            LinkOutcome::NextHopNotFound { message, missing } => {
                self.stats.data_dropped(&message, DropReason::NextHopUnavailable);
                let lost = self.table.handle_unreachable(&missing);
                self.report_lost_routes(lost)
            }
        }
    }

    fn report_lost_routes(&mut self, lost: Vec<UnreachableDestination>) -> RoutingResult<()> {
        let Some(first) = lost.first() else {
            return Ok(());
        };
        let precursors = self
            .table
            .get(&first.address)
            .map(|entry| entry.precursors.clone())
            .unwrap_or_default();

        for precursor in precursors {
            let rerr = Message::new(
                Payload::Rerr(Rerr::new(lost.clone())),
                precursor.clone(),
                self.local.clone(),
                self.ttl,
            );
            self.send_control(rerr, &precursor)?;
        }
        Ok(())
    }

    /// Forward DATA that is not addressed to this node
    fn forward_data(&mut self, message: Message) -> RoutingResult<()> {
        if self.table.active_route_exists(&message.destination) {
            return self.send_data_message(message);
        }

        debug!(
            node = %self.local,
            dest = %message.destination,
            prev = %message.previous_hop,
            "No active route for transit DATA"
        );
        self.stats.data_dropped(&message, DropReason::NoActiveForwardingRoute);

        let sequence = self.table.get(&message.destination).map_or(0, |entry| entry.sequence);
        let rerr = Message::new(
            Payload::Rerr(Rerr::new(vec![UnreachableDestination::new(
                message.destination.clone(),
                sequence,
            )])),
            message.previous_hop.clone(),
            self.local.clone(),
            self.ttl,
        );
        self.send_control(rerr, &message.previous_hop)
    }

    /// Resend parked DATA whose destination now has an active route
    fn retry_parked(&mut self) -> RoutingResult<()> {
        let parked = mem::take(&mut self.parked);
        let table = &self.table;
        let (ready, waiting): (Vec<_>, Vec<_>) = parked
            .into_iter()
            .partition(|message| table.active_route_exists(&message.destination));
        self.parked = waiting;

        for message in ready {
            trace!(node = %self.local, dest = %message.destination, "Sending parked DATA");
            self.send_data_message(message)?;
        }
        Ok(())
    }

    /// Drop parked DATA for a destination that was declared unreachable
    fn drop_parked(&mut self, destination: &NodeAddress) {
        let parked = mem::take(&mut self.parked);
        let (dropped, kept): (Vec<_>, Vec<_>) = parked
            .into_iter()
            .partition(|message| &message.destination == destination);
        self.parked = kept;

        for message in &dropped {
            self.stats.data_dropped(message, DropReason::DestinationUnreachable);
        }
        if !dropped.is_empty() {
            debug!(
                node = %self.local,
                dest = %destination,
                count = dropped.len(),
                "Dropped parked DATA"
            );
        }
    }

    /// Create or refresh the one-hop route to the neighbor that sent a message
    ///
    /// An existing entry keeps its sequence number and precursors. A new
    /// entry is seeded with `precursor` when given.
    fn refresh_neighbor_route(&mut self, neighbor: &NodeAddress, precursor: Option<NodeAddress>) {
        let expires_at = self.clock.future(self.params.active_route_timeout);
        match self.table.get(neighbor).cloned() {
            Some(mut entry) => {
                entry.expires_at = expires_at;
                entry.valid = true;
                entry.hop_count = 1;
                entry.next_hop = neighbor.clone();
                self.table.update_entry(entry);
            }
            None => {
                let mut entry = RouteEntry::neighbor(neighbor.clone(), expires_at);
                if let Some(precursor) = precursor {
                    entry.add_precursor(precursor);
                }
                self.table.add_entry(entry);
            }
        }
    }

    fn handle_control(&mut self, message: Message) -> RoutingResult<()> {
        match &message.payload {
            Payload::Rreq(rreq) => {
                let rreq = rreq.clone();
                self.handle_rreq(&message, rreq)
            }
            Payload::Rrep(rrep) => {
                let rrep = rrep.clone();
                self.handle_rrep(&message, rrep)
            }
            Payload::Rerr(rerr) => {
                let rerr = rerr.clone();
                self.handle_rerr(&message, rerr)
            }
            Payload::Hello(hello) => {
                let hello = hello.clone();
                self.handle_hello(&message, hello);
                Ok(())
            }
            Payload::RrepAck => Err(RoutingError::Unsupported(MessageKind::RrepAck)),
            Payload::Data(_) => Err(RoutingError::ControlOnly),
        }
    }

    fn handle_rreq(&mut self, incoming: &Message, mut rreq: Rreq) -> RoutingResult<()> {
        let previous_hop = incoming.previous_hop.clone();

        if rreq.originator == self.local || self.discovery.attempt_exists(&rreq.destination, &rreq.originator) {
            trace!(
                node = %self.local,
                dest = %rreq.destination,
                originator = %rreq.originator,
                "Duplicate RREQ ignored"
            );
            return Ok(());
        }

        let now = self.clock.now();
        self.discovery.add_attempt(BufferedRreqAttempt::new(
            rreq.clone(),
            now + self.params.path_discovery_time,
        ));
        self.refresh_neighbor_route(&previous_hop, None);

        rreq.hop_count += 1;

        // reverse route toward the originator
        let minimal = self.params.minimal_lifetime(now, rreq.hop_count);
        match self.table.get(&rreq.originator).cloned() {
            Some(mut entry) => {
                entry.sequence = entry.sequence.max(rreq.originator_seq);
                entry.valid_sequence = true;
                entry.next_hop = previous_hop.clone();
                entry.hop_count = rreq.hop_count;
                entry.valid = true;
                entry.expires_at = entry.expires_at.max(minimal);
                self.table.update_entry(entry);
            }
            None => self.table.add_entry(RouteEntry {
                destination: rreq.originator.clone(),
                sequence: rreq.originator_seq,
                valid_sequence: true,
                hop_count: rreq.hop_count,
                next_hop: previous_hop.clone(),
                valid: true,
                expires_at: minimal,
                precursors: Vec::new(),
            }),
        }

        if rreq.destination == self.local {
            if rreq.destination_seq == self.table.sequence_number() + 1 {
                self.table.next_sequence_number();
            }
            let rrep = Rrep::new(
                0,
                self.local.clone(),
                self.table.sequence_number(),
                rreq.originator.clone(),
                now + self.params.my_route_timeout,
            );
            debug!(node = %self.local, originator = %rreq.originator, "Replying to RREQ as destination");
            let reply = Message::new(Payload::Rrep(rrep), rreq.originator, self.local.clone(), self.ttl);
            return self.send_control(reply, &previous_hop);
        }

        let fresh_route = self
            .table
            .get(&rreq.destination)
            .filter(|entry| {
                !rreq.destination_only
                    && entry.valid
                    && entry.valid_sequence
                    && entry.sequence >= rreq.destination_seq
            })
            .cloned();

        if let Some(forward) = fresh_route {
            return self.reply_as_intermediate(rreq, forward, previous_hop);
        }

        let known = self.table.get(&rreq.destination).map_or(-1, |entry| entry.sequence);
        rreq.destination_seq = rreq.destination_seq.max(known);

        trace!(
            node = %self.local,
            dest = %rreq.destination,
            hops = rreq.hop_count,
            "Rebroadcasting RREQ"
        );
        let mut outgoing = incoming.clone();
        outgoing.payload = Payload::Rreq(rreq);
        outgoing.destination = Self::broadcast();
        self.send_control(outgoing, &Self::broadcast())
    }

    /// Answer a RREQ from a fresh enough route of our own
    fn reply_as_intermediate(&mut self, rreq: Rreq, forward: RouteEntry, previous_hop: NodeAddress) -> RoutingResult<()> {
        let rrep = Rrep::new(
            forward.hop_count,
            rreq.destination.clone(),
            forward.sequence,
            rreq.originator.clone(),
            forward.expires_at,
        );
        self.table.add_precursor(&rreq.destination, previous_hop.clone())?;
        self.table.add_precursor(&rreq.originator, forward.next_hop.clone())?;

        debug!(
            node = %self.local,
            dest = %rreq.destination,
            originator = %rreq.originator,
            "Replying to RREQ from own route"
        );
        let reply = Message::new(
            Payload::Rrep(rrep),
            rreq.originator.clone(),
            self.local.clone(),
            self.ttl,
        );
        self.send_control(reply, &previous_hop)?;

        if rreq.gratuitous {
            let reverse = self.table.require(&rreq.originator)?.clone();
            let gratuitous = Rrep::new(
                reverse.hop_count,
                rreq.originator.clone(),
                rreq.originator_seq,
                rreq.destination.clone(),
                reverse.expires_at,
            );
            let message = Message::new(
                Payload::Rrep(gratuitous),
                rreq.destination,
                self.local.clone(),
                self.ttl,
            );
            self.send_control(message, &forward.next_hop)?;
        }
        Ok(())
    }

    fn handle_rrep(&mut self, incoming: &Message, mut rrep: Rrep) -> RoutingResult<()> {
        let previous_hop = incoming.previous_hop.clone();
        let toward_originator = self.table.get(&rrep.originator).map(|entry| entry.next_hop.clone());
        self.refresh_neighbor_route(&previous_hop, toward_originator);

        rrep.hop_count += 1;

        match self.table.get(&rrep.destination).cloned() {
            None => self.table.add_entry(RouteEntry {
                destination: rrep.destination.clone(),
                sequence: rrep.destination_seq,
                valid_sequence: true,
                hop_count: rrep.hop_count,
                next_hop: previous_hop.clone(),
                valid: true,
                expires_at: rrep.lifetime,
                precursors: Vec::new(),
            }),
            Some(mut entry) => {
                let same_sequence = rrep.destination_seq == entry.sequence;
                let update = !entry.valid_sequence
                    || rrep.destination_seq > entry.sequence
                    || (same_sequence && !entry.valid)
                    || (same_sequence && rrep.hop_count < entry.hop_count);

                if update {
                    entry.valid = true;
                    entry.valid_sequence = true;
                    entry.sequence = rrep.destination_seq;
                    entry.next_hop = previous_hop.clone();
                    entry.hop_count = rrep.hop_count;
                    entry.expires_at = rrep.lifetime;
                    self.table.update_entry(entry);
                }
            }
        }

        self.discovery.remove_local_attempt(&rrep.destination);

        if rrep.originator == self.local {
            info!(
                node = %self.local,
                dest = %rrep.destination,
                hops = rrep.hop_count,
                "Route discovered"
            );
            return Ok(());
        }

        if !self.table.active_route_exists(&rrep.originator) {
            self.stats.control_dropped(incoming, DropReason::NoActiveForwardingRoute);
            let rerr = Message::new(
                Payload::Rerr(Rerr::new(vec![UnreachableDestination::new(rrep.originator, 0)])),
                previous_hop.clone(),
                self.local.clone(),
                self.ttl,
            );
            return self.send_control(rerr, &previous_hop);
        }

        let mut reverse = self.table.require(&rrep.originator)?.clone();
        self.table.add_precursor(&rrep.destination, reverse.next_hop.clone())?;
        reverse.expires_at = reverse
            .expires_at
            .max(self.clock.future(self.params.active_route_timeout));
        let next_hop = reverse.next_hop.clone();
        self.table.update_entry(reverse);

        let mut outgoing = incoming.clone();
        outgoing.payload = Payload::Rrep(rrep);
        self.send_control(outgoing, &next_hop)
    }

    fn handle_rerr(&mut self, incoming: &Message, rerr: Rerr) -> RoutingResult<()> {
        let previous_hop = &incoming.previous_hop;
        let mut lost = Vec::new();

        for unreachable in &rerr.destinations {
            let Some(entry) = self.table.get(&unreachable.address) else {
                continue;
            };
            if !entry.valid || &entry.next_hop != previous_hop {
                continue;
            }
            lost.push(UnreachableDestination::new(entry.destination.clone(), entry.sequence));
            self.table.update_sequence(&unreachable.address, unreachable.sequence)?;
            self.table.invalidate(&unreachable.address)?;
        }

        // forward to the first precursor of the lost route with the most precursors
        let mut most = 0;
        let mut target = None;
        for unreachable in &lost {
            if let Some(entry) = self.table.get(&unreachable.address) {
                if entry.precursors.len() > most {
                    most = entry.precursors.len();
                    target = entry.precursors.first().cloned();
                }
            }
        }

        let Some(precursor) = target else {
            return Ok(());
        };
        debug!(
            node = %self.local,
            precursor = %precursor,
            lost = lost.len(),
            "Forwarding RERR"
        );
        let message = Message::new(Payload::Rerr(rerr), precursor.clone(), self.local.clone(), self.ttl);
        self.send_control(message, &precursor)
    }

    fn handle_hello(&mut self, incoming: &Message, hello: Hello) {
        let precursors = self
            .table
            .get(&hello.destination)
            .map(|entry| entry.precursors.clone())
            .unwrap_or_default();
        let entry = RouteEntry {
            destination: hello.destination.clone(),
            sequence: hello.destination_seq,
            valid_sequence: true,
            hop_count: 1,
            next_hop: incoming.previous_hop.clone(),
            valid: true,
            expires_at: hello.lifetime,
            precursors,
        };

        if self.table.route_exists(&hello.destination) {
            self.table.update_entry(entry);
        } else {
            self.table.add_entry(entry);
        }
        trace!(node = %self.local, from = %hello.destination, "Processed HELLO");
    }
}

impl<T: NetworkTopology> NetworkLayer for AodvRouter<T> {
    fn local_address(&self) -> &NodeAddress {
        &self.local
    }

    fn perform_maintenance(&mut self) -> RoutingResult<()> {
        for destination in self.discovery.reap_exhausted_or_foreign() {
            self.drop_parked(&destination);
        }

        for rreq in self.discovery.refresh_expired_attempts(&mut self.table) {
            self.send_control(rreq, &Self::broadcast())?;
        }

        let (invalidated, deleted) = self.table.invalidate_or_remove_expired();
        if invalidated + deleted > 0 {
            trace!(node = %self.local, invalidated, deleted, "Expired routes processed");
        }

        if self.config.use_hello {
            let hello = Hello {
                destination: self.local.clone(),
                destination_seq: self.table.sequence_number(),
                lifetime: self.clock.future(self.params.hello_lifetime()),
            };
            let message = Message::new(Payload::Hello(hello), Self::broadcast(), self.local.clone(), 1);
            self.send_control(message, &Self::broadcast())?;
        }
        Ok(())
    }

    fn get_incoming_message(&mut self) -> RoutingResult<Option<Message>> {
        let Some(message) = self.link.incoming() else {
            return Ok(None);
        };

        if message.is_data() {
            if message.destination == self.local || message.destination.is_broadcast() {
                return Ok(Some(message));
            }
            self.forward_data(message)?;
            return Ok(None);
        }

        self.stats.control_received(&message);
        self.handle_control(message)?;
        if !self.parked.is_empty() {
            self.retry_parked()?;
        }
        Ok(None)
    }

    fn incoming_count(&self) -> usize {
        self.link.incoming_count()
    }

    fn send_data_message(&mut self, message: Message) -> RoutingResult<()> {
        if !message.is_data() {
            return Err(RoutingError::DataOnly(message.kind()));
        }

        if message.destination.is_broadcast() {
            return self.transmit_data(message, &Self::broadcast());
        }

        let destination = message.destination.clone();
        if self.table.active_route_exists(&destination) {
            let next_hop = self.table.require(&destination)?.next_hop.clone();
            self.table.touch(&destination);
            self.table.touch(&next_hop);
            if message.source != self.local {
                self.table.touch(&message.source);
            }
            if message.previous_hop != self.local {
                self.table.touch(&message.previous_hop);
            }
            return self.transmit_data(message, &next_hop);
        }

        let in_flight = self.discovery.get_attempt(&destination, &self.local).is_some();
        self.parked.push(message);
        if in_flight {
            trace!(node = %self.local, dest = %destination, "DATA parked behind running discovery");
            return Ok(());
        }

        if let Some(rreq) = self.discovery.generate_discovery(&destination, &mut self.table) {
            self.stats.discovery_started();
            self.send_control(rreq, &Self::broadcast())?;
        }
        Ok(())
    }

    fn routes(&self) -> Vec<RouteEntry> {
        self.table.entries().cloned().collect()
    }
}
