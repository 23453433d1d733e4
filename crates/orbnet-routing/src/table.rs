//! AODV routing table
//!
//! The [`RoutingTable`] holds at most one [`RouteEntry`] per destination,
//! plus the node's own sequence number and RREQ id counters.
//!
//! Expired routes go through two stages: a valid route past its expiration
//! is first invalidated (and given `DELETE_PERIOD` more time), and only an
//! invalid route past its expiration is deleted.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use orbnet_core::{Clock, NodeAddress, SequenceNumber, UnreachableDestination, VirtualClock};
use tracing::debug;

use crate::entry::RouteEntry;
use crate::error::{RoutingError, RoutingResult};
use crate::params::AodvParameters;

/// Per-node routing table
#[derive(Debug, Clone)]
pub struct RoutingTable {
    local: NodeAddress,
    entries: BTreeMap<NodeAddress, RouteEntry>,
    sequence_number: SequenceNumber,
    rreq_id: u32,
    clock: VirtualClock,
    active_route_timeout: Duration,
    delete_period: Duration,
}

impl RoutingTable {
    pub fn new(local: NodeAddress, clock: VirtualClock, params: &AodvParameters) -> Self {
        Self {
            local,
            entries: BTreeMap::new(),
            sequence_number: 0,
            rreq_id: 0,
            clock,
            active_route_timeout: params.active_route_timeout,
            delete_period: params.delete_period,
        }
    }

    pub fn local(&self) -> &NodeAddress {
        &self.local
    }

    pub fn route_exists(&self, dest: &NodeAddress) -> bool {
        self.entries.contains_key(dest)
    }

    pub fn active_route_exists(&self, dest: &NodeAddress) -> bool {
        self.entries.get(dest).is_some_and(|entry| entry.valid)
    }

    pub fn get(&self, dest: &NodeAddress) -> Option<&RouteEntry> {
        self.entries.get(dest)
    }

    /// Like [`get`](Self::get), for lookups the protocol guarantees to succeed
    pub fn require(&self, dest: &NodeAddress) -> RoutingResult<&RouteEntry> {
        self.entries
            .get(dest)
            .ok_or_else(|| RoutingError::MissingRoute(dest.clone()))
    }

    fn require_mut(&mut self, dest: &NodeAddress) -> RoutingResult<&mut RouteEntry> {
        self.entries
            .get_mut(dest)
            .ok_or_else(|| RoutingError::MissingRoute(dest.clone()))
    }

    /// Insert a new entry, replacing any existing one for the destination
    pub fn add_entry(&mut self, entry: RouteEntry) {
        debug!(
            node = %self.local,
            dest = %entry.destination,
            seq = entry.sequence,
            hops = entry.hop_count,
            next_hop = %entry.next_hop,
            valid = entry.valid,
            "Route added"
        );
        self.entries.insert(entry.destination.clone(), entry);
    }

    /// Replace every field of the entry for `entry.destination`
    pub fn update_entry(&mut self, entry: RouteEntry) {
        debug!(
            node = %self.local,
            dest = %entry.destination,
            seq = entry.sequence,
            hops = entry.hop_count,
            next_hop = %entry.next_hop,
            valid = entry.valid,
            "Route updated"
        );
        self.entries.insert(entry.destination.clone(), entry);
    }

    /// Mark a route valid for another `ACTIVE_ROUTE_TIMEOUT`
    pub fn set_active(&mut self, dest: &NodeAddress) -> RoutingResult<()> {
        let expires_at = self.clock.future(self.active_route_timeout);
        let entry = self.require_mut(dest)?;
        entry.valid = true;
        entry.expires_at = expires_at;
        Ok(())
    }

    /// Mark a route invalid; it is deleted after `DELETE_PERIOD`
    pub fn invalidate(&mut self, dest: &NodeAddress) -> RoutingResult<()> {
        let expires_at = self.clock.future(self.delete_period);
        let entry = self.require_mut(dest)?;
        entry.valid = false;
        entry.expires_at = expires_at;
        debug!(node = %self.local, dest = %dest, "Route invalidated");
        Ok(())
    }

    /// Extend a route's expiration to now + `ACTIVE_ROUTE_TIMEOUT`, never shrinking it
    ///
    /// Returns whether an entry for `dest` exists.
    pub fn touch(&mut self, dest: &NodeAddress) -> bool {
        let candidate = self.clock.future(self.active_route_timeout);
        match self.entries.get_mut(dest) {
            Some(entry) => {
                entry.expires_at = entry.expires_at.max(candidate);
                true
            }
            None => false,
        }
    }

    /// Set a route's expiration to `expires_at` if the route exists
    ///
    /// Returns whether an entry for `dest` exists.
    pub fn hold_until(&mut self, dest: &NodeAddress, expires_at: DateTime<Utc>) -> bool {
        match self.entries.get_mut(dest) {
            Some(entry) => {
                entry.expires_at = expires_at;
                true
            }
            None => false,
        }
    }

    pub fn add_precursor(&mut self, dest: &NodeAddress, precursor: NodeAddress) -> RoutingResult<()> {
        self.require_mut(dest)?.add_precursor(precursor);
        Ok(())
    }

    pub fn update_expiration(&mut self, dest: &NodeAddress, expires_at: DateTime<Utc>) -> RoutingResult<()> {
        self.require_mut(dest)?.expires_at = expires_at;
        Ok(())
    }

    pub fn update_sequence(&mut self, dest: &NodeAddress, sequence: SequenceNumber) -> RoutingResult<()> {
        self.require_mut(dest)?.sequence = sequence;
        Ok(())
    }

    /// Invalidate expired valid routes and delete expired invalid ones
    ///
    /// A route invalidated in this pass gets a fresh expiration, so it cannot
    /// also be deleted in the same pass. Returns (invalidated, deleted).
    pub fn invalidate_or_remove_expired(&mut self) -> (usize, usize) {
        let now = self.clock.now();
        let delete_at = now + self.delete_period;
        let mut invalidated = 0;
        let mut deleted = Vec::new();

        for (dest, entry) in self.entries.iter_mut() {
            if !entry.is_expired(now) {
                continue;
            }
            if entry.valid {
                entry.valid = false;
                entry.expires_at = delete_at;
                invalidated += 1;
                debug!(node = %self.local, dest = %dest, "Expired route invalidated");
            } else {
                deleted.push(dest.clone());
            }
        }

        for dest in &deleted {
            self.entries.remove(dest);
            debug!(node = %self.local, dest = %dest, "Expired route deleted");
        }

        (invalidated, deleted.len())
    }

    /// Invalidate every route through a neighbor that is no longer reachable
    ///
    /// Each record carries the sequence number the route held before this
    /// call. Valid routes then get their sequence number bumped before
    /// invalidation.
    pub fn handle_unreachable(&mut self, missing_next_hop: &NodeAddress) -> Vec<UnreachableDestination> {
        let delete_at = self.clock.future(self.delete_period);
        let mut unreachable = Vec::new();

        for (dest, entry) in self.entries.iter_mut() {
            if &entry.next_hop != missing_next_hop {
                continue;
            }
            unreachable.push(UnreachableDestination::new(dest.clone(), entry.sequence));
            if entry.valid {
                entry.sequence += 1;
            }
            entry.valid = false;
            entry.expires_at = delete_at;
        }

        if !unreachable.is_empty() {
            debug!(
                node = %self.local,
                missing = %missing_next_hop,
                count = unreachable.len(),
                "Routes lost with next hop"
            );
        }
        unreachable
    }

    pub fn sequence_number(&self) -> SequenceNumber {
        self.sequence_number
    }

    /// Increment and return the local sequence number
    pub fn next_sequence_number(&mut self) -> SequenceNumber {
        self.sequence_number += 1;
        self.sequence_number
    }

    /// Increment and return the RREQ id; the first id is 1
    pub fn next_rreq_id(&mut self) -> u32 {
        self.rreq_id += 1;
        self.rreq_id
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries in destination order
    pub fn entries(&self) -> impl Iterator<Item = &RouteEntry> {
        self.entries.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_addr(s: &str) -> NodeAddress {
        NodeAddress::from(s)
    }

    fn make_table() -> (RoutingTable, VirtualClock) {
        let clock = VirtualClock::new();
        // ART 30s, node traversal 5s: DELETE_PERIOD 150s
        let params = AodvParameters::new(30, 5, 4, 2, false);
        (RoutingTable::new(make_addr("A"), clock.clone(), &params), clock)
    }

    fn make_route(dest: &str, next_hop: &str, expires_at: DateTime<Utc>) -> RouteEntry {
        RouteEntry {
            destination: make_addr(dest),
            sequence: 4,
            valid_sequence: true,
            hop_count: 2,
            next_hop: make_addr(next_hop),
            valid: true,
            expires_at,
            precursors: Vec::new(),
        }
    }

    #[test]
    fn test_counters() {
        let (mut table, _) = make_table();
        assert_eq!(table.sequence_number(), 0);
        assert_eq!(table.next_sequence_number(), 1);
        assert_eq!(table.next_sequence_number(), 2);
        assert_eq!(table.next_rreq_id(), 1);
        assert_eq!(table.next_rreq_id(), 2);
    }

    #[test]
    fn test_route_existence() {
        let (mut table, clock) = make_table();
        let c = make_addr("C");
        assert!(!table.route_exists(&c));
        assert!(!table.active_route_exists(&c));

        table.add_entry(make_route("C", "B", clock.future(Duration::seconds(30))));
        assert!(table.active_route_exists(&c));

        table.invalidate(&c).unwrap();
        assert!(table.route_exists(&c));
        assert!(!table.active_route_exists(&c));
        assert_eq!(table.get(&c).unwrap().expires_at, clock.future(Duration::seconds(150)));
    }

    #[test]
    fn test_update_replaces_entry() {
        let (mut table, clock) = make_table();
        table.add_entry(make_route("C", "B", clock.now()));

        let mut replacement = make_route("C", "D", clock.now());
        replacement.precursors.push(make_addr("E"));
        table.update_entry(replacement);

        assert_eq!(table.len(), 1);
        let entry = table.get(&make_addr("C")).unwrap();
        assert_eq!(entry.next_hop, make_addr("D"));
        assert_eq!(entry.precursors, vec![make_addr("E")]);
    }

    #[test]
    fn test_expiry_invalidates_before_delete() {
        let (mut table, clock) = make_table();
        table.add_entry(make_route("C", "B", clock.future(Duration::seconds(10))));

        clock.advance_secs(10);
        assert_eq!(table.invalidate_or_remove_expired(), (1, 0));
        assert!(table.route_exists(&make_addr("C")));
        assert!(!table.active_route_exists(&make_addr("C")));

        clock.advance_secs(149);
        assert_eq!(table.invalidate_or_remove_expired(), (0, 0));

        clock.advance_secs(1);
        assert_eq!(table.invalidate_or_remove_expired(), (0, 1));
        assert!(table.is_empty());
    }

    #[test]
    fn test_invalid_expired_route_deleted() {
        let (mut table, clock) = make_table();
        table.add_entry(make_route("C", "B", clock.now()));
        table.invalidate(&make_addr("C")).unwrap();
        table.update_expiration(&make_addr("C"), clock.now()).unwrap();

        assert_eq!(table.invalidate_or_remove_expired(), (0, 1));
        assert!(!table.route_exists(&make_addr("C")));
    }

    #[test]
    fn test_handle_unreachable() {
        let (mut table, clock) = make_table();
        let later = clock.future(Duration::seconds(30));
        table.add_entry(make_route("B", "B", later));
        table.add_entry(make_route("C", "B", later));
        table.add_entry(make_route("D", "E", later));

        let mut stale = make_route("F", "B", later);
        stale.valid = false;
        table.add_entry(stale);

        let unreachable = table.handle_unreachable(&make_addr("B"));
        let listed: Vec<_> = unreachable.iter().map(|u| (u.address.as_str(), u.sequence)).collect();
        assert_eq!(listed, vec![("B", 4), ("C", 4), ("F", 4)]);

        assert!(!table.active_route_exists(&make_addr("C")));
        assert_eq!(table.get(&make_addr("B")).unwrap().sequence, 5);
        assert_eq!(table.get(&make_addr("C")).unwrap().sequence, 5);
        assert_eq!(table.get(&make_addr("F")).unwrap().sequence, 4);
        assert!(table.active_route_exists(&make_addr("D")));
    }

    #[test]
    fn test_hold_until() {
        let (mut table, clock) = make_table();
        table.add_entry(make_route("C", "B", clock.future(Duration::seconds(100))));
        let hold = clock.future(Duration::seconds(60));

        assert!(table.hold_until(&make_addr("C"), hold));
        assert_eq!(table.get(&make_addr("C")).unwrap().expires_at, hold);
        assert!(!table.hold_until(&make_addr("D"), hold));
        assert!(!table.route_exists(&make_addr("D")));
    }

    #[test]
    fn test_touch_never_shrinks() {
        let (mut table, clock) = make_table();
        let far = clock.future(Duration::seconds(100));
        table.add_entry(make_route("C", "B", far));
        assert!(table.touch(&make_addr("C")));
        assert_eq!(table.get(&make_addr("C")).unwrap().expires_at, far);

        table.update_expiration(&make_addr("C"), clock.now()).unwrap();
        table.touch(&make_addr("C"));
        assert_eq!(
            table.get(&make_addr("C")).unwrap().expires_at,
            clock.future(Duration::seconds(30))
        );
        assert!(!table.touch(&make_addr("Z")));
    }

    #[test]
    fn test_missing_route_errors() {
        let (mut table, _) = make_table();
        let z = make_addr("Z");
        assert!(matches!(table.set_active(&z), Err(RoutingError::MissingRoute(_))));
        assert!(table.add_precursor(&z, make_addr("A")).is_err());
        assert!(table.update_sequence(&z, 3).is_err());
        assert!(table.require(&z).is_err());
    }

    #[test]
    fn test_set_active_and_precursors() {
        let (mut table, clock) = make_table();
        let c = make_addr("C");
        let mut entry = make_route("C", "B", clock.now());
        entry.valid = false;
        table.add_entry(entry);

        table.set_active(&c).unwrap();
        table.add_precursor(&c, make_addr("X")).unwrap();
        table.add_precursor(&c, make_addr("X")).unwrap();
        table.update_sequence(&c, 9).unwrap();

        let entry = table.get(&c).unwrap();
        assert!(entry.valid);
        assert_eq!(entry.expires_at, clock.future(Duration::seconds(30)));
        assert_eq!(entry.precursors.len(), 1);
        assert_eq!(entry.sequence, 9);
    }
}
