//! Route discovery retry engine
//!
//! Tracks RREQs in flight, keyed by (destination, originator). Attempts
//! originated locally drive the expanding ring search: each expiry doubles
//! the wait and widens the TTL until it saturates at the network diameter.
//! Attempts originated elsewhere only suppress duplicate forwarding and are
//! dropped once they expire.

use chrono::{DateTime, Utc};
use orbnet_core::{Clock, Message, NodeAddress, Payload, Rreq, VirtualClock};
use tracing::{debug, info};

use crate::params::{AodvConfig, AodvParameters};
use crate::table::RoutingTable;

/// A RREQ waiting for its reply
#[derive(Debug, Clone, PartialEq)]
pub struct BufferedRreqAttempt {
    pub attempt: u32,
    /// Attempts whose TTL saturated at the network diameter
    pub retries: u32,
    pub expires_at: DateTime<Utc>,
    pub rreq: Rreq,
}

impl BufferedRreqAttempt {
    pub fn new(rreq: Rreq, expires_at: DateTime<Utc>) -> Self {
        Self {
            attempt: 0,
            retries: 0,
            expires_at,
            rreq,
        }
    }

    pub fn destination(&self) -> &NodeAddress {
        &self.rreq.destination
    }

    pub fn originator(&self) -> &NodeAddress {
        &self.rreq.originator
    }

    fn matches(&self, destination: &NodeAddress, originator: &NodeAddress) -> bool {
        self.destination() == destination && self.originator() == originator
    }
}

/// Buffered RREQ attempts of one node
#[derive(Debug, Clone)]
pub struct DiscoveryEngine {
    local: NodeAddress,
    attempts: Vec<BufferedRreqAttempt>,
    clock: VirtualClock,
    params: AodvParameters,
    config: AodvConfig,
}

impl DiscoveryEngine {
    pub fn new(local: NodeAddress, clock: VirtualClock, params: AodvParameters, config: AodvConfig) -> Self {
        Self {
            local,
            attempts: Vec::new(),
            clock,
            params,
            config,
        }
    }

    pub fn attempt_exists(&self, destination: &NodeAddress, originator: &NodeAddress) -> bool {
        self.attempts.iter().any(|a| a.matches(destination, originator))
    }

    pub fn get_attempt(&self, destination: &NodeAddress, originator: &NodeAddress) -> Option<&BufferedRreqAttempt> {
        self.attempts.iter().find(|a| a.matches(destination, originator))
    }

    /// Buffer an attempt, replacing any prior attempt for the same pair
    pub fn add_attempt(&mut self, attempt: BufferedRreqAttempt) {
        let (destination, originator) = (attempt.destination().clone(), attempt.originator().clone());
        match self.attempts.iter_mut().find(|a| a.matches(&destination, &originator)) {
            Some(existing) => *existing = attempt,
            None => self.attempts.push(attempt),
        }
    }

    /// Drop the locally originated attempt for `destination`
    pub fn remove_local_attempt(&mut self, destination: &NodeAddress) {
        let local = &self.local;
        self.attempts.retain(|a| !a.matches(destination, local));
    }

    pub fn attempts(&self) -> &[BufferedRreqAttempt] {
        &self.attempts
    }

    pub fn len(&self) -> usize {
        self.attempts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }

    /// Re-issue every expired local attempt
    ///
    /// Each refreshed attempt waits `2^attempt * NET_TRAVERSAL_TIME` and gets
    /// a fresh RREQ id. Once the ring TTL passes `TTL_THRESHOLD` it is
    /// clamped to the network diameter and counts as a retry.
    pub fn refresh_expired_attempts(&mut self, table: &mut RoutingTable) -> Vec<Message> {
        let now = self.clock.now();
        let mut resend = Vec::new();

        for attempt in self.attempts.iter_mut() {
            if attempt.originator() != &self.local || now <= attempt.expires_at {
                continue;
            }

            attempt.attempt += 1;
            attempt.expires_at = now + self.params.discovery_backoff(attempt.attempt);
            attempt.rreq.rreq_id = table.next_rreq_id();

            let mut ttl = self.params.ring_ttl(attempt.attempt);
            if ttl > self.params.ttl_threshold {
                attempt.retries += 1;
                ttl = self.params.net_diameter;
            }

            // keep a stale route alive while its discovery is running
            table.hold_until(attempt.destination(), now + self.params.net_traversal_time * 2);

            debug!(
                node = %self.local,
                dest = %attempt.destination(),
                attempt = attempt.attempt,
                retries = attempt.retries,
                ttl,
                "Retrying route discovery"
            );

            resend.push(Message::new(
                Payload::Rreq(attempt.rreq.clone()),
                NodeAddress::broadcast(),
                self.local.clone(),
                ttl,
            ));
        }

        resend
    }

    /// Remove exhausted local attempts and expired foreign ones
    ///
    /// Returns the destinations of exhausted local attempts; they are now
    /// considered unreachable.
    pub fn reap_exhausted_or_foreign(&mut self) -> Vec<NodeAddress> {
        let now = self.clock.now();
        let retries = self.params.rreq_retries;
        let local = &self.local;
        let mut unreachable = Vec::new();

        self.attempts.retain(|attempt| {
            if attempt.originator() == local {
                if attempt.retries >= retries {
                    unreachable.push(attempt.destination().clone());
                    return false;
                }
                true
            } else {
                now < attempt.expires_at
            }
        });

        for dest in &unreachable {
            info!(node = %self.local, dest = %dest, "Route discovery exhausted, destination unreachable");
        }
        unreachable
    }

    /// Start a discovery for `destination`
    ///
    /// Returns `None` while a live local attempt for the destination exists.
    /// Otherwise bumps the local sequence number, buffers the attempt, and
    /// returns the broadcast RREQ.
    pub fn generate_discovery(&mut self, destination: &NodeAddress, table: &mut RoutingTable) -> Option<Message> {
        let now = self.clock.now();
        if self
            .get_attempt(destination, &self.local)
            .is_some_and(|a| now < a.expires_at)
        {
            debug!(node = %self.local, dest = %destination, "Discovery already in flight");
            return None;
        }

        table.next_sequence_number();

        let stale = table.get(destination).map(|e| (e.sequence, e.hop_count));
        let rreq = Rreq {
            join: false,
            repair: false,
            gratuitous: self.config.gratuitous_rrep,
            destination_only: self.config.destination_only,
            unknown_sequence: stale.is_none(),
            hop_count: 0,
            rreq_id: table.next_rreq_id(),
            destination: destination.clone(),
            destination_seq: stale.map_or(0, |(sequence, _)| sequence),
            originator: self.local.clone(),
            originator_seq: table.sequence_number(),
        };

        let ttl = match stale {
            Some((_, hops)) => hops as i32 + self.params.ttl_increment,
            None => self.params.ttl_start,
        };

        if stale.is_some() {
            table.hold_until(destination, now + self.params.net_traversal_time * 2);
        }

        self.add_attempt(BufferedRreqAttempt::new(
            rreq.clone(),
            now + self.params.path_discovery_time,
        ));

        debug!(
            node = %self.local,
            dest = %destination,
            rreq_id = rreq.rreq_id,
            ttl,
            "Starting route discovery"
        );

        Some(Message::new(
            Payload::Rreq(rreq),
            NodeAddress::broadcast(),
            self.local.clone(),
            ttl,
        ))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::entry::RouteEntry;

    fn make_addr(s: &str) -> NodeAddress {
        NodeAddress::from(s)
    }

    // NET_DIAMETER 3, NET_TRAVERSAL_TIME 30s, PATH_DISCOVERY_TIME 60s
    fn make_params() -> AodvParameters {
        AodvParameters::new(30, 5, 4, 2, false)
    }

    fn make_engine() -> (DiscoveryEngine, RoutingTable, VirtualClock) {
        let clock = VirtualClock::new();
        let params = make_params();
        let engine = DiscoveryEngine::new(make_addr("A"), clock.clone(), params, AodvConfig::default());
        let table = RoutingTable::new(make_addr("A"), clock.clone(), &params);
        (engine, table, clock)
    }

    fn rreq_of(msg: &Message) -> &Rreq {
        match &msg.payload {
            Payload::Rreq(rreq) => rreq,
            other => panic!("expected RREQ, got {other:?}"),
        }
    }

    fn make_foreign_rreq(dest: &str, originator: &str) -> Rreq {
        Rreq {
            join: false,
            repair: false,
            gratuitous: false,
            destination_only: false,
            unknown_sequence: true,
            hop_count: 0,
            rreq_id: 1,
            destination: make_addr(dest),
            destination_seq: 0,
            originator: make_addr(originator),
            originator_seq: 1,
        }
    }

    #[test]
    fn test_generate_fresh_discovery() {
        let (mut engine, mut table, clock) = make_engine();
        let msg = engine.generate_discovery(&make_addr("B"), &mut table).unwrap();

        assert!(msg.destination.is_broadcast());
        assert_eq!(msg.ttl, 1);
        let rreq = rreq_of(&msg);
        assert!(rreq.unknown_sequence);
        assert_eq!(rreq.destination_seq, 0);
        assert_eq!(rreq.originator_seq, 1);
        assert_eq!(rreq.rreq_id, 1);
        assert_eq!(table.sequence_number(), 1);

        let attempt = engine.get_attempt(&make_addr("B"), &make_addr("A")).unwrap();
        assert_eq!(attempt.attempt, 0);
        assert_eq!(attempt.expires_at, clock.future(Duration::seconds(60)));
    }

    #[test]
    fn test_generate_twice_returns_none() {
        let (mut engine, mut table, _) = make_engine();
        assert!(engine.generate_discovery(&make_addr("B"), &mut table).is_some());
        assert!(engine.generate_discovery(&make_addr("B"), &mut table).is_none());
        assert_eq!(engine.len(), 1);
        assert_eq!(table.sequence_number(), 1);
    }

    #[test]
    fn test_generate_with_stale_entry() {
        let (mut engine, mut table, clock) = make_engine();
        table.add_entry(RouteEntry {
            destination: make_addr("B"),
            sequence: 7,
            valid_sequence: true,
            hop_count: 3,
            next_hop: make_addr("C"),
            valid: false,
            expires_at: clock.now(),
            precursors: Vec::new(),
        });

        let msg = engine.generate_discovery(&make_addr("B"), &mut table).unwrap();
        let rreq = rreq_of(&msg);
        assert!(!rreq.unknown_sequence);
        assert_eq!(rreq.destination_seq, 7);
        assert_eq!(msg.ttl, 5);
        assert_eq!(
            table.get(&make_addr("B")).unwrap().expires_at,
            clock.future(Duration::seconds(60))
        );
    }

    #[test]
    fn test_refresh_holds_stale_route() {
        let (mut engine, mut table, clock) = make_engine();
        table.add_entry(RouteEntry {
            destination: make_addr("B"),
            sequence: 7,
            valid_sequence: true,
            hop_count: 1,
            next_hop: make_addr("C"),
            valid: false,
            expires_at: clock.now(),
            precursors: Vec::new(),
        });
        engine.generate_discovery(&make_addr("B"), &mut table).unwrap();

        clock.advance_secs(61);
        assert_eq!(engine.refresh_expired_attempts(&mut table).len(), 1);
        assert_eq!(
            table.get(&make_addr("B")).unwrap().expires_at,
            clock.future(Duration::seconds(60))
        );
    }

    #[test]
    fn test_refresh_backs_off_exponentially() {
        let (mut engine, mut table, clock) = make_engine();
        engine.generate_discovery(&make_addr("B"), &mut table).unwrap();

        // not yet expired
        clock.advance_secs(60);
        assert!(engine.refresh_expired_attempts(&mut table).is_empty());

        clock.advance_secs(1);
        let resent = engine.refresh_expired_attempts(&mut table);
        assert_eq!(resent.len(), 1);
        assert_eq!(resent[0].ttl, 3);
        assert_eq!(rreq_of(&resent[0]).rreq_id, 2);

        let attempt = engine.get_attempt(&make_addr("B"), &make_addr("A")).unwrap();
        assert_eq!(attempt.attempt, 1);
        assert_eq!(attempt.retries, 0);
        // 2^1 * 30s
        assert_eq!(attempt.expires_at, clock.future(Duration::seconds(60)));

        clock.advance_secs(61);
        engine.refresh_expired_attempts(&mut table);
        let attempt = engine.get_attempt(&make_addr("B"), &make_addr("A")).unwrap();
        assert_eq!(attempt.attempt, 2);
        // 2^2 * 30s
        assert_eq!(attempt.expires_at, clock.future(Duration::seconds(120)));
    }

    #[test]
    fn test_retries_exhaust_to_unreachable() {
        let (mut engine, mut table, clock) = make_engine();
        engine.generate_discovery(&make_addr("B"), &mut table).unwrap();

        // TTLs 3, 5, 7 stay under the threshold; 9 and 11 saturate
        let mut ttls = Vec::new();
        for _ in 0..5 {
            clock.advance_secs(10_000);
            assert!(engine.reap_exhausted_or_foreign().is_empty());
            let resent = engine.refresh_expired_attempts(&mut table);
            ttls.push(resent[0].ttl);
        }
        assert_eq!(ttls, vec![3, 5, 7, 3, 3]);

        let unreachable = engine.reap_exhausted_or_foreign();
        assert_eq!(unreachable, vec![make_addr("B")]);
        assert!(engine.is_empty());
    }

    #[test]
    fn test_foreign_attempts_expire_silently() {
        let (mut engine, _, clock) = make_engine();
        let expires = clock.future(Duration::seconds(60));
        engine.add_attempt(BufferedRreqAttempt::new(make_foreign_rreq("B", "C"), expires));

        clock.advance_secs(59);
        assert!(engine.reap_exhausted_or_foreign().is_empty());
        assert!(engine.attempt_exists(&make_addr("B"), &make_addr("C")));

        clock.advance_secs(1);
        assert!(engine.reap_exhausted_or_foreign().is_empty());
        assert!(!engine.attempt_exists(&make_addr("B"), &make_addr("C")));
    }

    #[test]
    fn test_foreign_attempts_not_refreshed() {
        let (mut engine, mut table, clock) = make_engine();
        engine.add_attempt(BufferedRreqAttempt::new(make_foreign_rreq("B", "C"), clock.now()));
        clock.advance_secs(1);
        assert!(engine.refresh_expired_attempts(&mut table).is_empty());
    }

    #[test]
    fn test_add_attempt_replaces_pair() {
        let (mut engine, _, clock) = make_engine();
        engine.add_attempt(BufferedRreqAttempt::new(make_foreign_rreq("B", "C"), clock.now()));
        let mut second = make_foreign_rreq("B", "C");
        second.rreq_id = 9;
        engine.add_attempt(BufferedRreqAttempt::new(second, clock.now()));

        assert_eq!(engine.len(), 1);
        assert_eq!(engine.attempts()[0].rreq.rreq_id, 9);
    }

    #[test]
    fn test_remove_local_attempt_keeps_foreign() {
        let (mut engine, mut table, clock) = make_engine();
        engine.generate_discovery(&make_addr("B"), &mut table).unwrap();
        engine.add_attempt(BufferedRreqAttempt::new(make_foreign_rreq("B", "C"), clock.now()));

        engine.remove_local_attempt(&make_addr("B"));
        assert!(!engine.attempt_exists(&make_addr("B"), &make_addr("A")));
        assert!(engine.attempt_exists(&make_addr("B"), &make_addr("C")));
    }
}
