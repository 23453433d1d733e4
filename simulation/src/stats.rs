//! Statistics collection
//!
//! [`StatsCollector`] is the [`StatisticsSink`] installed on the medium and
//! every routing layer of a run. It only accumulates; nothing in the
//! protocol reads the counters back.

use std::collections::BTreeMap;

use orbnet_core::{DropReason, Message, MessageKind, StatisticsSink};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Raw counters of one simulation run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimStats {
    // Link layer, all kinds
    pub link_sent: u64,
    pub link_received: u64,
    pub link_dropped: u64,
    pub link_bytes_sent: u64,
    pub link_bytes_received: u64,
    pub link_bytes_dropped: u64,
    pub ttl_expired: BTreeMap<MessageKind, u64>,

    // DATA
    pub data_sent: u64,
    pub data_delivered: u64,
    pub data_bytes_sent: u64,
    pub data_bytes_delivered: u64,
    pub data_dropped_destination_unreachable: u64,
    pub data_dropped_no_active_route: u64,
    pub data_dropped_next_hop_unavailable: u64,
    pub data_dropped_link: u64,

    // Routing protocol
    pub control_sent: BTreeMap<MessageKind, u64>,
    pub control_received: BTreeMap<MessageKind, u64>,
    pub control_dropped_no_active_route: u64,
    pub control_dropped_next_hop_unavailable: u64,
    pub rreqs_generated: u64,

    // Delivered DATA samples
    pub total_hops: u64,
    pub total_delay_ms: f64,
}

fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

impl SimStats {
    /// DATA messages dropped for any reason, TTL expiry included
    pub fn data_dropped(&self) -> u64 {
        self.data_dropped_destination_unreachable
            + self.data_dropped_no_active_route
            + self.data_dropped_next_hop_unavailable
            + self.data_dropped_link
            + self.ttl_expired_of(MessageKind::Data)
    }

    pub fn ttl_expired_of(&self, kind: MessageKind) -> u64 {
        self.ttl_expired.get(&kind).copied().unwrap_or(0)
    }

    pub fn control_sent_total(&self) -> u64 {
        self.control_sent.values().sum()
    }

    /// Delivered over generated DATA messages
    pub fn delivery_rate(&self) -> f64 {
        ratio(self.data_delivered, self.data_sent)
    }

    /// Delivered DATA over every message received on any link
    pub fn goodput(&self) -> f64 {
        ratio(self.data_delivered, self.link_received)
    }

    pub fn mean_hop_count(&self) -> f64 {
        ratio(self.total_hops, self.data_delivered)
    }

    pub fn mean_end_to_end_delay_ms(&self) -> f64 {
        if self.data_delivered == 0 {
            0.0
        } else {
            self.total_delay_ms / self.data_delivered as f64
        }
    }
}

fn bump(map: &mut BTreeMap<MessageKind, u64>, kind: MessageKind) {
    *map.entry(kind).or_insert(0) += 1;
}

/// State of the run at one point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub minutes: f64,
    pub delivery_rate: f64,
    pub goodput: f64,
    /// Discoveries started since the previous snapshot
    pub rreqs_generated: u64,
}

#[derive(Debug, Default)]
struct CollectorState {
    stats: SimStats,
    rreqs_at_last_snapshot: u64,
}

/// Thread-safe statistics sink
#[derive(Debug, Default)]
pub struct StatsCollector {
    state: Mutex<CollectorState>,
}

impl StatsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the counters so far
    pub fn stats(&self) -> SimStats {
        self.state.lock().stats.clone()
    }

    pub fn snapshot(&self, minutes: f64) -> Snapshot {
        let mut state = self.state.lock();
        let total = state.stats.rreqs_generated;
        let rreqs = total - state.rreqs_at_last_snapshot;
        state.rreqs_at_last_snapshot = total;
        Snapshot {
            minutes,
            delivery_rate: state.stats.delivery_rate(),
            goodput: state.stats.goodput(),
            rreqs_generated: rreqs,
        }
    }

    pub fn reset(&self) {
        *self.state.lock() = CollectorState::default();
    }
}

impl StatisticsSink for StatsCollector {
    fn link_sent(&self, message: &Message) {
        let mut state = self.state.lock();
        let stats = &mut state.stats;
        stats.link_sent += 1;
        stats.link_bytes_sent += message.size() as u64;
    }

    fn link_received(&self, message: &Message) {
        let mut state = self.state.lock();
        let stats = &mut state.stats;
        stats.link_received += 1;
        stats.link_bytes_received += message.size() as u64;
    }

    fn link_dropped(&self, message: &Message) {
        let mut state = self.state.lock();
        let stats = &mut state.stats;
        stats.link_dropped += 1;
        stats.link_bytes_dropped += message.size() as u64;
        if message.is_data() {
            stats.data_dropped_link += 1;
        }
    }

    fn ttl_expired(&self, message: &Message) {
        bump(&mut self.state.lock().stats.ttl_expired, message.kind());
    }

    fn data_sent(&self, message: &Message) {
        let mut state = self.state.lock();
        let stats = &mut state.stats;
        stats.data_sent += 1;
        stats.data_bytes_sent += message.payload.size() as u64;
    }

    fn data_delivered(&self, message: &Message) {
        let mut state = self.state.lock();
        let stats = &mut state.stats;
        stats.data_delivered += 1;
        stats.data_bytes_delivered += message.payload.size() as u64;
        stats.total_hops += u64::from(message.hop_count());
        stats.total_delay_ms += message.end_to_end_delay_ms();
    }

    fn data_dropped(&self, _message: &Message, reason: DropReason) {
        let mut state = self.state.lock();
        let stats = &mut state.stats;
        match reason {
            DropReason::DestinationUnreachable => stats.data_dropped_destination_unreachable += 1,
            DropReason::NoActiveForwardingRoute => stats.data_dropped_no_active_route += 1,
            DropReason::NextHopUnavailable => stats.data_dropped_next_hop_unavailable += 1,
        }
    }

    fn control_sent(&self, message: &Message) {
        bump(&mut self.state.lock().stats.control_sent, message.kind());
    }

    fn control_received(&self, message: &Message) {
        bump(&mut self.state.lock().stats.control_received, message.kind());
    }

    fn control_dropped(&self, _message: &Message, reason: DropReason) {
        let mut state = self.state.lock();
        let stats = &mut state.stats;
        match reason {
            DropReason::NextHopUnavailable => stats.control_dropped_next_hop_unavailable += 1,
            _ => stats.control_dropped_no_active_route += 1,
        }
    }

    fn discovery_started(&self) {
        self.state.lock().stats.rreqs_generated += 1;
    }
}

/// Headline figures of a run, or the mean over several runs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub data_sent: f64,
    pub data_delivered: f64,
    pub data_dropped: f64,
    pub delivery_rate: f64,
    pub goodput: f64,
    pub mean_hop_count: f64,
    pub mean_end_to_end_delay_ms: f64,
    pub control_sent: f64,
    pub rreqs_generated: f64,
    pub link_sent: f64,
    pub link_received: f64,
    pub link_dropped: f64,
}

impl From<&SimStats> for RunSummary {
    fn from(stats: &SimStats) -> Self {
        Self {
            data_sent: stats.data_sent as f64,
            data_delivered: stats.data_delivered as f64,
            data_dropped: stats.data_dropped() as f64,
            delivery_rate: stats.delivery_rate(),
            goodput: stats.goodput(),
            mean_hop_count: stats.mean_hop_count(),
            mean_end_to_end_delay_ms: stats.mean_end_to_end_delay_ms(),
            control_sent: stats.control_sent_total() as f64,
            rreqs_generated: stats.rreqs_generated as f64,
            link_sent: stats.link_sent as f64,
            link_received: stats.link_received as f64,
            link_dropped: stats.link_dropped as f64,
        }
    }
}

impl RunSummary {
    /// Field-wise mean; an empty slice gives all zeros
    pub fn average(runs: &[RunSummary]) -> RunSummary {
        if runs.is_empty() {
            return RunSummary::default();
        }
        let n = runs.len() as f64;
        let mean = |field: fn(&RunSummary) -> f64| runs.iter().map(field).sum::<f64>() / n;
        RunSummary {
            data_sent: mean(|r| r.data_sent),
            data_delivered: mean(|r| r.data_delivered),
            data_dropped: mean(|r| r.data_dropped),
            delivery_rate: mean(|r| r.delivery_rate),
            goodput: mean(|r| r.goodput),
            mean_hop_count: mean(|r| r.mean_hop_count),
            mean_end_to_end_delay_ms: mean(|r| r.mean_end_to_end_delay_ms),
            control_sent: mean(|r| r.control_sent),
            rreqs_generated: mean(|r| r.rreqs_generated),
            link_sent: mean(|r| r.link_sent),
            link_received: mean(|r| r.link_received),
            link_dropped: mean(|r| r.link_dropped),
        }
    }
}
