//! AODV protocol constants
//!
//! [`AodvParameters`] derives every RFC 3561 timing constant from five
//! inputs: active route timeout, node traversal time, satellites per orbit,
//! orbit count, and whether cross-seam links exist. The network diameter
//! follows from the grid: half an orbit vertically plus either half the
//! orbits (with seam links) or all of them (without).

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Compute the network diameter of a constellation grid
pub fn net_diameter(sats_per_orbit: usize, orbits: usize, cross_seam: bool) -> i32 {
    let vertical = sats_per_orbit / 2;
    let horizontal = if cross_seam {
        orbits / 2
    } else {
        orbits.saturating_sub(1)
    };
    (vertical + horizontal) as i32
}

/// RFC 3561 constants for one constellation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AodvParameters {
    pub active_route_timeout: Duration,
    pub node_traversal_time: Duration,
    pub net_diameter: i32,
    pub net_traversal_time: Duration,
    pub path_discovery_time: Duration,
    pub delete_period: Duration,
    pub my_route_timeout: Duration,
    pub hello_interval: Duration,
    pub allowed_hello_loss: i32,
    pub rreq_retries: u32,
    pub rreq_rate_limit: u32,
    pub rerr_rate_limit: u32,
    pub ttl_start: i32,
    pub ttl_increment: i32,
    pub ttl_threshold: i32,
    pub timeout_buffer: i32,
    pub local_add_ttl: i32,
    pub min_repair_ttl: i32,
    pub max_repair_ttl: f64,
    pub blacklist_timeout: Duration,
    pub next_hop_wait: Duration,
}

impl AodvParameters {
    /// Derive the parameter set
    ///
    /// The node traversal time doubles as the HELLO interval since a node
    /// processes at most one step of a message per simulation tick.
    pub fn new(
        active_route_timeout_secs: i64,
        node_traversal_secs: i64,
        sats_per_orbit: usize,
        orbits: usize,
        cross_seam: bool,
    ) -> Self {
        let active_route_timeout = Duration::seconds(active_route_timeout_secs);
        let node_traversal_time = Duration::seconds(node_traversal_secs);
        let hello_interval = node_traversal_time;
        let diameter = net_diameter(sats_per_orbit, orbits, cross_seam);
        let net_traversal_time = node_traversal_time * 2 * diameter;
        let rreq_retries = 2;

        Self {
            active_route_timeout,
            node_traversal_time,
            net_diameter: diameter,
            net_traversal_time,
            path_discovery_time: net_traversal_time * 2,
            delete_period: active_route_timeout.max(hello_interval) * 5,
            my_route_timeout: active_route_timeout * 2,
            hello_interval,
            allowed_hello_loss: 2,
            rreq_retries,
            rreq_rate_limit: 10,
            rerr_rate_limit: 10,
            ttl_start: 1,
            ttl_increment: 2,
            ttl_threshold: 7,
            timeout_buffer: 0,
            local_add_ttl: 2,
            min_repair_ttl: 0,
            max_repair_ttl: 0.3 * f64::from(diameter),
            blacklist_timeout: net_traversal_time * rreq_retries as i32,
            next_hop_wait: node_traversal_time + Duration::seconds(10),
        }
    }

    /// Lifetime a reverse route must at least have after `hop_count` hops
    ///
    /// May lie in the past for long paths; callers take the max with any
    /// existing expiration.
    pub fn minimal_lifetime(&self, now: DateTime<Utc>, hop_count: u32) -> DateTime<Utc> {
        now + self.net_traversal_time * 2 - self.node_traversal_time * (2 * hop_count as i32)
    }

    /// Time a RREQ with `ttl` needs to travel out and back
    pub fn ring_traversal_time(&self, ttl: i32) -> Duration {
        self.node_traversal_time * 2 * (ttl + self.timeout_buffer)
    }

    /// How long a HELLO keeps the neighbor route alive
    pub fn hello_lifetime(&self) -> Duration {
        self.hello_interval * self.allowed_hello_loss
    }

    /// Binary exponential backoff for discovery attempt `attempt`
    pub fn discovery_backoff(&self, attempt: u32) -> Duration {
        self.net_traversal_time * 2_i32.saturating_pow(attempt)
    }

    /// TTL of the expanding ring search for `attempt`, before clamping
    pub fn ring_ttl(&self, attempt: u32) -> i32 {
        self.ttl_start + attempt as i32 * self.ttl_increment
    }
}

impl fmt::Display for AodvParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "NET_DIAMETER          {}", self.net_diameter)?;
        writeln!(f, "ACTIVE_ROUTE_TIMEOUT  {}s", self.active_route_timeout.num_seconds())?;
        writeln!(f, "NODE_TRAVERSAL_TIME   {}s", self.node_traversal_time.num_seconds())?;
        writeln!(f, "NET_TRAVERSAL_TIME    {}s", self.net_traversal_time.num_seconds())?;
        writeln!(f, "PATH_DISCOVERY_TIME   {}s", self.path_discovery_time.num_seconds())?;
        writeln!(f, "DELETE_PERIOD         {}s", self.delete_period.num_seconds())?;
        writeln!(f, "MY_ROUTE_TIMEOUT      {}s", self.my_route_timeout.num_seconds())?;
        writeln!(f, "HELLO_INTERVAL        {}s", self.hello_interval.num_seconds())?;
        writeln!(f, "ALLOWED_HELLO_LOSS    {}", self.allowed_hello_loss)?;
        writeln!(f, "RREQ_RETRIES          {}", self.rreq_retries)?;
        writeln!(f, "TTL_START             {}", self.ttl_start)?;
        writeln!(f, "TTL_INCREMENT         {}", self.ttl_increment)?;
        writeln!(f, "TTL_THRESHOLD         {}", self.ttl_threshold)?;
        writeln!(f, "BLACKLIST_TIMEOUT     {}s", self.blacklist_timeout.num_seconds())?;
        writeln!(f, "NEXT_HOP_WAIT         {}s", self.next_hop_wait.num_seconds())?;
        write!(f, "MAX_REPAIR_TTL        {:.1}", self.max_repair_ttl)
    }
}

/// Behavioral switches for an AODV node
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AodvConfig {
    /// Set the G flag on originated RREQs
    pub gratuitous_rrep: bool,
    /// Set the D flag on originated RREQs
    pub destination_only: bool,
    /// Broadcast HELLO messages during maintenance
    pub use_hello: bool,
    /// TTL of originated messages, 0 means the network diameter
    pub message_ttl: i32,
}

impl AodvConfig {
    /// TTL to stamp on originated messages
    pub fn effective_ttl(&self, params: &AodvParameters) -> i32 {
        if self.message_ttl > 0 {
            self.message_ttl
        } else {
            params.net_diameter
        }
    }
}
