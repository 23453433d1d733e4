//! Simulation engine
//!
//! Discrete-time loop over the constellation. Each tick visits every
//! satellite in (orbit, slot) order:
//!
//! 1. Routing table maintenance
//! 2. Drain the receive queue, counting DATA that arrived
//! 3. Maybe originate a DATA message to a random other satellite
//!
//! Then the virtual clock advances by one tick, and the orbits rotate one
//! slot every `ticks_per_position_change` ticks.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use orbnet_core::{Message, NodeAddress, StatisticsSink, VirtualClock};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

use crate::config::SimConfig;
use crate::constellation::Constellation;
use crate::error::SimResult;
use crate::export;
use crate::stats::{RunSummary, SimStats, Snapshot, StatsCollector};

/// A single simulation run
pub struct Simulation {
    config: SimConfig,
    constellation: Constellation,
    addresses: Vec<NodeAddress>,
    clock: VirtualClock,
    collector: Arc<StatsCollector>,
    rng: StdRng,
    seed: u64,
    tick: usize,
    data_ttl: i32,
    snapshots: Vec<Snapshot>,
}

impl Simulation {
    /// Create a run seeded from the configuration, or randomly when it has no seed
    pub fn new(config: SimConfig) -> SimResult<Self> {
        let seed = config.seed.unwrap_or_else(|| rand::rng().random());
        Self::with_seed(config, seed)
    }

    pub fn with_seed(config: SimConfig, seed: u64) -> SimResult<Self> {
        config.validate()?;

        let mut rng = StdRng::seed_from_u64(seed);
        let clock = VirtualClock::new();
        let collector = Arc::new(StatsCollector::new());
        let sink: Arc<dyn StatisticsSink> = collector.clone();
        let constellation = Constellation::new(&config, clock.clone(), sink, rng.random())?;
        let addresses = constellation.satellites().map(|sat| sat.address.clone()).collect();

        Ok(Self {
            data_ttl: config.data_ttl(),
            config,
            constellation,
            addresses,
            clock,
            collector,
            rng,
            seed,
            tick: 0,
            snapshots: Vec::new(),
        })
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn constellation(&self) -> &Constellation {
        &self.constellation
    }

    pub fn clock(&self) -> &VirtualClock {
        &self.clock
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Ticks executed so far
    pub fn tick(&self) -> usize {
        self.tick
    }

    pub fn stats(&self) -> SimStats {
        self.collector.stats()
    }

    pub fn snapshots(&self) -> &[Snapshot] {
        &self.snapshots
    }

    /// Simulated minutes elapsed
    pub fn minutes(&self) -> f64 {
        (self.tick as i64 * self.config.seconds_per_tick) as f64 / 60.0
    }

    /// Run a single tick
    pub fn step(&mut self) -> SimResult<()> {
        trace!(tick = self.tick, "=== Tick ===");

        for node in 0..self.addresses.len() {
            self.run_satellite(node)?;
        }

        self.clock.advance_secs(self.config.seconds_per_tick);
        self.tick += 1;

        if self.tick % self.config.ticks_per_position_change() == 0 {
            debug!(tick = self.tick, "Position change");
            self.constellation.position_tick();
        }

        if self.config.export_snapshots {
            self.snapshots.push(self.collector.snapshot(self.minutes()));
        }

        Ok(())
    }

    /// Run for a specific number of ticks
    pub fn run_ticks(&mut self, ticks: usize) -> SimResult<()> {
        for _ in 0..ticks {
            self.step()?;
        }
        Ok(())
    }

    /// Run every configured tick and return the final counters
    pub fn run(&mut self) -> SimResult<SimStats> {
        let total = self.config.total_ticks();
        info!(
            name = %self.config.name,
            satellites = self.addresses.len(),
            ticks = total,
            seed = self.seed,
            "Simulation starting"
        );

        self.run_ticks(total)?;

        let stats = self.stats();
        info!(
            tick = self.tick,
            delivery_rate = stats.delivery_rate(),
            data_sent = stats.data_sent,
            data_delivered = stats.data_delivered,
            "Simulation complete"
        );
        Ok(stats)
    }

    /// One satellite's turn
    fn run_satellite(&mut self, node: usize) -> SimResult<()> {
        let Some(satellite) = self.constellation.satellite_mut(node) else {
            return Ok(());
        };
        let layer = &mut satellite.layer;

        layer.perform_maintenance()?;

        while layer.incoming_count() > 0 {
            if let Some(message) = layer.get_incoming_message()? {
                trace!(node = %self.addresses[node], source = %message.source, hops = message.hop_count(), "Data delivered");
                self.collector.data_delivered(&message);
            }
        }

        let others = self.addresses.len() - 1;
        let probability = f64::from(self.config.data_probability_percent) / 100.0;
        if others == 0 || !self.rng.random_bool(probability) {
            return Ok(());
        }

        // uniform over every satellite except this one
        let mut target = self.rng.random_range(0..others);
        if target >= node {
            target += 1;
        }
        let size = self.rng.random_range(self.config.data_min_bytes..=self.config.data_max_bytes);
        let message = Message::data(
            self.addresses[target].clone(),
            self.addresses[node].clone(),
            size,
            self.data_ttl,
        );

        trace!(node = %self.addresses[node], dest = %message.destination, size, "Generated data");
        self.collector.data_sent(&message);
        layer.send_data_message(message)?;
        Ok(())
    }
}

/// Result of one iteration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutcome {
    /// 1-based iteration number
    pub iteration: usize,
    pub seed: u64,
    pub started_at: DateTime<Utc>,
    /// Wall-clock duration of the run
    pub elapsed_ms: i64,
    pub summary: RunSummary,
    pub stats: SimStats,
}

/// Outcome of a batch of iterations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IterationReport {
    pub name: String,
    pub runs: Vec<RunOutcome>,
    pub average: RunSummary,
}

/// Run every configured iteration with fresh state
///
/// Iteration `i` is seeded with `seed + i - 1`, so a fixed configuration
/// seed reproduces the whole batch. Results are written below
/// `output_dir/name` when `export` is set.
pub fn run_iterations(config: &SimConfig, export: bool) -> SimResult<IterationReport> {
    config.validate()?;
    let base_seed = config.seed.unwrap_or_else(|| rand::rng().random());
    let mut runs = Vec::with_capacity(config.iterations);

    for iteration in 1..=config.iterations {
        info!(name = %config.name, iteration, of = config.iterations, "Running iteration");

        let seed = base_seed.wrapping_add(iteration as u64 - 1);
        let mut simulation = Simulation::with_seed(config.clone(), seed)?;
        let started_at = Utc::now();
        let stats = simulation.run()?;
        let elapsed_ms = (Utc::now() - started_at).num_milliseconds();

        let outcome = RunOutcome {
            iteration,
            seed,
            started_at,
            elapsed_ms,
            summary: RunSummary::from(&stats),
            stats,
        };

        if export {
            export::export_run(&simulation, &outcome, &config.run_dir(iteration))?;
        }
        runs.push(outcome);
    }

    let summaries: Vec<RunSummary> = runs.iter().map(|run| run.summary.clone()).collect();
    let report = IterationReport {
        name: config.name.clone(),
        average: RunSummary::average(&summaries),
        runs,
    };

    if export {
        export::export_average(&report, &config.output_dir.join(&config.name))?;
    }

    Ok(report)
}
