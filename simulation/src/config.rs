//! Simulation configuration
//!
//! A [`SimConfig`] is read from a JSON file. Every field has a default, so a
//! file only needs to name what it changes. Tick counts are derived from the
//! orbital period of the configured altitude.

use std::f64::consts::PI;
use std::fs;
use std::path::{Path, PathBuf};

use orbnet_routing::{AodvConfig, AodvParameters};
use orbnet_transport::{ConstellationShape, LinkConfig, TransportResult};
use orbnet_transport::geometry::EARTH_RADIUS_KM;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Standard gravitational parameter of Earth, km^3/s^2
pub const EARTH_MU: f64 = 398_600.0;

/// Errors from loading or validating a configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Constellation needs at least one orbit and one satellite, got {orbits}x{sats_per_orbit}")]
    EmptyConstellation { orbits: usize, sats_per_orbit: usize },

    #[error("Seconds per tick must be positive, got {0}")]
    InvalidTick(i64),

    #[error("Tick of {tick}s is longer than a position change of {position_change}s")]
    TickTooLong { tick: i64, position_change: i64 },

    #[error("{field} must be a percentage, got {value}")]
    InvalidPercentage { field: &'static str, value: u32 },

    #[error("Data size range {min}..={max} is empty")]
    InvalidSizeRange { min: usize, max: usize },

    #[error("Active route timeout must be positive, got {0}")]
    InvalidRouteTimeout(i64),
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Routing layer installed on every satellite
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerKind {
    #[default]
    Aodv,
    Flooding,
}

/// Full configuration of a simulation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub name: String,

    // Constellation
    pub orbits: usize,
    pub sats_per_orbit: usize,
    pub altitude_km: f64,
    pub cross_seam: bool,

    // Routing
    pub network_layer: LayerKind,
    pub gratuitous_rrep: bool,
    pub destination_only: bool,
    pub use_hello: bool,
    pub active_route_timeout_secs: i64,
    /// TTL of generated DATA, 0 means the network diameter
    pub message_ttl: i32,

    // Traffic
    /// Chance per satellite per tick of generating a DATA message
    pub data_probability_percent: u32,
    pub data_min_bytes: usize,
    pub data_max_bytes: usize,

    // Links
    pub reception_percent: u32,
    pub buffer_size: usize,

    // Run
    pub seconds_per_tick: i64,
    /// Orbital periods to simulate
    pub periods: usize,
    pub iterations: usize,
    /// Fixed RNG seed; runs are random when absent
    pub seed: Option<u64>,

    // Export
    pub export_routing_tables: bool,
    pub export_snapshots: bool,
    pub output_dir: PathBuf,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            name: "constellation".to_string(),
            orbits: 6,
            sats_per_orbit: 11,
            altitude_km: 780.0,
            cross_seam: false,
            network_layer: LayerKind::Aodv,
            gratuitous_rrep: false,
            destination_only: false,
            use_hello: false,
            active_route_timeout_secs: 30,
            message_ttl: 0,
            data_probability_percent: 25,
            data_min_bytes: 1024,
            data_max_bytes: 512_000,
            reception_percent: 100,
            buffer_size: 50,
            seconds_per_tick: 5,
            periods: 5,
            iterations: 5,
            seed: None,
            export_routing_tables: false,
            export_snapshots: false,
            output_dir: PathBuf::from("results"),
        }
    }
}

impl SimConfig {
    /// Load and validate a configuration file
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let text = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.orbits == 0 || self.sats_per_orbit == 0 {
            return Err(ConfigError::EmptyConstellation {
                orbits: self.orbits,
                sats_per_orbit: self.sats_per_orbit,
            });
        }
        if self.seconds_per_tick <= 0 {
            return Err(ConfigError::InvalidTick(self.seconds_per_tick));
        }
        if self.active_route_timeout_secs <= 0 {
            return Err(ConfigError::InvalidRouteTimeout(self.active_route_timeout_secs));
        }
        for (field, value) in [
            ("data_probability_percent", self.data_probability_percent),
            ("reception_percent", self.reception_percent),
        ] {
            if value > 100 {
                return Err(ConfigError::InvalidPercentage { field, value });
            }
        }
        if self.data_min_bytes > self.data_max_bytes {
            return Err(ConfigError::InvalidSizeRange {
                min: self.data_min_bytes,
                max: self.data_max_bytes,
            });
        }
        if self.ticks_per_position_change() == 0 {
            return Err(ConfigError::TickTooLong {
                tick: self.seconds_per_tick,
                position_change: self.seconds_per_position_change(),
            });
        }
        Ok(())
    }

    pub fn node_count(&self) -> usize {
        self.orbits * self.sats_per_orbit
    }

    /// Period of a circular orbit at the configured altitude
    pub fn orbit_period_secs(&self) -> f64 {
        2.0 * PI * (EARTH_RADIUS_KM + self.altitude_km).powf(1.5) / EARTH_MU.sqrt()
    }

    /// Seconds the constellation holds still between one-slot rotations
    pub fn seconds_per_position_change(&self) -> i64 {
        (self.orbit_period_secs() / self.sats_per_orbit as f64).round() as i64
    }

    pub fn ticks_per_position_change(&self) -> usize {
        if self.seconds_per_tick <= 0 {
            return 0;
        }
        (self.seconds_per_position_change() / self.seconds_per_tick) as usize
    }

    pub fn total_ticks(&self) -> usize {
        self.ticks_per_position_change() * self.sats_per_orbit * self.periods
    }

    pub fn shape(&self) -> TransportResult<ConstellationShape> {
        ConstellationShape::new(self.orbits, self.sats_per_orbit, self.cross_seam)
    }

    /// RFC constants; the tick length doubles as node traversal time
    pub fn aodv_parameters(&self) -> AodvParameters {
        AodvParameters::new(
            self.active_route_timeout_secs,
            self.seconds_per_tick,
            self.sats_per_orbit,
            self.orbits,
            self.cross_seam,
        )
    }

    pub fn aodv_config(&self) -> AodvConfig {
        AodvConfig {
            gratuitous_rrep: self.gratuitous_rrep,
            destination_only: self.destination_only,
            use_hello: self.use_hello,
            message_ttl: self.message_ttl,
        }
    }

    pub fn link_config(&self) -> LinkConfig {
        LinkConfig::from_percent(self.reception_percent, self.buffer_size)
    }

    /// TTL stamped on generated DATA
    pub fn data_ttl(&self) -> i32 {
        self.aodv_config().effective_ttl(&self.aodv_parameters())
    }

    /// Directory for the results of iteration `iteration` (1-based)
    pub fn run_dir(&self, iteration: usize) -> PathBuf {
        self.output_dir.join(&self.name).join(format!("run-{iteration}"))
    }
}
