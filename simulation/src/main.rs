//! orbnet - AODV routing over a rotating satellite constellation
//!
//! Runs configured simulations and inspects the derived protocol constants
//! and neighbor sets of a constellation.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use orbnet_routing::AodvParameters;
use orbnet_simulation::{SimConfig, run_iterations};
use orbnet_transport::{ConstellationShape, SlotPosition, resolve_neighbors};

#[derive(Parser)]
#[command(
    name = "orbnet",
    about = "AODV routing simulation for satellite constellations",
    version
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every iteration of a configuration and export the results
    Run {
        /// JSON configuration file
        #[arg(short, long)]
        config: PathBuf,

        /// Override the configured seed
        #[arg(long)]
        seed: Option<u64>,

        /// Skip writing result files
        #[arg(long)]
        no_export: bool,
    },

    /// Print the AODV constants derived for a constellation
    Params {
        /// Satellites per orbit
        #[arg(short, long, default_value = "11")]
        sats: usize,

        /// Number of orbits
        #[arg(short, long, default_value = "6")]
        orbits: usize,

        /// Links across the seam exist
        #[arg(long)]
        cross_seam: bool,

        /// Active route timeout in seconds
        #[arg(long, default_value = "30")]
        active_route_timeout: i64,

        /// Seconds per tick, used as node traversal time
        #[arg(long, default_value = "5")]
        tick: i64,
    },

    /// Print the neighbors of one satellite after some rotation
    Neighbors {
        #[arg(long, default_value = "6")]
        orbits: usize,

        #[arg(long, default_value = "11")]
        sats: usize,

        #[arg(long)]
        cross_seam: bool,

        /// Orbit of the satellite
        #[arg(long)]
        orbit: usize,

        /// Fixed slot of the satellite
        #[arg(long)]
        slot: usize,

        /// Position changes since the start
        #[arg(short, long, default_value = "0")]
        drift: usize,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up tracing
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    match cli.command {
        Commands::Run {
            config,
            seed,
            no_export,
        } => {
            let mut sim_config =
                SimConfig::load(&config).with_context(|| format!("loading {}", config.display()))?;
            if seed.is_some() {
                sim_config.seed = seed;
            }

            let report = run_iterations(&sim_config, !no_export)?;

            println!("{}: {} iteration(s)", report.name, report.runs.len());
            for run in &report.runs {
                println!(
                    "  run {} (seed {}): delivery {:.2}%, {} of {} delivered, mean hops {:.2}, mean delay {:.2} ms",
                    run.iteration,
                    run.seed,
                    run.summary.delivery_rate * 100.0,
                    run.stats.data_delivered,
                    run.stats.data_sent,
                    run.summary.mean_hop_count,
                    run.summary.mean_end_to_end_delay_ms,
                );
            }
            println!(
                "  average: delivery {:.2}%, goodput {:.2}%, {:.1} RREQs",
                report.average.delivery_rate * 100.0,
                report.average.goodput * 100.0,
                report.average.rreqs_generated,
            );
        }
        Commands::Params {
            sats,
            orbits,
            cross_seam,
            active_route_timeout,
            tick,
        } => {
            let params = AodvParameters::new(active_route_timeout, tick, sats, orbits, cross_seam);
            println!("{params}");
        }
        Commands::Neighbors {
            orbits,
            sats,
            cross_seam,
            orbit,
            slot,
            drift,
        } => {
            let shape = ConstellationShape::new(orbits, sats, cross_seam)?;
            anyhow::ensure!(
                orbit < orbits && slot < sats,
                "R{orbit}S{slot} is outside a {orbits}x{sats} constellation"
            );

            let logical = (slot + drift) % sats;
            println!("R{orbit}S{slot} (logical slot {logical}):");
            for neighbor in resolve_neighbors(&shape, SlotPosition::new(orbit, slot), logical) {
                println!("  {:?}: {}", neighbor.direction, neighbor.position);
            }
        }
    }

    Ok(())
}
