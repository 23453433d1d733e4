//! Integration scenarios over a full constellation
//!
//! These runs exercise the whole stack together:
//! - orbnet-transport (orbital topology, medium, link layer)
//! - orbnet-routing (AODV and flooding layers)
//! - the simulation loop, statistics, and export

use orbnet_core::MessageKind;

use crate::config::{LayerKind, SimConfig};
use crate::simulation::Simulation;

fn small_config(layer: LayerKind) -> SimConfig {
    SimConfig {
        name: "scenario".to_string(),
        orbits: 3,
        sats_per_orbit: 4,
        network_layer: layer,
        seconds_per_tick: 5,
        data_probability_percent: 10,
        data_min_bytes: 100,
        data_max_bytes: 200,
        buffer_size: 500,
        periods: 1,
        iterations: 1,
        seed: Some(2024),
        ..SimConfig::default()
    }
}

/// AODV finds routes and delivers traffic on a lossless grid
#[test]
fn test_aodv_delivers_on_small_grid() {
    let mut sim = Simulation::new(small_config(LayerKind::Aodv)).unwrap();
    sim.run_ticks(200).unwrap();
    let stats = sim.stats();

    assert!(stats.data_sent > 0);
    assert!(stats.data_delivered > 0);
    assert!(stats.data_delivered <= stats.data_sent);
    assert!(stats.rreqs_generated > 0);
    assert!(stats.control_sent.get(&MessageKind::Rreq).copied().unwrap_or(0) > 0);
    assert!(stats.control_sent.get(&MessageKind::Rrep).copied().unwrap_or(0) > 0);
    // 3x4 grid without seam links: nobody is more than 4 hops away
    assert!(stats.mean_hop_count() >= 1.0);
    assert!(stats.mean_hop_count() <= 4.0);
    assert!(stats.mean_end_to_end_delay_ms() > 0.0);
}

/// Flooding needs no control traffic at all
#[test]
fn test_flooding_delivers_without_control() {
    let mut sim = Simulation::new(small_config(LayerKind::Flooding)).unwrap();
    sim.run_ticks(50).unwrap();
    let stats = sim.stats();

    assert!(stats.data_sent > 0);
    assert!(stats.data_delivered > 0);
    assert_eq!(stats.rreqs_generated, 0);
    assert_eq!(stats.control_sent_total(), 0);
    assert!(stats.link_sent > stats.data_sent);
}

/// Same seed, same run
#[test]
fn test_runs_are_reproducible() {
    let mut first = Simulation::new(small_config(LayerKind::Aodv)).unwrap();
    let mut second = Simulation::new(small_config(LayerKind::Aodv)).unwrap();
    first.run_ticks(120).unwrap();
    second.run_ticks(120).unwrap();

    assert_eq!(first.stats(), second.stats());
}

/// Lossy links lose messages but the run carries on
#[test]
fn test_lossy_links_still_complete() {
    let config = SimConfig {
        reception_percent: 60,
        ..small_config(LayerKind::Aodv)
    };
    let mut sim = Simulation::new(config).unwrap();
    sim.run_ticks(150).unwrap();
    let stats = sim.stats();

    assert!(stats.link_dropped > 0);
    assert!(stats.link_sent > 0);
}

/// The orbits rotate after each position change interval
#[test]
fn test_position_change_applied_on_schedule() {
    let config = SimConfig {
        cross_seam: true,
        data_probability_percent: 0,
        ..small_config(LayerKind::Aodv)
    };
    let per_change = config.ticks_per_position_change();
    let mut sim = Simulation::new(config).unwrap();
    let before = sim.constellation().neighbors(0);

    sim.run_ticks(per_change - 1).unwrap();
    assert_eq!(sim.constellation().neighbors(0), before);

    sim.step().unwrap();
    assert_ne!(sim.constellation().neighbors(0), before);
}

/// A full configured run with every export switched on
#[test]
fn test_full_run_with_exports() {
    let dir = tempfile::tempdir().unwrap();
    let config = SimConfig {
        seconds_per_tick: 60,
        export_snapshots: true,
        export_routing_tables: true,
        iterations: 2,
        output_dir: dir.path().to_path_buf(),
        ..small_config(LayerKind::Aodv)
    };
    let total = config.total_ticks();

    let report = crate::simulation::run_iterations(&config, true).unwrap();
    assert_eq!(report.runs.len(), 2);
    assert_ne!(report.runs[0].stats, report.runs[1].stats);

    let run_dir = dir.path().join("scenario").join("run-1");
    let text = std::fs::read_to_string(run_dir.join("snapshots.json")).unwrap();
    let snapshots: Vec<crate::stats::Snapshot> = serde_json::from_str(&text).unwrap();
    assert_eq!(snapshots.len(), total);
    assert!(run_dir.join("R2S3-routing-table.json").exists());
}
