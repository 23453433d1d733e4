//! Result export
//!
//! Every iteration gets its own directory holding `statistics.json`,
//! `configuration.json`, and optionally `snapshots.json` plus one routing
//! table per satellite. The batch directory gets `average-statistics.json`.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use crate::error::SimResult;
use crate::simulation::{IterationReport, RunOutcome, Simulation};

pub const STATISTICS_FILE: &str = "statistics.json";
pub const CONFIGURATION_FILE: &str = "configuration.json";
pub const SNAPSHOTS_FILE: &str = "snapshots.json";
pub const AVERAGE_FILE: &str = "average-statistics.json";

/// Pretty-print `value` as JSON into `path`
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> SimResult<()> {
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, value)?;
    Ok(())
}

/// Write the results of a finished run into `dir`
pub fn export_run(simulation: &Simulation, outcome: &RunOutcome, dir: &Path) -> SimResult<Vec<PathBuf>> {
    fs::create_dir_all(dir)?;
    let config = simulation.config();
    let mut written = Vec::new();

    let path = dir.join(STATISTICS_FILE);
    write_json(&path, outcome)?;
    written.push(path);

    let path = dir.join(CONFIGURATION_FILE);
    write_json(&path, config)?;
    written.push(path);

    if config.export_snapshots {
        let path = dir.join(SNAPSHOTS_FILE);
        write_json(&path, simulation.snapshots())?;
        written.push(path);
    }

    if config.export_routing_tables {
        let tables = simulation.constellation().export_routing_tables(dir)?;
        info!(dir = %dir.display(), tables, "Routing tables exported");
    }

    info!(dir = %dir.display(), iteration = outcome.iteration, "Results exported");
    Ok(written)
}

/// Write the averaged results of a batch into `dir`
pub fn export_average(report: &IterationReport, dir: &Path) -> SimResult<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(AVERAGE_FILE);
    write_json(&path, report)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use crate::simulation::run_iterations;

    #[test]
    fn test_write_json_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = SimConfig::default();
        write_json(&path, &config).unwrap();

        let loaded = SimConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_export_batch_layout() {
        let dir = tempfile::tempdir().unwrap();
        let config = SimConfig {
            name: "layout".to_string(),
            orbits: 2,
            sats_per_orbit: 3,
            seconds_per_tick: 60,
            periods: 0,
            iterations: 2,
            seed: Some(1),
            export_snapshots: true,
            export_routing_tables: true,
            output_dir: dir.path().to_path_buf(),
            ..SimConfig::default()
        };

        run_iterations(&config, true).unwrap();

        let batch = dir.path().join("layout");
        assert!(batch.join(AVERAGE_FILE).exists());
        for run in ["run-1", "run-2"] {
            let run_dir = batch.join(run);
            assert!(run_dir.join(STATISTICS_FILE).exists());
            assert!(run_dir.join(CONFIGURATION_FILE).exists());
            assert!(run_dir.join(SNAPSHOTS_FILE).exists());
            assert!(run_dir.join("R0S0-routing-table.json").exists());
        }

        let text = fs::read_to_string(batch.join(AVERAGE_FILE)).unwrap();
        let report: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(report["runs"].as_array().unwrap().len(), 2);
        assert_eq!(report["name"], "layout");
    }
}
