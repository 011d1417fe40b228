// demos/distance_sweep.rs

// Runs the two-node Barrett-Kok experiment at 1, 5, 10, 20 and 50 km and
// prints one CSV row per distance.
//
//   cargo run --example distance_sweep [config.toml]
//   RUST_LOG=qnetsim=debug cargo run --example distance_sweep

use qnetsim::simulation::sweep::{rows, sweep_distances, DEFAULT_DISTANCES_M};
use qnetsim::{ResultRow, RunConfig, SimError};
use std::fs;

fn load_config() -> Result<RunConfig, SimError> {
    match std::env::args().nth(1) {
        Some(path) => {
            let contents = fs::read_to_string(&path)
                .map_err(|err| SimError::InvalidConfig { message: format!("unable to read {path}: {err}") })?;
            RunConfig::from_toml_str(&contents)
        }
        None => Ok(RunConfig::default()),
    }
}

fn main() -> Result<(), SimError> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = load_config()?;
    tracing::info!(attempts = config.num_attempts, "starting distance sweep");
    let reports = sweep_distances(&config, &DEFAULT_DISTANCES_M)?;

    println!("{}", ResultRow::CSV_HEADER);
    for row in rows(&reports) {
        println!("{}", row.to_csv_line());
    }
    for (report, theoretical) in reports.iter().zip(DEFAULT_DISTANCES_M.map(|d| config.at_distance(d).theoretical_success_rate())) {
        tracing::info!(km = report.distance_m / 1000.0, measured = report.success_rate, theoretical, "success rate");
    }
    Ok(())
}
