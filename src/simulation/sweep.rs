// src/simulation/sweep.rs

//! Repeats an experiment over several distances. Each distance gets its own
//! [`Experiment`] and timeline, so runs share nothing and can go in parallel.

use super::results::{ResultRow, RunReport};
use super::Experiment;
use crate::config::RunConfig;
use crate::core::SimError;
use tracing::debug;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// 1, 5, 10, 20 and 50 km.
pub const DEFAULT_DISTANCES_M: [f64; 5] = [1_000.0, 5_000.0, 10_000.0, 20_000.0, 50_000.0];

/// Runs `base` at `distance_m`.
pub fn run_at(base: &RunConfig, distance_m: f64) -> Result<RunReport, SimError> {
    Experiment::new(base.at_distance(distance_m))?.run()
}

/// Runs `base` once per distance. Reports come back in the order of
/// `distances_m`; the first failing run aborts the sweep.
pub fn sweep_distances(base: &RunConfig, distances_m: &[f64]) -> Result<Vec<RunReport>, SimError> {
    debug!(points = distances_m.len(), parallel = cfg!(feature = "parallel"), "distance sweep");

    #[cfg(feature = "parallel")]
    let reports = distances_m.par_iter().map(|&d| run_at(base, d)).collect();

    #[cfg(not(feature = "parallel"))]
    let reports = distances_m.iter().map(|&d| run_at(base, d)).collect();

    reports
}

/// Table rows for a set of reports.
pub fn rows(reports: &[RunReport]) -> Vec<ResultRow> {
    reports.iter().map(RunReport::row).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sweep_keeps_order_and_matches_single_runs() -> Result<(), SimError> {
        let base = RunConfig { num_attempts: 20, ..RunConfig::default() };
        let distances = [1_000.0, 50_000.0, 5_000.0];
        let reports = sweep_distances(&base, &distances)?;

        let km: Vec<f64> = rows(&reports).iter().map(|r| r.distance_km).collect();
        assert_eq!(km, vec![1.0, 50.0, 5.0]);
        for (report, &d) in reports.iter().zip(&distances) {
            assert_eq!(report, &run_at(&base, d)?);
        }
        Ok(())
    }

    #[test]
    fn test_sweep_surfaces_config_errors() {
        let base = RunConfig::default();
        assert!(matches!(sweep_distances(&base, &[1_000.0, -5.0]), Err(SimError::InvalidConfig { .. })));
    }
}
