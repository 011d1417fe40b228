// src/simulation/results.rs
use crate::core::{SimTime, PS_PER_SECOND};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How one entanglement attempt ended for a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    /// No entanglement: photon lost, measurement failed, or herald timed out.
    Raw,
    /// Heralded success; the memory holds half of a Bell pair.
    Entangled,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Raw => write!(f, "RAW"),
            Outcome::Entangled => write!(f, "ENTANGLED"),
        }
    }
}

/// Counts RAW vs ENTANGLED outcomes and keeps the fidelity of every success
/// in the order it was recorded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutcomeTracker {
    raw_count: u64,
    entangled_count: u64,
    fidelities: Vec<f64>,
}

impl OutcomeTracker {
    /// Creates an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one completed attempt. The fidelity is only kept for
    /// ENTANGLED outcomes.
    pub fn record(&mut self, outcome: Outcome, fidelity: Option<f64>) {
        match outcome {
            Outcome::Raw => self.raw_count += 1,
            Outcome::Entangled => {
                self.entangled_count += 1;
                if let Some(f) = fidelity {
                    self.fidelities.push(f);
                }
            }
        }
    }

    /// Number of RAW outcomes.
    pub fn raw_count(&self) -> u64 {
        self.raw_count
    }

    /// Number of ENTANGLED outcomes.
    pub fn entangled_count(&self) -> u64 {
        self.entangled_count
    }

    /// Number of completed attempts.
    pub fn attempts(&self) -> u64 {
        self.raw_count + self.entangled_count
    }

    /// Fidelity history, oldest first.
    pub fn fidelities(&self) -> &[f64] {
        &self.fidelities
    }

    /// entangled / attempts, or 0 with no attempts.
    pub fn success_rate(&self) -> f64 {
        match self.attempts() {
            0 => 0.0,
            n => self.entangled_count as f64 / n as f64,
        }
    }

    /// Mean recorded fidelity, or 0 with no successes.
    pub fn average_fidelity(&self) -> f64 {
        if self.fidelities.is_empty() {
            0.0
        } else {
            self.fidelities.iter().sum::<f64>() / self.fidelities.len() as f64
        }
    }

    /// Entangled pairs per simulated second, or 0 when no time has elapsed.
    pub fn throughput(&self, elapsed: SimTime) -> f64 {
        if elapsed == 0 {
            return 0.0;
        }
        self.entangled_count as f64 / (elapsed as f64 / PS_PER_SECOND as f64)
    }

    /// Forgets everything recorded so far.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Everything a caller needs from one experiment run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Distance from each end node to the BSM node, in meters.
    pub distance_m: f64,
    /// Attempts completed.
    pub attempts: u64,
    /// RAW outcomes.
    pub raw_count: u64,
    /// ENTANGLED outcomes.
    pub entangled_count: u64,
    /// Fidelity of every success, in order.
    pub fidelities: Vec<f64>,
    /// Simulated time at the end of the run, in picoseconds.
    pub elapsed_ps: SimTime,
    /// entangled / attempts.
    pub success_rate: f64,
    /// Mean fidelity over successes.
    pub avg_fidelity: f64,
    /// Entangled pairs per simulated second.
    pub throughput: f64,
    /// Quantum memories that ended up holding entanglement (two per success).
    pub memory_used: u64,
}

impl RunReport {
    /// Builds a report from a tracker and the elapsed simulated time.
    pub fn from_tracker(distance_m: f64, tracker: &OutcomeTracker, elapsed_ps: SimTime) -> Self {
        Self {
            distance_m,
            attempts: tracker.attempts(),
            raw_count: tracker.raw_count(),
            entangled_count: tracker.entangled_count(),
            fidelities: tracker.fidelities().to_vec(),
            elapsed_ps,
            success_rate: tracker.success_rate(),
            avg_fidelity: tracker.average_fidelity(),
            throughput: tracker.throughput(elapsed_ps),
            memory_used: tracker.entangled_count() * 2,
        }
    }

    /// The tabular row consumed by reporting tools.
    pub fn row(&self) -> ResultRow {
        ResultRow {
            distance_km: self.distance_m / 1000.0,
            success_rate: self.success_rate,
            avg_fidelity: self.avg_fidelity,
            throughput: self.throughput,
            memory_used: self.memory_used,
        }
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Run Report ({:.1} km):", self.distance_m / 1000.0)?;
        writeln!(f, "  Entangled: {}/{}", self.entangled_count, self.attempts)?;
        writeln!(f, "  Success rate: {:.4}", self.success_rate)?;
        writeln!(f, "  Average fidelity: {:.4}", self.avg_fidelity)?;
        writeln!(f, "  Throughput: {:.4} pairs/s", self.throughput)?;
        write!(f, "  Memories used: {}", self.memory_used)
    }
}

/// One row of the distance-sweep table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    pub distance_km: f64,
    pub success_rate: f64,
    pub avg_fidelity: f64,
    pub throughput: f64,
    pub memory_used: u64,
}

impl ResultRow {
    /// Column names, in the order produced by [`ResultRow::to_csv_line`].
    pub const CSV_HEADER: &'static str = "distance_km,success_rate,avg_fidelity,throughput,memory_used";

    /// Comma-separated rendering of the row.
    pub fn to_csv_line(&self) -> String {
        format!(
            "{},{:.4},{:.4},{:.4},{}",
            self.distance_km, self.success_rate, self.avg_fidelity, self.throughput, self.memory_used
        )
    }
}
