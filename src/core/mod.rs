// src/core/mod.rs

//! Core data structures and types

pub mod constants;
pub mod error;
pub mod measurement;
pub mod state;

// Re-export public types for convenient access via `qnetsim::core::TypeName`
pub use constants::SimTime;
pub use constants::sim_constants::{LIGHT_SPEED_FIBER_M_PER_PS, NORM_TOLERANCE, PS_PER_SECOND};
pub use error::{AttemptId, NodeId, SimError};
pub use measurement::{measure_z, measure_z_with_noise, MeasurementConfig};
pub use state::{fidelity, BellState, QuantumState};
