// src/validation/mod.rs

//! Checks on states, gates and configuration values.

use crate::core::{QuantumState, SimError, NORM_TOLERANCE};
use crate::gates::Gate;
use num_complex::Complex;

const DEFAULT_UNITARY_TOLERANCE: f64 = 1e-9;

/// Checks that the state vector is normalized (sum of squared amplitudes ~ 1).
///
/// # Arguments
/// * `state` - The `QuantumState` to check.
/// * `tolerance` - Allowed deviation from 1.0. Defaults to `NORM_TOLERANCE`.
///
/// # Returns
/// * `Ok(())` if normalized within tolerance.
/// * `Err(SimError::Unnormalized)` otherwise.
pub fn check_normalization(state: &QuantumState, tolerance: Option<f64>) -> Result<(), SimError> {
    let effective_tolerance = tolerance.unwrap_or(NORM_TOLERANCE);
    let norm_sq = state.norm_sqr();
    if (norm_sq - 1.0).abs() > effective_tolerance {
        Err(SimError::Unnormalized { norm_sq })
    } else {
        Ok(())
    }
}

/// Checks that `value` is a probability in [0, 1]. `name` is used in the error.
pub fn check_probability(name: &str, value: f64) -> Result<(), SimError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(SimError::InvalidConfig { message: format!("{name} must lie in [0, 1], got {value}") })
    }
}

/// Checks that `value` is finite and not negative.
pub fn check_non_negative(name: &str, value: f64) -> Result<(), SimError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(SimError::InvalidConfig { message: format!("{name} must be finite and >= 0, got {value}") })
    }
}

/// Checks that `gate * gate^dagger` is the identity.
///
/// # Arguments
/// * `gate` - The gate to check.
/// * `tolerance` - Allowed absolute deviation per matrix entry.
///
/// # Returns
/// * `Err(SimError::InvalidConfig)` naming the gate if it is not unitary.
pub fn check_unitary(gate: &Gate, tolerance: Option<f64>) -> Result<(), SimError> {
    let effective_tolerance = tolerance.unwrap_or(DEFAULT_UNITARY_TOLERANCE);
    let product = gate.compose(&gate.adjoint())?;
    for r in 0..gate.dim() {
        for c in 0..gate.dim() {
            let expected = if r == c { Complex::new(1.0, 0.0) } else { Complex::new(0.0, 0.0) };
            let deviation = (product.entry(r, c) - expected).norm();
            if deviation > effective_tolerance {
                return Err(SimError::InvalidConfig {
                    message: format!("gate {} is not unitary: entry ({r}, {c}) deviates by {deviation:e}", gate.name()),
                });
            }
        }
    }
    Ok(())
}

/// Checks that the state describes a whole register: a non-zero,
/// power-of-two number of amplitudes.
pub fn check_dimension(state: &QuantumState) -> Result<(), SimError> {
    let dim = state.dim();
    if dim == 0 || !dim.is_power_of_two() {
        return Err(SimError::DimensionMismatch { left: dim, right: dim.next_power_of_two().max(1) });
    }
    Ok(())
}

/// Runs every state check: a power-of-two dimension and unit norm.
pub fn validate_state(state: &QuantumState) -> Result<(), SimError> {
    check_dimension(state)?;
    check_normalization(state, None)
}
