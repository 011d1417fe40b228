// src/core/measurement.rs

//! Z-basis measurement and the detector model shared by the BSM.

use super::error::SimError;
use super::state::QuantumState;
use crate::validation::{check_dimension, check_probability};
use num_complex::Complex;
use num_traits::Zero;
use rand::Rng;

/// Bernoulli draw that tolerates probabilities outside [0, 1] and NaN.
/// Certain outcomes do not consume randomness.
pub(crate) fn bernoulli<R: Rng + ?Sized>(rng: &mut R, p: f64) -> bool {
    p > 0.0 && (p >= 1.0 || rng.gen_bool(p))
}

/// Imperfections of a single-photon detector and of its classical readout.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeasurementConfig {
    /// Probability of a click when a photon is present.
    pub detector_efficiency: f64,
    /// Probability of a click when no photon is present.
    pub dark_count_rate: f64,
    /// Probability that the recorded bit is flipped.
    pub readout_error_rate: f64,
}

impl MeasurementConfig {
    pub fn perfect() -> Self {
        Self { detector_efficiency: 1.0, dark_count_rate: 0.0, readout_error_rate: 0.0 }
    }

    pub fn realistic() -> Self {
        Self { detector_efficiency: 0.95, dark_count_rate: 0.01, readout_error_rate: 0.02 }
    }

    pub fn high_quality() -> Self {
        Self { detector_efficiency: 0.98, dark_count_rate: 0.001, readout_error_rate: 0.005 }
    }

    /// Ideal readout with a lossy detector.
    pub fn with_efficiency(detector_efficiency: f64) -> Self {
        Self { detector_efficiency, ..Self::perfect() }
    }

    pub fn validate(&self) -> Result<(), SimError> {
        check_probability("detector-efficiency", self.detector_efficiency)?;
        check_probability("dark-count-rate", self.dark_count_rate)?;
        check_probability("readout-error-rate", self.readout_error_rate)
    }

    /// Whether the detector clicks, given whether a photon reached it.
    pub fn detect<R: Rng + ?Sized>(&self, photon_present: bool, rng: &mut R) -> bool {
        if photon_present {
            bernoulli(rng, self.detector_efficiency)
        } else {
            bernoulli(rng, self.dark_count_rate)
        }
    }

    /// The bit as recorded by the readout electronics.
    pub fn read<R: Rng + ?Sized>(&self, bit: bool, rng: &mut R) -> bool {
        bit ^ bernoulli(rng, self.readout_error_rate)
    }
}

impl Default for MeasurementConfig {
    fn default() -> Self {
        Self::perfect()
    }
}

/// Measures `qubit` (0 is the most significant) in the Z basis.
///
/// Returns `true` for |1> together with the collapsed, renormalized state.
pub fn measure_z<R: Rng + ?Sized>(state: &QuantumState, qubit: u32, rng: &mut R) -> Result<(bool, QuantumState), SimError> {
    check_dimension(state)?;
    let num_qubits = state.num_qubits();
    if qubit >= num_qubits {
        return Err(SimError::DimensionMismatch { left: qubit as usize + 1, right: num_qubits as usize });
    }
    let norm_sq = state.norm_sqr();
    if norm_sq == 0.0 {
        return Err(SimError::Unnormalized { norm_sq });
    }

    let mask = 1usize << (num_qubits - 1 - qubit);
    let p_one: f64 = (0..state.dim()).filter(|i| i & mask != 0).map(|i| state.probability(i)).sum::<f64>() / norm_sq;
    let one = bernoulli(rng, p_one);

    let kept = if one { p_one } else { 1.0 - p_one };
    let scale = 1.0 / (kept * norm_sq).sqrt();
    let collapsed = state
        .amplitudes()
        .iter()
        .enumerate()
        .map(|(i, amp)| if (i & mask != 0) == one { amp * scale } else { Complex::zero() })
        .collect();
    Ok((one, QuantumState::from_amplitudes(collapsed)))
}

/// [`measure_z`] seen through an imperfect detector: the |1> outcome is a
/// photon that may go undetected, the |0> outcome may still produce a dark
/// count, and the recorded bit may be flipped.
///
/// The returned state is the true post-measurement state.
pub fn measure_z_with_noise<R: Rng + ?Sized>(
    state: &QuantumState,
    qubit: u32,
    config: &MeasurementConfig,
    rng: &mut R,
) -> Result<(bool, QuantumState), SimError> {
    let (ideal, collapsed) = measure_z(state, qubit, rng)?;
    let clicked = config.detect(ideal, rng);
    Ok((config.read(clicked, rng), collapsed))
}
