// src/core/state.rs

use super::constants::sim_constants::NORM_TOLERANCE;
use super::error::SimError;
use num_complex::Complex;
use num_traits::{One, Zero};
use std::f64::consts::FRAC_1_SQRT_2;
use std::fmt;

/// Which of the four Bell states a two-qubit register holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BellState {
    /// (|00> + |11>)/sqrt(2)
    PhiPlus,
    /// (|00> - |11>)/sqrt(2)
    PhiMinus,
    /// (|01> + |10>)/sqrt(2)
    PsiPlus,
    /// (|01> - |10>)/sqrt(2)
    PsiMinus,
}

impl fmt::Display for BellState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BellState::PhiPlus => write!(f, "Phi+"),
            BellState::PhiMinus => write!(f, "Phi-"),
            BellState::PsiPlus => write!(f, "Psi+"),
            BellState::PsiMinus => write!(f, "Psi-"),
        }
    }
}

/// A pure state over a small register: 2 amplitudes for a single qubit,
/// 4 for a pair. Amplitudes are in computational-basis order, the first
/// qubit being the most significant bit.
#[derive(Debug, Clone, PartialEq)]
pub struct QuantumState {
    amplitudes: Vec<Complex<f64>>,
}

impl QuantumState {
    /// Wraps an amplitude vector as-is. Normalization is the caller's concern;
    /// see [`crate::validation::check_normalization`].
    pub fn from_amplitudes(amplitudes: Vec<Complex<f64>>) -> Self {
        Self { amplitudes }
    }

    /// |0...0> over `num_qubits` qubits.
    pub fn zero(num_qubits: u32) -> Self {
        Self::basis(num_qubits, 0)
    }

    /// Computational basis state |index> over `num_qubits` qubits.
    /// An out-of-range index yields the all-zero vector.
    pub fn basis(num_qubits: u32, index: usize) -> Self {
        let dim = 1usize << num_qubits;
        let mut amplitudes = vec![Complex::zero(); dim];
        if index < dim {
            amplitudes[index] = Complex::one();
        }
        Self { amplitudes }
    }

    /// (|0> + |1>)/sqrt(2)
    pub fn plus() -> Self {
        let a = Complex::new(FRAC_1_SQRT_2, 0.0);
        Self { amplitudes: vec![a, a] }
    }

    /// One of the four maximally entangled two-qubit states.
    pub fn bell(which: BellState) -> Self {
        let h = Complex::new(FRAC_1_SQRT_2, 0.0);
        let z = Complex::zero();
        let amplitudes = match which {
            BellState::PhiPlus => vec![h, z, z, h],
            BellState::PhiMinus => vec![h, z, z, -h],
            BellState::PsiPlus => vec![z, h, h, z],
            BellState::PsiMinus => vec![z, h, -h, z],
        };
        Self { amplitudes }
    }

    /// Read-only view of the amplitudes.
    pub fn amplitudes(&self) -> &[Complex<f64>] {
        &self.amplitudes
    }

    /// Number of amplitudes.
    pub fn dim(&self) -> usize {
        self.amplitudes.len()
    }

    /// Number of qubits in the register (log2 of the dimension).
    pub fn num_qubits(&self) -> u32 {
        self.amplitudes.len().trailing_zeros()
    }

    /// Sum of squared amplitude magnitudes.
    pub fn norm_sqr(&self) -> f64 {
        self.amplitudes.iter().map(|c| c.norm_sqr()).sum()
    }

    /// Euclidean norm of the amplitude vector.
    pub fn norm(&self) -> f64 {
        self.norm_sqr().sqrt()
    }

    /// `true` when the squared norm is within tolerance of 1.
    pub fn is_normalized(&self) -> bool {
        (self.norm_sqr() - 1.0).abs() < NORM_TOLERANCE
    }

    /// Probability of observing basis state `index`.
    pub fn probability(&self, index: usize) -> f64 {
        self.amplitudes.get(index).map(|c| c.norm_sqr()).unwrap_or(0.0)
    }

    /// Inner product <self|other>.
    pub fn inner(&self, other: &QuantumState) -> Result<Complex<f64>, SimError> {
        if self.dim() != other.dim() {
            return Err(SimError::DimensionMismatch { left: self.dim(), right: other.dim() });
        }
        Ok(self
            .amplitudes
            .iter()
            .zip(other.amplitudes.iter())
            .fold(Complex::zero(), |acc, (a, b)| acc + a.conj() * b))
    }

    /// Tensor product `self ⊗ other`.
    pub fn tensor(&self, other: &QuantumState) -> QuantumState {
        let mut amplitudes = Vec::with_capacity(self.dim() * other.dim());
        for a in &self.amplitudes {
            for b in &other.amplitudes {
                amplitudes.push(a * b);
            }
        }
        QuantumState { amplitudes }
    }
}

/// Squared overlap |<a|b>|^2 between two states of equal dimension.
///
/// Symmetric in its arguments and equal to 1 for a normalized state compared
/// with itself.
pub fn fidelity(a: &QuantumState, b: &QuantumState) -> Result<f64, SimError> {
    Ok(a.inner(b)?.norm_sqr())
}

impl fmt::Display for QuantumState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "State[")?;
        for (i, c) in self.amplitudes.iter().enumerate() {
            write!(f, "{}{:.4}", if i > 0 { ", " } else { "" }, c)?;
        }
        write!(f, "]")
    }
}
