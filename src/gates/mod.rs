// src/gates/mod.rs

//! Named unitary gates and their application to [`QuantumState`]s.
//!
//! This is deliberately a small, fixed set: the Paulis, Hadamard and a
//! Z rotation are all the entanglement protocol needs. There is no gate
//! synthesis here.

use crate::core::{QuantumState, SimError};
use crate::validation::check_dimension;
use num_complex::Complex;
use num_traits::{One, Zero};
use std::f64::consts::FRAC_1_SQRT_2;
use std::fmt;

/// A square matrix acting on a state vector, stored row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct Gate {
    name: &'static str,
    dim: usize,
    matrix: Vec<Complex<f64>>,
}

impl Gate {
    /// Builds a gate from a row-major matrix. Fails if `matrix` is not
    /// `dim * dim` long. Unitarity is not checked.
    pub fn from_matrix(name: &'static str, dim: usize, matrix: Vec<Complex<f64>>) -> Result<Self, SimError> {
        if matrix.len() != dim * dim {
            return Err(SimError::DimensionMismatch { left: dim * dim, right: matrix.len() });
        }
        Ok(Self { name, dim, matrix })
    }

    fn single(name: &'static str, m: [[Complex<f64>; 2]; 2]) -> Self {
        Self {
            name,
            dim: 2,
            matrix: vec![m[0][0], m[0][1], m[1][0], m[1][1]],
        }
    }

    /// Identity on one qubit.
    pub fn identity() -> Self {
        Self::single("I", [
            [Complex::one(), Complex::zero()],
            [Complex::zero(), Complex::one()],
        ])
    }

    /// Pauli-X (bit flip).
    pub fn pauli_x() -> Self {
        Self::single("X", [
            [Complex::zero(), Complex::one()],
            [Complex::one(), Complex::zero()],
        ])
    }

    /// Pauli-Y.
    pub fn pauli_y() -> Self {
        let i = Complex::i();
        Self::single("Y", [
            [Complex::zero(), -i],
            [i, Complex::zero()],
        ])
    }

    /// Pauli-Z (phase flip).
    pub fn pauli_z() -> Self {
        Self::single("Z", [
            [Complex::one(), Complex::zero()],
            [Complex::zero(), -Complex::one()],
        ])
    }

    /// Hadamard.
    pub fn hadamard() -> Self {
        let h = Complex::new(FRAC_1_SQRT_2, 0.0);
        Self::single("H", [
            [h, h],
            [h, -h],
        ])
    }

    /// Rz(theta) = diag(e^{-i theta/2}, e^{i theta/2}).
    pub fn rz(theta: f64) -> Self {
        let half = theta / 2.0;
        Self::single("Rz", [
            [Complex::new(half.cos(), -half.sin()), Complex::zero()],
            [Complex::zero(), Complex::new(half.cos(), half.sin())],
        ])
    }

    /// Short label of the gate.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Dimension of the space the gate acts on.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Matrix entry at (`row`, `col`).
    pub fn entry(&self, row: usize, col: usize) -> Complex<f64> {
        self.matrix[row * self.dim + col]
    }

    /// Conjugate transpose.
    pub fn adjoint(&self) -> Gate {
        let mut matrix = vec![Complex::zero(); self.dim * self.dim];
        for r in 0..self.dim {
            for c in 0..self.dim {
                matrix[c * self.dim + r] = self.entry(r, c).conj();
            }
        }
        Gate { name: self.name, dim: self.dim, matrix }
    }

    /// Matrix product `self * other`.
    pub fn compose(&self, other: &Gate) -> Result<Gate, SimError> {
        if self.dim != other.dim {
            return Err(SimError::DimensionMismatch { left: self.dim, right: other.dim });
        }
        let n = self.dim;
        let mut matrix = vec![Complex::zero(); n * n];
        for r in 0..n {
            for c in 0..n {
                matrix[r * n + c] = (0..n).map(|k| self.entry(r, k) * other.entry(k, c)).sum::<Complex<f64>>();
            }
        }
        Ok(Gate { name: self.name, dim: n, matrix })
    }
}

impl fmt::Display for Gate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}x{})", self.name, self.dim, self.dim)
    }
}

/// Returns `gate * state` as a new state.
///
/// The gate must act on the full register. Passing a non-unitary matrix is
/// allowed and simply produces an unnormalized result.
pub fn apply_gate(state: &QuantumState, gate: &Gate) -> Result<QuantumState, SimError> {
    let n = state.dim();
    if gate.dim() != n {
        return Err(SimError::DimensionMismatch { left: gate.dim(), right: n });
    }
    let psi = state.amplitudes();
    let out: Vec<Complex<f64>> = (0..n)
        .map(|r| (0..n).map(|c| gate.entry(r, c) * psi[c]).sum::<Complex<f64>>())
        .collect();
    Ok(QuantumState::from_amplitudes(out))
}

/// Applies a 2x2 gate to qubit `target` of a multi-qubit register
/// (qubit 0 is the most significant bit).
pub fn apply_single_qubit_gate(state: &QuantumState, gate: &Gate, target: u32) -> Result<QuantumState, SimError> {
    if gate.dim() != 2 {
        return Err(SimError::DimensionMismatch { left: gate.dim(), right: 2 });
    }
    check_dimension(state)?;
    let num_qubits = state.num_qubits();
    if target >= num_qubits {
        return Err(SimError::DimensionMismatch { left: target as usize + 1, right: num_qubits as usize });
    }

    let k = num_qubits - 1 - target; // bit position from the right
    let k_mask = 1usize << k;
    let lower_mask = k_mask - 1;
    let upper_mask = !((k_mask << 1) - 1);

    let dim = state.dim();
    let psi = state.amplitudes();
    let mut out = vec![Complex::zero(); dim];

    // Walk pairs of basis states that differ only in the target bit.
    for i in 0..dim / 2 {
        let i0 = ((i << 1) & upper_mask) | (i & lower_mask);
        let i1 = i0 | k_mask;
        let (a0, a1) = (psi[i0], psi[i1]);
        out[i0] = gate.entry(0, 0) * a0 + gate.entry(0, 1) * a1;
        out[i1] = gate.entry(1, 0) * a0 + gate.entry(1, 1) * a1;
    }

    Ok(QuantumState::from_amplitudes(out))
}
