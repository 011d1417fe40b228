//! Physical and numerical constants used across the simulator.

/// Simulated time, in picoseconds.
pub type SimTime = u64;

/// Units and physical constants for the network model.
pub mod sim_constants {
    use super::SimTime;

    /// Picoseconds in one second.
    pub const PS_PER_SECOND: SimTime = 1_000_000_000_000;
    /// Speed of light in optical fibre, in meters per picosecond.
    pub const LIGHT_SPEED_FIBER_M_PER_PS: f64 = 2e-4;
    /// Tolerance for norm and fidelity comparisons.
    pub const NORM_TOLERANCE: f64 = 1e-9;
}
