// src/lib.rs

//! `qnetsim` - A discrete-event simulation kernel for quantum networks
//!
//! This library provides a picosecond-resolution event timeline, small
//! state-vector and gate primitives, and the Barrett-Kok heralded
//! entanglement-generation protocol between two quantum memories mediated by
//! a Bell-state-measurement node over lossy fibre.

pub mod config;
pub mod core;
pub mod gates;
pub mod network;
pub mod protocols;
pub mod simulation;
pub mod validation;

// Re-export the most common types for easier top-level use
pub use config::{RunConfig, Seeds};
pub use crate::core::{
    fidelity,
    measure_z,
    measure_z_with_noise,
    AttemptId,
    BellState,
    MeasurementConfig,
    NodeId,
    QuantumState,
    SimError,
    SimTime,
};
pub use gates::{apply_gate, apply_single_qubit_gate, Gate};
pub use network::{ClassicalChannel, MemoryMode, QuantumChannel, QuantumMemory, Transmission};
pub use protocols::{transition, EntanglementGeneration, GenerationState, NetEvent, Role, Trigger};
pub use simulation::{
    sweep_distances,
    Experiment,
    Outcome,
    OutcomeTracker,
    ResultRow,
    RunReport,
    Timeline,
};
pub use validation::{check_dimension, check_normalization, check_probability, check_unitary, validate_state};

// Example 1: Scenario at 1 km
// Runs the default configuration (1 km per arm, 0.0002 dB/m, 100 attempts)
// and checks the result against the closed-form success probability t^2 * 0.9.
/// ```
/// use qnetsim::{Experiment, RunConfig, SimError};
///
/// let config = RunConfig::default();
/// let expected = config.theoretical_success_rate();
/// let sigma = (expected * (1.0 - expected) / 100.0).sqrt();
///
/// let report = Experiment::new(config)?.run()?;
/// println!("{}", report);
///
/// assert_eq!(report.attempts, 100);
/// assert!((report.success_rate - expected).abs() < 4.0 * sigma);
/// assert!(report.success_rate < 1.0);
/// assert!(report.avg_fidelity >= 0.95 - 0.05);
/// # Ok::<(), SimError>(())
/// ```
#[doc(hidden)]
const _: () = ();

// Example 2: Driving the timeline directly
// Any payload implementing `EventKind` can be scheduled; events at the same
// time come out in the order they went in.
/// ```
/// use qnetsim::simulation::{Event, EventKind, Timeline};
/// use qnetsim::{NodeId, SimError};
///
/// struct Ping(u32);
/// impl EventKind for Ping {
///     fn kind(&self) -> &'static str { "ping" }
/// }
///
/// let mut timeline = Timeline::new();
/// timeline.schedule(20, NodeId(0), Ping(2))?;
/// timeline.schedule(10, NodeId(0), Ping(1))?;
/// timeline.schedule(20, NodeId(0), Ping(3))?;
///
/// let mut seen = Vec::new();
/// timeline.run(&mut |event: Event<Ping>, _: &mut Timeline<Ping>| {
///     seen.push((event.time, event.payload.0));
///     Ok(())
/// })?;
/// assert_eq!(seen, vec![(10, 1), (20, 2), (20, 3)]);
///
/// // scheduling into the past is rejected
/// assert!(timeline.schedule(5, NodeId(0), Ping(4)).is_err());
/// # Ok::<(), SimError>(())
/// ```
#[doc(hidden)]
const _: () = ();
