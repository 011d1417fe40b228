//! Error handling logic

use super::constants::SimTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Identifier of a node in the network registry.
/// Components refer to each other through this handle instead of holding
/// references to one another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node({})", self.0)
    }
}

/// Identifier of one entanglement-generation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AttemptId(pub u64);

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Attempt({})", self.0)
    }
}

/// Errors raised by the simulation kernel.
///
/// Every variant is a usage error: the caller scheduled into the past,
/// mixed incompatible states, or drove a protocol out of order. Photon loss,
/// failed measurements and herald timeouts are ordinary outcomes and never
/// show up here.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    /// An event was scheduled before the current simulated time.
    #[error("Causality Violation: {kind} event scheduled at {time} ps while clock is at {now} ps")]
    CausalityViolation {
        /// Requested dispatch time.
        time: SimTime,
        /// Clock value when the request was made.
        now: SimTime,
        /// Kind tag of the rejected event.
        kind: &'static str,
    },

    /// Two states (or a state and a gate) have incompatible dimensions.
    #[error("Dimension Mismatch: {left} vs {right}")]
    DimensionMismatch {
        /// Dimension of the left operand.
        left: usize,
        /// Dimension of the right operand.
        right: usize,
    },

    /// A protocol instance was started before a partner was assigned.
    #[error("Protocol on {node} started before it was paired")]
    NotPaired {
        /// Name of the node owning the unpaired protocol.
        node: String,
    },

    /// The protocol state machine received a trigger it cannot accept.
    #[error("Invalid Transition: {trigger} is not accepted in state {from}")]
    InvalidTransition {
        /// State the machine was in.
        from: &'static str,
        /// Trigger that was rejected.
        trigger: &'static str,
    },

    /// An attempt was armed on a memory that still holds entanglement.
    #[error("Memory {memory} must be RAW before a new attempt")]
    MemoryNotRaw {
        /// Name of the busy memory.
        memory: String,
    },

    /// A node id or name did not resolve in the registry.
    #[error("Unknown node: {node}")]
    UnknownNode {
        /// Id or name that failed to resolve.
        node: String,
    },

    /// A state vector is not normalized.
    #[error("Unnormalized state: sum(|c_i|^2) = {norm_sq}")]
    Unnormalized {
        /// Computed squared norm.
        norm_sq: f64,
    },

    /// A configuration value is out of range or unparsable.
    #[error("Invalid Configuration: {message}")]
    InvalidConfig {
        /// What was wrong with the configuration.
        message: String,
    },

    /// A handler failed while processing an event.
    #[error("Dispatch of {kind} event at {time} ps failed: {source}")]
    Dispatch {
        /// Dispatch time of the failing event.
        time: SimTime,
        /// Kind tag of the failing event.
        kind: &'static str,
        /// Underlying failure.
        #[source]
        source: Box<SimError>,
    },
}
