// src/protocols/barrett_kok.rs

//! Barrett-Kok heralded entanglement generation.
//!
//! Each end node runs one [`EntanglementGeneration`] instance per attempt.
//! The instance is a tagged state machine; every state change goes through
//! the pure [`transition`] function so the full table can be tested without a
//! timeline. The handlers that drive it live on
//! [`EndNode`](crate::network::node::EndNode).

use super::NetEvent;
use crate::core::{fidelity, AttemptId, BellState, NodeId, QuantumState, SimError, SimTime};
use crate::gates::{apply_single_qubit_gate, Gate};
use crate::network::memory::{MemoryMode, MemoryRef, QuantumMemory};
use crate::simulation::timeline::{EventId, Timeline};
use std::fmt;
use tracing::debug;

/// Which side of the pair an instance plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Initiator,
    Responder,
}

impl Role {
    /// Index of this side's qubit in the shared two-qubit register.
    pub fn qubit(self) -> u32 {
        match self {
            Role::Initiator => 0,
            Role::Responder => 1,
        }
    }
}

/// Protocol states. `Entangled` and `Raw` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GenerationState {
    Idle,
    Emitted,
    AwaitingHerald,
    Entangled,
    Raw,
}

impl GenerationState {
    pub const ALL: [GenerationState; 5] = [
        GenerationState::Idle,
        GenerationState::Emitted,
        GenerationState::AwaitingHerald,
        GenerationState::Entangled,
        GenerationState::Raw,
    ];

    pub fn name(self) -> &'static str {
        match self {
            GenerationState::Idle => "IDLE",
            GenerationState::Emitted => "EMITTED",
            GenerationState::AwaitingHerald => "AWAITING_HERALD",
            GenerationState::Entangled => "ENTANGLED",
            GenerationState::Raw => "RAW",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, GenerationState::Entangled | GenerationState::Raw)
    }
}

impl fmt::Display for GenerationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Inputs that move the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trigger {
    Start,
    PhotonEmitted,
    Herald { success: bool },
    Timeout,
}

impl Trigger {
    pub fn name(self) -> &'static str {
        match self {
            Trigger::Start => "START",
            Trigger::PhotonEmitted => "PHOTON_EMITTED",
            Trigger::Herald { success: true } => "HERALD_SUCCESS",
            Trigger::Herald { success: false } => "HERALD_FAILURE",
            Trigger::Timeout => "TIMEOUT",
        }
    }
}

/// The transition table. Anything not listed is an [`SimError::InvalidTransition`].
pub fn transition(state: GenerationState, trigger: Trigger) -> Result<GenerationState, SimError> {
    use GenerationState::*;
    match (state, trigger) {
        (Idle, Trigger::Start) => Ok(Emitted),
        (Emitted, Trigger::PhotonEmitted) => Ok(AwaitingHerald),
        (AwaitingHerald, Trigger::Herald { success: true }) => Ok(Entangled),
        (AwaitingHerald, Trigger::Herald { success: false }) => Ok(Raw),
        (AwaitingHerald, Trigger::Timeout) => Ok(Raw),
        (from, trigger) => Err(SimError::InvalidTransition { from: from.name(), trigger: trigger.name() }),
    }
}

/// Infidelity picked up by a heralded pair: detector and memory
/// inefficiencies weighted by the fraction of light lost in the channels.
pub fn realized_loss(detector_efficiency: f64, memory_efficiency: f64, channel_loss: f64) -> f64 {
    let inefficiency = (1.0 - detector_efficiency) + (1.0 - memory_efficiency);
    (inefficiency * channel_loss / 2.0).clamp(0.0, 1.0)
}

/// The pair both nodes agree on after heralding. For a Psi- outcome the
/// responder applies Pauli-Z to its qubit, leaving Psi+ up to a global phase.
pub fn corrected_pair(bell: BellState) -> Result<QuantumState, SimError> {
    let pair = QuantumState::bell(bell);
    match bell {
        BellState::PsiMinus => apply_single_qubit_gate(&pair, &Gate::pauli_z(), Role::Responder.qubit()),
        _ => Ok(pair),
    }
}

/// Fidelity recorded when a dark count heralded the attempt: the memories
/// share no entanglement, and a maximally mixed pair overlaps any Bell state
/// by 1/4.
pub const DARK_COUNT_FIDELITY: f64 = 0.25;

/// The pair a node actually holds after a genuine herald, dephased by `loss`
/// on its own qubit, and its overlap with Psi+. When the outcome was misread
/// the responder's correction was the wrong one and the pair is Psi-.
pub fn heralded_pair(bell: BellState, misread: bool, role: Role, loss: f64) -> Result<(QuantumState, f64), SimError> {
    let mut pair = corrected_pair(bell)?;
    if misread {
        pair = apply_single_qubit_gate(&pair, &Gate::pauli_z(), Role::Responder.qubit())?;
    }
    dephase(&pair, role.qubit(), loss)
}

/// Dephases `qubit` of `pair` so that its overlap with Psi+ drops by `loss`.
/// Returns the noisy state and that overlap.
pub fn dephase(pair: &QuantumState, qubit: u32, loss: f64) -> Result<(QuantumState, f64), SimError> {
    // cos^2(phi / 2) = 1 - loss
    let phi = 2.0 * (1.0 - loss.clamp(0.0, 1.0)).sqrt().acos();
    let noisy = apply_single_qubit_gate(pair, &Gate::rz(phi), qubit)?;
    let overlap = fidelity(&QuantumState::bell(BellState::PsiPlus), &noisy)?;
    Ok((noisy, overlap))
}

/// One node's view of one entanglement attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct EntanglementGeneration {
    attempt: AttemptId,
    role: Role,
    state: GenerationState,
    memory: String,
    partner: Option<MemoryRef>,
    herald_deadline: SimTime,
    timeout_event: Option<EventId>,
}

impl EntanglementGeneration {
    /// Fresh IDLE instance for `attempt` driving the memory named `memory`.
    pub fn new(attempt: AttemptId, role: Role, memory: impl Into<String>) -> Self {
        Self {
            attempt,
            role,
            state: GenerationState::Idle,
            memory: memory.into(),
            partner: None,
            herald_deadline: SimTime::MAX,
            timeout_event: None,
        }
    }

    /// Makes `a` (on `a_node`) and `b` (on `b_node`) partners of each other.
    pub fn pair(a: &mut Self, a_node: NodeId, b: &mut Self, b_node: NodeId) {
        a.partner = Some(MemoryRef { node: b_node, memory: b.memory.clone() });
        b.partner = Some(MemoryRef { node: a_node, memory: a.memory.clone() });
    }

    pub fn attempt(&self) -> AttemptId {
        self.attempt
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn state(&self) -> GenerationState {
        self.state
    }

    pub fn memory(&self) -> &str {
        &self.memory
    }

    pub fn partner(&self) -> Option<&MemoryRef> {
        self.partner.as_ref()
    }

    /// Absolute time at which a missing herald counts as a failure.
    pub fn herald_deadline(&self) -> SimTime {
        self.herald_deadline
    }

    /// `true` if an event for `attempt` may still act on this instance.
    pub fn accepts(&self, attempt: AttemptId) -> bool {
        self.attempt == attempt && !self.state.is_terminal()
    }

    /// Feeds `trigger` through [`transition`] and stores the new state.
    pub fn apply(&mut self, trigger: Trigger) -> Result<GenerationState, SimError> {
        let next = transition(self.state, trigger)?;
        debug!(attempt = %self.attempt, from = %self.state, to = %next, trigger = trigger.name(), "protocol transition");
        self.state = next;
        Ok(next)
    }

    /// Schedules the photon emission at the memory's next operation slot and
    /// moves to EMITTED. Returns the emission time.
    ///
    /// `herald_deadline` is when the node gives up waiting for the BSM.
    pub fn start(
        &mut self,
        node: NodeId,
        node_name: &str,
        memory: &QuantumMemory,
        herald_deadline: SimTime,
        timeline: &mut Timeline<NetEvent>,
    ) -> Result<SimTime, SimError> {
        if self.partner.is_none() {
            return Err(SimError::NotPaired { node: node_name.to_string() });
        }
        if memory.mode() != MemoryMode::Raw {
            return Err(SimError::MemoryNotRaw { memory: memory.name().to_string() });
        }
        let next = transition(self.state, Trigger::Start)?;
        let emit_at = memory.next_slot(timeline.now());
        timeline.schedule(emit_at, node, NetEvent::EmitPhoton { attempt: self.attempt })?;
        self.herald_deadline = herald_deadline;
        self.state = next;
        Ok(emit_at)
    }

    pub(crate) fn set_timeout_event(&mut self, event: EventId) {
        self.timeout_event = Some(event);
    }

    pub(crate) fn take_timeout_event(&mut self) -> Option<EventId> {
        self.timeout_event.take()
    }
}
