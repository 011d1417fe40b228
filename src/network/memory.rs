// src/network/memory.rs

use crate::core::{AttemptId, NodeId, QuantumState, SimTime, PS_PER_SECOND};
use crate::simulation::timeline::EventId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether a memory currently holds entanglement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemoryMode {
    Raw,
    Entangled,
}

impl fmt::Display for MemoryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryMode::Raw => write!(f, "RAW"),
            MemoryMode::Entangled => write!(f, "ENTANGLED"),
        }
    }
}

/// Physical parameters of a memory.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MemoryParams {
    /// Fidelity of a freshly heralded pair before channel/detector degradation.
    pub fidelity: f64,
    /// Operation frequency; emissions happen on multiples of 1/frequency.
    pub frequency_hz: f64,
    /// Storage efficiency in [0, 1].
    pub efficiency: f64,
    /// Characteristic decay time of stored entanglement, in picoseconds.
    pub coherence_time_ps: SimTime,
}

/// Reference to a memory held by another node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemoryRef {
    pub node: NodeId,
    pub memory: String,
}

/// A photon emitted by a memory, tagged with the attempt it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct Photon {
    pub source: NodeId,
    pub attempt: AttemptId,
    pub emitted_at: SimTime,
    /// Photonic qubit mirroring the excited spin.
    pub encoding: QuantumState,
}

/// F(t) = F0 * exp(-t / T)
pub fn fidelity_after_decoherence(initial: f64, elapsed: SimTime, coherence_time: SimTime) -> f64 {
    if coherence_time == 0 {
        return 0.0;
    }
    initial * (-(elapsed as f64) / coherence_time as f64).exp()
}

/// Storage for one qubit of a remote pair.
#[derive(Debug, Clone)]
pub struct QuantumMemory {
    name: String,
    owner: NodeId,
    params: MemoryParams,
    state: QuantumState,
    mode: MemoryMode,
    fidelity: Option<f64>,
    entangled_at: Option<SimTime>,
    partner: Option<MemoryRef>,
    expiry: Option<EventId>,
}

impl QuantumMemory {
    /// Creates a RAW memory in |0>.
    pub fn new(name: impl Into<String>, owner: NodeId, params: MemoryParams) -> Self {
        Self {
            name: name.into(),
            owner,
            params,
            state: QuantumState::zero(1),
            mode: MemoryMode::Raw,
            fidelity: None,
            entangled_at: None,
            partner: None,
            expiry: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn owner(&self) -> NodeId {
        self.owner
    }

    pub fn params(&self) -> &MemoryParams {
        &self.params
    }

    pub fn state(&self) -> &QuantumState {
        &self.state
    }

    pub fn mode(&self) -> MemoryMode {
        self.mode
    }

    pub fn partner(&self) -> Option<&MemoryRef> {
        self.partner.as_ref()
    }

    pub fn entangled_at(&self) -> Option<SimTime> {
        self.entangled_at
    }

    /// Fidelity at the moment of heralding; `None` unless ENTANGLED.
    pub fn fidelity(&self) -> Option<f64> {
        self.fidelity
    }

    /// Fidelity decayed to time `now`; `None` unless ENTANGLED.
    pub fn fidelity_at(&self, now: SimTime) -> Option<f64> {
        let (f0, since) = (self.fidelity?, self.entangled_at?);
        Some(fidelity_after_decoherence(f0, now.saturating_sub(since), self.params.coherence_time_ps))
    }

    /// Returns the memory to RAW |0>. Hands back any pending expiry event so
    /// the caller can cancel it.
    pub fn reset(&mut self) -> Option<EventId> {
        self.state = QuantumState::zero(1);
        self.mode = MemoryMode::Raw;
        self.fidelity = None;
        self.entangled_at = None;
        self.partner = None;
        self.expiry.take()
    }

    /// Period between emission slots, in picoseconds. Zero for a
    /// non-positive frequency, meaning "emit immediately".
    pub fn period(&self) -> SimTime {
        if self.params.frequency_hz <= 0.0 {
            return 0;
        }
        (PS_PER_SECOND as f64 / self.params.frequency_hz).round() as SimTime
    }

    /// First emission slot at or after `now`.
    pub fn next_slot(&self, now: SimTime) -> SimTime {
        match self.period() {
            0 => now,
            period => now.div_ceil(period).saturating_mul(period),
        }
    }

    /// Excites the spin into |+> and emits a photon entangled with it.
    pub fn emit_photon(&mut self, attempt: AttemptId, now: SimTime) -> Photon {
        // H|0>: the spin always starts from |0> here.
        self.state = QuantumState::plus();
        Photon {
            source: self.owner,
            attempt,
            emitted_at: now,
            encoding: self.state.clone(),
        }
    }

    /// Stores half of a heralded pair.
    pub fn entangle(&mut self, state: QuantumState, fidelity: f64, partner: MemoryRef, now: SimTime) {
        self.state = state;
        self.mode = MemoryMode::Entangled;
        self.fidelity = Some(fidelity.clamp(0.0, 1.0));
        self.entangled_at = Some(now);
        self.partner = Some(partner);
    }

    /// Remembers the event that will expire this entanglement.
    pub fn set_expiry(&mut self, event: EventId) {
        self.expiry = Some(event);
    }
}

impl fmt::Display for QuantumMemory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.fidelity {
            Some(fid) => write!(f, "{}[{} F={:.4}]", self.name, self.mode, fid),
            None => write!(f, "{}[{}]", self.name, self.mode),
        }
    }
}
