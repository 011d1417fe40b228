// src/network/node.rs

//! End nodes: a quantum memory, a fibre to the BSM, and the protocol slot
//! for the current attempt.

use super::channel::{QuantumChannel, Transmission};
use super::memory::{MemoryMode, MemoryParams, QuantumMemory};
use crate::core::{AttemptId, NodeId, SimError, SimTime};
use crate::core::measurement::bernoulli;
use crate::protocols::barrett_kok::{corrected_pair, heralded_pair, realized_loss, DARK_COUNT_FIDELITY};
use crate::protocols::{EntanglementGeneration, GenerationState, HeraldResult, NetEvent, Trigger};
use crate::simulation::results::{Outcome, OutcomeTracker};
use crate::simulation::timeline::{Event, Timeline};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, warn};

/// A network endpoint owning one memory.
#[derive(Debug)]
pub struct EndNode {
    id: NodeId,
    name: String,
    bsm: NodeId,
    memory: QuantumMemory,
    channel: QuantumChannel,
    rng: ChaCha8Rng,
    protocol: Option<EntanglementGeneration>,
    tracker: OutcomeTracker,
    decoherence_expiry: bool,
    emission_gated: bool,
}

impl EndNode {
    /// Creates a node whose memory is named `<name>.memory` and whose photons
    /// travel over `channel` to `channel.dst()`.
    pub fn new(
        id: NodeId,
        name: impl Into<String>,
        memory: MemoryParams,
        channel: QuantumChannel,
        seed: u64,
    ) -> Self {
        let name = name.into();
        Self {
            id,
            bsm: channel.dst(),
            memory: QuantumMemory::new(format!("{name}.memory"), id, memory),
            name,
            channel,
            rng: ChaCha8Rng::seed_from_u64(seed),
            protocol: None,
            tracker: OutcomeTracker::new(),
            decoherence_expiry: false,
            emission_gated: false,
        }
    }

    /// Enables scheduling of ENTANGLED -> RAW expiry after the coherence time.
    pub fn with_decoherence_expiry(mut self, enabled: bool) -> Self {
        self.decoherence_expiry = enabled;
        self
    }

    /// Lets the memory fail to emit with probability `1 - efficiency`.
    pub fn with_emission_gating(mut self, enabled: bool) -> Self {
        self.emission_gated = enabled;
        self
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn memory(&self) -> &QuantumMemory {
        &self.memory
    }

    pub fn channel(&self) -> &QuantumChannel {
        &self.channel
    }

    pub fn protocol(&self) -> Option<&EntanglementGeneration> {
        self.protocol.as_ref()
    }

    pub fn tracker(&self) -> &OutcomeTracker {
        &self.tracker
    }

    /// Puts a new protocol instance in this node's slot, replacing the
    /// previous attempt's.
    pub fn install(&mut self, protocol: EntanglementGeneration) {
        if let Some(previous) = &self.protocol {
            if !previous.state().is_terminal() {
                warn!(node = %self.name, attempt = %previous.attempt(), state = %previous.state(), "replacing unresolved protocol instance");
            }
        }
        self.protocol = Some(protocol);
    }

    /// Consumes whatever the memory holds so the next attempt starts RAW.
    pub fn release_memory(&mut self, timeline: &mut Timeline<NetEvent>) {
        if let Some(expiry) = self.memory.reset() {
            timeline.cancel(expiry);
        }
    }

    /// Starts the installed protocol. Fails with [`SimError::NotPaired`] if
    /// nothing is installed or the instance has no partner.
    pub fn start(&mut self, herald_deadline: SimTime, timeline: &mut Timeline<NetEvent>) -> Result<SimTime, SimError> {
        let Some(protocol) = self.protocol.as_mut() else {
            return Err(SimError::NotPaired { node: self.name.clone() });
        };
        protocol.start(self.id, &self.name, &self.memory, herald_deadline, timeline)
    }

    pub fn handle(&mut self, event: Event<NetEvent>, timeline: &mut Timeline<NetEvent>) -> Result<(), SimError> {
        match event.payload {
            NetEvent::EmitPhoton { attempt } => self.on_emit(attempt, timeline),
            NetEvent::Herald { attempt, result } => self.on_herald(attempt, result, timeline),
            NetEvent::HeraldTimeout { attempt } => self.on_timeout(attempt),
            NetEvent::Decoherence => {
                self.on_decoherence(timeline.now());
                Ok(())
            }
            other => {
                debug!(node = %self.name, kind = ?other, "ignoring event not meant for an end node");
                Ok(())
            }
        }
    }

    // Takes the slot rather than `self` so callers can keep using the other fields.
    fn active<'a>(
        slot: &'a mut Option<EntanglementGeneration>,
        name: &str,
        attempt: AttemptId,
        kind: &'static str,
    ) -> Option<&'a mut EntanglementGeneration> {
        match slot.as_mut() {
            Some(protocol) if protocol.accepts(attempt) => Some(protocol),
            _ => {
                debug!(node = %name, %attempt, kind, "stale event ignored");
                None
            }
        }
    }

    fn on_emit(&mut self, attempt: AttemptId, timeline: &mut Timeline<NetEvent>) -> Result<(), SimError> {
        let (id, bsm, now) = (self.id, self.bsm, timeline.now());
        let Some(protocol) = Self::active(&mut self.protocol, &self.name, attempt, "emit_photon") else {
            return Ok(());
        };
        protocol.apply(Trigger::PhotonEmitted)?;
        let deadline = protocol.herald_deadline();

        if self.emission_gated && !bernoulli(&mut self.rng, self.memory.params().efficiency) {
            debug!(node = %self.name, %attempt, "memory failed to emit");
        } else {
            let photon = self.memory.emit_photon(attempt, now);
            match self.channel.transmit(photon, &mut self.rng) {
                Transmission::Delivered(photon) => {
                    timeline.schedule_in(self.channel.delay(), bsm, NetEvent::PhotonArrival { photon })?;
                }
                Transmission::Lost => debug!(node = %self.name, %attempt, "photon lost in fibre"),
            }
        }

        let timeout = timeline.schedule(deadline.max(now), id, NetEvent::HeraldTimeout { attempt })?;
        protocol.set_timeout_event(timeout);
        Ok(())
    }

    fn on_herald(&mut self, attempt: AttemptId, result: HeraldResult, timeline: &mut Timeline<NetEvent>) -> Result<(), SimError> {
        let now = timeline.now();
        let Some(protocol) = Self::active(&mut self.protocol, &self.name, attempt, "herald") else {
            return Ok(());
        };
        if let Some(timeout) = protocol.take_timeout_event() {
            timeline.cancel(timeout);
        }

        match result {
            HeraldResult::Success { bell, channel_loss, detector_efficiency, misread, dark_count } => {
                protocol.apply(Trigger::Herald { success: true })?;
                let (role, partner) = (protocol.role(), protocol.partner().cloned());
                let Some(partner) = partner else {
                    return Err(SimError::NotPaired { node: self.name.clone() });
                };

                let params = *self.memory.params();
                let (pair, fidelity) = if dark_count {
                    (corrected_pair(bell)?, DARK_COUNT_FIDELITY)
                } else {
                    let loss = realized_loss(detector_efficiency, params.efficiency, channel_loss);
                    let (pair, overlap) = heralded_pair(bell, misread, role, loss)?;
                    (pair, params.fidelity * overlap)
                };
                self.memory.entangle(pair, fidelity, partner, now);
                if self.decoherence_expiry {
                    let expiry = timeline.schedule_in(params.coherence_time_ps, self.id, NetEvent::Decoherence)?;
                    self.memory.set_expiry(expiry);
                }
                self.tracker.record(Outcome::Entangled, Some(fidelity));
                debug!(node = %self.name, %attempt, %bell, fidelity, "entangled");
            }
            HeraldResult::Failure => {
                protocol.apply(Trigger::Herald { success: false })?;
                self.resolve_raw(attempt, "herald failure");
            }
        }
        Ok(())
    }

    fn on_timeout(&mut self, attempt: AttemptId) -> Result<(), SimError> {
        let Some(protocol) = Self::active(&mut self.protocol, &self.name, attempt, "herald_timeout") else {
            return Ok(());
        };
        if protocol.state() != GenerationState::AwaitingHerald {
            debug!(node = %self.name, %attempt, "timeout before emission ignored");
            return Ok(());
        }
        protocol.take_timeout_event();
        protocol.apply(Trigger::Timeout)?;
        warn!(node = %self.name, %attempt, "herald timed out");
        self.resolve_raw(attempt, "herald timeout");
        Ok(())
    }

    fn resolve_raw(&mut self, attempt: AttemptId, reason: &'static str) {
        // no expiry can be pending: the memory was RAW when the attempt started
        self.memory.reset();
        self.tracker.record(Outcome::Raw, None);
        debug!(node = %self.name, %attempt, reason, "attempt resolved RAW");
    }

    fn on_decoherence(&mut self, now: SimTime) {
        if self.memory.mode() == MemoryMode::Entangled {
            debug!(node = %self.name, fidelity = ?self.memory.fidelity_at(now), "entanglement expired");
            self.memory.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::BellState;
    use crate::protocols::Role;

    const ALICE: NodeId = NodeId(0);
    const BSM: NodeId = NodeId(2);

    fn params() -> MemoryParams {
        MemoryParams {
            fidelity: 0.95,
            frequency_hz: 0.0,
            efficiency: 1.0,
            coherence_time_ps: 1_000_000,
        }
    }

    fn node(distance_m: f64) -> EndNode {
        let channel = QuantumChannel::new(ALICE, BSM, distance_m, 0.0002);
        EndNode::new(ALICE, "alice", params(), channel, 1)
    }

    fn armed(node: &mut EndNode, deadline: SimTime, timeline: &mut Timeline<NetEvent>) -> Result<(), SimError> {
        let mut mine = EntanglementGeneration::new(AttemptId(0), Role::Initiator, node.memory().name());
        let mut theirs = EntanglementGeneration::new(AttemptId(0), Role::Responder, "bob.memory");
        EntanglementGeneration::pair(&mut mine, ALICE, &mut theirs, NodeId(1));
        node.install(mine);
        node.start(deadline, timeline)?;
        Ok(())
    }

    fn genuine(bell: BellState) -> HeraldResult {
        HeraldResult::Success { bell, channel_loss: 0.0, detector_efficiency: 1.0, misread: false, dark_count: false }
    }

    // Emits, delivers `result` at t=500 and runs the node to completion.
    fn heralded(mut node: EndNode, result: HeraldResult) -> Result<EndNode, SimError> {
        let mut timeline = Timeline::new();
        armed(&mut node, 1_000, &mut timeline)?;
        let emit = timeline.pop_next().ok_or(SimError::UnknownNode { node: "emit".into() })?;
        node.handle(emit, &mut timeline)?;
        timeline.schedule(500, ALICE, NetEvent::Herald { attempt: AttemptId(0), result })?;
        while let Some(event) = timeline.pop_next() {
            if event.target == ALICE {
                node.handle(event, &mut timeline)?;
            }
        }
        Ok(node)
    }

    #[test]
    fn test_start_without_instance_is_not_paired() {
        let mut node = node(0.0);
        let mut timeline = Timeline::new();
        assert_eq!(node.start(10, &mut timeline), Err(SimError::NotPaired { node: "alice".into() }));
    }

    #[test]
    fn test_emission_sends_photon_and_arms_timeout() -> Result<(), SimError> {
        let mut node = node(1_000.0);
        let mut timeline = Timeline::new();
        armed(&mut node, 50_000_000, &mut timeline)?;

        let emit = timeline.pop_next().ok_or(SimError::UnknownNode { node: "emit".into() })?;
        node.handle(emit, &mut timeline)?;
        assert_eq!(node.protocol().map(|p| p.state()), Some(GenerationState::AwaitingHerald));

        let mut kinds = Vec::new();
        while let Some(event) = timeline.pop_next() {
            kinds.push((event.time, event.target, event.kind()));
            if event.target == ALICE {
                node.handle(event, &mut timeline)?;
            }
        }
        // the photon may be lost, the timeout is always there
        assert!(kinds.contains(&(50_000_000, ALICE, "herald_timeout")));
        assert_eq!(node.tracker().raw_count(), 1);
        assert_eq!(node.memory().mode(), MemoryMode::Raw);
        Ok(())
    }

    #[test]
    fn test_herald_cancels_timeout_and_entangles() -> Result<(), SimError> {
        let mut node = node(0.0);
        let mut timeline = Timeline::new();
        armed(&mut node, 1_000, &mut timeline)?;
        let emit = timeline.pop_next().ok_or(SimError::UnknownNode { node: "emit".into() })?;
        node.handle(emit, &mut timeline)?;

        let result = genuine(BellState::PsiMinus);
        timeline.schedule(500, ALICE, NetEvent::Herald { attempt: AttemptId(0), result })?;
        while let Some(event) = timeline.pop_next() {
            assert_ne!(event.kind(), "herald_timeout");
            if event.target == ALICE {
                node.handle(event, &mut timeline)?;
            }
        }

        assert_eq!(node.tracker().entangled_count(), 1);
        assert_eq!(node.tracker().raw_count(), 0);
        assert_eq!(node.memory().mode(), MemoryMode::Entangled);
        let fidelity = node.memory().fidelity().unwrap_or(0.0);
        assert!((fidelity - 0.95).abs() < 1e-9);
        Ok(())
    }

    #[test]
    fn test_duplicate_herald_is_ignored() -> Result<(), SimError> {
        let mut node = node(0.0);
        let mut timeline = Timeline::new();
        armed(&mut node, 1_000, &mut timeline)?;
        let emit = timeline.pop_next().ok_or(SimError::UnknownNode { node: "emit".into() })?;
        node.handle(emit, &mut timeline)?;

        for _ in 0..2 {
            let herald = NetEvent::Herald { attempt: AttemptId(0), result: HeraldResult::Failure };
            timeline.schedule(500, ALICE, herald)?;
        }
        while let Some(event) = timeline.pop_next() {
            if event.target == ALICE {
                node.handle(event, &mut timeline)?;
            }
        }
        assert_eq!(node.tracker().attempts(), 1);
        Ok(())
    }

    #[test]
    fn test_decoherence_expiry_and_release() -> Result<(), SimError> {
        let mut node = node(0.0).with_decoherence_expiry(true);
        let mut timeline = Timeline::new();
        armed(&mut node, 1_000, &mut timeline)?;
        let emit = timeline.pop_next().ok_or(SimError::UnknownNode { node: "emit".into() })?;
        node.handle(emit, &mut timeline)?;
        let result = genuine(BellState::PsiPlus);
        timeline.schedule(500, ALICE, NetEvent::Herald { attempt: AttemptId(0), result })?;

        while let Some(event) = timeline.pop_next() {
            if event.target == ALICE {
                node.handle(event, &mut timeline)?;
            }
        }
        // expiry fired at 500 + coherence time
        assert_eq!(timeline.now(), 1_000_500);
        assert_eq!(node.memory().mode(), MemoryMode::Raw);
        assert_eq!(node.tracker().entangled_count(), 1);
        Ok(())
    }

    #[test]
    fn test_gated_emission_can_fail() -> Result<(), SimError> {
        let dead = MemoryParams { efficiency: 0.0, ..params() };
        let channel = QuantumChannel::new(ALICE, BSM, 0.0, 0.0002);
        let mut node = EndNode::new(ALICE, "alice", dead, channel, 1).with_emission_gating(true);
        let mut timeline = Timeline::new();
        armed(&mut node, 1_000, &mut timeline)?;
        let emit = timeline.pop_next().ok_or(SimError::UnknownNode { node: "emit".into() })?;
        node.handle(emit, &mut timeline)?;

        // only the timeout is pending: no photon left the memory
        assert_eq!(timeline.pending(), 1);
        assert_eq!(timeline.peek_time(), Some(1_000));
        assert_eq!(node.protocol().map(|p| p.state()), Some(GenerationState::AwaitingHerald));
        Ok(())
    }

    #[test]
    fn test_ungated_emission_ignores_memory_efficiency() -> Result<(), SimError> {
        let dead = MemoryParams { efficiency: 0.0, ..params() };
        let channel = QuantumChannel::new(ALICE, BSM, 0.0, 0.0002);
        let mut node = EndNode::new(ALICE, "alice", dead, channel, 1);
        let mut timeline = Timeline::new();
        armed(&mut node, 1_000, &mut timeline)?;
        let emit = timeline.pop_next().ok_or(SimError::UnknownNode { node: "emit".into() })?;
        node.handle(emit, &mut timeline)?;

        let arrival = timeline.pop_next().ok_or(SimError::UnknownNode { node: "arrival".into() })?;
        assert_eq!(arrival.kind(), "photon_arrival");
        Ok(())
    }

    #[test]
    fn test_dark_count_herald_records_unentangled_fidelity() -> Result<(), SimError> {
        let result = HeraldResult::Success {
            bell: BellState::PsiPlus,
            channel_loss: 0.0,
            detector_efficiency: 1.0,
            misread: false,
            dark_count: true,
        };
        let node = heralded(node(0.0), result)?;
        assert_eq!(node.tracker().entangled_count(), 1);
        assert_eq!(node.memory().fidelity(), Some(DARK_COUNT_FIDELITY));
        Ok(())
    }

    #[test]
    fn test_misread_herald_records_wrong_pair() -> Result<(), SimError> {
        let result = HeraldResult::Success {
            bell: BellState::PsiMinus,
            channel_loss: 0.0,
            detector_efficiency: 1.0,
            misread: true,
            dark_count: false,
        };
        let node = heralded(node(0.0), result)?;
        assert_eq!(node.memory().mode(), MemoryMode::Entangled);
        assert!(node.memory().fidelity().unwrap_or(1.0) < 1e-9);
        Ok(())
    }
}
