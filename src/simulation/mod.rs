// src/simulation/mod.rs

//! Runs Barrett-Kok experiments on a [`Timeline`].
//! [`Experiment`] wires two end nodes and a BSM node into a [`Network`],
//! arms one attempt at a time, and reports what the initiator observed.

pub mod results;
pub mod sweep;
pub mod timeline;

pub use results::{Outcome, OutcomeTracker, ResultRow, RunReport};
pub use sweep::{sweep_distances, DEFAULT_DISTANCES_M};
pub use timeline::{Event, EventHandler, EventId, EventKind, Timeline};

use crate::config::RunConfig;
use crate::core::{AttemptId, NodeId, SimError, SimTime};
use crate::network::{ClassicalChannel, EndNode, Network, Node, QuantumChannel};
use crate::protocols::{BsmArm, BsmNode, EntanglementGeneration, GenerationState, NetEvent, Role};
use tracing::{debug, info};

/// Registry id of the initiating end node.
pub const INITIATOR: NodeId = NodeId(0);
/// Registry id of the responding end node.
pub const RESPONDER: NodeId = NodeId(1);
/// Registry id of the BSM node.
pub const BSM: NodeId = NodeId(2);

/// Two end nodes, one BSM node, and the timeline driving them.
#[derive(Debug)]
pub struct Experiment {
    config: RunConfig,
    network: Network,
    timeline: Timeline<NetEvent>,
    next_attempt: u64,
}

impl Experiment {
    /// Validates `config` and builds the network at time 0.
    pub fn new(config: RunConfig) -> Result<Self, SimError> {
        config.validate()?;
        let mut network = Network::new();

        let params = config.memory_params();
        for (id, name, seed) in [(INITIATOR, "alice", config.seeds.initiator), (RESPONDER, "bob", config.seeds.responder)] {
            let channel = QuantumChannel::new(id, BSM, config.distance_m, config.attenuation_db_per_m);
            let node = EndNode::new(id, name, params, channel, seed)
                .with_decoherence_expiry(config.decoherence_expiry)
                .with_emission_gating(config.emission_gated_by_memory_efficiency);
            network.insert(Node::End(node))?;
        }

        let mut mediator = BsmNode::new(BSM, "bsm", config.detector_efficiency, config.detection_window_ps, config.seeds.bsm)
            .with_detector(config.detector())
            .with_bsm_efficiency(config.bsm_efficiency);
        for id in [INITIATOR, RESPONDER] {
            let transmission = network.end_node(id)?.channel().transmission_probability();
            let classical = ClassicalChannel::new(BSM, id, config.distance_m, config.classical_delay_ps);
            mediator.connect(BsmArm { node: id, transmission, classical });
        }
        network.insert(Node::Bsm(mediator))?;

        Ok(Self {
            config,
            network,
            timeline: Timeline::with_capacity(16),
            next_attempt: 0,
        })
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn timeline(&self) -> &Timeline<NetEvent> {
        &self.timeline
    }

    /// Current simulated time.
    pub fn now(&self) -> SimTime {
        self.timeline.now()
    }

    /// Drops all state and rebuilds the experiment from its configuration.
    pub fn reset(&mut self) -> Result<(), SimError> {
        *self = Self::new(self.config.clone())?;
        Ok(())
    }

    /// Prepares the next attempt at the current time: consumes both memories,
    /// installs a fresh paired protocol instance on each end node, starts
    /// both and opens the BSM window.
    pub fn arm(&mut self) -> Result<AttemptId, SimError> {
        let attempt = AttemptId(self.next_attempt);
        self.next_attempt += 1;
        let now = self.timeline.now();

        let (window, herald_delay) = {
            let bsm = self.network.bsm(BSM)?;
            (bsm.window(), bsm.max_herald_delay())
        };

        let mut last_arrival = now;
        let mut memories = Vec::with_capacity(2);
        for id in [INITIATOR, RESPONDER] {
            let node = self.network.end_node_mut(id)?;
            node.release_memory(&mut self.timeline);
            let emit_at = node.memory().next_slot(now);
            last_arrival = last_arrival.max(emit_at.saturating_add(node.channel().delay()));
            memories.push(node.memory().name().to_string());
        }
        // a herald sent when the window closes arrives well before this
        let herald_deadline = last_arrival
            .saturating_add(window)
            .saturating_add(herald_delay.saturating_mul(2))
            .saturating_add(1);

        let mut initiator = EntanglementGeneration::new(attempt, Role::Initiator, memories[0].as_str());
        let mut responder = EntanglementGeneration::new(attempt, Role::Responder, memories[1].as_str());
        EntanglementGeneration::pair(&mut initiator, INITIATOR, &mut responder, RESPONDER);

        for (id, protocol) in [(INITIATOR, initiator), (RESPONDER, responder)] {
            let node = self.network.end_node_mut(id)?;
            node.install(protocol);
            node.start(herald_deadline, &mut self.timeline)?;
        }
        self.network.bsm_mut(BSM)?.arm(attempt, last_arrival, &mut self.timeline)?;

        debug!(%attempt, now, herald_deadline, "attempt armed");
        Ok(attempt)
    }

    /// Arms one attempt and runs the timeline until both nodes have resolved it.
    pub fn run_attempt(&mut self) -> Result<Outcome, SimError> {
        self.arm()?;
        let deadline = self
            .network
            .end_node(INITIATOR)?
            .protocol()
            .map(|p| p.herald_deadline())
            .unwrap_or(SimTime::MAX);
        self.timeline.run_until(deadline, &mut self.network)?;

        let state = self.network.end_node(INITIATOR)?.protocol().map(|p| p.state());
        match state {
            Some(GenerationState::Entangled) => Ok(Outcome::Entangled),
            Some(GenerationState::Raw) => Ok(Outcome::Raw),
            other => Err(SimError::InvalidTransition {
                from: other.map(GenerationState::name).unwrap_or("NONE"),
                trigger: "RESOLVE",
            }),
        }
    }

    /// Runs `num_attempts` attempts spaced `attempt_interval_ps` apart and
    /// reports the initiator's outcomes.
    pub fn run(&mut self) -> Result<RunReport, SimError> {
        let attempts = self.config.num_attempts;
        for k in 0..attempts {
            let started = self.timeline.now();
            self.run_attempt()?;
            if k + 1 < attempts {
                let next = started.saturating_add(self.config.attempt_interval_ps);
                self.timeline.run_until(next, &mut self.network)?;
            }
        }
        let report = self.report()?;
        info!(
            distance_m = self.config.distance_m,
            attempts = report.attempts,
            success_rate = report.success_rate,
            avg_fidelity = report.avg_fidelity,
            "run complete"
        );
        Ok(report)
    }

    /// Outcomes seen by `node`.
    pub fn tracker(&self, node: NodeId) -> Result<&OutcomeTracker, SimError> {
        Ok(self.network.end_node(node)?.tracker())
    }

    /// Report built from the initiator's tracker at the current time.
    pub fn report(&self) -> Result<RunReport, SimError> {
        let tracker = self.tracker(INITIATOR)?;
        Ok(RunReport::from_tracker(self.config.distance_m, tracker, self.timeline.now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::MemoryMode;

    fn ideal() -> RunConfig {
        RunConfig {
            distance_m: 0.0,
            detector_efficiency: 1.0,
            memory_efficiency: 1.0,
            num_attempts: 5,
            ..RunConfig::default()
        }
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = RunConfig { memory_efficiency: 2.0, ..RunConfig::default() };
        assert!(matches!(Experiment::new(config), Err(SimError::InvalidConfig { .. })));
    }

    #[test]
    fn test_single_ideal_attempt_entangles_both_memories() -> Result<(), SimError> {
        let mut experiment = Experiment::new(ideal())?;
        assert_eq!(experiment.run_attempt()?, Outcome::Entangled);
        for id in [INITIATOR, RESPONDER] {
            let node = experiment.network().end_node(id)?;
            assert_eq!(node.memory().mode(), MemoryMode::Entangled);
            assert_eq!(node.tracker().entangled_count(), 1);
        }
        let alice = experiment.network().end_node(INITIATOR)?.memory().partner().cloned();
        assert_eq!(alice.map(|p| p.memory), Some("bob.memory".to_string()));
        Ok(())
    }

    #[test]
    fn test_arm_consumes_previous_entanglement() -> Result<(), SimError> {
        let mut experiment = Experiment::new(ideal())?;
        experiment.run_attempt()?;
        experiment.arm()?;
        assert_eq!(experiment.network().end_node(INITIATOR)?.memory().mode(), MemoryMode::Raw);
        Ok(())
    }

    #[test]
    fn test_reset_rewinds_everything() -> Result<(), SimError> {
        let mut experiment = Experiment::new(ideal())?;
        experiment.run()?;
        experiment.reset()?;
        assert_eq!(experiment.now(), 0);
        assert_eq!(experiment.tracker(INITIATOR)?.attempts(), 0);
        assert!(experiment.timeline().is_empty());
        Ok(())
    }

    #[test]
    fn test_attempts_are_spaced_by_interval() -> Result<(), SimError> {
        let mut experiment = Experiment::new(ideal())?;
        let report = experiment.run()?;
        assert_eq!(report.attempts, 5);
        assert!(report.elapsed_ps > 4 * experiment.config().attempt_interval_ps);
        assert!(report.elapsed_ps < 5 * experiment.config().attempt_interval_ps);
        Ok(())
    }
}
