// src/protocols/bsm.rs

//! The Bell-state-measurement mediator sitting between the two end nodes.

use super::NetEvent;
use crate::core::measurement::bernoulli;
use crate::core::{AttemptId, BellState, MeasurementConfig, NodeId, SimError, SimTime};
use crate::network::channel::ClassicalChannel;
use crate::network::memory::Photon;
use crate::simulation::timeline::{Event, EventId, Timeline};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;
use tracing::{debug, trace};

/// What the BSM tells each end node once its detection window closes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HeraldResult {
    /// A detector pattern heralding `bell` was recorded.
    Success {
        bell: BellState,
        /// 1 minus the product of both arm transmissions.
        channel_loss: f64,
        detector_efficiency: f64,
        /// The recorded outcome is the other Psi state than the one measured.
        misread: bool,
        /// The click came from detector noise, not from both photons.
        dark_count: bool,
    },
    Failure,
}

impl HeraldResult {
    pub fn is_success(&self) -> bool {
        matches!(self, HeraldResult::Success { .. })
    }
}

/// Probability that both photons survive their channels and the detector
/// registers the joint measurement.
pub fn heralding_probability(transmission_a: f64, transmission_b: f64, detector_efficiency: f64) -> f64 {
    (transmission_a * transmission_b * detector_efficiency).clamp(0.0, 1.0)
}

/// Success probability of one attempt once the BSM's own efficiency and
/// dark counts are included. `arrival` is the probability that both photons
/// reach the BSM.
pub fn herald_success_probability(arrival: f64, bsm_efficiency: f64, detector: &MeasurementConfig) -> f64 {
    let arrival = arrival.clamp(0.0, 1.0);
    let genuine = bsm_efficiency * heralding_probability(arrival, 1.0, detector.detector_efficiency);
    (genuine + (1.0 - arrival) * detector.dark_count_rate).clamp(0.0, 1.0)
}

/// One end node as seen from the BSM.
#[derive(Debug, Clone)]
pub struct BsmArm {
    pub node: NodeId,
    /// Transmission probability of the quantum channel from `node`.
    pub transmission: f64,
    /// Link used to herald back to `node`.
    pub classical: ClassicalChannel,
}

/// Collects photons per attempt and heralds the measurement outcome.
#[derive(Debug)]
pub struct BsmNode {
    id: NodeId,
    name: String,
    detector: MeasurementConfig,
    bsm_efficiency: f64,
    window: SimTime,
    rng: ChaCha8Rng,
    arms: Vec<BsmArm>,
    collecting: BTreeMap<AttemptId, Vec<Photon>>,
}

impl BsmNode {
    pub fn new(id: NodeId, name: impl Into<String>, detector_efficiency: f64, window: SimTime, seed: u64) -> Self {
        Self {
            id,
            name: name.into(),
            detector: MeasurementConfig::with_efficiency(detector_efficiency),
            bsm_efficiency: 1.0,
            window,
            rng: ChaCha8Rng::seed_from_u64(seed),
            arms: Vec::with_capacity(2),
            collecting: BTreeMap::new(),
        }
    }

    /// Replaces the detector model, including its efficiency.
    pub fn with_detector(mut self, detector: MeasurementConfig) -> Self {
        self.detector = detector;
        self
    }

    /// Probability that the optics perform the joint measurement at all.
    pub fn with_bsm_efficiency(mut self, bsm_efficiency: f64) -> Self {
        self.bsm_efficiency = bsm_efficiency;
        self
    }

    /// Registers an end node and the links to and from it.
    pub fn connect(&mut self, arm: BsmArm) {
        self.arms.push(arm);
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn detector(&self) -> &MeasurementConfig {
        &self.detector
    }

    pub fn bsm_efficiency(&self) -> f64 {
        self.bsm_efficiency
    }

    pub fn window(&self) -> SimTime {
        self.window
    }

    pub fn arms(&self) -> &[BsmArm] {
        &self.arms
    }

    /// Largest herald delay over all arms.
    pub fn max_herald_delay(&self) -> SimTime {
        self.arms.iter().map(|arm| arm.classical.delay()).max().unwrap_or(0)
    }

    /// Success probability of one attempt with the connected arms.
    pub fn theoretical_success_rate(&self) -> f64 {
        match self.arms.as_slice() {
            [a, b] => herald_success_probability(a.transmission * b.transmission, self.bsm_efficiency, &self.detector),
            _ => 0.0,
        }
    }

    /// Opens collection for `attempt`. The window closes at `last_arrival + window`.
    pub fn arm(
        &mut self,
        attempt: AttemptId,
        last_arrival: SimTime,
        timeline: &mut Timeline<NetEvent>,
    ) -> Result<EventId, SimError> {
        self.collecting.insert(attempt, Vec::with_capacity(self.arms.len()));
        let close_at = last_arrival.saturating_add(self.window);
        timeline.schedule(close_at, self.id, NetEvent::CloseDetectionWindow { attempt })
    }

    /// Number of attempts currently collecting photons.
    pub fn open_windows(&self) -> usize {
        self.collecting.len()
    }

    pub fn handle(&mut self, event: Event<NetEvent>, timeline: &mut Timeline<NetEvent>) -> Result<(), SimError> {
        match event.payload {
            NetEvent::PhotonArrival { photon } => {
                self.receive(photon);
                Ok(())
            }
            NetEvent::CloseDetectionWindow { attempt } => self.close_window(attempt, timeline),
            other => {
                debug!(node = %self.name, kind = ?other, "ignoring event not meant for a BSM node");
                Ok(())
            }
        }
    }

    fn receive(&mut self, photon: Photon) {
        let known = self.arms.iter().any(|arm| arm.node == photon.source);
        match self.collecting.get_mut(&photon.attempt) {
            Some(photons) if known => {
                trace!(node = %self.name, source = %photon.source, attempt = %photon.attempt, "photon detected in window");
                photons.push(photon);
            }
            _ => debug!(node = %self.name, source = %photon.source, attempt = %photon.attempt, "photon outside any open window"),
        }
    }

    fn close_window(&mut self, attempt: AttemptId, timeline: &mut Timeline<NetEvent>) -> Result<(), SimError> {
        let photons = self.collecting.remove(&attempt).unwrap_or_default();
        let from_every_arm = !self.arms.is_empty()
            && self.arms.iter().all(|arm| photons.iter().any(|p| p.source == arm.node));

        let detector = self.detector;
        let clicked = if from_every_arm {
            bernoulli(&mut self.rng, self.bsm_efficiency) && detector.detect(true, &mut self.rng)
        } else {
            detector.detect(false, &mut self.rng)
        };

        let result = if clicked {
            let measured_minus = self.rng.gen_bool(0.5);
            let recorded_minus = detector.read(measured_minus, &mut self.rng);
            let transmitted: f64 = self.arms.iter().map(|arm| arm.transmission).product();
            HeraldResult::Success {
                bell: if recorded_minus { BellState::PsiMinus } else { BellState::PsiPlus },
                channel_loss: 1.0 - transmitted,
                detector_efficiency: detector.detector_efficiency,
                misread: recorded_minus != measured_minus,
                dark_count: !from_every_arm,
            }
        } else {
            HeraldResult::Failure
        };
        debug!(node = %self.name, %attempt, photons = photons.len(), success = result.is_success(), "detection window closed");

        let now = timeline.now();
        for arm in &self.arms {
            arm.classical.send(timeline, NetEvent::Herald { attempt, result }, now)?;
        }
        Ok(())
    }
}
