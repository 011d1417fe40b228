// src/protocols/mod.rs

//! Entanglement-generation protocols and the events they exchange.

pub mod barrett_kok;
pub mod bsm;

pub use barrett_kok::{transition, EntanglementGeneration, GenerationState, Role, Trigger};
pub use bsm::{herald_success_probability, heralding_probability, BsmArm, BsmNode, HeraldResult};

use crate::core::AttemptId;
use crate::network::memory::Photon;
use crate::simulation::timeline::EventKind;

/// Payload of every event on a network timeline.
#[derive(Debug, Clone, PartialEq)]
pub enum NetEvent {
    /// An end node excites its memory and sends the photon toward the BSM.
    EmitPhoton { attempt: AttemptId },
    /// A photon reached the BSM node.
    PhotonArrival { photon: Photon },
    /// The BSM stops collecting photons for `attempt` and measures.
    CloseDetectionWindow { attempt: AttemptId },
    /// Classical result of the joint measurement, delivered to an end node.
    Herald { attempt: AttemptId, result: HeraldResult },
    /// The herald for `attempt` did not arrive in time.
    HeraldTimeout { attempt: AttemptId },
    /// Stored entanglement has outlived its coherence time.
    Decoherence,
}

impl EventKind for NetEvent {
    fn kind(&self) -> &'static str {
        match self {
            NetEvent::EmitPhoton { .. } => "emit_photon",
            NetEvent::PhotonArrival { .. } => "photon_arrival",
            NetEvent::CloseDetectionWindow { .. } => "close_window",
            NetEvent::Herald { .. } => "herald",
            NetEvent::HeraldTimeout { .. } => "herald_timeout",
            NetEvent::Decoherence => "decoherence",
        }
    }
}
