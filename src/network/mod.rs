// src/network/mod.rs

//! Physical layer: channels, memories, nodes and the registry tying them together.

pub mod channel;
pub mod memory;
pub mod node;
pub mod registry;

pub use channel::{ClassicalChannel, QuantumChannel, Transmission};
pub use memory::{fidelity_after_decoherence, MemoryMode, MemoryParams, MemoryRef, Photon, QuantumMemory};
pub use node::EndNode;
pub use registry::{Network, Node};
