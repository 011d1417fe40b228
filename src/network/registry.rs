// src/network/registry.rs

//! Owns every node and routes dispatched events to them by [`NodeId`].

use super::node::EndNode;
use crate::core::{NodeId, SimError};
use crate::protocols::{BsmNode, NetEvent};
use crate::simulation::timeline::{Event, EventHandler, Timeline};
use std::collections::HashMap;
use tracing::trace;

/// Anything that can sit in the registry.
#[derive(Debug)]
pub enum Node {
    End(EndNode),
    Bsm(BsmNode),
}

impl Node {
    pub fn id(&self) -> NodeId {
        match self {
            Node::End(node) => node.id(),
            Node::Bsm(node) => node.id(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Node::End(node) => node.name(),
            Node::Bsm(node) => node.name(),
        }
    }
}

/// Node ids are dense indices into the registry, handed out by
/// [`Network::next_id`].
#[derive(Debug, Default)]
pub struct Network {
    nodes: Vec<Node>,
    names: HashMap<String, NodeId>,
}

impl Network {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id the next inserted node must carry.
    pub fn next_id(&self) -> NodeId {
        NodeId(self.nodes.len() as u32)
    }

    /// Adds `node`. Its id must equal [`Network::next_id`] and its name must
    /// be unused.
    pub fn insert(&mut self, node: Node) -> Result<NodeId, SimError> {
        let id = node.id();
        if id != self.next_id() {
            return Err(SimError::InvalidConfig {
                message: format!("{} carries {} but the next free id is {}", node.name(), id, self.next_id()),
            });
        }
        if self.names.contains_key(node.name()) {
            return Err(SimError::InvalidConfig { message: format!("duplicate node name {}", node.name()) });
        }
        self.names.insert(node.name().to_string(), id);
        self.nodes.push(node);
        Ok(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Resolves a node name.
    pub fn id_of(&self, name: &str) -> Result<NodeId, SimError> {
        self.names.get(name).copied().ok_or_else(|| SimError::UnknownNode { node: name.to_string() })
    }

    pub fn node(&self, id: NodeId) -> Result<&Node, SimError> {
        self.nodes.get(id.0 as usize).ok_or_else(|| SimError::UnknownNode { node: id.to_string() })
    }

    pub fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, SimError> {
        self.nodes.get_mut(id.0 as usize).ok_or_else(|| SimError::UnknownNode { node: id.to_string() })
    }

    pub fn end_node(&self, id: NodeId) -> Result<&EndNode, SimError> {
        match self.node(id)? {
            Node::End(node) => Ok(node),
            Node::Bsm(node) => Err(SimError::UnknownNode { node: format!("{} is not an end node", node.name()) }),
        }
    }

    pub fn end_node_mut(&mut self, id: NodeId) -> Result<&mut EndNode, SimError> {
        match self.node_mut(id)? {
            Node::End(node) => Ok(node),
            Node::Bsm(node) => Err(SimError::UnknownNode { node: format!("{} is not an end node", node.name()) }),
        }
    }

    pub fn bsm(&self, id: NodeId) -> Result<&BsmNode, SimError> {
        match self.node(id)? {
            Node::Bsm(node) => Ok(node),
            Node::End(node) => Err(SimError::UnknownNode { node: format!("{} is not a BSM node", node.name()) }),
        }
    }

    pub fn bsm_mut(&mut self, id: NodeId) -> Result<&mut BsmNode, SimError> {
        match self.node_mut(id)? {
            Node::Bsm(node) => Ok(node),
            Node::End(node) => Err(SimError::UnknownNode { node: format!("{} is not a BSM node", node.name()) }),
        }
    }
}

impl EventHandler<NetEvent> for Network {
    fn handle(&mut self, event: Event<NetEvent>, timeline: &mut Timeline<NetEvent>) -> Result<(), SimError> {
        trace!(time = event.time, target = %event.target, kind = event.kind(), "dispatch");
        match self.node_mut(event.target)? {
            Node::End(node) => node.handle(event, timeline),
            Node::Bsm(node) => node.handle(event, timeline),
        }
    }
}
