//! The graph arena: node descriptors keyed by engine id, name-to-id
//! resolution, per-node and derived graph state, and the mutation
//! operations used by diff application.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::descriptor::{NodeDescriptor, NodeId, Relation};
use crate::engine::error::{EngineError, EngineResult};

/// Per-node lifecycle state tracked by the graph.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeState {
    Initialized,
    Active,
    Finished,
    Error,
}

/// Derived graph-level state.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GraphState {
    Uninitialized,
    Initialized,
    Active,
    Finished,
    Error,
}

/// A named DAG over node descriptors.
///
/// Relations carry `(name, suffix)` by value; resolution to ids goes
/// through the `name_to_id` map. Adjacency is computed from the
/// descriptors' relation lists, so diff application only ever touches
/// the two endpoint descriptors.
#[derive(Debug)]
pub struct Graph {
    name: String,
    nodes: HashMap<NodeId, NodeDescriptor>,
    name_to_id: HashMap<String, NodeId>,
    node_states: HashMap<NodeId, NodeState>,
    added_at: DateTime<Utc>,
}

impl Graph {
    /// Build a graph from descriptors that already carry engine ids.
    /// Duplicate full names are rejected; correctness and relation
    /// closure are reported through [`Graph::check_state`].
    pub fn new(name: impl Into<String>, nodes: Vec<NodeDescriptor>) -> EngineResult<Self> {
        let name = name.into();
        let mut node_map = HashMap::new();
        let mut name_to_id = HashMap::new();
        let mut node_states = HashMap::new();

        for node in nodes {
            let full_name = node.full_name();
            if name_to_id.contains_key(&full_name) {
                return Err(EngineError::AlreadyExists(format!(
                    "graph '{name}' declares node '{full_name}' twice"
                )));
            }
            name_to_id.insert(full_name, node.id);
            node_states.insert(node.id, NodeState::Initialized);
            node_map.insert(node.id, node);
        }

        Ok(Self {
            name,
            nodes: node_map,
            name_to_id,
            node_states,
            added_at: Utc::now(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn added_at(&self) -> DateTime<Utc> {
        self.added_at
    }

    pub fn node_ids(&self) -> Vec<NodeId> {
        self.nodes.keys().copied().collect()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &NodeDescriptor> {
        self.nodes.values()
    }

    pub fn node(&self, id: NodeId) -> EngineResult<&NodeDescriptor> {
        self.nodes
            .get(&id)
            .ok_or_else(|| EngineError::NotFound(format!("graph '{}' has no node {id}", self.name)))
    }

    pub fn node_mut(&mut self, id: NodeId) -> EngineResult<&mut NodeDescriptor> {
        let name = self.name.clone();
        self.nodes
            .get_mut(&id)
            .ok_or_else(|| EngineError::NotFound(format!("graph '{name}' has no node {id}")))
    }

    pub fn id_of(&self, full_name: &str) -> Option<NodeId> {
        self.name_to_id.get(full_name).copied()
    }

    pub fn part_of(&self, full_name: &str) -> bool {
        self.name_to_id.contains_key(full_name)
    }

    pub fn contains_id(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// The roots: nodes with no parents.
    pub fn roots(&self) -> Vec<NodeId> {
        let mut roots: Vec<NodeId> = self
            .nodes
            .values()
            .filter(|n| n.parents.is_empty())
            .map(|n| n.id)
            .collect();
        roots.sort_unstable();
        roots
    }

    /// Ids of the node's children, skipping relations that no longer
    /// resolve (possible transiently during diff application).
    pub fn children_of(&self, id: NodeId) -> Vec<NodeId> {
        let Some(node) = self.nodes.get(&id) else {
            return Vec::new();
        };
        let mut children: Vec<NodeId> = node
            .children
            .iter()
            .filter_map(|r| self.id_of(&r.full_name()))
            .collect();
        children.sort_unstable();
        children
    }

    pub fn parents_of(&self, id: NodeId) -> Vec<NodeId> {
        let Some(node) = self.nodes.get(&id) else {
            return Vec::new();
        };
        let mut parents: Vec<NodeId> = node
            .parents
            .iter()
            .filter_map(|r| self.id_of(&r.full_name()))
            .collect();
        parents.sort_unstable();
        parents
    }

    pub fn node_state(&self, id: NodeId) -> Option<NodeState> {
        self.node_states.get(&id).copied()
    }

    /// Transition a node's state. Same-state transitions are accepted;
    /// `Error` is terminal and a finished node can no longer activate.
    pub fn set_node_state(&mut self, id: NodeId, state: NodeState) -> EngineResult<()> {
        let current = self.node_states.get(&id).copied().ok_or_else(|| {
            EngineError::NotFound(format!("graph '{}' has no node {id}", self.name))
        })?;
        if current == state {
            return Ok(());
        }
        let allowed = match (current, state) {
            (NodeState::Initialized, _) => true,
            (NodeState::Active, NodeState::Finished) | (NodeState::Active, NodeState::Error) => {
                true
            }
            _ => false,
        };
        if !allowed {
            return Err(EngineError::Unknown(format!(
                "invalid node state transition {current:?} -> {state:?} for node {id} in graph '{}'",
                self.name
            )));
        }
        self.node_states.insert(id, state);
        Ok(())
    }

    /// The derived graph state per the node states and descriptor
    /// correctness.
    pub fn check_state(&self) -> GraphState {
        if self.nodes.values().any(|n| !n.is_correct()) || !self.relations_close() {
            return GraphState::Uninitialized;
        }
        let states = self.node_states.values();
        if states.clone().any(|s| *s == NodeState::Error) {
            return GraphState::Error;
        }
        if states.clone().any(|s| *s == NodeState::Active) {
            return GraphState::Active;
        }
        if !self.nodes.is_empty() && states.clone().all(|s| *s == NodeState::Finished) {
            return GraphState::Finished;
        }
        GraphState::Initialized
    }

    fn relations_close(&self) -> bool {
        self.nodes.values().all(|node| {
            node.parents
                .iter()
                .chain(node.children.iter())
                .all(|r| self.part_of(&r.full_name()))
        })
    }

    /// Insert a new node; rejected when the full name is taken.
    pub fn add_node(&mut self, node: NodeDescriptor) -> EngineResult<NodeId> {
        let full_name = node.full_name();
        if self.part_of(&full_name) {
            return Err(EngineError::AlreadyExists(format!(
                "node '{full_name}' is already part of graph '{}'",
                self.name
            )));
        }
        let id = node.id;
        self.name_to_id.insert(full_name, id);
        self.node_states.insert(id, NodeState::Initialized);
        self.nodes.insert(id, node);
        Ok(id)
    }

    /// Remove a node and every edge referencing it on neighboring
    /// descriptors. Returns the removed node's id.
    pub fn remove_node(&mut self, target: &Relation) -> EngineResult<NodeId> {
        let full_name = target.full_name();
        let id = self.id_of(&full_name).ok_or_else(|| {
            EngineError::NotFound(format!(
                "graph '{}' does not contain node '{full_name}'",
                self.name
            ))
        })?;

        let removed = self.nodes.remove(&id).ok_or_else(|| {
            EngineError::NotFound(format!("graph '{}' has no node {id}", self.name))
        })?;
        self.name_to_id.remove(&full_name);
        self.node_states.remove(&id);

        let as_relation = removed.as_relation();
        for neighbor in removed.parents.iter().chain(removed.children.iter()) {
            if let Some(neighbor_id) = self.id_of(&neighbor.full_name()) {
                if let Some(node) = self.nodes.get_mut(&neighbor_id) {
                    node.children.retain(|r| !r.matches(&as_relation));
                    node.parents.retain(|r| !r.matches(&as_relation));
                }
            }
        }
        Ok(id)
    }

    /// Wire new child edges. The carrier names an existing node and
    /// lists the children to attach; both endpoints are updated, or
    /// neither on validation failure.
    pub fn add_child(&mut self, carrier: &NodeDescriptor) -> EngineResult<()> {
        let parent_id = self.require_id(&carrier.full_name())?;
        let mut child_ids = Vec::with_capacity(carrier.children.len());
        for child in &carrier.children {
            child_ids.push((self.require_id(&child.full_name())?, child.clone()));
        }

        let parent_relation = carrier.as_relation();
        for (child_id, relation) in child_ids {
            let parent = self.node_mut(parent_id)?;
            if !parent.children.iter().any(|r| r.matches(&relation)) {
                parent.children.push(relation.clone());
            }
            let child = self.node_mut(child_id)?;
            if !child.parents.iter().any(|r| r.matches(&parent_relation)) {
                let mut incoming = parent_relation.clone();
                incoming.required = relation.required;
                child.parents.push(incoming);
            }
        }
        Ok(())
    }

    /// Unwire child edges named by the carrier from both endpoints.
    pub fn remove_child(&mut self, carrier: &NodeDescriptor) -> EngineResult<()> {
        let parent_id = self.require_id(&carrier.full_name())?;
        let mut child_ids = Vec::with_capacity(carrier.children.len());
        for child in &carrier.children {
            child_ids.push((self.require_id(&child.full_name())?, child.clone()));
        }

        let parent_relation = carrier.as_relation();
        for (child_id, relation) in child_ids {
            self.node_mut(parent_id)?
                .children
                .retain(|r| !r.matches(&relation));
            self.node_mut(child_id)?
                .parents
                .retain(|r| !r.matches(&parent_relation));
        }
        Ok(())
    }

    fn require_id(&self, full_name: &str) -> EngineResult<NodeId> {
        self.id_of(full_name).ok_or_else(|| {
            EngineError::NotFound(format!(
                "graph '{}' does not contain node '{full_name}'",
                self.name
            ))
        })
    }
}
