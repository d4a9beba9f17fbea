//! Wire documents for graph submission, diff submission, and graph
//! export. The transport that delivers them is external; the engine
//! only defines the JSON-equivalent shape and its validation.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::engine::descriptor::NodeDescriptor;
use crate::engine::diff::GraphDiff;
use crate::engine::error::{EngineError, EngineResult};

/// A graph as submitted over the wire: a unique name plus the node
/// descriptors.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphDocument {
    pub graph_name: String,
    #[serde(default)]
    pub nodes: Vec<NodeDescriptor>,
}

impl GraphDocument {
    pub fn new(graph_name: impl Into<String>) -> Self {
        Self {
            graph_name: graph_name.into(),
            nodes: Vec::new(),
        }
    }

    pub fn with_node(mut self, node: NodeDescriptor) -> Self {
        self.nodes.push(node);
        self
    }

    pub fn from_json(value: serde_json::Value) -> EngineResult<Self> {
        serde_json::from_value(value)
            .map_err(|e| EngineError::Unknown(format!("failed to parse graph document: {e}")))
    }

    pub fn from_string(input: &str) -> EngineResult<Self> {
        serde_json::from_str(input)
            .map_err(|e| EngineError::Unknown(format!("failed to parse graph document: {e}")))
    }

    pub fn to_json(&self) -> serde_json::Value {
        // The document is a plain data tree; serialization cannot fail.
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    pub fn to_json_string(&self) -> String {
        self.to_json().to_string()
    }

    /// Structural validation of an incoming document: a graph name,
    /// named nodes with unique full names, and relations that resolve
    /// within the document.
    pub fn validate(&self) -> EngineResult<()> {
        if self.graph_name.is_empty() {
            return Err(EngineError::Uninitialized(
                "graph document has no graph name".to_string(),
            ));
        }
        let mut full_names = HashSet::new();
        for node in &self.nodes {
            if node.name.is_empty() {
                return Err(EngineError::Uninitialized(format!(
                    "graph '{}' contains a node with an empty name",
                    self.graph_name
                )));
            }
            if !full_names.insert(node.full_name()) {
                return Err(EngineError::AlreadyExists(format!(
                    "graph '{}' declares node '{}' twice",
                    self.graph_name,
                    node.full_name()
                )));
            }
        }
        for node in &self.nodes {
            for relation in node.parents.iter().chain(node.children.iter()) {
                if !full_names.contains(&relation.full_name()) {
                    return Err(EngineError::NotFound(format!(
                        "relation '{}' of node '{}' does not resolve within graph '{}'",
                        relation.full_name(),
                        node.full_name(),
                        self.graph_name
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Parse a diff list; unknown operations or malformed descriptors are a
/// bad diff.
pub fn parse_diffs(input: &str) -> EngineResult<Vec<GraphDiff>> {
    serde_json::from_str(input).map_err(|e| EngineError::BadDiff(format!("failed to parse: {e}")))
}
