//! Graph diffs: atomic-preflight, best-effort-apply mutation lists.

use serde::{Deserialize, Serialize};

use crate::engine::descriptor::NodeDescriptor;

/// The closed set of mutation operations a diff may carry.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffOp {
    AddNode,
    RemoveNode,
    AddChild,
    RemoveChild,
}

impl DiffOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiffOp::AddNode => "add_node",
            DiffOp::RemoveNode => "remove_node",
            DiffOp::AddChild => "add_child",
            DiffOp::RemoveChild => "remove_child",
        }
    }
}

/// One mutation: the operation plus the node descriptor it targets.
///
/// For `add_node` the descriptor is the new node; for the edge
/// operations it is a carrier naming an existing node and the child
/// relations to wire or unwire.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GraphDiff {
    #[serde(rename = "operation")]
    pub op: DiffOp,
    #[serde(rename = "node_descriptor")]
    pub node: NodeDescriptor,
}

impl GraphDiff {
    pub fn add_node(node: NodeDescriptor) -> Self {
        Self {
            op: DiffOp::AddNode,
            node,
        }
    }

    pub fn remove_node(node: NodeDescriptor) -> Self {
        Self {
            op: DiffOp::RemoveNode,
            node,
        }
    }

    pub fn add_child(carrier: NodeDescriptor) -> Self {
        Self {
            op: DiffOp::AddChild,
            node: carrier,
        }
    }

    pub fn remove_child(carrier: NodeDescriptor) -> Self {
        Self {
            op: DiffOp::RemoveChild,
            node: carrier,
        }
    }
}
