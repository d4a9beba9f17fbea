//! Node descriptors: the declarative description of a single action and
//! its I/O within a graph.

use serde::{Deserialize, Serialize};

use crate::engine::error::{EngineError, EngineResult};
use crate::engine::params::ParameterSet;

/// Engine-assigned node identifier, unique for the engine's lifetime.
pub type NodeId = u32;

/// Whether a node's completion is observed by the cleanup pass.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effect {
    #[default]
    Synchronous,
    Asynchronous,
}

impl Effect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Effect::Synchronous => "synchronous",
            Effect::Asynchronous => "asynchronous",
        }
    }
}

/// A reference to another node along a parent/child edge.
///
/// `required` marks the edge mandatory for child readiness; `received`
/// is a runtime flag toggled when the parent completes.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    pub name: String,
    #[serde(default)]
    pub suffix: u32,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub received: bool,
}

impl Relation {
    pub fn new(name: impl Into<String>, suffix: u32) -> Self {
        Self {
            name: name.into(),
            suffix,
            required: false,
            received: false,
        }
    }

    pub fn required(name: impl Into<String>, suffix: u32) -> Self {
        Self {
            required: true,
            ..Self::new(name, suffix)
        }
    }

    pub fn full_name(&self) -> String {
        format!("{}_{}", self.name, self.suffix)
    }

    /// Identity comparison; the runtime flags do not participate.
    pub fn matches(&self, other: &Relation) -> bool {
        self.name == other.name && self.suffix == other.suffix
    }
}

/// Immutable-identity record describing one node of an action graph.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeDescriptor {
    pub name: String,
    #[serde(default)]
    pub suffix: u32,
    #[serde(default)]
    pub package_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub notation: String,
    #[serde(default)]
    pub effect: Effect,
    #[serde(default)]
    pub library_path: String,
    #[serde(default)]
    pub parents: Vec<Relation>,
    #[serde(default)]
    pub children: Vec<Relation>,
    #[serde(default)]
    pub input_params: ParameterSet,
    #[serde(default)]
    pub output_params: ParameterSet,
    /// Engine-assigned; zero until admission.
    #[serde(default)]
    pub id: NodeId,
}

impl NodeDescriptor {
    pub fn new(name: impl Into<String>, suffix: u32) -> Self {
        Self {
            name: name.into(),
            suffix,
            ..Self::default()
        }
    }

    pub fn with_library_path(mut self, library_path: impl Into<String>) -> Self {
        self.library_path = library_path.into();
        self
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effect = effect;
        self
    }

    pub fn with_parent(mut self, parent: Relation) -> Self {
        self.parents.push(parent);
        self
    }

    pub fn with_child(mut self, child: Relation) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_input(mut self, param: crate::engine::params::Parameter) -> Self {
        self.input_params.set(param);
        self
    }

    pub fn with_output(mut self, param: crate::engine::params::Parameter) -> Self {
        self.output_params.set(param);
        self
    }

    pub fn full_name(&self) -> String {
        format!("{}_{}", self.name, self.suffix)
    }

    pub fn set_id(&mut self, id: NodeId) {
        self.id = id;
    }

    /// A descriptor is correct when it names an action and a library to
    /// load it from.
    pub fn is_correct(&self) -> bool {
        !self.name.is_empty() && !self.library_path.is_empty()
    }

    pub fn as_relation(&self) -> Relation {
        Relation::new(self.name.clone(), self.suffix)
    }

    /// Flip the `received` flag on the matching parent relation.
    pub fn mark_parent_received(&mut self, parent: &Relation) -> EngineResult<()> {
        match self.parents.iter_mut().find(|r| r.matches(parent)) {
            Some(relation) => {
                relation.received = true;
                Ok(())
            }
            None => Err(EngineError::UnknownRelation {
                node: self.full_name(),
                relation: parent.full_name(),
            }),
        }
    }

    /// True iff every required parent has reported completion.
    pub fn required_parents_finished(&self) -> bool {
        self.parents.iter().all(|p| !p.required || p.received)
    }

    /// True iff every required input parameter has data.
    pub fn inputs_delivered(&self) -> bool {
        self.input_params.delivered()
    }

    /// Structural equality: identity fields, relation multisets, and
    /// parameter schemas, ignoring parameter data. With
    /// `check_updatable` the updatable flags must match too.
    pub fn is_equal(&self, other: &NodeDescriptor, check_updatable: bool) -> bool {
        if self.name != other.name
            || self.suffix != other.suffix
            || self.notation != other.notation
            || self.effect != other.effect
        {
            return false;
        }

        if self.parents.len() != other.parents.len()
            || self.children.len() != other.children.len()
        {
            return false;
        }
        let relations_close = |own: &[Relation], theirs: &[Relation]| {
            theirs
                .iter()
                .all(|r| own.iter().any(|own_r| own_r.matches(r)))
        };
        if !relations_close(&self.parents, &other.parents)
            || !relations_close(&self.children, &other.children)
        {
            return false;
        }

        self.input_params.is_equal(&other.input_params, check_updatable)
            && self.output_params.is_equal(&other.output_params, false)
    }
}
