//! Typed, named parameter sets attached to graph nodes.
//!
//! Parameter `data` is an opaque JSON value; the engine only ever asks
//! whether it is present. The `type` tag is likewise opaque and is
//! compared verbatim during matching.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A named value carried by a node's input or output set.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub updatable: bool,
    /// Opaque payload; `Null` means no data has been delivered.
    #[serde(default)]
    pub data: serde_json::Value,
    /// Finite set of admissible payloads; empty means unrestricted.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_values: Vec<serde_json::Value>,
}

impl Parameter {
    pub fn new(name: impl Into<String>, param_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            param_type: param_type.into(),
            ..Self::default()
        }
    }

    pub fn required(name: impl Into<String>, param_type: impl Into<String>) -> Self {
        Self {
            required: true,
            ..Self::new(name, param_type)
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }

    pub fn with_updatable(mut self, updatable: bool) -> Self {
        self.updatable = updatable;
        self
    }

    pub fn has_data(&self) -> bool {
        !self.data.is_null()
    }

    /// Structural equality ignoring `data`.
    pub fn is_equal_no_data(&self, other: &Parameter) -> bool {
        self.name == other.name
            && self.param_type == other.param_type
            && self.required == other.required
            && self.updatable == other.updatable
    }

    /// Structural equality ignoring `data` and `updatable`.
    pub fn is_equal_no_data_no_update(&self, other: &Parameter) -> bool {
        self.name == other.name
            && self.param_type == other.param_type
            && self.required == other.required
    }
}

/// A set of parameters keyed by unique name.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterSet {
    params: BTreeMap<String, Parameter>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace by name.
    pub fn set(&mut self, param: Parameter) {
        self.params.insert(param.name.clone(), param);
    }

    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.params.get(name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.params.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.params.values()
    }

    /// Copy delivered data from `other` into parameters this set already
    /// holds. Names absent from `self` are never added.
    pub fn copy_from(&mut self, other: &ParameterSet) {
        for (name, incoming) in &other.params {
            if let Some(param) = self.params.get_mut(name) {
                param.data = incoming.data.clone();
            }
        }
    }

    /// Replace parameters marked updatable with their counterparts from
    /// `incoming`. Returns whether anything changed.
    pub fn update_from(&mut self, incoming: &ParameterSet) -> bool {
        let mut updated = false;
        for (name, param_in) in &incoming.params {
            let Some(param) = self.params.get_mut(name) else {
                continue;
            };
            if !param.updatable {
                continue;
            }
            *param = param_in.clone();
            updated = true;
        }
        updated
    }

    /// True iff every parameter with `required = true` has data.
    pub fn delivered(&self) -> bool {
        self.params
            .values()
            .filter(|p| p.required)
            .all(Parameter::has_data)
    }

    /// Structural equality over the whole set, ignoring data. With
    /// `check_updatable` the updatable flag must match as well.
    pub fn is_equal(&self, other: &ParameterSet, check_updatable: bool) -> bool {
        if self.len() != other.len() {
            return false;
        }
        self.params.values().all(|param| {
            other.get(&param.name).is_some_and(|other_param| {
                if check_updatable {
                    param.is_equal_no_data(other_param)
                } else {
                    param.is_equal_no_data_no_update(other_param)
                }
            })
        })
    }
}

impl FromIterator<Parameter> for ParameterSet {
    fn from_iter<I: IntoIterator<Item = Parameter>>(iter: I) -> Self {
        let mut set = ParameterSet::new();
        for param in iter {
            set.set(param);
        }
        set
    }
}
