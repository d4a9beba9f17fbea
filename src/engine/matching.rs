//! Resolves graph nodes to indexed action implementations.

use crate::engine::descriptor::NodeDescriptor;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::index::{ActionIndex, IndexEntry};

/// Deterministic matcher from a node descriptor to the best index entry.
///
/// Candidates must be schema-compatible with the node: same effect and
/// equal input/output parameter schemas, ignoring parameter data and the
/// updatable flags. Graph wiring (parents/children) does not participate;
/// an index entry advertises an implementation signature, not a graph
/// position. Ties are broken by lexicographically smallest library path.
#[derive(Clone, Copy, Debug, Default)]
pub struct MatchFinder {
    pub name_match_required: bool,
}

impl MatchFinder {
    pub fn new(name_match_required: bool) -> Self {
        Self {
            name_match_required,
        }
    }

    /// Find the matching entry for `node`.
    pub fn find_match<'a>(
        &self,
        node: &NodeDescriptor,
        index: &'a ActionIndex,
    ) -> EngineResult<&'a IndexEntry> {
        let mut best: Option<&IndexEntry> = None;
        for entry in index.entries() {
            if self.name_match_required && entry.descriptor.name != node.name {
                continue;
            }
            if !schema_match(node, &entry.descriptor) {
                continue;
            }
            best = match best {
                Some(current) if current.library_path() <= entry.library_path() => Some(current),
                _ => Some(entry),
            };
        }
        best.ok_or_else(|| EngineError::NoMatch {
            node: node.full_name(),
            message: format!("no indexed implementation matches '{}'", node.name),
        })
    }

    /// Resolve `node` against the index, returning a copy that carries
    /// the matched implementation's library path and package name.
    pub fn resolve(&self, node: &NodeDescriptor, index: &ActionIndex) -> EngineResult<NodeDescriptor> {
        let entry = self.find_match(node, index)?;
        let mut resolved = node.clone();
        resolved.library_path = entry.descriptor.library_path.clone();
        if resolved.package_name.is_empty() {
            resolved.package_name = entry.descriptor.package_name.clone();
        }
        Ok(resolved)
    }
}

fn schema_match(node: &NodeDescriptor, advertised: &NodeDescriptor) -> bool {
    node.effect == advertised.effect
        && node.input_params.is_equal(&advertised.input_params, false)
        && node.output_params.is_equal(&advertised.output_params, false)
}
