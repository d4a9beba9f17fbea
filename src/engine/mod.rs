//! Gantry engine
//!
//! The execution core: graph and node data model, action resolution,
//! per-node workers, parameter propagation, live graph mutation, and
//! graceful stop.
//!
//! ## Layout
//!
//! - **Data model**: [`params`], [`descriptor`], [`graph`], [`diff`]
//! - **Resolution**: [`index`], [`matching`]
//! - **Runtime**: [`action`], [`handle`], [`executor`], [`cancel`]
//! - **Surface**: [`facade`], [`wire`]
//!
//! All public operations go through [`facade::Engine`] or, one level
//! down, [`executor::Executor`]. The executor is a handle around a
//! single owner task; every operation is a command on its channel, so
//! child activation and graph mutation are observed in a total order.

pub mod action;
pub mod cancel;
pub mod constants;
pub mod descriptor;
pub mod diff;
pub mod error;
pub mod executor;
pub mod facade;
pub mod graph;
pub mod handle;
pub mod index;
pub mod matching;
pub mod params;
pub mod wire;

/// Common imports for engine users.
pub mod prelude {
    pub use crate::engine::action::{Action, ActionCore, ActionLoader, RegistryLoader};
    pub use crate::engine::cancel::StopToken;
    pub use crate::engine::descriptor::{Effect, NodeDescriptor, NodeId, Relation};
    pub use crate::engine::diff::{DiffOp, GraphDiff};
    pub use crate::engine::error::{EngineError, EngineResult};
    pub use crate::engine::executor::{Executor, ExecutorConfig};
    pub use crate::engine::facade::Engine;
    pub use crate::engine::graph::{Graph, GraphState, NodeState};
    pub use crate::engine::index::{ActionIndex, IndexEntry, PackageScanner, StaticScanner};
    pub use crate::engine::matching::MatchFinder;
    pub use crate::engine::params::{Parameter, ParameterSet};
    pub use crate::engine::wire::GraphDocument;
}
