//! The action seam: the trait user-supplied behavior implements, the
//! shared state surface between the engine and a running body, and the
//! loader interface that turns a library path into an instance.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use crate::engine::cancel::StopToken;
use crate::engine::descriptor::NodeDescriptor;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::params::{Parameter, ParameterSet};

/// A unit of user-supplied behavior.
///
/// Implementations embed an [`ActionCore`] and expose it through
/// [`Action::core`]; the engine drives the descriptor injection, the
/// parameter updates, and the stop flag through it. `execute` is the
/// blocking body and runs on a dedicated worker; long-running bodies
/// must poll `self.core().action_ok()` and return once it turns false.
pub trait Action: Send + Sync {
    /// The shared state surface the engine operates on.
    fn core(&self) -> &ActionCore;

    /// Blocking action body.
    fn execute(&self) -> EngineResult<()>;

    /// Invoked after updatable input parameters changed while running.
    fn on_parameter_update(&self) {}
}

/// Shared state between an action handle and the running action body.
///
/// The descriptor identity is written once at injection time. The
/// parameter sets carry their own locks: a running body writes outputs
/// while the scheduler reads them, and live updates rewrite inputs while
/// the body reads them.
#[derive(Debug, Default)]
pub struct ActionCore {
    descriptor: RwLock<Option<NodeDescriptor>>,
    inputs: Mutex<ParameterSet>,
    outputs: Mutex<ParameterSet>,
    stop: StopToken,
}

impl ActionCore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inject the descriptor and seed the parameter sets from it.
    pub fn set_descriptor(&self, descriptor: NodeDescriptor) {
        *self.inputs.lock().unwrap_or_else(|e| e.into_inner()) = descriptor.input_params.clone();
        *self.outputs.lock().unwrap_or_else(|e| e.into_inner()) = descriptor.output_params.clone();
        *self.descriptor.write().unwrap_or_else(|e| e.into_inner()) = Some(descriptor);
    }

    pub fn is_bound(&self) -> bool {
        self.descriptor
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    /// Snapshot of the injected descriptor.
    pub fn descriptor(&self) -> Option<NodeDescriptor> {
        self.descriptor
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Snapshot of the current input parameters.
    pub fn inputs(&self) -> ParameterSet {
        self.inputs.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Convenience accessor for a single input's data.
    pub fn input_data(&self, name: &str) -> Option<serde_json::Value> {
        self.inputs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .map(|p| p.data.clone())
    }

    /// Snapshot of the current output parameters.
    pub fn outputs(&self) -> ParameterSet {
        self.outputs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Publish one output parameter.
    pub fn set_output(&self, param: Parameter) {
        self.outputs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .set(param);
    }

    /// Merge updatable input parameters from `incoming`; returns whether
    /// anything changed.
    pub fn update_inputs(&self, incoming: &ParameterSet) -> bool {
        self.inputs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .update_from(incoming)
    }

    pub fn stop_token(&self) -> StopToken {
        self.stop.clone()
    }

    /// The predicate action bodies poll in their loops.
    pub fn action_ok(&self) -> bool {
        self.stop.action_ok()
    }
}

/// Turns a `library_path` into a live action instance.
///
/// The shared-library loader proper is an external collaborator; the
/// engine only requires this interface from it. A dlopen-backed loader
/// plugs in here without the engine changing.
pub trait ActionLoader: Send + Sync {
    fn load(&self, library_path: &str) -> EngineResult<Arc<dyn Action>>;
}

/// Factory producing fresh action instances.
pub type ActionFactory = Arc<dyn Fn() -> Arc<dyn Action> + Send + Sync>;

/// In-process loader keyed by library path; the stand-in used by tests
/// and demos.
#[derive(Clone, Default)]
pub struct RegistryLoader {
    factories: Arc<RwLock<HashMap<String, ActionFactory>>>,
}

impl RegistryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, library_path: impl Into<String>, factory: ActionFactory) {
        self.factories
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(library_path.into(), factory);
    }
}

impl ActionLoader for RegistryLoader {
    fn load(&self, library_path: &str) -> EngineResult<Arc<dyn Action>> {
        let factories = self.factories.read().unwrap_or_else(|e| e.into_inner());
        let factory = factories.get(library_path).ok_or_else(|| {
            EngineError::InstantiationFailed {
                node: library_path.to_string(),
                message: format!("no action registered for library path '{library_path}'"),
            }
        })?;
        Ok(factory())
    }
}
