//! Per-node runtime: owns the instantiated action, its worker task, and
//! the completion channel the scheduler drains.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch};
use tracing::debug;

use crate::engine::action::{Action, ActionLoader};
use crate::engine::descriptor::{Effect, NodeDescriptor, NodeId};
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::params::ParameterSet;

/// Lifecycle of an action handle.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum HandleState {
    Uninitialized,
    Initialized,
    Running,
    Finished,
    Error,
}

/// What a worker reports when its action body returns.
#[derive(Clone, Debug)]
pub struct CompletionRecord {
    pub handle_id: NodeId,
    pub outputs: ParameterSet,
    pub error: Option<String>,
}

/// Channel workers report completions on; drained by the executor's
/// owner task.
pub type CompletionSink = mpsc::UnboundedSender<CompletionRecord>;

/// Runtime twin of a graph node.
pub struct ActionHandle {
    handle_id: NodeId,
    descriptor: NodeDescriptor,
    state: HandleState,
    action: Option<Arc<dyn Action>>,
    worker: Option<tokio::task::JoinHandle<()>>,
    completion_tx: Option<watch::Sender<Option<CompletionRecord>>>,
    completion_rx: watch::Receiver<Option<CompletionRecord>>,
    drained: bool,
    started_at: Option<DateTime<Utc>>,
    loader: Arc<dyn ActionLoader>,
    completions: CompletionSink,
}

impl ActionHandle {
    /// Build a handle for a node. The handle is `Initialized` iff the
    /// descriptor is correct and every required input has been
    /// delivered; otherwise it is `Uninitialized` and the scheduler will
    /// not start it.
    pub fn new(
        descriptor: NodeDescriptor,
        loader: Arc<dyn ActionLoader>,
        completions: CompletionSink,
    ) -> Self {
        let state = if descriptor.is_correct() && descriptor.inputs_delivered() {
            HandleState::Initialized
        } else {
            HandleState::Uninitialized
        };
        let (completion_tx, completion_rx) = watch::channel(None);
        Self {
            handle_id: descriptor.id,
            descriptor,
            state,
            action: None,
            worker: None,
            completion_tx: Some(completion_tx),
            completion_rx,
            drained: false,
            started_at: None,
            loader,
            completions,
        }
    }

    pub fn handle_id(&self) -> NodeId {
        self.handle_id
    }

    pub fn state(&self) -> HandleState {
        self.state
    }

    pub fn effect(&self) -> Effect {
        self.descriptor.effect
    }

    pub fn full_name(&self) -> String {
        self.descriptor.full_name()
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Load the library and construct the action object, injecting the
    /// descriptor.
    pub fn instantiate(&mut self) -> EngineResult<()> {
        if self.state != HandleState::Initialized {
            return Err(EngineError::NotInitialized(format!(
                "cannot instantiate '{}' from state {:?}",
                self.full_name(),
                self.state
            )));
        }
        let action = self
            .loader
            .load(&self.descriptor.library_path)
            .map_err(|e| e.forward("instantiate"))?;
        action.core().set_descriptor(self.descriptor.clone());
        self.action = Some(action);
        Ok(())
    }

    /// Spawn the worker that runs the blocking action body.
    pub fn start(&mut self) -> EngineResult<()> {
        let action = self.action.clone().ok_or_else(|| {
            EngineError::NotInitialized(format!(
                "cannot start '{}' before instantiation",
                self.full_name()
            ))
        })?;
        let completion_tx = self.completion_tx.take().ok_or_else(|| {
            EngineError::ExecutionFailed {
                node: self.full_name(),
                message: "worker already started".to_string(),
            }
        })?;

        let handle_id = self.handle_id;
        let full_name = self.full_name();
        let completions = self.completions.clone();
        let worker = tokio::task::spawn_blocking(move || {
            let result = action.execute();
            let record = CompletionRecord {
                handle_id,
                outputs: action.core().outputs(),
                error: result.err().map(|e| e.to_string()),
            };
            debug!(action = %full_name, error = ?record.error, "worker finished");
            let _ = completion_tx.send(Some(record.clone()));
            let _ = completions.send(record);
        });

        self.worker = Some(worker);
        self.started_at = Some(Utc::now());
        self.state = HandleState::Running;
        Ok(())
    }

    /// Cooperative stop: set the stop flag, wait up to `timeout` for the
    /// body to return, abandon the worker on expiry. Idempotent.
    pub async fn stop(&mut self, timeout: Duration) -> EngineResult<()> {
        if self.state != HandleState::Running {
            return Ok(());
        }
        if let Some(action) = &self.action {
            action.core().stop_token().request_stop("stop requested");
        }

        let mut rx = self.completion_rx.clone();
        match tokio::time::timeout(timeout, rx.wait_for(|v| v.is_some())).await {
            Ok(Ok(_)) => {
                self.state = HandleState::Finished;
            }
            _ => {
                // Abandoned: the worker may keep running until process
                // exit, but the engine no longer tracks it.
                debug!(action = %self.full_name(), "stop timeout expired, abandoning worker");
                self.worker = None;
                self.state = HandleState::Error;
            }
        }
        Ok(())
    }

    /// Merge updatable input parameters and fire the action's update
    /// hook. Allowed while running only.
    pub fn update_descriptor(&mut self, incoming: &NodeDescriptor) -> EngineResult<bool> {
        if self.state != HandleState::Running {
            return Err(EngineError::NotInitialized(format!(
                "cannot update parameters of '{}' from state {:?}",
                self.full_name(),
                self.state
            )));
        }
        let action = self.action.as_ref().ok_or_else(|| {
            EngineError::NotInitialized(format!("'{}' has no live instance", self.full_name()))
        })?;
        let updated = action.core().update_inputs(&incoming.input_params);
        if updated {
            action.on_parameter_update();
        }
        Ok(updated)
    }

    /// Record that the worker reported natural completion.
    pub fn note_completed(&mut self) {
        if self.state == HandleState::Running {
            self.state = HandleState::Finished;
        }
    }

    /// Whether the worker has delivered its completion record.
    pub fn future_ready(&self) -> bool {
        !self.drained && self.completion_rx.borrow().is_some()
    }

    /// Drain the completion record; yields once.
    pub fn future_value(&mut self) -> Option<CompletionRecord> {
        if self.drained {
            return None;
        }
        let record = self.completion_rx.borrow().clone();
        if record.is_some() {
            self.drained = true;
        }
        record
    }

    /// Release the instance. A running body is asked to stop but not
    /// waited on.
    pub fn clear(&mut self) {
        if let Some(action) = self.action.take() {
            action.core().stop_token().request_stop("handle cleared");
        }
        self.worker = None;
        if self.state == HandleState::Running {
            self.state = HandleState::Finished;
        }
    }
}
