//! The scheduler: admits graphs, starts root actions, propagates
//! parameters to children as parents complete, applies diffs, and runs
//! the periodic cleanup pass.
//!
//! The executor is a cheap handle around a single owner task. Every
//! public operation is a command on the owner's channel and worker
//! completions arrive on a second channel, so graph mutation and child
//! activation are serialized without any lock-order discipline.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::engine::action::ActionLoader;
use crate::engine::constants::{CLEANUP_PERIOD, DEFAULT_STOP_TIMEOUT};
use crate::engine::descriptor::{Effect, NodeDescriptor, NodeId};
use crate::engine::diff::{DiffOp, GraphDiff};
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::graph::{Graph, GraphState, NodeState};
use crate::engine::handle::{ActionHandle, CompletionRecord, CompletionSink, HandleState};
use crate::engine::wire::GraphDocument;

/// Executor tuning knobs.
#[derive(Clone, Debug)]
pub struct ExecutorConfig {
    /// Period of the cleanup pass.
    pub cleanup_period: Duration,
    /// Upper bound on cooperative stop before a worker is abandoned.
    pub stop_timeout: Duration,
    /// Whether the match finder only considers entries with the same
    /// action name.
    pub name_match_required: bool,
}

impl ExecutorConfig {
    pub fn new() -> Self {
        Self {
            cleanup_period: CLEANUP_PERIOD,
            stop_timeout: DEFAULT_STOP_TIMEOUT,
            name_match_required: false,
        }
    }

    pub fn with_cleanup_period(mut self, period: Duration) -> Self {
        self.cleanup_period = period;
        self
    }

    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    pub fn with_name_match_required(mut self, required: bool) -> Self {
        self.name_match_required = required;
        self
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self::new()
    }
}

enum Command {
    AddGraph {
        name: String,
        nodes: Vec<NodeDescriptor>,
        reply: oneshot::Sender<EngineResult<()>>,
    },
    ExecuteGraph {
        name: String,
        reply: oneshot::Sender<EngineResult<()>>,
    },
    ModifyGraph {
        name: String,
        diffs: Vec<GraphDiff>,
        reply: oneshot::Sender<EngineResult<()>>,
    },
    UpdateGraph {
        name: String,
        nodes: Vec<NodeDescriptor>,
        reply: oneshot::Sender<EngineResult<()>>,
    },
    StopGraph {
        name: String,
        reply: oneshot::Sender<EngineResult<()>>,
    },
    ListGraphs {
        reply: oneshot::Sender<Vec<String>>,
    },
    GraphStateOf {
        name: String,
        reply: oneshot::Sender<Option<GraphState>>,
    },
    GraphDocuments {
        reply: oneshot::Sender<Vec<GraphDocument>>,
    },
    IsActive {
        reply: oneshot::Sender<bool>,
    },
    ActionCount {
        reply: oneshot::Sender<usize>,
    },
    StopAll {
        reply: oneshot::Sender<bool>,
    },
}

/// Handle to the executor's owner task.
#[derive(Clone)]
pub struct Executor {
    commands: mpsc::UnboundedSender<Command>,
    owner: Arc<Mutex<Option<tokio::task::JoinHandle<()>>>>,
}

impl Executor {
    /// Spawn the owner task and its cleanup timer.
    pub fn new(config: ExecutorConfig, loader: Arc<dyn ActionLoader>) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        let owner = Owner {
            config,
            loader,
            graphs: HashMap::new(),
            handles: HashMap::new(),
            next_id: 1,
            completions: completion_tx,
        };
        let task = tokio::spawn(owner.run(command_rx, completion_rx));
        Self {
            commands: command_tx,
            owner: Arc::new(Mutex::new(Some(task))),
        }
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> EngineResult<T> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(make(tx))
            .map_err(|_| EngineError::Unknown("executor is stopped".to_string()))?;
        rx.await
            .map_err(|_| EngineError::Unknown("executor is stopped".to_string()))
    }

    /// Register a graph under a unique name; ids are assigned here.
    pub async fn add_graph(&self, name: impl Into<String>, nodes: Vec<NodeDescriptor>) -> EngineResult<()> {
        let name = name.into();
        self.request(|reply| Command::AddGraph { name, nodes, reply })
            .await?
    }

    /// Start a registered graph from its roots.
    pub async fn execute_graph(&self, name: impl Into<String>) -> EngineResult<()> {
        let name = name.into();
        self.request(|reply| Command::ExecuteGraph { name, reply })
            .await?
    }

    /// Apply a diff list to a registered graph. The whole list is
    /// preflighted; application is best-effort in order.
    pub async fn modify_graph(&self, name: impl Into<String>, diffs: Vec<GraphDiff>) -> EngineResult<()> {
        let name = name.into();
        self.request(|reply| Command::ModifyGraph { name, diffs, reply })
            .await?
    }

    /// Merge updatable input parameters into a running graph's live
    /// actions from a structurally equal node set.
    pub async fn update_graph(&self, name: impl Into<String>, nodes: Vec<NodeDescriptor>) -> EngineResult<()> {
        let name = name.into();
        self.request(|reply| Command::UpdateGraph { name, nodes, reply })
            .await?
    }

    /// Stop every action of a graph and remove it. Idempotent.
    pub async fn stop_graph(&self, name: impl Into<String>) -> EngineResult<()> {
        let name = name.into();
        self.request(|reply| Command::StopGraph { name, reply })
            .await?
    }

    pub async fn list_graphs(&self) -> Vec<String> {
        self.request(|reply| Command::ListGraphs { reply })
            .await
            .unwrap_or_default()
    }

    /// Derived state of a registered graph, if it exists.
    pub async fn graph_state(&self, name: impl Into<String>) -> Option<GraphState> {
        let name = name.into();
        self.request(|reply| Command::GraphStateOf { name, reply })
            .await
            .unwrap_or(None)
    }

    /// Serialize every registered graph back to its wire document.
    pub async fn graph_documents(&self) -> Vec<GraphDocument> {
        self.request(|reply| Command::GraphDocuments { reply })
            .await
            .unwrap_or_default()
    }

    /// Whether any handle reports a running worker.
    pub async fn is_active(&self) -> bool {
        self.request(|reply| Command::IsActive { reply })
            .await
            .unwrap_or(false)
    }

    pub async fn action_count(&self) -> usize {
        self.request(|reply| Command::ActionCount { reply })
            .await
            .unwrap_or(0)
    }

    /// Stop every action, wait for workers to quiesce, and halt the
    /// owner task (which carries the cleanup timer). Returns false when
    /// the owner task cannot be joined.
    pub async fn stop_all(&self) -> bool {
        let quiesced = self
            .request(|reply| Command::StopAll { reply })
            .await
            .unwrap_or(true);
        let task = self.owner.lock().await.take();
        if let Some(task) = task {
            if let Err(join_error) = task.await {
                error!(error = %join_error, "failed to join executor owner task");
                return false;
            }
        }
        quiesced
    }
}

struct Owner {
    config: ExecutorConfig,
    loader: Arc<dyn ActionLoader>,
    graphs: HashMap<String, Graph>,
    handles: HashMap<NodeId, ActionHandle>,
    next_id: NodeId,
    completions: CompletionSink,
}

impl Owner {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut completions: mpsc::UnboundedReceiver<CompletionRecord>,
    ) {
        let mut cleanup = tokio::time::interval_at(
            tokio::time::Instant::now() + self.config.cleanup_period,
            self.config.cleanup_period,
        );
        cleanup.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => {
                        if self.handle_command(command).await {
                            break;
                        }
                    }
                    None => break,
                },
                Some(record) = completions.recv() => self.on_completion(record),
                _ = cleanup.tick() => self.cleanup_pass(),
            }
        }
    }

    /// Returns true when the owner should shut down.
    async fn handle_command(&mut self, command: Command) -> bool {
        match command {
            Command::AddGraph { name, nodes, reply } => {
                let _ = reply.send(self.add_graph(name, nodes));
            }
            Command::ExecuteGraph { name, reply } => {
                let _ = reply.send(self.execute(&name));
            }
            Command::ModifyGraph { name, diffs, reply } => {
                let _ = reply.send(self.modify_graph(&name, diffs).await);
            }
            Command::UpdateGraph { name, nodes, reply } => {
                let _ = reply.send(self.update_graph(&name, nodes));
            }
            Command::StopGraph { name, reply } => {
                let _ = reply.send(self.stop_graph(&name).await);
            }
            Command::ListGraphs { reply } => {
                let mut names: Vec<String> = self.graphs.keys().cloned().collect();
                names.sort_unstable();
                let _ = reply.send(names);
            }
            Command::GraphStateOf { name, reply } => {
                let _ = reply.send(self.graphs.get(&name).map(Graph::check_state));
            }
            Command::GraphDocuments { reply } => {
                let documents = self
                    .graphs
                    .values()
                    .map(|graph| GraphDocument {
                        graph_name: graph.name().to_string(),
                        nodes: graph.nodes().cloned().collect(),
                    })
                    .collect();
                let _ = reply.send(documents);
            }
            Command::IsActive { reply } => {
                let active = self
                    .handles
                    .values()
                    .any(|h| h.state() == HandleState::Running);
                let _ = reply.send(active);
            }
            Command::ActionCount { reply } => {
                let _ = reply.send(self.handles.len());
            }
            Command::StopAll { reply } => {
                self.stop_all().await;
                let _ = reply.send(true);
                return true;
            }
        }
        false
    }

    fn create_id(&mut self) -> NodeId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn add_graph(&mut self, name: String, mut nodes: Vec<NodeDescriptor>) -> EngineResult<()> {
        if self.graphs.contains_key(&name) {
            return Err(EngineError::AlreadyExists(format!(
                "graph '{name}' is already added"
            )));
        }
        for node in &mut nodes {
            let id = self.create_id();
            node.set_id(id);
        }
        let graph = Graph::new(name.clone(), nodes).map_err(|e| e.forward("add_graph"))?;
        if graph.check_state() == GraphState::Uninitialized {
            return Err(EngineError::Uninitialized(format!(
                "cannot add graph '{name}' because it is uninitialized"
            )));
        }
        info!(graph = %name, nodes = graph.node_count(), "graph added");
        self.graphs.insert(name, graph);
        Ok(())
    }

    fn execute(&mut self, name: &str) -> EngineResult<()> {
        let graph = self.graphs.get(name).ok_or_else(|| {
            EngineError::NotFound(format!("cannot execute graph '{name}' because it does not exist"))
        })?;
        if graph.check_state() != GraphState::Initialized {
            return Err(EngineError::NotInitialized(format!(
                "cannot execute graph '{name}' because it is not in initialized state"
            )));
        }
        let roots = graph.roots();
        info!(graph = %name, run_id = %Uuid::new_v4(), roots = roots.len(), "executing graph");
        self.execute_ids(name, roots, true)
    }

    /// Start a batch of nodes: build handles, insert, instantiate, then
    /// start the workers. Any instantiation or start failure marks the
    /// failing node and rolls back the whole batch.
    fn execute_ids(
        &mut self,
        graph_name: &str,
        ids: Vec<NodeId>,
        require_initialized: bool,
    ) -> EngineResult<()> {
        let graph = self.graphs.get_mut(graph_name).ok_or_else(|| {
            EngineError::NotFound(format!("graph '{graph_name}' does not exist"))
        })?;

        let mut built = Vec::new();
        for id in ids {
            if self.handles.contains_key(&id) {
                continue;
            }
            if graph.node_state(id) != Some(NodeState::Initialized) {
                continue;
            }
            let descriptor = graph.node(id)?.clone();
            if !require_initialized
                && (!descriptor.required_parents_finished() || !descriptor.inputs_delivered())
            {
                debug!(node = %descriptor.full_name(), "child not ready, postponing");
                continue;
            }
            let handle =
                ActionHandle::new(descriptor, Arc::clone(&self.loader), self.completions.clone());
            if handle.state() != HandleState::Initialized {
                if require_initialized {
                    return Err(EngineError::NotInitialized(format!(
                        "cannot execute graph '{graph_name}' because node '{}' is not fully initialized",
                        handle.full_name()
                    )));
                }
                debug!(node = %handle.full_name(), "handle not initialized, postponing");
                continue;
            }
            built.push(handle);
        }

        // The owner task is the only writer, so the batch insert is
        // atomic with respect to any other admission.
        let batch: Vec<NodeId> = built.iter().map(ActionHandle::handle_id).collect();
        for handle in built {
            self.handles.insert(handle.handle_id(), handle);
        }

        let mut failure = None;
        for &id in &batch {
            let outcome = match self.handles.get_mut(&id) {
                Some(handle) => handle.instantiate(),
                None => continue,
            };
            if let Err(e) = outcome {
                let _ = graph.set_node_state(id, NodeState::Error);
                failure = Some(e.forward("execute_ids"));
                break;
            }
        }
        if failure.is_none() {
            for &id in &batch {
                let outcome = match self.handles.get_mut(&id) {
                    Some(handle) => handle.start(),
                    None => continue,
                };
                match outcome {
                    Ok(()) => {
                        let _ = graph.set_node_state(id, NodeState::Active);
                    }
                    Err(e) => {
                        let _ = graph.set_node_state(id, NodeState::Error);
                        failure = Some(e.forward("execute_ids"));
                        break;
                    }
                }
            }
        }

        if let Some(error) = failure {
            warn!(graph = %graph_name, error = %error, "rolling back action batch");
            for &id in &batch {
                if let Some(mut handle) = self.handles.remove(&id) {
                    handle.clear();
                }
                // The failing node stays in error; aborted peers are not
                // failures of those nodes themselves.
                let _ = graph.set_node_state(id, NodeState::Finished);
            }
            return Err(error);
        }
        Ok(())
    }

    /// A worker reported completion: transfer parameters to children,
    /// flip their received flags, and activate the ready ones.
    fn on_completion(&mut self, record: CompletionRecord) {
        let CompletionRecord {
            handle_id,
            outputs,
            error,
        } = record;

        match self.handles.get_mut(&handle_id) {
            Some(handle) => handle.note_completed(),
            // Stale completion from a stopped and removed handle.
            None => return,
        }

        let Some(graph_name) = self
            .graphs
            .iter()
            .find(|(_, g)| g.contains_id(handle_id))
            .map(|(name, _)| name.clone())
        else {
            return;
        };

        if let Some(message) = error {
            warn!(graph = %graph_name, node = handle_id, error = %message, "action failed");
            if let Some(graph) = self.graphs.get_mut(&graph_name) {
                let _ = graph.set_node_state(handle_id, NodeState::Error);
            }
            return;
        }

        let children = {
            let Some(graph) = self.graphs.get_mut(&graph_name) else {
                return;
            };
            let was_active = graph.check_state() == GraphState::Active;
            let _ = graph.set_node_state(handle_id, NodeState::Finished);
            if !was_active {
                return;
            }

            let parent_relation = match graph.node(handle_id) {
                Ok(node) => node.as_relation(),
                Err(_) => return,
            };
            let children = graph.children_of(handle_id);
            for &child_id in &children {
                if let Ok(child) = graph.node_mut(child_id) {
                    child.input_params.copy_from(&outputs);
                    if let Err(e) = child.mark_parent_received(&parent_relation) {
                        warn!(graph = %graph_name, node = child_id, error = %e, "parent relation not declared on child");
                    }
                }
            }
            children
        };

        if !children.is_empty() {
            if let Err(e) = self.execute_ids(&graph_name, children, false) {
                warn!(graph = %graph_name, error = %e, "child activation failed");
            }
        }
    }

    /// Periodic pass: drain completed synchronous handles and reap
    /// finished graphs. Idempotent by construction.
    fn cleanup_pass(&mut self) {
        let ready: Vec<NodeId> = self
            .handles
            .iter()
            .filter(|(_, h)| {
                h.state() == HandleState::Finished
                    && h.effect() == Effect::Synchronous
                    && h.future_ready()
            })
            .map(|(id, _)| *id)
            .collect();

        for id in ready {
            if let Some(handle) = self.handles.get_mut(&id) {
                if let Some(record) = handle.future_value() {
                    if let Some(message) = record.error {
                        error!(node = id, error = %message, "action reported error");
                    }
                }
            }
            for graph in self.graphs.values_mut() {
                if graph.contains_id(id) {
                    let _ = graph.set_node_state(id, NodeState::Finished);
                }
            }
            if let Some(mut handle) = self.handles.remove(&id) {
                handle.clear();
            }
        }

        let finished: Vec<String> = self
            .graphs
            .iter()
            .filter(|(_, g)| g.check_state() == GraphState::Finished)
            .map(|(name, _)| name.clone())
            .collect();
        for name in finished {
            if let Some(graph) = self.graphs.remove(&name) {
                info!(graph = %name, "graph finished");
                for id in graph.node_ids() {
                    if let Some(mut handle) = self.handles.remove(&id) {
                        handle.clear();
                    }
                }
            }
        }
    }

    /// Preflight the whole diff list, then apply in order. Failures
    /// after preflight leave the graph in the successful-prefix state.
    async fn modify_graph(&mut self, name: &str, diffs: Vec<GraphDiff>) -> EngineResult<()> {
        let graph = self.graphs.get(name).ok_or_else(|| {
            EngineError::NotFound(format!("cannot modify graph '{name}' because it does not exist"))
        })?;

        for diff in &diffs {
            let full_name = diff.node.full_name();
            match diff.op {
                DiffOp::AddNode => {
                    if graph.part_of(&full_name) {
                        return Err(EngineError::AlreadyExists(format!(
                            "cannot add node '{full_name}', it is already part of graph '{name}'"
                        )));
                    }
                }
                _ => {
                    if !graph.part_of(&full_name) {
                        return Err(EngineError::NotFound(format!(
                            "cannot perform '{}' because graph '{name}' does not contain node '{full_name}'",
                            diff.op.as_str()
                        )));
                    }
                }
            }
        }

        for diff in diffs {
            info!(graph = %name, op = diff.op.as_str(), node = %diff.node.full_name(), "applying diff");
            match diff.op {
                DiffOp::AddNode => {
                    let id = self.create_id();
                    let mut node = diff.node;
                    node.set_id(id);
                    self.graph_mut(name)?
                        .add_node(node)
                        .map_err(|e| e.forward("modify_graph"))?;
                }
                DiffOp::RemoveNode => {
                    let id = self
                        .graph_mut(name)?
                        .remove_node(&diff.node.as_relation())
                        .map_err(|e| e.forward("modify_graph"))?;
                    if let Some(mut handle) = self.handles.remove(&id) {
                        let _ = handle.stop(self.config.stop_timeout).await;
                        handle.clear();
                    }
                }
                DiffOp::AddChild => {
                    self.graph_mut(name)?
                        .add_child(&diff.node)
                        .map_err(|e| e.forward("modify_graph"))?;
                }
                DiffOp::RemoveChild => {
                    self.graph_mut(name)?
                        .remove_child(&diff.node)
                        .map_err(|e| e.forward("modify_graph"))?;
                }
            }
        }
        Ok(())
    }

    /// Merge updatable parameters into the live handles of a running
    /// graph from a structurally equal node set.
    fn update_graph(&mut self, name: &str, nodes: Vec<NodeDescriptor>) -> EngineResult<()> {
        let graph = self.graphs.get(name).ok_or_else(|| {
            EngineError::NotFound(format!("could not find graph '{name}'"))
        })?;

        if nodes.len() != graph.node_count() {
            return Err(EngineError::SizeMismatch(format!(
                "cannot update graph '{name}' because node counts do not match"
            )));
        }
        for existing in graph.nodes() {
            if !nodes.iter().any(|incoming| existing.is_equal(incoming, false)) {
                return Err(EngineError::NotFound(format!(
                    "cannot update graph '{name}' because the incoming set does not contain node '{}'",
                    existing.full_name()
                )));
            }
        }

        let targets: Vec<(NodeId, NodeDescriptor)> = nodes
            .into_iter()
            .filter_map(|node| graph.id_of(&node.full_name()).map(|id| (id, node)))
            .collect();
        for (id, incoming) in targets {
            let Some(handle) = self.handles.get_mut(&id) else {
                // This handle has finished execution already.
                continue;
            };
            if handle.state() != HandleState::Running {
                continue;
            }
            match handle.update_descriptor(&incoming) {
                Ok(true) => info!(graph = %name, node = id, "live parameters updated"),
                Ok(false) => {}
                Err(e) => warn!(graph = %name, node = id, error = %e, "parameter update failed"),
            }
        }
        Ok(())
    }

    /// Stop every action of the graph, then drop the graph entry.
    /// Stopping an unknown graph is a no-op.
    async fn stop_graph(&mut self, name: &str) -> EngineResult<()> {
        let Some(graph) = self.graphs.remove(name) else {
            debug!(graph = %name, "stop requested for unknown graph");
            return Ok(());
        };
        info!(graph = %name, "stopping graph");
        for id in graph.node_ids() {
            if let Some(mut handle) = self.handles.remove(&id) {
                info!(action = %handle.full_name(), "stopping action");
                let _ = handle.stop(self.config.stop_timeout).await;
                handle.clear();
            }
        }
        Ok(())
    }

    async fn stop_all(&mut self) {
        for handle in self.handles.values_mut() {
            if handle.state() == HandleState::Running {
                info!(action = %handle.full_name(), "stopping action");
            }
            let _ = handle.stop(self.config.stop_timeout).await;
        }
        for (_, mut handle) in self.handles.drain() {
            handle.clear();
        }
        self.graphs.clear();
        info!("action executor stopped");
    }

    fn graph_mut(&mut self, name: &str) -> EngineResult<&mut Graph> {
        self.graphs
            .get_mut(name)
            .ok_or_else(|| EngineError::NotFound(format!("graph '{name}' does not exist")))
    }
}
