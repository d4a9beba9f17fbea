//! Top-level entry point: resolves submitted graphs against the action
//! index and forwards everything else to the executor.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use crate::engine::action::ActionLoader;
use crate::engine::descriptor::NodeDescriptor;
use crate::engine::diff::{DiffOp, GraphDiff};
use crate::engine::error::EngineResult;
use crate::engine::executor::{Executor, ExecutorConfig};
use crate::engine::index::{ActionIndex, PackageScanner};
use crate::engine::matching::MatchFinder;
use crate::engine::wire::GraphDocument;

/// The engine facade. Thin: resolution happens here, everything else in
/// the executor.
pub struct Engine {
    executor: Executor,
    index: ActionIndex,
    matcher: MatchFinder,
}

impl Engine {
    pub fn new(
        config: ExecutorConfig,
        scanner: Arc<dyn PackageScanner>,
        loader: Arc<dyn ActionLoader>,
    ) -> Self {
        let matcher = MatchFinder::new(config.name_match_required);
        Self {
            executor: Executor::new(config, loader),
            index: ActionIndex::new(scanner),
            matcher,
        }
    }

    /// Register an action package path and rebuild the index.
    pub fn add_actions_path(&mut self, path: impl Into<PathBuf>) -> EngineResult<usize> {
        self.index.add_lookup_path(path)
    }

    /// Validate, resolve, admit, and start a submitted graph.
    pub async fn execute(&self, document: GraphDocument) -> EngineResult<()> {
        document.validate().map_err(|e| e.forward("execute"))?;
        let nodes = self.resolve_nodes(&document.nodes)?;
        info!(graph = %document.graph_name, "graph accepted for execution");
        self.executor
            .add_graph(document.graph_name.clone(), nodes)
            .await?;
        self.executor.execute_graph(&document.graph_name).await
    }

    /// Apply a diff list to a running graph; added nodes are resolved
    /// against the index first.
    pub async fn modify(&self, name: &str, diffs: Vec<GraphDiff>) -> EngineResult<()> {
        let mut resolved = Vec::with_capacity(diffs.len());
        for diff in diffs {
            if diff.op == DiffOp::AddNode {
                let node = self.matcher.resolve(&diff.node, &self.index)?;
                resolved.push(GraphDiff { op: diff.op, node });
            } else {
                resolved.push(diff);
            }
        }
        self.executor.modify_graph(name, resolved).await
    }

    /// Push updatable parameter values into a running graph.
    pub async fn update(&self, document: GraphDocument) -> EngineResult<()> {
        self.executor
            .update_graph(document.graph_name.clone(), document.nodes)
            .await
    }

    /// Stop a graph by name. Idempotent.
    pub async fn stop(&self, name: &str) -> EngineResult<()> {
        self.executor.stop_graph(name).await
    }

    /// Stop everything and halt the engine; true once all workers have
    /// quiesced.
    pub async fn stop_all(&self) -> bool {
        self.executor.stop_all().await
    }

    pub async fn list_graphs(&self) -> Vec<String> {
        self.executor.list_graphs().await
    }

    /// Serialize every registered graph back to its wire document.
    pub async fn graph_documents(&self) -> Vec<GraphDocument> {
        self.executor.graph_documents().await
    }

    pub fn index(&self) -> &ActionIndex {
        &self.index
    }

    fn resolve_nodes(&self, nodes: &[NodeDescriptor]) -> EngineResult<Vec<NodeDescriptor>> {
        nodes
            .iter()
            .map(|node| self.matcher.resolve(node, &self.index))
            .collect()
    }
}
