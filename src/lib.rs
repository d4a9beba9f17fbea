//! Gantry
//!
//! A hierarchical action-graph execution engine. Operators submit named
//! DAGs whose nodes are *actions* resolved against an index of available
//! implementations; the engine instantiates each action through a
//! pluggable loader, runs it in its own worker, propagates typed
//! parameters along edges as parents complete, and supports live
//! mutation and graceful stop of running graphs.
//!
//! # Example
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use gantry::engine::prelude::*;
//!
//! # async fn run() -> EngineResult<()> {
//! let loader = Arc::new(RegistryLoader::new());
//! let scanner = Arc::new(StaticScanner::default());
//! let mut engine = Engine::new(ExecutorConfig::new(), scanner, loader);
//!
//! engine.add_actions_path("/opt/actions")?;
//! let document = GraphDocument::from_string(r#"{ "graph_name": "demo", "nodes": [] }"#)?;
//! engine.execute(document).await?;
//! engine.stop_all().await;
//! # Ok(())
//! # }
//! ```

pub mod engine;
