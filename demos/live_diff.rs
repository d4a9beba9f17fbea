//! Mutate a running graph: add a node and an edge under an action that
//! is still executing.
//!
//! ```sh
//! cargo run --example live_diff
//! ```

use std::sync::Arc;
use std::time::Duration;

use gantry::engine::action::ActionFactory;
use gantry::engine::prelude::*;

struct PatrolAction {
    core: ActionCore,
}

impl Action for PatrolAction {
    fn core(&self) -> &ActionCore {
        &self.core
    }

    fn execute(&self) -> EngineResult<()> {
        println!("patrol: started");
        for _ in 0..20 {
            if !self.core.action_ok() {
                break;
            }
            std::thread::sleep(Duration::from_millis(50));
        }
        println!("patrol: done");
        Ok(())
    }
}

struct ReportAction {
    core: ActionCore,
}

impl Action for ReportAction {
    fn core(&self) -> &ActionCore {
        &self.core
    }

    fn execute(&self) -> EngineResult<()> {
        println!("report: patrol finished, filing report");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> EngineResult<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let loader = RegistryLoader::new();
    let patrol: ActionFactory = Arc::new(|| {
        Arc::new(PatrolAction {
            core: ActionCore::new(),
        })
    });
    let report: ActionFactory = Arc::new(|| {
        Arc::new(ReportAction {
            core: ActionCore::new(),
        })
    });
    loader.register("/demo/libpatrol.so", patrol);
    loader.register("/demo/libreport.so", report);

    let config = ExecutorConfig::new().with_cleanup_period(Duration::from_millis(100));
    let executor = Executor::new(config, Arc::new(loader));

    let patrol_node = NodeDescriptor::new("patrol", 0).with_library_path("/demo/libpatrol.so");
    executor.add_graph("mission", vec![patrol_node]).await?;
    executor.execute_graph("mission").await?;

    // while the patrol runs, wire a report step under it
    tokio::time::sleep(Duration::from_millis(200)).await;
    let report_node = NodeDescriptor::new("report", 0).with_library_path("/demo/libreport.so");
    let carrier = NodeDescriptor::new("patrol", 0).with_child(Relation::required("report", 0));
    executor
        .modify_graph(
            "mission",
            vec![GraphDiff::add_node(report_node), GraphDiff::add_child(carrier)],
        )
        .await?;
    println!("diff applied while patrol is running");

    while !executor.list_graphs().await.is_empty() {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    executor.stop_all().await;
    Ok(())
}
