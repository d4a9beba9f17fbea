//! Run a three-node chain through the engine facade and watch the
//! parameters flow.
//!
//! ```sh
//! cargo run --example linear_chain
//! ```

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use gantry::engine::action::ActionFactory;
use gantry::engine::prelude::*;

struct GreetAction {
    core: ActionCore,
}

impl Action for GreetAction {
    fn core(&self) -> &ActionCore {
        &self.core
    }

    fn execute(&self) -> EngineResult<()> {
        self.core
            .set_output(Parameter::new("greeting", "string").with_data(json!("hello")));
        Ok(())
    }
}

struct ShoutAction {
    core: ActionCore,
}

impl Action for ShoutAction {
    fn core(&self) -> &ActionCore {
        &self.core
    }

    fn execute(&self) -> EngineResult<()> {
        let greeting = self
            .core
            .input_data("greeting")
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();
        println!("{}!", greeting.to_uppercase());
        Ok(())
    }
}

#[tokio::main]
async fn main() -> EngineResult<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let loader = RegistryLoader::new();
    let greet: ActionFactory = Arc::new(|| {
        Arc::new(GreetAction {
            core: ActionCore::new(),
        })
    });
    let shout: ActionFactory = Arc::new(|| {
        Arc::new(ShoutAction {
            core: ActionCore::new(),
        })
    });
    loader.register("/demo/libgreet.so", greet);
    loader.register("/demo/libshout.so", shout);

    let scanner = StaticScanner::new(vec![
        IndexEntry::new(
            NodeDescriptor::new("greet", 0)
                .with_library_path("/demo/libgreet.so")
                .with_output(Parameter::new("greeting", "string")),
        ),
        IndexEntry::new(
            NodeDescriptor::new("shout", 0)
                .with_library_path("/demo/libshout.so")
                .with_input(Parameter::required("greeting", "string")),
        ),
    ]);

    let config = ExecutorConfig::new()
        .with_cleanup_period(Duration::from_millis(100))
        .with_name_match_required(true);
    let mut engine = Engine::new(config, Arc::new(scanner), Arc::new(loader));
    engine.add_actions_path("/demo")?;

    let document = GraphDocument::new("greeting_chain")
        .with_node(
            NodeDescriptor::new("greet", 0)
                .with_output(Parameter::new("greeting", "string"))
                .with_child(Relation::new("shout", 0)),
        )
        .with_node(
            NodeDescriptor::new("shout", 0)
                .with_input(Parameter::required("greeting", "string"))
                .with_parent(Relation::required("greet", 0)),
        );

    engine.execute(document).await?;

    // let the chain finish and the cleanup pass reap the graph
    while !engine.list_graphs().await.is_empty() {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    engine.stop_all().await;
    Ok(())
}
