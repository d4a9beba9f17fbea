//! A child whose required parent never finishes must not start; the
//! graph goes to error and can still be stopped.

use std::time::Duration;

use gantry::engine::prelude::*;

use crate::fixtures::actions::{bench, eventually, CONSUMER_LIB, FAILING_LIB, PATIENCE};

#[tokio::test]
async fn child_of_failing_parent_never_runs() {
    let (executor, probe) = bench();

    let failing = NodeDescriptor::new("miss", 0)
        .with_library_path(FAILING_LIB)
        .with_child(Relation::new("cons", 0));
    let consumer = NodeDescriptor::new("cons", 0)
        .with_library_path(CONSUMER_LIB)
        .with_input(Parameter::required("x", "number"))
        .with_parent(Relation::required("miss", 0));

    executor
        .add_graph("broken", vec![failing, consumer])
        .await
        .unwrap();
    executor.execute_graph("broken").await.unwrap();

    let probe_done = probe.clone();
    assert!(
        eventually(PATIENCE, || {
            let probe = probe_done.clone();
            async move { probe.contains("miss_0:exec") }
        })
        .await
    );

    // give the engine time to (wrongly) start the consumer
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!probe.events().iter().any(|e| e.starts_with("cons_0")));

    // the failure surfaces as graph error and the graph is not reaped
    let errored = eventually(PATIENCE, || {
        let executor = executor.clone();
        async move { executor.graph_state("broken").await == Some(GraphState::Error) }
    })
    .await;
    assert!(errored);
    assert!(executor
        .list_graphs()
        .await
        .contains(&"broken".to_string()));

    // and stop still succeeds
    executor.stop_graph("broken").await.unwrap();
    assert!(executor.list_graphs().await.is_empty());
    assert!(executor.stop_all().await);
}
