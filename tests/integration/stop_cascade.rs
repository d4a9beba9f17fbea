//! Stopping a graph delivers the cooperative stop flag and removes the
//! graph; pending children never start.

use gantry::engine::prelude::*;

use crate::fixtures::actions::{bench, eventually, BLOCKING_LIB, INSTANT_LIB, PATIENCE};

#[tokio::test]
async fn stop_cascades_to_the_running_action() {
    let (executor, probe) = bench();

    let a = NodeDescriptor::new("a", 0)
        .with_library_path(BLOCKING_LIB)
        .with_child(Relation::new("b", 0));
    let b = NodeDescriptor::new("b", 0)
        .with_library_path(INSTANT_LIB)
        .with_parent(Relation::required("a", 0))
        .with_child(Relation::new("c", 0));
    let c = NodeDescriptor::new("c", 0)
        .with_library_path(INSTANT_LIB)
        .with_parent(Relation::required("b", 0));

    executor.add_graph("s", vec![a, b, c]).await.unwrap();
    executor.execute_graph("s").await.unwrap();

    let probe_started = probe.clone();
    assert!(
        eventually(PATIENCE, || {
            let probe = probe_started.clone();
            async move { probe.contains("a_0:start") }
        })
        .await
    );

    executor.stop_graph("s").await.unwrap();

    // cooperative exit observed, graph gone, successors never ran
    assert!(probe.contains("a_0:stopped"));
    assert!(executor.list_graphs().await.is_empty());
    assert!(!probe.contains("b_0:exec"));
    assert!(!probe.contains("c_0:exec"));

    // stop is idempotent
    executor.stop_graph("s").await.unwrap();
    assert!(executor.stop_all().await);
}
