//! Diffs applied while a graph runs take effect on the live structure.

use gantry::engine::prelude::*;

use crate::fixtures::actions::{bench, eventually, INSTANT_LIB, PATIENCE, SLOW_LIB};

#[tokio::test]
async fn node_added_during_execution_starts_after_its_parent() {
    let (executor, probe) = bench();

    let a = NodeDescriptor::new("a", 0).with_library_path(SLOW_LIB);
    executor.add_graph("live", vec![a]).await.unwrap();
    executor.execute_graph("live").await.unwrap();

    let probe_started = probe.clone();
    assert!(
        eventually(PATIENCE, || {
            let probe = probe_started.clone();
            async move { probe.contains("a_0:start") }
        })
        .await
    );

    // wire b_0 under the still-running a_0
    let b = NodeDescriptor::new("b", 0).with_library_path(INSTANT_LIB);
    let carrier = NodeDescriptor::new("a", 0).with_child(Relation::required("b", 0));
    executor
        .modify_graph(
            "live",
            vec![GraphDiff::add_node(b), GraphDiff::add_child(carrier)],
        )
        .await
        .unwrap();

    let probe_done = probe.clone();
    assert!(
        eventually(PATIENCE, || {
            let probe = probe_done.clone();
            async move { probe.contains("b_0:exec") }
        })
        .await
    );

    let a_finished = probe.position("a_0:exec").unwrap();
    let b_ran = probe.position("b_0:exec").unwrap();
    assert!(a_finished < b_ran);
    assert!(executor.stop_all().await);
}

#[tokio::test]
async fn removed_node_is_stopped_and_unwired() {
    let (executor, probe) = bench();

    let a = NodeDescriptor::new("a", 0)
        .with_library_path(SLOW_LIB)
        .with_child(Relation::new("b", 0));
    let b = NodeDescriptor::new("b", 0)
        .with_library_path(INSTANT_LIB)
        .with_parent(Relation::required("a", 0));
    executor.add_graph("live", vec![a, b]).await.unwrap();
    executor.execute_graph("live").await.unwrap();

    let probe_started = probe.clone();
    assert!(
        eventually(PATIENCE, || {
            let probe = probe_started.clone();
            async move { probe.contains("a_0:start") }
        })
        .await
    );

    executor
        .modify_graph(
            "live",
            vec![GraphDiff::remove_node(NodeDescriptor::new("a", 0))],
        )
        .await
        .unwrap();

    let docs = executor.graph_documents().await;
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].nodes.len(), 1);
    assert!(docs[0].nodes[0].parents.is_empty());

    // the removed node's worker was told to stop and b never ran off it
    assert!(!probe.contains("b_0:exec"));
    assert!(executor.stop_all().await);
}
