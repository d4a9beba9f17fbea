//! A three-node chain runs to completion in causal order and the graph
//! is reaped afterwards.

use gantry::engine::prelude::*;

use crate::fixtures::actions::{bench, eventually, INSTANT_LIB, PATIENCE};

fn chain_nodes() -> Vec<NodeDescriptor> {
    let a = NodeDescriptor::new("a", 0)
        .with_library_path(INSTANT_LIB)
        .with_child(Relation::new("b", 0));
    let b = NodeDescriptor::new("b", 0)
        .with_library_path(INSTANT_LIB)
        .with_parent(Relation::required("a", 0))
        .with_child(Relation::new("c", 0));
    let c = NodeDescriptor::new("c", 0)
        .with_library_path(INSTANT_LIB)
        .with_parent(Relation::required("b", 0));
    vec![a, b, c]
}

#[tokio::test]
async fn chain_executes_in_causal_order() {
    let (executor, probe) = bench();
    executor.add_graph("chain", chain_nodes()).await.unwrap();
    executor.execute_graph("chain").await.unwrap();

    let probe_done = probe.clone();
    assert!(
        eventually(PATIENCE, || {
            let probe = probe_done.clone();
            async move { probe.contains("c_0:exec") }
        })
        .await
    );

    let a = probe.position("a_0:exec").unwrap();
    let b = probe.position("b_0:exec").unwrap();
    let c = probe.position("c_0:exec").unwrap();
    assert!(a < b && b < c);

    assert!(executor.stop_all().await);
}

#[tokio::test]
async fn finished_chain_is_reaped_by_cleanup() {
    let (executor, _probe) = bench();
    executor.add_graph("chain", chain_nodes()).await.unwrap();
    executor.execute_graph("chain").await.unwrap();

    let reaped = eventually(PATIENCE, || {
        let executor = executor.clone();
        async move { !executor.list_graphs().await.contains(&"chain".to_string()) }
    })
    .await;
    assert!(reaped);

    // handles go with the graph
    assert_eq!(executor.action_count().await, 0);
    assert!(executor.stop_all().await);
}
