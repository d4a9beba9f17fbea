//! Output parameters flow to child inputs when the parent completes.

use gantry::engine::prelude::*;

use crate::fixtures::actions::{bench, eventually, CONSUMER_LIB, PATIENCE, PRODUCER_LIB};

#[tokio::test]
async fn consumer_starts_with_the_producer_value() {
    let (executor, probe) = bench();

    let producer = NodeDescriptor::new("prod", 0)
        .with_library_path(PRODUCER_LIB)
        .with_output(Parameter::new("x", "number"))
        .with_child(Relation::new("cons", 0));
    let consumer = NodeDescriptor::new("cons", 0)
        .with_library_path(CONSUMER_LIB)
        .with_input(Parameter::required("x", "number"))
        .with_parent(Relation::required("prod", 0));

    executor
        .add_graph("pipe", vec![producer, consumer])
        .await
        .unwrap();
    executor.execute_graph("pipe").await.unwrap();

    let probe_done = probe.clone();
    assert!(
        eventually(PATIENCE, || {
            let probe = probe_done.clone();
            async move { probe.contains("cons_0:x=42") }
        })
        .await
    );
    assert!(executor.stop_all().await);
}

#[tokio::test]
async fn propagation_only_touches_names_the_child_declares() {
    let (executor, probe) = bench();

    let producer = NodeDescriptor::new("prod", 0)
        .with_library_path(PRODUCER_LIB)
        .with_output(Parameter::new("x", "number"))
        .with_child(Relation::new("cons", 0));
    // consumer has no "x" input, so the produced value must not appear
    let consumer = NodeDescriptor::new("cons", 0)
        .with_library_path(CONSUMER_LIB)
        .with_parent(Relation::required("prod", 0));

    executor
        .add_graph("pipe", vec![producer, consumer])
        .await
        .unwrap();
    executor.execute_graph("pipe").await.unwrap();

    let probe_done = probe.clone();
    assert!(
        eventually(PATIENCE, || {
            let probe = probe_done.clone();
            async move { probe.contains("cons_0:x=null") }
        })
        .await
    );
    assert!(executor.stop_all().await);
}
