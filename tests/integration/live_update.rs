//! Live parameter updates reach a running action through its update
//! hook.

use serde_json::json;

use gantry::engine::prelude::*;

use crate::fixtures::actions::{bench, eventually, BLOCKING_LIB, PATIENCE};

fn tracker() -> NodeDescriptor {
    NodeDescriptor::new("a", 0)
        .with_library_path(BLOCKING_LIB)
        .with_input(Parameter::new("rate", "number").with_updatable(true))
}

#[tokio::test]
async fn updatable_inputs_reach_the_running_action() {
    let (executor, probe) = bench();

    executor.add_graph("u", vec![tracker()]).await.unwrap();
    executor.execute_graph("u").await.unwrap();

    let probe_started = probe.clone();
    assert!(
        eventually(PATIENCE, || {
            let probe = probe_started.clone();
            async move { probe.contains("a_0:start") }
        })
        .await
    );

    let update = tracker().with_input(
        Parameter::new("rate", "number")
            .with_updatable(true)
            .with_data(json!(20)),
    );
    executor.update_graph("u", vec![update]).await.unwrap();

    let probe_updated = probe.clone();
    assert!(
        eventually(PATIENCE, || {
            let probe = probe_updated.clone();
            async move { probe.contains("a_0:rate=20") }
        })
        .await
    );
    assert!(executor.stop_all().await);
}

#[tokio::test]
async fn non_updatable_inputs_are_left_alone() {
    let (executor, probe) = bench();

    let fixed = NodeDescriptor::new("a", 0)
        .with_library_path(BLOCKING_LIB)
        .with_input(Parameter::new("rate", "number"));
    executor.add_graph("u", vec![fixed.clone()]).await.unwrap();
    executor.execute_graph("u").await.unwrap();

    let probe_started = probe.clone();
    assert!(
        eventually(PATIENCE, || {
            let probe = probe_started.clone();
            async move { probe.contains("a_0:start") }
        })
        .await
    );

    let update =
        fixed.with_input(Parameter::new("rate", "number").with_data(json!(99)));
    executor.update_graph("u", vec![update]).await.unwrap();

    // no update hook fired for a non-updatable parameter
    assert!(!probe.contains("a_0:rate=99"));
    assert!(executor.stop_all().await);
}
