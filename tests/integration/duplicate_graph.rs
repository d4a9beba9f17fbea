//! Admission rejects duplicate graph names without disturbing the
//! original graph.

use gantry::engine::prelude::*;

use crate::fixtures::actions::{bench, eventually, BLOCKING_LIB, PATIENCE};

#[tokio::test]
async fn second_registration_under_the_same_name_fails() {
    let (executor, probe) = bench();

    let a = NodeDescriptor::new("a", 0).with_library_path(BLOCKING_LIB);
    executor.add_graph("g", vec![a.clone()]).await.unwrap();
    executor.execute_graph("g").await.unwrap();

    let probe_started = probe.clone();
    assert!(
        eventually(PATIENCE, || {
            let probe = probe_started.clone();
            async move { probe.contains("a_0:start") }
        })
        .await
    );

    let err = executor.add_graph("g", vec![a]).await.unwrap_err();
    assert!(matches!(err, EngineError::AlreadyExists(_)));

    // the first graph keeps running untouched
    assert!(executor.is_active().await);
    assert_eq!(executor.list_graphs().await, vec!["g".to_string()]);

    assert!(executor.stop_all().await);
    assert!(probe.contains("a_0:stopped"));
}
