//! Fixture actions and an executor bench for the integration suite.

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;

use gantry::engine::action::ActionFactory;
use gantry::engine::prelude::*;

/// Records what fixture actions observed, in order.
#[derive(Clone, Default)]
pub struct Probe {
    events: Arc<Mutex<Vec<String>>>,
}

impl Probe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, event: impl Into<String>) {
        self.events.lock().unwrap().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn contains(&self, event: &str) -> bool {
        self.events().iter().any(|e| e == event)
    }

    /// Index of the first occurrence, for ordering assertions.
    pub fn position(&self, event: &str) -> Option<usize> {
        self.events().iter().position(|e| e == event)
    }
}

fn bound_name(core: &ActionCore) -> String {
    core.descriptor()
        .map(|d| d.full_name())
        .unwrap_or_else(|| "unbound".to_string())
}

/// Completes immediately and records its run.
pub struct InstantAction {
    core: ActionCore,
    probe: Probe,
}

impl Action for InstantAction {
    fn core(&self) -> &ActionCore {
        &self.core
    }

    fn execute(&self) -> EngineResult<()> {
        self.probe.record(format!("{}:exec", bound_name(&self.core)));
        Ok(())
    }
}

/// Publishes `x = 42` on completion.
pub struct ProducerAction {
    core: ActionCore,
    probe: Probe,
}

impl Action for ProducerAction {
    fn core(&self) -> &ActionCore {
        &self.core
    }

    fn execute(&self) -> EngineResult<()> {
        self.probe.record(format!("{}:exec", bound_name(&self.core)));
        self.core
            .set_output(Parameter::new("x", "number").with_data(json!(42)));
        Ok(())
    }
}

/// Records the value of its `x` input.
pub struct ConsumerAction {
    core: ActionCore,
    probe: Probe,
}

impl Action for ConsumerAction {
    fn core(&self) -> &ActionCore {
        &self.core
    }

    fn execute(&self) -> EngineResult<()> {
        let x = self.core.input_data("x").unwrap_or(json!(null));
        self.probe
            .record(format!("{}:x={}", bound_name(&self.core), x));
        Ok(())
    }
}

/// Fails on every execution.
pub struct FailingAction {
    core: ActionCore,
    probe: Probe,
}

impl Action for FailingAction {
    fn core(&self) -> &ActionCore {
        &self.core
    }

    fn execute(&self) -> EngineResult<()> {
        self.probe.record(format!("{}:exec", bound_name(&self.core)));
        Err(EngineError::ExecutionFailed {
            node: bound_name(&self.core),
            message: "fixture failure".to_string(),
        })
    }
}

/// Runs until the stop flag is set, then exits cleanly. Also records
/// live parameter updates.
pub struct BlockingAction {
    core: ActionCore,
    probe: Probe,
}

impl Action for BlockingAction {
    fn core(&self) -> &ActionCore {
        &self.core
    }

    fn execute(&self) -> EngineResult<()> {
        self.probe.record(format!("{}:start", bound_name(&self.core)));
        while self.core.action_ok() {
            std::thread::sleep(Duration::from_millis(5));
        }
        self.probe.record(format!("{}:stopped", bound_name(&self.core)));
        Ok(())
    }

    fn on_parameter_update(&self) {
        let rate = self.core.input_data("rate").unwrap_or(json!(null));
        self.probe
            .record(format!("{}:rate={}", bound_name(&self.core), rate));
    }
}

/// Finishes naturally after ~250 ms, exiting early when stopped.
pub struct SlowAction {
    core: ActionCore,
    probe: Probe,
}

impl Action for SlowAction {
    fn core(&self) -> &ActionCore {
        &self.core
    }

    fn execute(&self) -> EngineResult<()> {
        self.probe.record(format!("{}:start", bound_name(&self.core)));
        for _ in 0..50 {
            if !self.core.action_ok() {
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        self.probe.record(format!("{}:exec", bound_name(&self.core)));
        Ok(())
    }
}

/// Library paths the fixture loader serves.
pub const INSTANT_LIB: &str = "/fix/libinstant.so";
pub const PRODUCER_LIB: &str = "/fix/libproducer.so";
pub const CONSUMER_LIB: &str = "/fix/libconsumer.so";
pub const FAILING_LIB: &str = "/fix/libfailing.so";
pub const BLOCKING_LIB: &str = "/fix/libblocking.so";
pub const SLOW_LIB: &str = "/fix/libslow.so";

/// Loader serving every fixture action, all wired to one probe.
pub fn fixture_loader(probe: &Probe) -> Arc<RegistryLoader> {
    let loader = RegistryLoader::new();

    let p = probe.clone();
    let instant: ActionFactory = Arc::new(move || {
        Arc::new(InstantAction {
            core: ActionCore::new(),
            probe: p.clone(),
        })
    });
    loader.register(INSTANT_LIB, instant);

    let p = probe.clone();
    let producer: ActionFactory = Arc::new(move || {
        Arc::new(ProducerAction {
            core: ActionCore::new(),
            probe: p.clone(),
        })
    });
    loader.register(PRODUCER_LIB, producer);

    let p = probe.clone();
    let consumer: ActionFactory = Arc::new(move || {
        Arc::new(ConsumerAction {
            core: ActionCore::new(),
            probe: p.clone(),
        })
    });
    loader.register(CONSUMER_LIB, consumer);

    let p = probe.clone();
    let failing: ActionFactory = Arc::new(move || {
        Arc::new(FailingAction {
            core: ActionCore::new(),
            probe: p.clone(),
        })
    });
    loader.register(FAILING_LIB, failing);

    let p = probe.clone();
    let blocking: ActionFactory = Arc::new(move || {
        Arc::new(BlockingAction {
            core: ActionCore::new(),
            probe: p.clone(),
        })
    });
    loader.register(BLOCKING_LIB, blocking);

    let p = probe.clone();
    let slow: ActionFactory = Arc::new(move || {
        Arc::new(SlowAction {
            core: ActionCore::new(),
            probe: p.clone(),
        })
    });
    loader.register(SLOW_LIB, slow);

    Arc::new(loader)
}

/// An executor wired to the fixture loader, with a fast cleanup period
/// so reaping is observable within test timeouts.
pub fn bench() -> (Executor, Probe) {
    let probe = Probe::new();
    let config = ExecutorConfig::new()
        .with_cleanup_period(Duration::from_millis(25))
        .with_stop_timeout(Duration::from_millis(500));
    let executor = Executor::new(config, fixture_loader(&probe));
    (executor, probe)
}

/// Poll an async condition until it holds or the timeout expires.
pub async fn eventually<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Default patience for engine-driven state changes.
pub const PATIENCE: Duration = Duration::from_secs(3);
