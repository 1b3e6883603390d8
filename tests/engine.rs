use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use warmvisor::{Engine, EngineConfig, Params, TaskError, Warmer, WarmerPolicy, WarmerRegistry};

fn config() -> EngineConfig {
    EngineConfig {
        parallelism: 4,
        cleanup_interval: Duration::from_millis(20),
        ..EngineConfig::default()
    }
}

async fn wait_for(what: &str, cond: impl Fn() -> bool) {
    for _ in 0..500 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {what}");
}

/// Counts `init` calls into a shared counter; `next` always succeeds.
struct Quick {
    inits: Arc<AtomicUsize>,
}

#[async_trait]
impl Warmer for Quick {
    async fn init(&mut self, _params: &Params) -> Result<(), TaskError> {
        self.inits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
    async fn next(&mut self) -> Result<(), TaskError> {
        Ok(())
    }
}

fn instant_registry(inits: &Arc<AtomicUsize>) -> WarmerRegistry {
    let mut registry = WarmerRegistry::with_builtin();
    let inits = Arc::clone(inits);
    registry
        .register_with::<Quick, _>("instant", move || Quick {
            inits: Arc::clone(&inits),
        })
        .unwrap();
    registry
}

#[derive(Default)]
struct AlwaysFailing;

#[async_trait]
impl Warmer for AlwaysFailing {
    async fn init(&mut self, _params: &Params) -> Result<(), TaskError> {
        Ok(())
    }
    async fn next(&mut self) -> Result<(), TaskError> {
        Err(TaskError::fail("backend unavailable"))
    }
}

#[derive(Default)]
struct Sleeping;

#[async_trait]
impl Warmer for Sleeping {
    async fn init(&mut self, _params: &Params) -> Result<(), TaskError> {
        Ok(())
    }
    async fn next(&mut self) -> Result<(), TaskError> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(())
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn echo_runs_to_completion_and_engine_gets_warm() {
    let mut params = Params::new();
    params.insert("text".into(), "echo is a sample warmer...".into());
    let cfg = config().with_warmer(
        WarmerPolicy::new("echo")
            .with_name("echo")
            .with_max_iterations(10)
            .with_max_failures(3)
            .with_timeout_millis(1000)
            .with_required(true)
            .with_params(params),
    );
    let engine = Engine::new(cfg, WarmerRegistry::with_builtin());

    engine.start();
    wait_for("engine to get warm", || engine.is_warm()).await;

    let status = &engine.warmers()[0];
    assert_eq!(status.name, "echo-1");
    assert_eq!(status.iteration, 10);
    assert_eq!(status.successful_rounds, 10);
    assert_eq!(status.failed_rounds, 0);
    assert!(status.completed);
    assert!(status.stopped);

    wait_for("watcher to stop the engine", || !engine.is_running()).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn external_stop_halts_unbounded_runners() {
    let inits = Arc::new(AtomicUsize::new(0));
    let cfg = config().with_warmer(WarmerPolicy::new("instant").with_concurrency(10));
    let engine = Engine::new(cfg, instant_registry(&inits));

    engine.start();
    assert_eq!(engine.runners().len(), 10);
    wait_for("every runner to initialize", || {
        engine.runners().iter().all(|r| r.is_initialized())
    })
    .await;
    assert!(engine.is_warm());

    engine.stop();
    wait_for("every runner to stop", || {
        engine.runners().iter().all(|r| r.is_stopped() && !r.is_running())
    })
    .await;

    assert_eq!(inits.load(Ordering::SeqCst), 10);
    assert!(engine.runners().iter().all(|r| !r.is_completed()));
    assert!(!engine.is_running());
}

#[tokio::test(flavor = "multi_thread")]
async fn no_warmers_is_warm() {
    let engine = Engine::new(config(), WarmerRegistry::with_builtin());

    engine.start();

    assert!(engine.runners().is_empty());
    assert!(engine.is_warm());
    assert!(engine.started_at().is_some());
    wait_for("watcher to stop the engine", || !engine.is_running()).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn failing_runner_stops_after_max_failures() {
    let mut registry = WarmerRegistry::new();
    registry.register::<AlwaysFailing>("failing").unwrap();
    let cfg = config().with_warmer(
        WarmerPolicy::new("failing")
            .with_max_failures(4)
            .with_yield_millis(1)
            .with_required(true),
    );
    let engine = Engine::new(cfg, registry);

    engine.start();
    wait_for("engine to get warm", || engine.is_warm()).await;

    let runner = &engine.runners()[0];
    assert_eq!(runner.failed_rounds(), 4);
    assert_eq!(runner.successful_rounds(), 0);
    assert!(runner.is_initialized());
    assert!(!runner.is_completed());
}

#[tokio::test(flavor = "multi_thread")]
async fn optional_runner_does_not_block_warm() {
    let mut registry = WarmerRegistry::with_builtin();
    registry.register::<Sleeping>("sleeping").unwrap();
    let cfg = config()
        .with_warmer(
            WarmerPolicy::new("echo")
                .with_max_iterations(3)
                .with_required(true),
        )
        .with_warmer(WarmerPolicy::new("sleeping"));
    let engine = Engine::new(cfg, registry);

    engine.start();
    wait_for("engine to get warm", || engine.is_warm()).await;

    let optional = engine
        .runners()
        .into_iter()
        .find(|r| r.policy().class() == "sleeping")
        .unwrap();
    assert!(!optional.is_stopped());

    engine.stop();
    wait_for("optional runner to stop", || optional.is_stopped()).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn blocked_runner_is_stopped_after_timeout() {
    let mut registry = WarmerRegistry::new();
    registry.register::<Sleeping>("sleeping").unwrap();
    let cfg = config().with_warmer(
        WarmerPolicy::new("sleeping")
            .with_timeout_millis(100)
            .with_required(true),
    );
    let engine = Engine::new(cfg, registry);

    let started = Instant::now();
    engine.start();
    wait_for("timed out runner to stop", || {
        engine.is_warm() && engine.runners().iter().all(|r| !r.is_running())
    })
    .await;

    assert!(started.elapsed() >= Duration::from_millis(100));
    assert!(started.elapsed() < Duration::from_secs(5));
    let runner = &engine.runners()[0];
    assert_eq!(runner.iteration(), 1);
    assert_eq!(runner.successful_rounds(), 0);
    assert_eq!(runner.failed_rounds(), 1);
}

static SERIAL_IN_FLIGHT: AtomicUsize = AtomicUsize::new(0);
static SERIAL_PEAK: AtomicUsize = AtomicUsize::new(0);

#[derive(Default)]
struct Serial;

#[async_trait]
impl Warmer for Serial {
    async fn init(&mut self, _params: &Params) -> Result<(), TaskError> {
        Ok(())
    }
    async fn next(&mut self) -> Result<(), TaskError> {
        let now = SERIAL_IN_FLIGHT.fetch_add(1, Ordering::SeqCst) + 1;
        SERIAL_PEAK.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(5)).await;
        SERIAL_IN_FLIGHT.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn same_type_runners_never_overlap() {
    let mut registry = WarmerRegistry::new();
    registry.register::<Serial>("serial").unwrap();
    let cfg = config().with_warmer(
        WarmerPolicy::new("serial")
            .with_concurrency(4)
            .with_max_iterations(5)
            .with_yield_millis(1)
            .with_required(true),
    );
    let engine = Engine::new(cfg, registry);

    engine.start();
    wait_for("engine to get warm", || engine.is_warm()).await;

    assert_eq!(SERIAL_PEAK.load(Ordering::SeqCst), 1);
    assert!(engine.runners().iter().all(|r| r.iteration() == 5));
}

static MIXED_IN_FLIGHT: AtomicUsize = AtomicUsize::new(0);
static MIXED_PEAK: AtomicUsize = AtomicUsize::new(0);

async fn mixed_next() -> Result<(), TaskError> {
    let now = MIXED_IN_FLIGHT.fetch_add(1, Ordering::SeqCst) + 1;
    MIXED_PEAK.fetch_max(now, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(30)).await;
    MIXED_IN_FLIGHT.fetch_sub(1, Ordering::SeqCst);
    Ok(())
}

#[derive(Default)]
struct Left;

#[async_trait]
impl Warmer for Left {
    async fn init(&mut self, _params: &Params) -> Result<(), TaskError> {
        Ok(())
    }
    async fn next(&mut self) -> Result<(), TaskError> {
        mixed_next().await
    }
}

#[derive(Default)]
struct Right;

#[async_trait]
impl Warmer for Right {
    async fn init(&mut self, _params: &Params) -> Result<(), TaskError> {
        Ok(())
    }
    async fn next(&mut self) -> Result<(), TaskError> {
        mixed_next().await
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn different_types_run_in_parallel() {
    let mut registry = WarmerRegistry::new();
    registry.register::<Left>("left").unwrap();
    registry.register::<Right>("right").unwrap();
    let policy = |class: &str| {
        WarmerPolicy::new(class)
            .with_max_iterations(10)
            .with_yield_millis(1)
            .with_required(true)
    };
    let cfg = config()
        .with_warmer(policy("left"))
        .with_warmer(policy("right"));
    let engine = Engine::new(cfg, registry);

    engine.start();
    wait_for("engine to get warm", || engine.is_warm()).await;

    assert_eq!(MIXED_PEAK.load(Ordering::SeqCst), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_class_is_skipped_at_start() {
    let cfg = config()
        .with_warmer(WarmerPolicy::new("foo.bar.baz").with_required(true))
        .with_warmer(WarmerPolicy::new("echo").with_max_iterations(1));
    let engine = Engine::new(cfg, WarmerRegistry::with_builtin());

    engine.start();

    assert_eq!(engine.runners().len(), 1);
    assert_eq!(engine.runners()[0].policy().class(), "echo");
    assert!(engine.is_warm());
    engine.stop();
}

#[test]
fn stop_before_start_is_noop() {
    let engine = Engine::new(config(), WarmerRegistry::with_builtin());
    engine.stop();
    assert!(!engine.is_running());
    assert!(engine.started_at().is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn timeout_of_last_runner_stops_engine_in_same_poll() {
    let mut registry = WarmerRegistry::new();
    registry.register::<Sleeping>("sleeping").unwrap();
    let cfg = EngineConfig {
        cleanup_interval: Duration::from_millis(1000),
        ..config()
    }
    .with_warmer(
        WarmerPolicy::new("sleeping")
            .with_timeout_millis(100)
            .with_required(true),
    );
    let engine = Engine::new(cfg, registry);

    engine.start();
    // first poll runs right away, the second one (~1s) finds the timeout
    tokio::time::sleep(Duration::from_millis(1500)).await;

    assert!(engine.runners()[0].is_stopped());
    assert!(!engine.is_running());
}
