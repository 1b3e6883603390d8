//! # Engine: owns the runner set, the scheduling pool and the watcher.
//!
//! The [`Engine`] turns an [`EngineConfig`] into running warmers and reports
//! whether the service is *warm*.
//!
//! ## Architecture
//! ```text
//! EngineConfig ──► Engine::start()
//!                    ├─► Pool::new(parallelism)
//!                    ├─► register_warmer(policy)        (per configured policy)
//!                    │     └─► TaskRunner × concurrency (registry.build(class))
//!                    ├─► Watcher::new(weak engine).run()
//!                    └─► pool.schedule(jitter, runner.start)   (per runner)
//!
//! Watcher (all runners stopped) ─► Engine::stop()
//!                                    ├─► pool.shutdown()   (queued steps dropped,
//!                                    │                      in-flight steps cancelled)
//!                                    └─► runner.stop()     (per runner)
//! ```
//!
//! ## Rules
//! - `start()` runs once; later calls log a warning and return.
//! - `stop()` is idempotent; on a never-started engine it does nothing.
//! - Unknown warmer classes are logged and skipped, never returned.
//! - `is_warm()` ignores runners whose policy is not `required`.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use warmvisor::{Engine, EngineConfig, WarmerPolicy, WarmerRegistry};
//!
//! #[tokio::main(flavor = "multi_thread")]
//! async fn main() {
//!     let cfg = EngineConfig::default().with_warmer(
//!         WarmerPolicy::new("echo")
//!             .with_max_iterations(3)
//!             .with_required(true),
//!     );
//!     let engine = Engine::new(cfg, WarmerRegistry::with_builtin());
//!
//!     engine.start();
//!     while !engine.is_warm() {
//!         tokio::time::sleep(Duration::from_millis(10)).await;
//!     }
//!     engine.stop();
//! }
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};
use std::time::Instant;

use chrono::{DateTime, Utc};
use tokio::runtime::Handle;
use tracing::{debug, error, info, warn};

use crate::{
    core::{
        config::EngineConfig, locks::TypeLocks, pool::Pool, runner::TaskRunner,
        stats::RunnerStatus, watcher::Watcher,
    },
    policies::{WarmerPolicy, startup_jitter},
    warmers::WarmerRegistry,
};

#[derive(Default)]
struct Lifecycle {
    pool: Option<Pool>,
    watcher: Option<Arc<Watcher>>,
    started_at: Option<DateTime<Utc>>,
    started: Option<Instant>,
}

/// Runs warmers until every required one has stopped.
pub struct Engine {
    cfg: EngineConfig,
    registry: Arc<WarmerRegistry>,
    locks: TypeLocks,
    runners: RwLock<Vec<Arc<TaskRunner>>>,
    instances: AtomicUsize,
    lifecycle: Mutex<Lifecycle>,
    me: Weak<Engine>,
}

impl Engine {
    /// Creates an idle engine; nothing runs until [`Engine::start`].
    pub fn new(cfg: EngineConfig, registry: WarmerRegistry) -> Arc<Self> {
        Self::with_shared_registry(cfg, Arc::new(registry))
    }

    /// Like [`Engine::new`], sharing an existing registry.
    pub fn with_shared_registry(cfg: EngineConfig, registry: Arc<WarmerRegistry>) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            cfg,
            registry,
            locks: TypeLocks::new(),
            runners: RwLock::new(Vec::new()),
            instances: AtomicUsize::new(0),
            lifecycle: Mutex::new(Lifecycle::default()),
            me: me.clone(),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.cfg
    }

    pub fn registry(&self) -> &WarmerRegistry {
        &self.registry
    }

    /// Builds `policy.concurrency()` runners for `policy` and adds them to the set.
    ///
    /// An unknown class is logged and the remaining instances are skipped.
    pub fn register_warmer(&self, policy: WarmerPolicy) {
        info!(class = policy.class(), name = policy.name(), "registering warmer");
        let policy = Arc::new(policy);

        for _ in 0..policy.concurrency() {
            let instance = self.instances.fetch_add(1, Ordering::Relaxed) + 1;
            match TaskRunner::from_registry(Arc::clone(&policy), instance, &self.registry, &self.locks) {
                Ok(runner) => self
                    .runners
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(runner),
                Err(e) => {
                    warn!(
                        class = policy.class(),
                        error = %e,
                        label = e.as_label(),
                        "failed to register warmer"
                    );
                    return;
                }
            }
        }
    }

    /// Starts the pool, the watcher and every configured warmer.
    pub fn start(&self) {
        let mut life = self.lifecycle();
        if let Some(started_at) = life.started_at {
            warn!(%started_at, "engine already started, ignoring start request");
            return;
        }
        let Ok(handle) = Handle::try_current() else {
            error!("no tokio runtime available, engine not started");
            return;
        };

        let pool = Pool::new("warmers", self.cfg.parallelism_clamped(), handle.clone());
        for policy in &self.cfg.warmers {
            self.register_warmer(policy.clone());
        }

        let watcher = Watcher::new(
            self.me.clone(),
            handle,
            self.cfg.cleanup_interval,
            self.cfg.log_interval,
        );
        life.started_at = Some(Utc::now());
        life.started = Some(Instant::now());
        life.pool = Some(pool.clone());
        life.watcher = Some(Arc::clone(&watcher));
        drop(life);

        // outside the lifecycle lock: the first poll may call `stop()` at once
        watcher.run();

        let runners = self.runners();
        if runners.is_empty() {
            warn!("no warmers registered, nothing to schedule");
            return;
        }

        info!(
            count = runners.len(),
            parallelism = pool.parallelism(),
            "scheduling warmers"
        );
        for runner in runners {
            let delay = startup_jitter(self.cfg.defaults.yield_interval);
            let runner_pool = pool.clone();
            pool.schedule(delay, move |_unit| async move {
                runner.start(&runner_pool);
            });
        }
    }

    /// Cancels all pending and running steps and stops every runner.
    pub fn stop(&self) {
        let mut life = self.lifecycle();
        let Some(pool) = life.pool.take() else {
            debug!("engine not running, ignoring stop request");
            return;
        };

        info!("shutting down warmer pool");
        pool.shutdown();

        info!("stopping all warmers");
        for runner in self.runners() {
            runner.stop();
        }

        let elapsed = life.started.map(|s| s.elapsed()).unwrap_or_default();
        info!(
            started_at = ?life.started_at,
            finished_at = %Utc::now(),
            elapsed_ms = elapsed.as_millis() as u64,
            "engine finished"
        );
    }

    /// True when every required runner has stopped.
    pub fn is_warm(&self) -> bool {
        self.runners()
            .iter()
            .filter(|r| r.is_required())
            .all(|r| r.is_stopped())
    }

    /// True between a successful `start()` and the first `stop()`.
    pub fn is_running(&self) -> bool {
        self.lifecycle().pool.is_some()
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.lifecycle().started_at
    }

    /// Shared handles to every registered runner.
    pub fn runners(&self) -> Vec<Arc<TaskRunner>> {
        self.runners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Status snapshots of every registered runner.
    pub fn warmers(&self) -> Vec<RunnerStatus> {
        self.runners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|r| r.status())
            .collect()
    }

    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        let life = self
            .lifecycle
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(pool) = life.pool.take() {
            pool.shutdown();
        }
        if let Some(watcher) = life.watcher.take() {
            watcher.shutdown();
        }
    }
}
