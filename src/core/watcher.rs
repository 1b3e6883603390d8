//! # Watcher: convergence detection, timeout enforcement and stats logging.
//!
//! The watcher runs two timers on its own single-slot [`Pool`]:
//!
//! ```text
//! cleanup (every cleanup_interval)
//!   ├─► engine gone?            ─► shut down
//!   ├─► runner.is_timed_out()   ─► runner.stop()
//!   └─► every runner stopped?   ─► final stats ─► engine.stop() ─► shut down
//!
//! stats (every log_interval)
//!   └─► render report ─► log it unless identical to the previous one
//! ```
//!
//! It holds the engine weakly: dropping the engine ends the watcher on its
//! next tick.

use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use crate::core::{engine::Engine, pool::Pool, stats::stats_report};

/// Polls an [`Engine`]'s runners until all of them stopped.
pub(crate) struct Watcher {
    engine: Weak<Engine>,
    pool: Pool,
    cleanup_interval: Duration,
    log_interval: Duration,
    last_report: Mutex<Option<String>>,
}

impl Watcher {
    /// Creates the watcher and logs the initial stats.
    pub(crate) fn new(
        engine: Weak<Engine>,
        handle: Handle,
        cleanup_interval: Duration,
        log_interval: Duration,
    ) -> Arc<Self> {
        let watcher = Arc::new(Self {
            engine,
            pool: Pool::new("watcher", 1, handle),
            cleanup_interval,
            log_interval,
            last_report: Mutex::new(None),
        });
        watcher.log_stats();
        watcher
    }

    /// Schedules the first cleanup immediately and the stats timer after one interval.
    pub(crate) fn run(self: &Arc<Self>) {
        self.schedule_cleanup(Duration::ZERO);
        self.schedule_stats();
    }

    /// Stops both timers. Idempotent.
    pub(crate) fn shutdown(&self) {
        if !self.pool.is_shutdown() {
            debug!(pool = self.pool.name(), "shutting down watcher");
            self.pool.shutdown();
        }
    }

    #[cfg(test)]
    pub(crate) fn is_shutdown(&self) -> bool {
        self.pool.is_shutdown()
    }

    /// Logs the stats report unless it equals the last one logged.
    ///
    /// Returns `true` when a report was logged.
    pub(crate) fn log_stats(&self) -> bool {
        let Some(engine) = self.engine.upgrade() else {
            return false;
        };
        let report = stats_report(&engine.warmers());
        let mut last = self
            .last_report
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if last.as_deref() == Some(report.as_str()) {
            return false;
        }
        info!("{report}");
        *last = Some(report);
        true
    }

    fn schedule_cleanup(self: &Arc<Self>, delay: Duration) {
        let watcher = Arc::clone(self);
        self.pool.schedule(delay, move |_unit| async move {
            if watcher.cleanup() {
                watcher.schedule_cleanup(watcher.cleanup_interval);
            }
        });
    }

    fn schedule_stats(self: &Arc<Self>) {
        let watcher = Arc::clone(self);
        self.pool.schedule(self.log_interval, move |_unit| async move {
            watcher.log_stats();
            watcher.schedule_stats();
        });
    }

    /// One cleanup tick; returns `false` once the watcher is done.
    fn cleanup(&self) -> bool {
        let Some(engine) = self.engine.upgrade() else {
            self.shutdown();
            return false;
        };

        let runners = engine.runners();
        for runner in runners.iter().filter(|r| !r.is_stopped() && r.is_timed_out()) {
            warn!(
                warmer = runner.name(),
                duration_ms = runner.duration().as_millis() as u64,
                timeout_ms = runner.policy().timeout().map(|t| t.as_millis() as u64),
                "warmer timed out, stopping it"
            );
            runner.stop();
        }

        if runners.iter().all(|r| r.is_stopped()) {
            info!(count = runners.len(), "all warmers stopped");
            self.log_stats();
            engine.stop();
            self.shutdown();
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::TaskError,
        policies::{Params, WarmerPolicy},
        warmers::{Warmer, WarmerRegistry},
    };
    use async_trait::async_trait;

    #[derive(Default)]
    struct Stuck;

    #[async_trait]
    impl Warmer for Stuck {
        async fn init(&mut self, _params: &Params) -> Result<(), TaskError> {
            Ok(())
        }
        async fn next(&mut self) -> Result<(), TaskError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        }
    }

    fn engine(policies: Vec<WarmerPolicy>) -> Arc<Engine> {
        let mut registry = WarmerRegistry::with_builtin();
        registry.register::<Stuck>("stuck").unwrap();
        let engine = Engine::new(crate::EngineConfig::default(), registry);
        for policy in policies {
            engine.register_warmer(policy);
        }
        engine
    }

    fn watcher(engine: &Arc<Engine>) -> Arc<Watcher> {
        Watcher::new(
            Arc::downgrade(engine),
            Handle::current(),
            Duration::from_secs(3600),
            Duration::from_secs(3600),
        )
    }

    fn last_report(watcher: &Watcher) -> Option<String> {
        watcher.last_report.lock().unwrap().clone()
    }

    #[tokio::test]
    async fn initial_snapshot_logged_on_construction() {
        let engine = engine(vec![WarmerPolicy::new("echo").with_concurrency(2)]);
        let watcher = watcher(&engine);

        let report = last_report(&watcher).expect("initial report");
        assert!(report.starts_with("warmvisor stats:"));
        assert!(report.contains("warmer=echo-1"));
        assert!(report.contains("warmer=echo-2"));
    }

    #[tokio::test]
    async fn stats_logged_only_when_changed() {
        let engine = engine(vec![WarmerPolicy::new("echo")]);
        let watcher = watcher(&engine);
        let before = last_report(&watcher);

        assert!(!watcher.log_stats());
        assert_eq!(last_report(&watcher), before);

        engine.runners()[0].stop();
        assert!(watcher.log_stats());
        assert_ne!(last_report(&watcher), before);
        assert!(last_report(&watcher).unwrap().contains("stopped=true"));

        assert!(!watcher.log_stats());
    }

    #[tokio::test]
    async fn cleanup_continues_while_runners_active() {
        let engine = engine(vec![WarmerPolicy::new("echo")]);
        let watcher = watcher(&engine);

        assert!(watcher.cleanup());
        assert!(!watcher.is_shutdown());
    }

    #[tokio::test]
    async fn converging_tick_is_terminal() {
        let engine = engine(vec![WarmerPolicy::new("echo").with_concurrency(2)]);
        let watcher = watcher(&engine);
        for runner in engine.runners() {
            runner.stop();
        }

        assert!(!watcher.cleanup());
        assert!(watcher.is_shutdown());
        assert!(!watcher.pool.schedule(Duration::ZERO, |_unit| async {}));
    }

    #[tokio::test]
    async fn timed_out_last_runner_converges_in_same_tick() {
        let engine = engine(vec![
            WarmerPolicy::new("stuck")
                .with_timeout_millis(20)
                .with_yield_millis(1),
        ]);
        let watcher = watcher(&engine);
        let runner = Arc::clone(&engine.runners()[0]);
        let pool = Pool::try_current("test", 1).unwrap();
        runner.start(&pool);

        for _ in 0..200 {
            if runner.is_timed_out() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(runner.is_timed_out());
        assert!(!runner.is_stopped());

        assert!(!watcher.cleanup());
        assert!(runner.is_stopped());
        assert!(watcher.is_shutdown());
        pool.shutdown();
    }

    #[tokio::test]
    async fn dropped_engine_ends_watcher() {
        let engine = engine(vec![WarmerPolicy::new("echo")]);
        let watcher = watcher(&engine);
        drop(engine);

        assert!(!watcher.cleanup());
        assert!(watcher.is_shutdown());
        assert!(!watcher.log_stats());
    }
}
