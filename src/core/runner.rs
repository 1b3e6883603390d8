//! # TaskRunner: one warmer instance driven by a self-rescheduling step.
//!
//! A runner owns one [`Warmer`] and executes it one *step* at a time on the
//! engine's pool. Every step either stops the runner or re-submits the
//! next step after the policy's yield interval.
//!
//! ## Step flow
//! ```text
//! step()
//!   ├─► guard: stopped | failures >= max | iteration >= max | unit cancelled
//!   │        └─► mark stopped (and completed, for the iteration cap) ─► done
//!   ├─► not initialized?  init(params)      ─► Ok: initialized = true
//!   │   else              iteration += 1
//!   │                     next()            ─► Ok: successful_rounds += 1
//!   │
//!   │   Err(Fail | Panicked) ─► failed_rounds += 1 ─► reschedule
//!   │   Err(Canceled)        ─► failed_rounds += 1 ─► mark stopped ─► done
//!   ├─► duration += step time
//!   └─► pool.schedule(yield_interval, step)
//! ```
//!
//! ## Rules
//! - Steps of one runner never overlap (the next one is scheduled by the previous).
//! - Calls into the same warmer **type** are serialized across runners.
//! - `stop()` cancels the unit of the step in flight; a blocked call is abandoned.
//! - Once stopped, a runner never executes again.
//! - Counters only grow; `iteration == successful_rounds + failed next() rounds`.

use std::any::TypeId;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use futures::{FutureExt, future::BoxFuture};
use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    core::{locks::TypeLocks, pool::Pool, stats::RunnerStatus},
    error::{EngineError, TaskError},
    policies::WarmerPolicy,
    warmers::{BuiltWarmer, Warmer, WarmerRegistry},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Call {
    Init,
    Next,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Next {
    Reschedule,
    Stop,
}

/// Why the guard refused to run a step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum StopReason {
    Requested,
    FailureLimit,
    IterationLimit,
    Cancelled,
}

impl StopReason {
    fn as_label(self) -> &'static str {
        match self {
            StopReason::Requested => "stop_requested",
            StopReason::FailureLimit => "max_failures_reached",
            StopReason::IterationLimit => "max_iterations_reached",
            StopReason::Cancelled => "unit_cancelled",
        }
    }
}

/// Executes one warmer instance according to its [`WarmerPolicy`].
pub struct TaskRunner {
    name: String,
    policy: Arc<WarmerPolicy>,
    type_id: TypeId,
    type_name: &'static str,
    warmer: tokio::sync::Mutex<Box<dyn Warmer>>,
    serial: Arc<tokio::sync::Mutex<()>>,
    current: Mutex<Option<CancellationToken>>,

    epoch: Instant,
    stopped: AtomicBool,
    completed: AtomicBool,
    running: AtomicBool,
    initialized: AtomicBool,
    iteration: AtomicU64,
    successful_rounds: AtomicU64,
    failed_rounds: AtomicU64,
    started_at_millis: AtomicU64,
    duration_nanos: AtomicU64,
    /// Offset (nanos since `epoch`, plus one) of the step in flight; `0` when idle.
    step_started: AtomicU64,
}

impl TaskRunner {
    /// Creates runner `instance` for `policy` around an already built warmer.
    pub(crate) fn new(policy: Arc<WarmerPolicy>, instance: usize, built: BuiltWarmer, locks: &TypeLocks) -> Arc<Self> {
        Arc::new(Self {
            name: format!("{}-{}", policy.name(), instance),
            serial: locks.lock_for(built.type_id),
            type_id: built.type_id,
            type_name: built.type_name,
            warmer: tokio::sync::Mutex::new(built.warmer),
            current: Mutex::new(None),
            policy,
            epoch: Instant::now(),
            stopped: AtomicBool::new(false),
            completed: AtomicBool::new(false),
            running: AtomicBool::new(false),
            initialized: AtomicBool::new(false),
            iteration: AtomicU64::new(0),
            successful_rounds: AtomicU64::new(0),
            failed_rounds: AtomicU64::new(0),
            started_at_millis: AtomicU64::new(0),
            duration_nanos: AtomicU64::new(0),
            step_started: AtomicU64::new(0),
        })
    }

    /// Resolves `policy.class()` in `registry` and creates runner `instance`.
    pub(crate) fn from_registry(
        policy: Arc<WarmerPolicy>,
        instance: usize,
        registry: &WarmerRegistry,
        locks: &TypeLocks,
    ) -> Result<Arc<Self>, EngineError> {
        let built = registry.build(policy.class())?;
        Ok(Self::new(policy, instance, built, locks))
    }

    /// Records the start time and schedules the first step.
    pub(crate) fn start(self: &Arc<Self>, pool: &Pool) {
        self.started_at_millis
            .store(now_millis(), Ordering::SeqCst);
        info!(warmer = %self.name, implementation = self.type_name, "starting warmer");
        self.schedule(pool);
    }

    /// Marks the runner stopped and cancels the step in flight, if any.
    pub fn stop(&self) {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            info!(
                warmer = %self.name,
                elapsed_ms = self.elapsed_millis(),
                "stop called on warmer"
            );
        }
        if let Some(unit) = lock(&self.current).as_ref() {
            unit.cancel();
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn policy(&self) -> &WarmerPolicy {
        &self.policy
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    pub fn is_required(&self) -> bool {
        self.policy.is_required()
    }

    pub fn iteration(&self) -> u64 {
        self.iteration.load(Ordering::Relaxed)
    }

    pub fn successful_rounds(&self) -> u64 {
        self.successful_rounds.load(Ordering::Relaxed)
    }

    pub fn failed_rounds(&self) -> u64 {
        self.failed_rounds.load(Ordering::Relaxed)
    }

    pub fn started_at_millis(&self) -> u64 {
        self.started_at_millis.load(Ordering::SeqCst)
    }

    /// Time spent inside steps so far, including the step in flight.
    pub fn duration(&self) -> Duration {
        let done = self.duration_nanos.load(Ordering::SeqCst);
        let in_flight = match self.step_started.load(Ordering::SeqCst) {
            0 => 0,
            mark => self.epoch_nanos().saturating_sub(mark - 1),
        };
        Duration::from_nanos(done.saturating_add(in_flight))
    }

    /// True once `duration()` exceeds the policy timeout.
    pub fn is_timed_out(&self) -> bool {
        self.policy
            .timeout()
            .is_some_and(|timeout| self.duration() > timeout)
    }

    pub fn status(&self) -> RunnerStatus {
        RunnerStatus {
            name: self.name.clone(),
            class: self.policy.class().to_string(),
            iteration: self.iteration(),
            successful_rounds: self.successful_rounds(),
            failed_rounds: self.failed_rounds(),
            started_at_millis: self.started_at_millis(),
            duration: self.duration(),
            timeout: self.policy.timeout(),
            required: self.is_required(),
            initialized: self.is_initialized(),
            running: self.is_running(),
            completed: self.is_completed(),
            stopped: self.is_stopped(),
        }
    }

    pub(crate) fn schedule(self: &Arc<Self>, pool: &Pool) {
        let runner = Arc::clone(self);
        let next_pool = pool.clone();
        let scheduled = pool.schedule(self.policy.yield_interval(), move |unit| {
            runner.step(next_pool, unit)
        });
        if !scheduled {
            debug!(warmer = %self.name, "pool is shut down, step not scheduled");
        }
    }

    fn step(self: Arc<Self>, pool: Pool, unit: CancellationToken) -> BoxFuture<'static, ()> {
        async move {
            self.running.store(true, Ordering::SeqCst);
            self.step_started
                .store(self.epoch_nanos() + 1, Ordering::SeqCst);
            let started = Instant::now();

            let next = self.advance(&unit).await;

            let elapsed = nanos(started.elapsed());
            self.step_started.store(0, Ordering::SeqCst);
            self.duration_nanos.fetch_add(elapsed, Ordering::SeqCst);
            self.running.store(false, Ordering::SeqCst);

            if next == Next::Reschedule {
                self.schedule(&pool);
            }
        }
        .boxed()
    }

    async fn advance(&self, unit: &CancellationToken) -> Next {
        if let Some(reason) = self.guard(unit) {
            if reason == StopReason::IterationLimit {
                self.completed.store(true, Ordering::SeqCst);
            }
            self.stopped.store(true, Ordering::SeqCst);
            info!(
                warmer = %self.name,
                reason = reason.as_label(),
                iteration = self.iteration(),
                failures = self.failed_rounds(),
                "warmer stopped"
            );
            return Next::Stop;
        }

        if !self.is_initialized() {
            info!(warmer = %self.name, "trying to initialize warmer");
            match self.call(unit, Call::Init).await {
                Ok(()) => {
                    self.initialized.store(true, Ordering::SeqCst);
                    info!(warmer = %self.name, "warmer initialized");
                    Next::Reschedule
                }
                Err(e) => self.on_failure(Call::Init, e),
            }
        } else {
            self.iteration.fetch_add(1, Ordering::Relaxed);
            match self.call(unit, Call::Next).await {
                Ok(()) => {
                    self.successful_rounds.fetch_add(1, Ordering::Relaxed);
                    Next::Reschedule
                }
                Err(e) => self.on_failure(Call::Next, e),
            }
        }
    }

    fn guard(&self, unit: &CancellationToken) -> Option<StopReason> {
        if self.is_stopped() {
            return Some(StopReason::Requested);
        }
        if self
            .policy
            .max_failures()
            .is_some_and(|max| self.failed_rounds() >= max)
        {
            return Some(StopReason::FailureLimit);
        }
        if self
            .policy
            .max_iterations()
            .is_some_and(|max| self.iteration() >= max)
        {
            return Some(StopReason::IterationLimit);
        }
        if unit.is_cancelled() {
            return Some(StopReason::Cancelled);
        }
        None
    }

    fn on_failure(&self, call: Call, err: TaskError) -> Next {
        self.failed_rounds.fetch_add(1, Ordering::Relaxed);
        if err.is_cancellation() {
            warn!(warmer = %self.name, ?call, "warmer interrupted");
            self.stopped.store(true, Ordering::SeqCst);
            Next::Stop
        } else {
            warn!(
                warmer = %self.name,
                ?call,
                error = %err,
                label = err.as_label(),
                "warmer execution failed"
            );
            Next::Reschedule
        }
    }

    /// Runs `init`/`next` under the type lock, racing the unit's cancellation.
    async fn call(&self, unit: &CancellationToken, call: Call) -> Result<(), TaskError> {
        let _bound = self.bind(unit);

        let mut warmer = self.warmer.lock().await;
        let serial = Arc::clone(&self.serial);
        let params = self.policy.params();
        let work = async {
            let _serial = serial.lock().await;
            match call {
                Call::Init => warmer.init(params).await,
                Call::Next => warmer.next().await,
            }
        };

        select! {
            biased;
            _ = unit.cancelled() => Err(TaskError::Canceled),
            res = AssertUnwindSafe(work).catch_unwind() => {
                res.unwrap_or_else(|panic| Err(TaskError::Panicked { info: panic_message(&*panic) }))
            }
        }
    }

    /// Publishes `unit` as the cancellable step in flight until the guard drops.
    fn bind<'a>(&'a self, unit: &CancellationToken) -> Bound<'a> {
        *lock(&self.current) = Some(unit.clone());
        if self.is_stopped() {
            unit.cancel();
        }
        Bound {
            slot: &self.current,
        }
    }

    fn epoch_nanos(&self) -> u64 {
        nanos(self.epoch.elapsed())
    }

    fn elapsed_millis(&self) -> u64 {
        match self.started_at_millis() {
            0 => 0,
            started => now_millis().saturating_sub(started),
        }
    }
}

struct Bound<'a> {
    slot: &'a Mutex<Option<CancellationToken>>,
}

impl Drop for Bound<'_> {
    fn drop(&mut self) {
        *lock(self.slot) = None;
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

fn nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

fn now_millis() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0)
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
