//! # Scheduling pool: delayed one-shot units on bounded worker slots.
//!
//! A [`Pool`] runs *units* (one-shot futures) after a delay, at most
//! `parallelism` of them at the same time. Runners use it to re-submit their
//! next step; the watcher uses a single-slot pool for its two timers.
//!
//! ## Architecture
//! ```text
//! schedule(delay, unit)
//!    └─► spawn ─► select { cancelled ─► drop, sleep(delay) }
//!                 select { cancelled ─► drop, acquire slot }
//!                 unit(unit_token).await          (holds the slot)
//!
//! shutdown()
//!    └─► cancel parent token ─► every unit_token is cancelled
//!        close semaphore     ─► waiting units never acquire a slot
//! ```
//!
//! ## Rules
//! - Each unit receives its **own child token**; cancelling it affects that unit only.
//! - Units still sleeping or waiting for a slot are **dropped** on shutdown.
//! - Running units are **not** aborted: they observe their token and exit on their own.
//! - `schedule` after `shutdown` is refused (returns `false`).

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::{runtime::Handle, select, sync::Semaphore, time};
use tokio_util::{sync::CancellationToken, task::TaskTracker};

/// Bounded pool of worker slots executing delayed one-shot units.
///
/// Cheap to clone; all clones share slots, shutdown token and tracker.
#[derive(Clone, Debug)]
pub(crate) struct Pool {
    name: &'static str,
    parallelism: usize,
    slots: Arc<Semaphore>,
    token: CancellationToken,
    tracker: TaskTracker,
    handle: Handle,
}

impl Pool {
    /// Creates a pool spawning on `handle` with `parallelism` slots (min 1).
    pub(crate) fn new(name: &'static str, parallelism: usize, handle: Handle) -> Self {
        let parallelism = parallelism.max(1);
        Self {
            name,
            parallelism,
            slots: Arc::new(Semaphore::new(parallelism)),
            token: CancellationToken::new(),
            tracker: TaskTracker::new(),
            handle,
        }
    }

    /// Creates a pool on the current tokio runtime, if there is one.
    #[cfg(test)]
    pub(crate) fn try_current(name: &'static str, parallelism: usize) -> Option<Self> {
        Handle::try_current()
            .ok()
            .map(|handle| Self::new(name, parallelism, handle))
    }

    pub(crate) fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn parallelism(&self) -> usize {
        self.parallelism
    }

    /// Runs `unit` after `delay` once a slot is free.
    ///
    /// Returns `false` if the pool is already shut down (nothing is spawned).
    pub(crate) fn schedule<F, Fut>(&self, delay: Duration, unit: F) -> bool
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if self.token.is_cancelled() {
            return false;
        }

        let unit_token = self.token.child_token();
        let slots = Arc::clone(&self.slots);

        self.tracker.spawn_on(
            async move {
                select! {
                    biased;
                    _ = unit_token.cancelled() => return,
                    _ = time::sleep(delay) => {}
                }

                let _permit = select! {
                    biased;
                    _ = unit_token.cancelled() => return,
                    res = slots.acquire_owned() => match res {
                        Ok(permit) => permit,
                        Err(_closed) => return,
                    }
                };

                unit(unit_token).await;
            },
            &self.handle,
        );
        true
    }

    /// Cancels every unit and refuses new ones. Idempotent.
    pub(crate) fn shutdown(&self) {
        self.token.cancel();
        self.slots.close();
        self.tracker.close();
    }

    pub(crate) fn is_shutdown(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Number of units spawned and not yet finished.
    #[cfg(test)]
    pub(crate) fn pending(&self) -> usize {
        self.tracker.len()
    }

    /// Waits until the pool is shut down and every unit has finished.
    #[cfg(test)]
    pub(crate) async fn wait(&self) {
        self.tracker.wait().await;
    }
}
