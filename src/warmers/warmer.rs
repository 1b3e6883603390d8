//! # Warmer contract.
//!
//! A [`Warmer`] is the unit of repeated work the engine drives: `init` runs
//! until it succeeds once, then `next` runs once per iteration.
//!
//! Both calls happen on pool-owned tasks, possibly a different one each
//! time, and never concurrently with another instance of the same concrete
//! type. A call may be cancelled at any `.await` point when the runner is
//! stopped; the engine counts that as a failed round and stops the runner.

use async_trait::async_trait;

use crate::{error::TaskError, policies::Params};

/// # Pluggable warm-up unit.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use warmvisor::{Params, TaskError, Warmer};
///
/// #[derive(Default)]
/// struct Counter {
///     hits: u64,
/// }
///
/// #[async_trait]
/// impl Warmer for Counter {
///     async fn init(&mut self, _params: &Params) -> Result<(), TaskError> {
///         Ok(())
///     }
///
///     async fn next(&mut self) -> Result<(), TaskError> {
///         self.hits += 1;
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Warmer: Send + 'static {
    /// Prepares the warmer from its policy parameters.
    ///
    /// Retried on the next step if it fails; every failure consumes one
    /// failure credit.
    async fn init(&mut self, params: &Params) -> Result<(), TaskError>;

    /// Performs one unit of warm-up work.
    async fn next(&mut self) -> Result<(), TaskError>;
}
