//! Warmer scheduling policies.
//!
//! This module groups the knobs that control **how long** a warmer runs,
//! **how often** it steps and **when** the engine considers it done.
//!
//! ## Contents
//! - [`WarmerPolicy`] per-warmer limits (timeout / yield / iterations / failures / concurrency)
//! - [`PolicyDefaults`] fallback values used when a record omits a field
//! - [`startup_jitter`] randomized first-step delay to avoid a startup stampede
//!
//! ## Quick wiring
//! ```text
//! WarmerPolicy { class, timeout, yield, max_iterations, max_failures, concurrency, required, params }
//!      └─► Engine::register_warmer() builds `concurrency` TaskRunners, each using:
//!           - yield_interval between steps
//!           - max_failures / max_iterations in the continuation guard
//!           - timeout in the Watcher poll cycle
//! ```
//!
//! ## Defaults
//! - `timeout = None` (unbounded), `yield = 10ms`, `concurrency = 1`
//! - `max_iterations = None`, `max_failures = None` (unbounded)
//! - `required = false`, `params = {}`

mod jitter;
mod warmer;

pub use jitter::startup_jitter;
pub use warmer::{DEFAULT_YIELD, Params, PolicyDefaults, WarmerPolicy};
