//! # warmvisor
//!
//! **Warmvisor** is a warm-up execution engine for Rust services.
//!
//! It runs a configured set of pluggable *warmers* (cache fillers, connection
//! pool primers, endpoint pingers) before a service accepts live traffic.
//! Each warmer cycles through `init` once and then `next` repeatedly, bounded
//! by its policy, until every required warmer has stopped: the service is
//! then *warm*.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │ WarmerPolicy │   │ WarmerPolicy │   │ WarmerPolicy │
//!     │ (class echo) │   │ (class http) │   │ (class ...)  │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Engine                                                           │
//! │  - WarmerRegistry (class -> factory)                              │
//! │  - TypeLocks (one async mutex per warmer type)                    │
//! │  - runner set (append-only)                                       │
//! └──────┬──────────────────┬──────────────────┬───────────────┬──────┘
//!        ▼                  ▼                  ▼               │
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐   │
//!     │  TaskRunner  │   │  TaskRunner  │   │  TaskRunner  │   │
//!     │ (step, step, │   │ (step, step, │   │ (step, step, │   │
//!     │  step, ...)  │   │  step, ...)  │   │  step, ...)  │   │
//!     └┬─────────────┘   └┬─────────────┘   └┬─────────────┘   │
//!      │ re-submit        │ re-submit        │ re-submit       │
//!      ▼                  ▼                  ▼                 ▼
//! ┌──────────────────────────────────────┐   ┌────────────────────────┐
//! │ Pool (parallelism slots)             │   │ Watcher (own 1-slot    │
//! │ delayed one-shot units,              │   │ pool): timeouts,       │
//! │ one CancellationToken per unit       │   │ convergence, stats     │
//! └──────────────────────────────────────┘   └────────────────────────┘
//! ```
//!
//! ### Lifecycle
//! ```text
//! Engine::start()
//!   ├─► register every configured policy (concurrency × TaskRunner)
//!   ├─► Watcher::run()
//!   └─► schedule runner.start() after random jitter
//!
//! TaskRunner step {
//!   ├─► guard: stopped / max failures / max iterations / cancelled ─► stop
//!   ├─► init(params) once, then next() per iteration
//!   │       ├─ Ok  ──► count success
//!   │       └─ Err ──► count failure (cancellation also stops)
//!   └─► re-submit after yield
//! }
//!
//! Watcher poll {
//!   ├─► stop runners past their timeout
//!   └─► all stopped ─► Engine::stop() ─► pool shutdown, runners stopped
//! }
//! ```
//!
//! ## Features
//! | Area              | Description                                                   | Key types / traits                          |
//! |-------------------|---------------------------------------------------------------|---------------------------------------------|
//! | **Warmers**       | Pluggable warm-up units and the class registry.               | [`Warmer`], [`WarmerRegistry`]              |
//! | **Policies**      | Timeout, yield, iteration/failure limits, concurrency.        | [`WarmerPolicy`], [`PolicyDefaults`]        |
//! | **Engine**        | Runs warmers and reports warm status.                         | [`Engine`], [`TaskRunner`], [`RunnerStatus`] |
//! | **Control**       | Start/stop handle for outer layers.                           | [`Controller`], [`Control`]                 |
//! | **Errors**        | Typed errors for warmers, registry and config.                | [`TaskError`], [`EngineError`], [`ConfigError`] |
//! | **Configuration** | TOML file plus `WARMVISOR_*` environment overrides.           | [`EngineConfig`]                            |
//!
//! ## Optional features
//! - `http`: exports the built-in `HttpWarmer` (class `http`, built on `reqwest`).
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use warmvisor::{Engine, EngineConfig, Params, WarmerPolicy, WarmerRegistry};
//!
//! #[tokio::main(flavor = "multi_thread")]
//! async fn main() {
//!     let mut params = Params::new();
//!     params.insert("text".into(), "warming up".into());
//!
//!     let cfg = EngineConfig::default().with_warmer(
//!         WarmerPolicy::new("echo")
//!             .with_max_iterations(10)
//!             .with_timeout(Duration::from_secs(1))
//!             .with_required(true)
//!             .with_params(params),
//!     );
//!
//!     let engine = Engine::new(cfg, WarmerRegistry::with_builtin());
//!     engine.start();
//!     while !engine.is_warm() {
//!         tokio::time::sleep(Duration::from_millis(10)).await;
//!     }
//!     engine.stop();
//!
//!     let status = &engine.warmers()[0];
//!     assert_eq!(status.iteration, 10);
//!     assert!(status.completed);
//! }
//! ```
mod controller;
mod core;
mod error;
mod policies;
mod warmers;

// ---- Public re-exports ----

pub use self::core::{
    DEFAULT_CLEANUP_INTERVAL, DEFAULT_LOG_INTERVAL, Engine, EngineConfig, RunnerStatus, TaskRunner,
    stats_report,
};
pub use controller::{Control, Controller};
pub use error::{ConfigError, EngineError, TaskError};
pub use policies::{DEFAULT_YIELD, Params, PolicyDefaults, WarmerPolicy, startup_jitter};
pub use warmers::{BuiltWarmer, EchoWarmer, Warmer, WarmerRegistry};

// Optional: built-in HTTP warmer.
// Enable with: `--features http`
#[cfg(feature = "http")]
pub use warmers::HttpWarmer;
