//! Runtime core: engine, runners, scheduling and supervision.
//!
//! Public API from this module is [`Engine`] plus the types it exposes.
//!
//! Internal modules:
//! - [`engine`]: owns runners, pool and watcher; start/stop and warm status;
//! - [`runner`]: one warmer instance and its self-rescheduling step;
//! - [`pool`]: delayed one-shot units on bounded worker slots;
//! - [`watcher`]: timeouts, convergence detection and stats logging;
//! - [`locks`]: per-implementation call serialization;
//! - [`stats`]: runner snapshots and the stats report;
//! - [`config`]: engine settings and the TOML/env loader.

mod config;
mod engine;
mod locks;
mod pool;
mod runner;
mod stats;
mod watcher;

pub use config::{DEFAULT_CLEANUP_INTERVAL, DEFAULT_LOG_INTERVAL, EngineConfig};
pub use engine::Engine;
pub use runner::TaskRunner;
pub use stats::{RunnerStatus, stats_report};
