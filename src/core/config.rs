//! # Engine configuration.
//!
//! [`EngineConfig`] holds the engine-wide settings plus the list of warmer
//! policies to run. It is built in code or loaded from TOML with environment
//! overrides:
//!
//! ```toml
//! parallelism = 4
//! cleanup_interval_millis = 300
//! log_interval_seconds = 30
//!
//! [defaults]
//! yield_millis = 10
//! max_failure = 5
//!
//! [[warmers]]
//! class = "echo"
//! name = "echo"
//! max_iterations = 10
//! timeout_millis = 1000
//! required = true
//! params = { text = "echo is a sample warmer..." }
//! ```
//!
//! Environment variables prefixed with `WARMVISOR_` override file values;
//! nested keys use `__` (`WARMVISOR_DEFAULTS__MAX_FAILURE=3`).
//!
//! ## Rules
//! - A missing file yields an empty config (warning only).
//! - A `[[warmers]]` record without `class` is skipped with a warning.
//! - Record fields left out inherit from `[defaults]`, then from built-in defaults.

use std::num::NonZeroUsize;
use std::path::Path;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::Deserialize;
use tracing::warn;

use crate::{
    error::ConfigError,
    policies::{Params, PolicyDefaults, WarmerPolicy},
};

/// Default watcher poll interval.
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_millis(300);
/// Default stats log interval.
pub const DEFAULT_LOG_INTERVAL: Duration = Duration::from_secs(30);

/// Engine-wide settings and the warmer policies to run.
///
/// ## Field semantics
/// - `parallelism`: worker slots of the runner pool (`0` is clamped to 1)
/// - `cleanup_interval`: watcher poll cadence (timeouts, convergence)
/// - `log_interval`: stats report cadence
/// - `defaults`: per-policy fallbacks used by [`WarmerPolicy::with_defaults`]
/// - `warmers`: policies registered on `start()`
#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub parallelism: usize,
    pub cleanup_interval: Duration,
    pub log_interval: Duration,
    pub defaults: PolicyDefaults,
    pub warmers: Vec<WarmerPolicy>,
}

impl Default for EngineConfig {
    /// - `parallelism` = available CPUs (1 if unknown)
    /// - `cleanup_interval = 300ms`
    /// - `log_interval = 30s`
    fn default() -> Self {
        Self {
            parallelism: std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1),
            cleanup_interval: DEFAULT_CLEANUP_INTERVAL,
            log_interval: DEFAULT_LOG_INTERVAL,
            defaults: PolicyDefaults::default(),
            warmers: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Appends a policy (builder style).
    pub fn with_warmer(mut self, policy: WarmerPolicy) -> Self {
        self.warmers.push(policy);
        self
    }

    /// Pool size clamped to a minimum of 1.
    #[inline]
    pub fn parallelism_clamped(&self) -> usize {
        self.parallelism.max(1)
    }

    /// Loads `path` (TOML) merged with `WARMVISOR_*` environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            warn!(path = %path.display(), "config file not found, using empty config");
        }

        let raw: RawConfig = Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("WARMVISOR_").split("__"))
            .extract()?;

        Ok(raw.into_config())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawConfig {
    parallelism: Option<usize>,
    cleanup_interval_millis: Option<u64>,
    log_interval_seconds: Option<u64>,
    defaults: RawDefaults,
    warmers: Vec<RawWarmer>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawDefaults {
    timeout_millis: Option<i64>,
    yield_millis: Option<i64>,
    concurrency: Option<usize>,
    max_iterations: Option<i64>,
    max_failure: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawWarmer {
    class: Option<String>,
    name: Option<String>,
    timeout_millis: Option<i64>,
    yield_millis: Option<i64>,
    max_iterations: Option<i64>,
    max_failure: Option<i64>,
    concurrency: Option<usize>,
    required: Option<bool>,
    params: Params,
}

impl RawDefaults {
    fn into_defaults(self) -> PolicyDefaults {
        let mut defaults = PolicyDefaults::default();
        if let Some(ms) = self.timeout_millis.filter(|ms| *ms > 0) {
            defaults.timeout = Some(Duration::from_millis(ms.unsigned_abs()));
        }
        if let Some(ms) = self.yield_millis.filter(|ms| *ms > 0) {
            defaults.yield_interval = Duration::from_millis(ms.unsigned_abs());
        }
        if let Some(n) = self.concurrency.filter(|n| *n >= 1) {
            defaults.concurrency = n;
        }
        if let Some(n) = self.max_iterations {
            defaults.max_iterations = u64::try_from(n).ok();
        }
        if let Some(n) = self.max_failure {
            defaults.max_failures = u64::try_from(n).ok();
        }
        defaults
    }
}

impl RawWarmer {
    fn into_policy(self, defaults: &PolicyDefaults) -> Option<WarmerPolicy> {
        let Some(class) = self.class.filter(|c| !c.is_empty()) else {
            warn!(name = ?self.name, "warmer record without class, skipping");
            return None;
        };

        let mut policy = WarmerPolicy::with_defaults(class, defaults).with_params(self.params);
        if let Some(name) = self.name {
            policy = policy.with_name(name);
        }
        if let Some(ms) = self.timeout_millis {
            policy = policy.with_timeout_millis(ms);
        }
        if let Some(ms) = self.yield_millis {
            policy = policy.with_yield_millis(ms);
        }
        if let Some(n) = self.max_iterations {
            policy = policy.with_max_iterations(n);
        }
        if let Some(n) = self.max_failure {
            policy = policy.with_max_failures(n);
        }
        if let Some(n) = self.concurrency {
            policy = policy.with_concurrency(n);
        }
        if let Some(required) = self.required {
            policy = policy.with_required(required);
        }
        Some(policy)
    }
}

impl RawConfig {
    fn into_config(self) -> EngineConfig {
        let base = EngineConfig::default();
        let defaults = self.defaults.into_defaults();
        let warmers = self
            .warmers
            .into_iter()
            .filter_map(|w| w.into_policy(&defaults))
            .collect();

        EngineConfig {
            parallelism: self.parallelism.unwrap_or(base.parallelism),
            cleanup_interval: self
                .cleanup_interval_millis
                .filter(|ms| *ms > 0)
                .map_or(base.cleanup_interval, Duration::from_millis),
            log_interval: self
                .log_interval_seconds
                .filter(|s| *s > 0)
                .map_or(base.log_interval, Duration::from_secs),
            defaults,
            warmers,
        }
    }
}
