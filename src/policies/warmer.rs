//! # Warmer policy.
//!
//! Defines [`WarmerPolicy`] an immutable bundle describing how one warmer
//! class is scheduled by the engine (timeout, yield, limits, concurrency).
//!
//! A policy can be created:
//! - **Explicitly** with [`WarmerPolicy::new`] and the `with_*` setters
//! - **From defaults** with [`WarmerPolicy::with_defaults`] (inherit [`PolicyDefaults`])
//!
//! ## Rules
//! - Non-positive timeout / yield inputs are **ignored** (previous value kept).
//! - Negative max-iterations / max-failure inputs mean **unbounded**.
//! - Concurrency below 1 is ignored.

use std::time::Duration;

use serde_json::{Map, Value};

/// Opaque parameters handed to [`Warmer::init`](crate::Warmer::init).
pub type Params = Map<String, Value>;

/// Default delay between two steps of a runner.
pub const DEFAULT_YIELD: Duration = Duration::from_millis(10);

/// Fallback values applied to every policy field a record leaves out.
///
/// Loaded from the `[defaults]` table of the config file (or the
/// `WARMVISOR_DEFAULTS__*` environment variables).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PolicyDefaults {
    /// Per-runner timeout (`None` = unbounded).
    pub timeout: Option<Duration>,
    /// Delay between steps.
    pub yield_interval: Duration,
    /// Runner instances per policy.
    pub concurrency: usize,
    /// Iteration cap (`None` = unbounded).
    pub max_iterations: Option<u64>,
    /// Failure cap (`None` = unbounded).
    pub max_failures: Option<u64>,
}

impl Default for PolicyDefaults {
    fn default() -> Self {
        Self {
            timeout: None,
            yield_interval: DEFAULT_YIELD,
            concurrency: 1,
            max_iterations: None,
            max_failures: None,
        }
    }
}

/// Scheduling policy for one warmer class.
///
/// ## Example
/// ```rust
/// use std::time::Duration;
/// use warmvisor::WarmerPolicy;
///
/// let policy = WarmerPolicy::new("echo")
///     .with_name("greeter")
///     .with_max_iterations(10)
///     .with_max_failures(3)
///     .with_timeout_millis(1000)
///     .with_required(true);
///
/// assert_eq!(policy.name(), "greeter");
/// assert_eq!(policy.timeout(), Some(Duration::from_secs(1)));
/// assert_eq!(policy.max_iterations(), Some(10));
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct WarmerPolicy {
    class: String,
    name: Option<String>,
    timeout: Option<Duration>,
    yield_interval: Duration,
    max_iterations: Option<u64>,
    max_failures: Option<u64>,
    concurrency: usize,
    required: bool,
    params: Params,
}

impl WarmerPolicy {
    /// Creates a policy for `class` with built-in defaults.
    pub fn new(class: impl Into<String>) -> Self {
        Self::with_defaults(class, &PolicyDefaults::default())
    }

    /// Creates a policy for `class` inheriting `defaults`.
    pub fn with_defaults(class: impl Into<String>, defaults: &PolicyDefaults) -> Self {
        Self {
            class: class.into(),
            name: None,
            timeout: defaults.timeout.filter(|d| !d.is_zero()),
            yield_interval: if defaults.yield_interval.is_zero() {
                DEFAULT_YIELD
            } else {
                defaults.yield_interval
            },
            max_iterations: defaults.max_iterations,
            max_failures: defaults.max_failures,
            concurrency: defaults.concurrency.max(1),
            required: false,
            params: Params::new(),
        }
    }

    /// Registry identifier of the warmer implementation.
    pub fn class(&self) -> &str {
        &self.class
    }

    /// Display name; falls back to the class when unset or empty.
    pub fn name(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => &self.class,
        }
    }

    /// Per-runner timeout on cumulative step time (`None` = unbounded).
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Delay inserted before every step.
    pub fn yield_interval(&self) -> Duration {
        self.yield_interval
    }

    /// Iteration cap (`None` = unbounded).
    pub fn max_iterations(&self) -> Option<u64> {
        self.max_iterations
    }

    /// Failure cap (`None` = unbounded).
    pub fn max_failures(&self) -> Option<u64> {
        self.max_failures
    }

    /// Number of runner instances built from this policy.
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Whether this warmer must stop before the engine reports warm.
    pub fn is_required(&self) -> bool {
        self.required
    }

    /// Parameters passed to `init`.
    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the timeout; zero is ignored.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        if !timeout.is_zero() {
            self.timeout = Some(timeout);
        }
        self
    }

    /// Sets the timeout in milliseconds; non-positive values are ignored.
    pub fn with_timeout_millis(self, millis: i64) -> Self {
        match positive_millis(millis) {
            Some(d) => self.with_timeout(d),
            None => self,
        }
    }

    /// Sets the yield interval; zero is ignored.
    pub fn with_yield(mut self, yield_interval: Duration) -> Self {
        if !yield_interval.is_zero() {
            self.yield_interval = yield_interval;
        }
        self
    }

    /// Sets the yield interval in milliseconds; non-positive values are ignored.
    pub fn with_yield_millis(self, millis: i64) -> Self {
        match positive_millis(millis) {
            Some(d) => self.with_yield(d),
            None => self,
        }
    }

    /// Sets the iteration cap; negative means unbounded.
    pub fn with_max_iterations(mut self, max: i64) -> Self {
        self.max_iterations = u64::try_from(max).ok();
        self
    }

    /// Sets the failure cap; negative means unbounded.
    pub fn with_max_failures(mut self, max: i64) -> Self {
        self.max_failures = u64::try_from(max).ok();
        self
    }

    /// Sets the instance count; values below 1 are ignored.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        if concurrency >= 1 {
            self.concurrency = concurrency;
        }
        self
    }

    pub fn with_required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }
}

fn positive_millis(millis: i64) -> Option<Duration> {
    u64::try_from(millis)
        .ok()
        .filter(|ms| *ms > 0)
        .map(Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let p = WarmerPolicy::new("echo");
        assert_eq!(p.class(), "echo");
        assert_eq!(p.name(), "echo");
        assert_eq!(p.timeout(), None);
        assert_eq!(p.yield_interval(), DEFAULT_YIELD);
        assert_eq!(p.max_iterations(), None);
        assert_eq!(p.max_failures(), None);
        assert_eq!(p.concurrency(), 1);
        assert!(!p.is_required());
        assert!(p.params().is_empty());
    }

    #[rstest]
    #[case::negative(-17)]
    #[case::zero(0)]
    fn test_non_positive_timeout_and_yield_ignored(#[case] millis: i64) {
        let p = WarmerPolicy::new("echo")
            .with_timeout_millis(250)
            .with_yield_millis(5)
            .with_timeout_millis(millis)
            .with_yield_millis(millis);
        assert_eq!(p.timeout(), Some(Duration::from_millis(250)));
        assert_eq!(p.yield_interval(), Duration::from_millis(5));
    }

    #[rstest]
    #[case::unbounded(-1, None)]
    #[case::zero(0, Some(0))]
    #[case::positive(7777, Some(7777))]
    fn test_limits(#[case] input: i64, #[case] expected: Option<u64>) {
        let p = WarmerPolicy::new("echo")
            .with_max_iterations(input)
            .with_max_failures(input);
        assert_eq!(p.max_iterations(), expected);
        assert_eq!(p.max_failures(), expected);
    }

    #[test]
    fn test_empty_name_falls_back_to_class() {
        let p = WarmerPolicy::new("foo.bar.baz").with_name("");
        assert_eq!(p.name(), "foo.bar.baz");
    }

    #[test]
    fn test_zero_concurrency_ignored() {
        let p = WarmerPolicy::new("echo").with_concurrency(4).with_concurrency(0);
        assert_eq!(p.concurrency(), 4);
    }

    #[test]
    fn test_inherits_defaults() {
        let defaults = PolicyDefaults {
            timeout: Some(Duration::from_millis(7)),
            yield_interval: Duration::from_millis(77),
            concurrency: 3,
            max_iterations: Some(777),
            max_failures: Some(7),
        };
        let p = WarmerPolicy::with_defaults("echo", &defaults);
        assert_eq!(p.timeout(), Some(Duration::from_millis(7)));
        assert_eq!(p.yield_interval(), Duration::from_millis(77));
        assert_eq!(p.concurrency(), 3);
        assert_eq!(p.max_iterations(), Some(777));
        assert_eq!(p.max_failures(), Some(7));
    }

    #[test]
    fn test_params_kept() {
        let mut params = Params::new();
        params.insert("text".into(), json!("hello"));
        let p = WarmerPolicy::new("echo").with_params(params.clone());
        assert_eq!(p.params(), &params);
    }
}
