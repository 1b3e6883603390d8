//! # Startup jitter for first steps.
//!
//! When the engine starts, every runner would otherwise fire its first step at
//! the same instant. [`startup_jitter`] spreads them uniformly over
//! `[0, 2 × base)` so that a large runner set does not stampede the pool.

use rand::Rng;
use std::time::Duration;

/// Returns a random delay in `[0, 2 × base)` with millisecond granularity.
///
/// A zero `base` yields `Duration::ZERO`.
///
/// # Example
/// ```rust
/// use std::time::Duration;
/// use warmvisor::startup_jitter;
///
/// let d = startup_jitter(Duration::from_millis(10));
/// assert!(d < Duration::from_millis(20));
/// ```
pub fn startup_jitter(base: Duration) -> Duration {
    let upper = (base.as_millis() as u64).saturating_mul(2);
    if upper == 0 {
        return Duration::ZERO;
    }
    let mut rng = rand::rng();
    Duration::from_millis(rng.random_range(0..upper))
}
