//! Error types used by the warmvisor engine, warmers and config loader.
//!
//! This module defines three enums:
//!
//! - [`TaskError`] errors raised by a warmer's `init`/`next` (always absorbed by the runner).
//! - [`EngineError`] errors raised while resolving warmers from the registry.
//! - [`ConfigError`] errors raised while loading an [`EngineConfig`](crate::EngineConfig).
//!
//! All of them provide `as_label` for logs.

use thiserror::Error;

/// # Errors produced by warmer execution.
///
/// A `TaskError` never escapes the engine: the runner converts every one of
/// them into a failed round. [`TaskError::Canceled`] additionally stops the runner.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum TaskError {
    /// Warmer call failed but may succeed on a later round.
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// The call observed that its execution unit was cancelled.
    #[error("context cancelled")]
    Canceled,

    /// The warmer panicked inside `init`/`next`.
    #[error("warmer panicked: {info}")]
    Panicked {
        /// Panic payload rendered as text.
        info: String,
    },
}

impl TaskError {
    /// Shorthand for [`TaskError::Fail`] from anything printable.
    ///
    /// # Example
    /// ```
    /// use warmvisor::TaskError;
    ///
    /// let err = TaskError::fail("connection refused");
    /// assert_eq!(err.to_string(), "execution failed: connection refused");
    /// ```
    pub fn fail(error: impl std::fmt::Display) -> Self {
        TaskError::Fail {
            error: error.to_string(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Fail { .. } => "task_failed",
            TaskError::Canceled => "task_canceled",
            TaskError::Panicked { .. } => "task_panicked",
        }
    }

    /// True when the error was caused by cancellation of the execution unit.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, TaskError::Canceled)
    }
}

/// # Errors produced while building runners.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// No factory is registered under the requested class.
    #[error("no warmer registered for class={class}")]
    UnknownWarmer {
        /// The class that failed to resolve.
        class: String,
    },

    /// A factory is already registered under this class.
    #[error("duplicate warmer for class={class}")]
    DuplicateWarmer {
        /// The class registered twice.
        class: String,
    },
}

impl EngineError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use warmvisor::EngineError;
    ///
    /// let err = EngineError::UnknownWarmer { class: "foo.bar".into() };
    /// assert_eq!(err.as_label(), "engine_unknown_warmer");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            EngineError::UnknownWarmer { .. } => "engine_unknown_warmer",
            EngineError::DuplicateWarmer { .. } => "engine_duplicate_warmer",
        }
    }
}

/// # Errors produced by the config loader.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The merged figment could not be extracted into the config model.
    #[error("invalid config: {0}")]
    Extract(#[from] Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        ConfigError::Extract(Box::new(err))
    }
}

impl ConfigError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            ConfigError::Extract(_) => "config_invalid",
        }
    }
}
