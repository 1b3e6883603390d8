//! # Warmer registry.
//!
//! Maps the `class` field of a [`WarmerPolicy`](crate::WarmerPolicy) to a
//! factory producing fresh warmer instances.
//!
//! ## Rules
//! - Built during initialization (mutable), shared read-only by the engine (`Arc`).
//! - Registering a class twice is an error ([`EngineError::DuplicateWarmer`]).
//! - Each factory remembers the concrete [`TypeId`] it produces; runners use it
//!   to serialize calls into the same implementation.

use std::any::{TypeId, type_name};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::EngineError;
use crate::warmers::{EchoWarmer, Warmer};

type Factory = Arc<dyn Fn() -> Box<dyn Warmer> + Send + Sync>;

struct Entry {
    type_id: TypeId,
    type_name: &'static str,
    factory: Factory,
}

/// A freshly built warmer together with its implementation identity.
pub struct BuiltWarmer {
    /// The warmer instance.
    pub warmer: Box<dyn Warmer>,
    /// Identity of the concrete implementation.
    pub type_id: TypeId,
    /// Rust type name of the concrete implementation (for logs).
    pub type_name: &'static str,
}

/// Registry of warmer factories (class -> factory).
#[derive(Default)]
pub struct WarmerRegistry {
    entries: HashMap<String, Entry>,
}

impl WarmerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Creates a registry with the built-in warmers (`echo`, and `http` when enabled).
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.insert::<EchoWarmer, _>("echo", EchoWarmer::default);
        #[cfg(feature = "http")]
        registry.insert::<crate::warmers::HttpWarmer, _>("http", crate::warmers::HttpWarmer::new);
        registry
    }

    /// Registers `W` under `class`, built through `Default`.
    pub fn register<W: Warmer + Default>(&mut self, class: impl Into<String>) -> Result<(), EngineError> {
        self.register_with::<W, _>(class, W::default)
    }

    /// Registers `W` under `class`, built through `factory`.
    pub fn register_with<W, F>(&mut self, class: impl Into<String>, factory: F) -> Result<(), EngineError>
    where
        W: Warmer,
        F: Fn() -> W + Send + Sync + 'static,
    {
        let class = class.into();
        if self.entries.contains_key(&class) {
            return Err(EngineError::DuplicateWarmer { class });
        }
        self.insert::<W, _>(class, factory);
        Ok(())
    }

    /// Builds a new instance for `class`.
    pub fn build(&self, class: &str) -> Result<BuiltWarmer, EngineError> {
        let entry = self
            .entries
            .get(class)
            .ok_or_else(|| EngineError::UnknownWarmer {
                class: class.to_string(),
            })?;

        Ok(BuiltWarmer {
            warmer: (entry.factory)(),
            type_id: entry.type_id,
            type_name: entry.type_name,
        })
    }

    pub fn contains(&self, class: &str) -> bool {
        self.entries.contains_key(class)
    }

    /// Returns the sorted list of registered classes.
    pub fn classes(&self) -> Vec<String> {
        let mut classes: Vec<String> = self.entries.keys().cloned().collect();
        classes.sort_unstable();
        classes
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn insert<W, F>(&mut self, class: impl Into<String>, factory: F)
    where
        W: Warmer,
        F: Fn() -> W + Send + Sync + 'static,
    {
        let entry = Entry {
            type_id: TypeId::of::<W>(),
            type_name: type_name::<W>(),
            factory: Arc::new(move || Box::new(factory()) as Box<dyn Warmer>),
        };
        self.entries.insert(class.into(), entry);
    }
}
