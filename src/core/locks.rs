//! Per-implementation call serialization.
//!
//! Runners backed by the same concrete warmer type share one async mutex,
//! so their `init`/`next` calls never overlap. Mutexes are created lazily on
//! first use and live as long as the owning engine.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

/// Lazily-populated map from warmer type to its shared call mutex.
#[derive(Default, Debug)]
pub(crate) struct TypeLocks {
    locks: Mutex<HashMap<TypeId, Arc<tokio::sync::Mutex<()>>>>,
}

impl TypeLocks {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Returns the mutex for `type_id`, creating it on first request.
    pub(crate) fn lock_for(&self, type_id: TypeId) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(type_id).or_default())
    }

    /// Number of distinct types seen so far.
    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_type_shares_mutex() {
        let locks = TypeLocks::new();
        let a = locks.lock_for(TypeId::of::<u8>());
        let b = locks.lock_for(TypeId::of::<u8>());
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(locks.len(), 1);
    }

    #[test]
    fn different_types_get_distinct_mutexes() {
        let locks = TypeLocks::new();
        let a = locks.lock_for(TypeId::of::<u8>());
        let b = locks.lock_for(TypeId::of::<u16>());
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(locks.len(), 2);
    }
}
