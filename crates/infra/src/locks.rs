//! Keyed mutual exclusion for engine operations.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use stockroom_core::{OrderId, ProductId};

/// A lockable resource.
///
/// The derived ordering (orders before products, then by id) is the global
/// acquisition order; see [`LockRegistry::acquire`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LockKey {
    Order(OrderId),
    Product(ProductId),
}

/// Per-key async locks, created on demand.
///
/// Writers must take the order's lock before any product lock, and product
/// locks only via a single [`acquire`](LockRegistry::acquire) call so they
/// come in sorted order. Overlapping operations then cannot deadlock.
///
/// Entries live for the registry's lifetime; with one entry per known
/// product and order that is cheap enough to not bother reclaiming.
#[derive(Debug, Default)]
pub struct LockRegistry {
    locks: Mutex<HashMap<LockKey, Arc<AsyncMutex<()>>>>,
}

impl LockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, key: LockKey) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap();
        locks
            .entry(key)
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Acquire all given keys, deduplicated and in sorted order.
    ///
    /// The returned guards release on drop.
    pub async fn acquire(&self, mut keys: Vec<LockKey>) -> Vec<OwnedMutexGuard<()>> {
        keys.sort();
        keys.dedup();

        let mut guards = Vec::with_capacity(keys.len());
        for key in keys {
            guards.push(self.entry(key).lock_owned().await);
        }
        guards
    }
}
