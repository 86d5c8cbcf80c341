//! Per-object state kept between reconciliation passes.
//!
//! The runtime never calls the reconciler for a deleted object, so entries
//! cannot be removed on deletion. Instead an entry is dropped once it has not
//! been touched for `idle_ttl`.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

#[derive(Debug)]
struct Entry<V> {
    value: V,
    touched: Instant,
}

/// State per object key (`namespace/name`), evicted when idle
#[derive(Debug)]
pub struct ObjectStates<V> {
    entries: Mutex<HashMap<String, Entry<V>>>,
    idle_ttl: Duration,
}

impl<V: Default> ObjectStates<V> {
    pub fn new(idle_ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            idle_ttl,
        }
    }

    /// Runs `f` on the state of `key`, creating it if absent.
    ///
    /// Entries idle for longer than `idle_ttl` at `now` are evicted first.
    pub fn with<R>(&self, key: &str, now: Instant, f: impl FnOnce(&mut V) -> R) -> R {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.retain(|_, entry| now.saturating_duration_since(entry.touched) <= self.idle_ttl);

        let entry = entries.entry(key.to_string()).or_insert_with(|| Entry {
            value: V::default(),
            touched: now,
        });
        entry.touched = now;
        f(&mut entry.value)
    }

    pub fn remove(&self, key: &str) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key);
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}
