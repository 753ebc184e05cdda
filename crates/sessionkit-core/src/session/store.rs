use std::any::Any;
use std::collections::HashMap;
use std::sync::Mutex;

/// Arbitrary handler-local state attached to a session, keyed by string.
///
/// Only ever touched by the handler currently holding the session (the
/// working handler) — invariant 4 of the session-core spec — so a plain
/// blocking mutex is fine: it is never held across an `.await`.
#[derive(Default)]
pub struct Store {
    values: Mutex<HashMap<String, Box<dyn Any + Send + Sync>>>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<T: Send + Sync + 'static>(&self, key: impl Into<String>, value: T) {
        self.values.lock().unwrap().insert(key.into(), Box::new(value));
    }

    pub fn get<T: Clone + 'static>(&self, key: &str) -> Option<T> {
        self.values.lock().unwrap().get(key).and_then(|v| v.downcast_ref::<T>()).cloned()
    }

    /// Atomically read-modify-write a single entry: seeds `key` with
    /// `default` if absent, then applies `f` to it, all under one lock
    /// acquisition. This is the linearizable counterpart to a bare
    /// `get` followed by an `insert` (invariant 4), useful for counters
    /// and other state a handler wants to bump without a data race
    /// against whatever last held this session.
    pub fn update<T, F>(&self, key: impl Into<String>, default: T, f: F)
    where
        T: Send + Sync + 'static,
        F: FnOnce(&mut T),
    {
        let mut values = self.values.lock().unwrap();
        let entry = values.entry(key.into()).or_insert_with(|| Box::new(default));
        if let Some(v) = entry.downcast_mut::<T>() {
            f(v);
        }
    }

    pub fn remove(&self, key: &str) -> bool {
        self.values.lock().unwrap().remove(key).is_some()
    }

    pub fn clear(&self) {
        self.values.lock().unwrap().clear();
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.lock().unwrap().contains_key(key)
    }

    /// Merge another store's entries into this one, matching the original
    /// `Session.__lshift__` "absorb another session's store" operation
    /// used when one session hands its state off to a replacement.
    pub fn extend_from(&self, other: &Store) {
        let mut other_values = other.values.lock().unwrap();
        let mut mine = self.values.lock().unwrap();
        for (k, v) in other_values.drain() {
            mine.insert(k, v);
        }
    }
}
