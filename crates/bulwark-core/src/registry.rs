//! Lazily populated per-key state.

use crate::key::OperationKey;
use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;

/// A concurrent map from [`OperationKey`] to shared per-key state.
///
/// Entries are created on first access through an atomic insert-or-fetch, so
/// two tasks racing on the first use of a key always observe the same
/// instance. Entries live until [`remove`](Self::remove) or
/// [`clear`](Self::clear) is called.
pub struct KeyedRegistry<T> {
    entries: DashMap<OperationKey, Arc<T>>,
}

impl<T> KeyedRegistry<T> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Returns the entry for `key`, creating it with `init` if absent.
    ///
    /// `init` runs at most once per key while the shard for that key is
    /// locked; it must not touch this registry.
    pub fn get_or_insert_with<F>(&self, key: &OperationKey, init: F) -> Arc<T>
    where
        F: FnOnce(&OperationKey) -> T,
    {
        if let Some(existing) = self.entries.get(key) {
            return Arc::clone(existing.value());
        }
        let entry = self
            .entries
            .entry(key.clone())
            .or_insert_with(|| Arc::new(init(key)));
        Arc::clone(entry.value())
    }

    /// Returns the entry for `key` if it has been created.
    pub fn get(&self, key: &str) -> Option<Arc<T>> {
        self.entries.get(key).map(|e| Arc::clone(e.value()))
    }

    /// Replaces the entry for `key`, returning the previous one.
    pub fn insert(&self, key: OperationKey, value: T) -> Option<Arc<T>> {
        self.entries.insert(key, Arc::new(value))
    }

    /// Removes the entry for `key`.
    pub fn remove(&self, key: &str) -> Option<Arc<T>> {
        self.entries.remove(key).map(|(_, v)| v)
    }

    /// Returns `true` if `key` has an entry.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Drops every entry.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Number of keys with state.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no key has state.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot of the keys currently present.
    pub fn keys(&self) -> Vec<OperationKey> {
        self.entries.iter().map(|e| e.key().clone()).collect()
    }
}

impl<T> Default for KeyedRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for KeyedRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyedRegistry")
            .field("keys", &self.keys())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn creates_once_and_returns_existing() {
        let registry = KeyedRegistry::new();
        let key = OperationKey::from("organization-lookup");
        let created = AtomicUsize::new(0);

        let a = registry.get_or_insert_with(&key, |_| {
            created.fetch_add(1, Ordering::SeqCst);
            AtomicUsize::new(7)
        });
        let b = registry.get_or_insert_with(&key, |_| {
            created.fetch_add(1, Ordering::SeqCst);
            AtomicUsize::new(9)
        });

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(b.load(Ordering::SeqCst), 7);
        assert_eq!(created.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn concurrent_first_access_yields_single_instance() {
        let registry = Arc::new(KeyedRegistry::<AtomicUsize>::new());
        let key = OperationKey::from("license-by-org");
        let created = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let key = key.clone();
                let created = Arc::clone(&created);
                std::thread::spawn(move || {
                    let entry = registry.get_or_insert_with(&key, |_| {
                        created.fetch_add(1, Ordering::SeqCst);
                        AtomicUsize::new(0)
                    });
                    entry.fetch_add(1, Ordering::SeqCst);
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(created.load(Ordering::SeqCst), 1);
        assert_eq!(registry.get("license-by-org").unwrap().load(Ordering::SeqCst), 16);
    }

    #[test]
    fn remove_and_clear() {
        let registry = KeyedRegistry::new();
        registry.get_or_insert_with(&"a".into(), |_| 1u32);
        registry.get_or_insert_with(&"b".into(), |_| 2u32);
        assert_eq!(registry.len(), 2);

        assert_eq!(registry.remove("a").as_deref(), Some(&1));
        assert!(!registry.contains("a"));

        registry.clear();
        assert!(registry.is_empty());
    }
}
