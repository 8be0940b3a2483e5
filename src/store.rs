use dashmap::DashMap;
use std::hash::Hash;
use std::sync::Arc;

/// Concurrent in-memory record store keyed by entity id.
///
/// Stands in for the persistence gateway: `with_entry_mut` runs a closure
/// while holding the entry's shard lock, which is the per-aggregate
/// atomicity the engine relies on for counter updates and state-machine
/// transitions.
pub struct StateStore<K, V> {
    data: Arc<DashMap<K, V>>,
}

impl<K, V> StateStore<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            data: Arc::new(DashMap::new()),
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.data.get(key).map(|entry| entry.value().clone())
    }

    pub fn put(&self, key: K, value: V) {
        self.data.insert(key, value);
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        self.data.remove(key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.data.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Mutates one entry under its shard lock. Returns `None` when the key
    /// is absent. The closure must not touch this store again (re-entrancy
    /// on the same shard deadlocks).
    pub fn with_entry_mut<R>(&self, key: &K, f: impl FnOnce(&mut V) -> R) -> Option<R> {
        self.data.get_mut(key).map(|mut entry| f(entry.value_mut()))
    }

    /// Read-only visit of every entry. Snapshot semantics are per entry,
    /// not across the whole map.
    pub fn for_each(&self, mut f: impl FnMut(&K, &V)) {
        for entry in self.data.iter() {
            f(entry.key(), entry.value());
        }
    }

    /// Keys matching a predicate, collected for follow-up per-entry work.
    pub fn keys_where(&self, mut pred: impl FnMut(&K, &V) -> bool) -> Vec<K> {
        self.data
            .iter()
            .filter(|entry| pred(entry.key(), entry.value()))
            .map(|entry| entry.key().clone())
            .collect()
    }
}

impl<K, V> Default for StateStore<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Clone for StateStore<K, V> {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
        }
    }
}
