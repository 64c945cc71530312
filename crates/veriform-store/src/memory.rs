use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::StoreResult;
use crate::kv::KeyValueStore;

/// In-memory, HashMap-based key-value backend.
///
/// Intended for tests and embedding. All values are held in memory behind a
/// `RwLock` for safe concurrent access. Values are cloned on read.
pub struct InMemoryKvStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryKvStore {
    /// Create a new empty in-memory backend.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Number of keys currently stored.
    pub fn len(&self) -> usize {
        self.entries.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the backend holds no keys.
    pub fn is_empty(&self) -> bool {
        self.entries.read().expect("lock poisoned").is_empty()
    }

    /// Total bytes across all stored values.
    pub fn total_bytes(&self) -> u64 {
        self.entries
            .read()
            .expect("lock poisoned")
            .values()
            .map(|v| v.len() as u64)
            .sum()
    }
}

impl Default for InMemoryKvStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyValueStore for InMemoryKvStore {
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let map = self.entries.read().expect("lock poisoned");
        Ok(map.get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        let mut map = self.entries.write().expect("lock poisoned");
        map.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn remove(&self, key: &str) -> StoreResult<bool> {
        let mut map = self.entries.write().expect("lock poisoned");
        Ok(map.remove(key).is_some())
    }

    fn keys(&self) -> StoreResult<Vec<String>> {
        let map = self.entries.read().expect("lock poisoned");
        let mut keys: Vec<String> = map.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}

impl std::fmt::Debug for InMemoryKvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryKvStore")
            .field("key_count", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_get() {
        let kv = InMemoryKvStore::new();
        kv.set("a", b"alpha").unwrap();
        assert_eq!(kv.get("a").unwrap().unwrap(), b"alpha");
    }

    #[test]
    fn get_missing_returns_none() {
        let kv = InMemoryKvStore::new();
        assert!(kv.get("missing").unwrap().is_none());
    }

    #[test]
    fn set_replaces_previous_value() {
        let kv = InMemoryKvStore::new();
        kv.set("k", b"one").unwrap();
        kv.set("k", b"two").unwrap();
        assert_eq!(kv.get("k").unwrap().unwrap(), b"two");
        assert_eq!(kv.len(), 1);
    }

    #[test]
    fn remove_is_idempotent() {
        let kv = InMemoryKvStore::new();
        kv.set("k", b"v").unwrap();
        assert!(kv.remove("k").unwrap());
        assert!(!kv.remove("k").unwrap());
        assert!(kv.get("k").unwrap().is_none());
    }

    #[test]
    fn keys_are_sorted() {
        let kv = InMemoryKvStore::new();
        kv.set("b", b"2").unwrap();
        kv.set("a", b"1").unwrap();
        kv.set("c", b"3").unwrap();
        assert_eq!(kv.keys().unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn contains_uses_default_impl() {
        let kv = InMemoryKvStore::new();
        kv.set("here", b"x").unwrap();
        assert!(kv.contains("here").unwrap());
        assert!(!kv.contains("gone").unwrap());
    }

    #[test]
    fn total_bytes_sums_values() {
        let kv = InMemoryKvStore::new();
        kv.set("a", b"12345").unwrap();
        kv.set("b", b"123456789").unwrap();
        assert_eq!(kv.total_bytes(), 14);
    }

    #[test]
    fn concurrent_reads_are_safe() {
        use std::sync::Arc;
        use std::thread;

        let kv = Arc::new(InMemoryKvStore::new());
        kv.set("shared", b"data").unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let kv = Arc::clone(&kv);
                thread::spawn(move || {
                    assert_eq!(kv.get("shared").unwrap().unwrap(), b"data");
                })
            })
            .collect();

        for h in handles {
            h.join().expect("thread should not panic");
        }
    }

    #[test]
    fn debug_format() {
        let kv = InMemoryKvStore::new();
        kv.set("x", b"1").unwrap();
        let debug = format!("{kv:?}");
        assert!(debug.contains("InMemoryKvStore"));
        assert!(debug.contains("key_count"));
    }
}
