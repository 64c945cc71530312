use crate::error::StoreResult;

/// Injectable key-value storage capability.
///
/// All implementations must satisfy these invariants:
/// - `set` either fully applies or fails with the previous value intact;
///   a failed write never leaves a torn entry visible to `get`.
/// - `remove` is idempotent; removing an absent key is not an error.
/// - Concurrent reads are always safe.
/// - The backend never interprets values — it is a pure byte store.
/// - All I/O errors surface as typed errors, never silently ignored.
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`.
    ///
    /// Returns `Ok(None)` if the key does not exist.
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &[u8]) -> StoreResult<()>;

    /// Remove `key`. Returns `true` if the key existed.
    fn remove(&self, key: &str) -> StoreResult<bool>;

    /// All keys currently present, sorted.
    fn keys(&self) -> StoreResult<Vec<String>>;

    /// Check whether `key` exists.
    ///
    /// Default implementation reads the value. Backends may override to
    /// avoid copying it.
    fn contains(&self, key: &str) -> StoreResult<bool> {
        Ok(self.get(key)?.is_some())
    }
}
