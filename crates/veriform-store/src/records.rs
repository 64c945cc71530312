//! The record store: deduplicated persistence with a bounded recency index.
//!
//! The [`RecordStore`] owns two kinds of persisted entries: one entry per
//! record (keyed by id) and a single `index` entry holding the ordered
//! record ids, most-recently-saved first, capped at
//! [`StoreConfig::index_cap`]. All mutations run under one mutation lock so
//! overlapping saves can never interleave their read-modify-write of the
//! index or lose an eviction.

use std::sync::{Arc, Mutex};

use tracing::{debug, warn};
use veriform_digest::Digester;
use veriform_types::{ChainStatus, Digest, RecordId};

use crate::error::{StoreError, StoreResult};
use crate::kv::KeyValueStore;
use crate::record::{Record, RecordMeta};

/// Key of the single index entry.
const INDEX_KEY: &str = "index";

/// Configuration for the record store.
#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// Maximum number of index entries. Saving past the cap evicts the
    /// oldest record.
    pub index_cap: usize,
    /// Whether records keep a hex-encoded copy of their blob, enabling
    /// `rebuild_blob`.
    pub retain_blobs: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            index_cap: 500,
            retain_blobs: true,
        }
    }
}

/// Content-addressable record store.
///
/// Byte-identical content is never stored twice: `save` digests the blob
/// and returns the existing record's id on a digest match, even when the
/// new call carries different metadata. The second caller's metadata is
/// dropped, not merged.
pub struct RecordStore {
    kv: Arc<dyn KeyValueStore>,
    config: StoreConfig,
    /// Serializes every index read-modify-write.
    mutation: Mutex<()>,
}

impl RecordStore {
    /// Create a store with default configuration over the given backend.
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self::with_config(kv, StoreConfig::default())
    }

    /// Create a store with explicit configuration.
    pub fn with_config(kv: Arc<dyn KeyValueStore>, config: StoreConfig) -> Self {
        Self {
            kv,
            config,
            mutation: Mutex::new(()),
        }
    }

    /// The active configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    // -----------------------------------------------------------------
    // Operations
    // -----------------------------------------------------------------

    /// Persist a new record, or return the existing id on a content match.
    ///
    /// Fails with [`StoreError::NoBlobProvided`] when the blob is empty and
    /// [`StoreError::Validation`] on malformed metadata. The record write
    /// and the index update apply as one logical unit: if the index write
    /// fails, the just-written record is removed again and the previous
    /// index state stays intact, so the store never introduces index
    /// entries pointing at missing records.
    pub fn save(&self, meta: RecordMeta, blob: &[u8]) -> StoreResult<RecordId> {
        if blob.is_empty() {
            return Err(StoreError::NoBlobProvided);
        }
        meta.validate()?;

        let _guard = self.mutation.lock().expect("mutation lock poisoned");

        let content_digest = Digester::BLOB.digest_bytes(blob);
        let index = self.read_index()?;

        if let Some(existing) = self.scan_for_digest(&index, &content_digest)? {
            debug!(
                id = %existing,
                digest = %content_digest.short_hex(),
                "content already stored; returning existing record"
            );
            return Ok(existing);
        }

        let record = Record::build(meta, blob, content_digest, self.config.retain_blobs);
        let key = Record::storage_key(&record.id);
        self.kv.set(&key, &record.encode()?)?;

        let mut ids = Vec::with_capacity(index.len() + 1);
        ids.push(record.id);
        ids.extend(index);
        let evicted = if ids.len() > self.config.index_cap {
            ids.split_off(self.config.index_cap)
        } else {
            Vec::new()
        };

        if let Err(e) = self.write_index(&ids) {
            // Previous index state stays authoritative; drop the record we
            // just wrote so the failed save leaves no trace.
            let _ = self.kv.remove(&key);
            return Err(e);
        }

        // Evicted records are deleted only after the new index is durable.
        for old in &evicted {
            match self.kv.remove(&Record::storage_key(old)) {
                Ok(_) => debug!(id = %old, "evicted oldest record at index cap"),
                Err(e) => warn!(id = %old, error = %e, "failed to remove evicted record"),
            }
        }

        debug!(
            id = %record.id,
            digest = %content_digest.short_hex(),
            size = record.size_bytes,
            "record saved"
        );
        Ok(record.id)
    }

    /// All records, most-recently-saved first.
    ///
    /// Index entries whose backing record is missing or undecodable are
    /// skipped rather than failing the whole read.
    pub fn load_all(&self) -> StoreResult<Vec<Record>> {
        let index = self.read_index()?;
        let mut records = Vec::with_capacity(index.len());
        for id in &index {
            match self.read_record(id) {
                Ok(Some(record)) => records.push(record),
                Ok(None) => warn!(id = %id, "index references missing record; skipping"),
                Err(StoreError::Serialization(e)) => {
                    warn!(id = %id, error = %e, "skipping undecodable record")
                }
                Err(e) => return Err(e),
            }
        }
        Ok(records)
    }

    /// Load a single record by id.
    pub fn get(&self, id: &RecordId) -> StoreResult<Option<Record>> {
        self.read_record(id)
    }

    /// Remove a record and its index entry. Idempotent: deleting an absent
    /// id is not an error and changes nothing.
    pub fn delete(&self, id: &RecordId) -> StoreResult<()> {
        let _guard = self.mutation.lock().expect("mutation lock poisoned");

        let index = self.read_index()?;
        if index.contains(id) {
            let ids: Vec<RecordId> = index.into_iter().filter(|x| x != id).collect();
            self.write_index(&ids)?;
        }
        if self.kv.remove(&Record::storage_key(id))? {
            debug!(id = %id, "record deleted");
        }
        Ok(())
    }

    /// Remove every indexed record and empty the index.
    ///
    /// The empty index is written first; record removals that fail
    /// afterwards leave unreferenced data behind, never dangling index
    /// entries.
    pub fn clear(&self) -> StoreResult<()> {
        let _guard = self.mutation.lock().expect("mutation lock poisoned");

        let index = self.read_index()?;
        self.write_index(&[])?;
        for id in &index {
            if let Err(e) = self.kv.remove(&Record::storage_key(id)) {
                warn!(id = %id, error = %e, "failed to remove record during clear");
            }
        }
        debug!(removed = index.len(), "store cleared");
        Ok(())
    }

    /// Transition a record's chain status. The only permitted mutation of
    /// a stored record.
    pub fn update_chain_status(&self, id: &RecordId, status: ChainStatus) -> StoreResult<()> {
        let _guard = self.mutation.lock().expect("mutation lock poisoned");

        let mut record = self.read_record(id)?.ok_or(StoreError::NotFound(*id))?;
        if record.chain_status == status {
            return Ok(());
        }
        record.chain_status = status;
        self.kv.set(&Record::storage_key(id), &record.encode()?)?;
        debug!(id = %id, status = %status, "chain status updated");
        Ok(())
    }

    /// Reconstruct the original blob bytes from a record's retained
    /// payload. Returns `Ok(None)` when the record carries none; the
    /// caller must regenerate the content instead.
    pub fn rebuild_blob(&self, record: &Record) -> StoreResult<Option<Vec<u8>>> {
        record.decoded_blob()
    }

    /// Number of indexed records.
    pub fn len(&self) -> StoreResult<usize> {
        Ok(self.read_index()?.len())
    }

    /// Returns `true` if no records are indexed.
    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.read_index()?.is_empty())
    }

    // -----------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------

    fn read_index(&self) -> StoreResult<Vec<RecordId>> {
        match self.kv.get(INDEX_KEY)? {
            None => Ok(Vec::new()),
            Some(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| StoreError::Serialization(format!("corrupt index: {e}"))),
        }
    }

    fn write_index(&self, ids: &[RecordId]) -> StoreResult<()> {
        let bytes =
            serde_json::to_vec(ids).map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.kv.set(INDEX_KEY, &bytes)
    }

    fn read_record(&self, id: &RecordId) -> StoreResult<Option<Record>> {
        match self.kv.get(&Record::storage_key(id))? {
            None => Ok(None),
            Some(bytes) => Record::decode(&bytes).map(Some),
        }
    }

    /// Scan indexed records for one with the given content digest.
    /// Undecodable records cannot match; real read failures propagate.
    fn scan_for_digest(
        &self,
        index: &[RecordId],
        digest: &Digest,
    ) -> StoreResult<Option<RecordId>> {
        for id in index {
            match self.read_record(id) {
                Ok(Some(record)) if record.content_digest == *digest => {
                    return Ok(Some(record.id))
                }
                Ok(_) => {}
                Err(StoreError::Serialization(e)) => {
                    warn!(id = %id, error = %e, "skipping undecodable record during dedup scan")
                }
                Err(e) => return Err(e),
            }
        }
        Ok(None)
    }
}

impl std::fmt::Debug for RecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordStore")
            .field("index_cap", &self.config.index_cap)
            .field("retain_blobs", &self.config.retain_blobs)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use serde_json::json;
    use veriform_types::ChainStatus;

    use super::*;
    use crate::memory::InMemoryKvStore;

    fn make_store() -> RecordStore {
        RecordStore::new(Arc::new(InMemoryKvStore::new()))
    }

    fn meta(name: &str) -> RecordMeta {
        RecordMeta::new("contract-v2", name).with_field("party", json!("Acme"))
    }

    // -----------------------------------------------------------------
    // Save + digest invariant
    // -----------------------------------------------------------------

    #[test]
    fn save_persists_record_with_content_digest() {
        let store = make_store();
        let blob = b"generated document";
        let id = store.save(meta("doc.pdf"), blob).unwrap();

        let record = store.get(&id).unwrap().expect("should exist");
        assert_eq!(record.content_digest, Digester::BLOB.digest_bytes(blob));
        assert_eq!(record.size_bytes, blob.len() as u64);
        assert_eq!(record.chain_status, ChainStatus::NotSubmitted);
    }

    #[test]
    fn save_empty_blob_fails() {
        let store = make_store();
        let err = store.save(meta("doc.pdf"), b"").unwrap_err();
        assert!(matches!(err, StoreError::NoBlobProvided));
        assert_eq!(store.len().unwrap(), 0);
    }

    #[test]
    fn save_blank_metadata_fails() {
        let store = make_store();
        let err = store.save(RecordMeta::new("", "doc.pdf"), b"x").unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    // -----------------------------------------------------------------
    // Deduplication
    // -----------------------------------------------------------------

    #[test]
    fn identical_blobs_dedup_to_one_record() {
        let store = make_store();
        let blob = b"identical bytes";

        let id1 = store.save(meta("first.pdf"), blob).unwrap();
        let id2 = store.save(meta("second.pdf"), blob).unwrap();

        assert_eq!(id1, id2);
        assert_eq!(store.len().unwrap(), 1);
        // The first caller's metadata wins.
        let record = store.get(&id1).unwrap().unwrap();
        assert_eq!(record.file_name, "first.pdf");
    }

    #[test]
    fn different_blobs_get_distinct_records() {
        let store = make_store();
        let id1 = store.save(meta("a.pdf"), b"aaa").unwrap();
        let id2 = store.save(meta("b.pdf"), b"bbb").unwrap();
        assert_ne!(id1, id2);
        assert_eq!(store.len().unwrap(), 2);
    }

    // -----------------------------------------------------------------
    // Listing
    // -----------------------------------------------------------------

    #[test]
    fn load_all_is_most_recent_first() {
        let store = make_store();
        let id1 = store.save(meta("one.pdf"), b"one").unwrap();
        let id2 = store.save(meta("two.pdf"), b"two").unwrap();
        let id3 = store.save(meta("three.pdf"), b"three").unwrap();

        let records = store.load_all().unwrap();
        let ids: Vec<RecordId> = records.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![id3, id2, id1]);
    }

    #[test]
    fn load_all_skips_missing_records() {
        let kv = Arc::new(InMemoryKvStore::new());
        let store = RecordStore::new(Arc::clone(&kv) as Arc<dyn KeyValueStore>);

        let id1 = store.save(meta("keep.pdf"), b"keep").unwrap();
        let id2 = store.save(meta("gone.pdf"), b"gone").unwrap();

        // Simulate partial corruption: the record vanishes out-of-band.
        kv.remove(&Record::storage_key(&id2)).unwrap();

        let records = store.load_all().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, id1);
    }

    #[test]
    fn load_all_skips_undecodable_records() {
        let kv = Arc::new(InMemoryKvStore::new());
        let store = RecordStore::new(Arc::clone(&kv) as Arc<dyn KeyValueStore>);

        let id1 = store.save(meta("good.pdf"), b"good").unwrap();
        let id2 = store.save(meta("bad.pdf"), b"bad").unwrap();
        kv.set(&Record::storage_key(&id2), b"not json").unwrap();

        let records = store.load_all().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, id1);
    }

    // -----------------------------------------------------------------
    // Delete / clear
    // -----------------------------------------------------------------

    #[test]
    fn delete_removes_record_and_index_entry() {
        let store = make_store();
        let id = store.save(meta("doc.pdf"), b"bytes").unwrap();

        store.delete(&id).unwrap();
        assert!(store.get(&id).unwrap().is_none());
        assert_eq!(store.len().unwrap(), 0);
    }

    #[test]
    fn delete_missing_id_is_a_no_op() {
        let store = make_store();
        store.save(meta("doc.pdf"), b"bytes").unwrap();

        store.delete(&RecordId::new()).unwrap();
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn clear_removes_everything() {
        let store = make_store();
        let id1 = store.save(meta("a.pdf"), b"a").unwrap();
        let id2 = store.save(meta("b.pdf"), b"b").unwrap();

        store.clear().unwrap();
        assert!(store.is_empty().unwrap());
        assert!(store.get(&id1).unwrap().is_none());
        assert!(store.get(&id2).unwrap().is_none());
    }

    // -----------------------------------------------------------------
    // Bounded index
    // -----------------------------------------------------------------

    #[test]
    fn index_evicts_oldest_past_cap() {
        let kv = Arc::new(InMemoryKvStore::new());
        let store = RecordStore::with_config(
            Arc::clone(&kv) as Arc<dyn KeyValueStore>,
            StoreConfig {
                index_cap: 3,
                retain_blobs: true,
            },
        );

        let first = store.save(meta("0.pdf"), b"blob-0").unwrap();
        for i in 1..4 {
            store
                .save(meta(&format!("{i}.pdf")), format!("blob-{i}").as_bytes())
                .unwrap();
        }

        assert_eq!(store.len().unwrap(), 3);
        // The oldest record is gone from both index and backing store.
        assert!(store.get(&first).unwrap().is_none());
        assert!(!kv.contains(&Record::storage_key(&first)).unwrap());
    }

    #[test]
    fn default_cap_holds_500_records() {
        let store = make_store();
        let mut first = None;
        for i in 0..=500u32 {
            let id = store
                .save(meta(&format!("{i}.pdf")), format!("blob-{i}").as_bytes())
                .unwrap();
            if i == 0 {
                first = Some(id);
            }
        }

        assert_eq!(store.len().unwrap(), 500);
        assert!(store.get(&first.unwrap()).unwrap().is_none());
    }

    // -----------------------------------------------------------------
    // Blob rebuild
    // -----------------------------------------------------------------

    #[test]
    fn rebuild_blob_returns_original_bytes() {
        let store = make_store();
        let blob = b"original artifact bytes";
        let id = store.save(meta("doc.pdf"), blob).unwrap();

        let record = store.get(&id).unwrap().unwrap();
        assert_eq!(store.rebuild_blob(&record).unwrap().unwrap(), blob);
    }

    #[test]
    fn rebuild_blob_without_retention_returns_none() {
        let store = RecordStore::with_config(
            Arc::new(InMemoryKvStore::new()),
            StoreConfig {
                index_cap: 500,
                retain_blobs: false,
            },
        );
        let id = store.save(meta("doc.pdf"), b"bytes").unwrap();
        let record = store.get(&id).unwrap().unwrap();
        assert!(store.rebuild_blob(&record).unwrap().is_none());
    }

    // -----------------------------------------------------------------
    // Chain status transitions
    // -----------------------------------------------------------------

    #[test]
    fn chain_status_transitions_persist() {
        let store = make_store();
        let id = store.save(meta("doc.pdf"), b"bytes").unwrap();

        store.update_chain_status(&id, ChainStatus::Pending).unwrap();
        assert_eq!(
            store.get(&id).unwrap().unwrap().chain_status,
            ChainStatus::Pending
        );

        store
            .update_chain_status(&id, ChainStatus::Confirmed)
            .unwrap();
        assert_eq!(
            store.get(&id).unwrap().unwrap().chain_status,
            ChainStatus::Confirmed
        );
    }

    #[test]
    fn chain_status_update_for_missing_record_fails() {
        let store = make_store();
        let err = store
            .update_chain_status(&RecordId::new(), ChainStatus::Pending)
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    // -----------------------------------------------------------------
    // Write-failure atomicity
    // -----------------------------------------------------------------

    /// Backend that fails index writes on demand.
    struct FlakyKv {
        inner: InMemoryKvStore,
        fail_index_writes: AtomicBool,
    }

    impl FlakyKv {
        fn new() -> Self {
            Self {
                inner: InMemoryKvStore::new(),
                fail_index_writes: AtomicBool::new(false),
            }
        }
    }

    impl KeyValueStore for FlakyKv {
        fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
            self.inner.get(key)
        }
        fn set(&self, key: &str, value: &[u8]) -> StoreResult<()> {
            if key == "index" && self.fail_index_writes.load(Ordering::SeqCst) {
                return Err(StoreError::Write {
                    reason: "injected index write failure".into(),
                });
            }
            self.inner.set(key, value)
        }
        fn remove(&self, key: &str) -> StoreResult<bool> {
            self.inner.remove(key)
        }
        fn keys(&self) -> StoreResult<Vec<String>> {
            self.inner.keys()
        }
    }

    #[test]
    fn failed_index_write_leaves_previous_state_intact() {
        let kv = Arc::new(FlakyKv::new());
        let store = RecordStore::new(Arc::clone(&kv) as Arc<dyn KeyValueStore>);

        let id1 = store.save(meta("ok.pdf"), b"committed").unwrap();

        kv.fail_index_writes.store(true, Ordering::SeqCst);
        let err = store.save(meta("fail.pdf"), b"uncommitted").unwrap_err();
        assert!(matches!(err, StoreError::Write { .. }));
        kv.fail_index_writes.store(false, Ordering::SeqCst);

        // Previous index intact, no orphaned record left behind.
        let records = store.load_all().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, id1);
        let keys = kv.keys().unwrap();
        assert_eq!(
            keys.iter().filter(|k| k.starts_with("record/")).count(),
            1
        );
    }

    // -----------------------------------------------------------------
    // Overlapping saves
    // -----------------------------------------------------------------

    #[test]
    fn concurrent_saves_never_lose_index_entries() {
        use std::thread;

        let store = Arc::new(make_store());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    store
                        .save(meta(&format!("{i}.pdf")), format!("distinct-{i}").as_bytes())
                        .unwrap()
                })
            })
            .collect();

        let mut ids: Vec<RecordId> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 8);
        assert_eq!(store.len().unwrap(), 8);
    }
}
