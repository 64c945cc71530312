use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{StoreError, StoreResult};
use crate::kv::KeyValueStore;

/// A single mutation recorded in the log.
///
/// On-disk format per entry:
/// ```text
/// [4 bytes: entry length (little-endian u32)]
/// [4 bytes: CRC32 of payload (little-endian u32)]
/// [N bytes: payload (bincode-serialized LogOp)]
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
enum LogOp {
    Set { key: String, value: Vec<u8> },
    Remove { key: String },
}

/// Flush/sync strategy for the log.
#[derive(Clone, Debug, Default)]
pub enum SyncMode {
    /// `fsync` after every write (safest, highest latency).
    EveryWrite,
    /// Rely on OS page-cache buffering (fastest, least durable).
    #[default]
    OsDefault,
}

/// Configuration for the durable log backend.
#[derive(Clone, Debug, Default)]
pub struct LogStoreConfig {
    /// Sync/flush strategy.
    pub sync_mode: SyncMode,
    /// Maximum log file size in bytes. A write that would grow the log
    /// past this bound fails with a quota [`StoreError::Write`]. `None`
    /// means unbounded.
    pub max_log_bytes: Option<u64>,
}

/// Header size: 4 bytes length + 4 bytes CRC.
const HEADER_SIZE: usize = 8;

/// Internal mutable state: the append handle and the materialized map.
struct LogInner {
    writer: BufWriter<File>,
    /// Current write offset in the log file.
    offset: u64,
    /// Live key-value state, rebuilt from the log on open.
    entries: HashMap<String, Vec<u8>>,
}

/// Crash-recoverable, log-structured key-value backend.
///
/// Mutations are serialized with bincode, framed with a length prefix and a
/// CRC32 checksum, and appended to a single log file. On open the log is
/// replayed front-to-back to rebuild the live map; entries that fail the
/// CRC check are skipped (torn writes from a crash) and a torn tail is
/// truncated so later appends start from a clean boundary.
pub struct LogKvStore {
    /// Path to the log file.
    path: PathBuf,
    /// Writer state and live map behind a mutex for thread safety.
    inner: Mutex<LogInner>,
    /// Configuration.
    config: LogStoreConfig,
}

impl LogKvStore {
    /// Open (or create) a log-backed store at the given path.
    pub fn open(path: &Path, config: LogStoreConfig) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;

        let (entries, valid_offset) = Self::replay(path)?;

        let file_len = file.metadata()?.len();
        if valid_offset < file_len {
            warn!(valid_offset, file_len, "truncating torn log tail");
            file.set_len(valid_offset)?;
        }

        info!(
            path = %path.display(),
            keys = entries.len(),
            offset = valid_offset,
            "log store opened"
        );

        Ok(Self {
            path: path.to_path_buf(),
            inner: Mutex::new(LogInner {
                writer: BufWriter::new(file),
                offset: valid_offset,
                entries,
            }),
            config,
        })
    }

    /// Replay the log front-to-back, returning the live map and the offset
    /// of the last byte that parsed cleanly.
    fn replay(path: &Path) -> StoreResult<(HashMap<String, Vec<u8>>, u64)> {
        let mut file = BufReader::new(File::open(path)?);
        let file_len = file.get_ref().metadata()?.len();
        let mut entries = HashMap::new();
        let mut offset: u64 = 0;

        while offset + HEADER_SIZE as u64 <= file_len {
            file.seek(SeekFrom::Start(offset))?;

            let mut header = [0u8; HEADER_SIZE];
            match file.read_exact(&mut header) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e.into()),
            }

            let length = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
            let expected_crc = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);

            if length == 0 || (offset + HEADER_SIZE as u64 + length as u64) > file_len {
                warn!(offset, length, file_len, "invalid log entry length; stopping replay");
                break;
            }

            let mut payload = vec![0u8; length as usize];
            match file.read_exact(&mut payload) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    warn!(offset, "truncated log entry; stopping replay");
                    break;
                }
                Err(e) => return Err(e.into()),
            }

            let actual_crc = crc32fast::hash(&payload);
            if actual_crc != expected_crc {
                warn!(
                    offset,
                    expected = expected_crc,
                    actual = actual_crc,
                    "CRC mismatch; skipping log entry"
                );
                offset += HEADER_SIZE as u64 + length as u64;
                continue;
            }

            match bincode::deserialize::<LogOp>(&payload) {
                Ok(LogOp::Set { key, value }) => {
                    entries.insert(key, value);
                }
                Ok(LogOp::Remove { key }) => {
                    entries.remove(&key);
                }
                Err(e) => {
                    warn!(offset, error = %e, "failed to decode log entry; skipping");
                }
            }

            offset += HEADER_SIZE as u64 + length as u64;
        }

        debug!(keys = entries.len(), offset, "log replay complete");
        Ok((entries, offset))
    }

    /// Frame and append one op while the lock is held. The live map is
    /// only touched by the caller after this succeeds, so a failed write
    /// never becomes visible to `get`.
    fn append_op(&self, inner: &mut LogInner, op: &LogOp) -> StoreResult<()> {
        let payload =
            bincode::serialize(op).map_err(|e| StoreError::Serialization(e.to_string()))?;
        let entry_len = HEADER_SIZE as u64 + payload.len() as u64;

        if let Some(max) = self.config.max_log_bytes {
            if inner.offset + entry_len > max {
                return Err(StoreError::Write {
                    reason: format!(
                        "log quota exhausted: {} bytes used, entry needs {entry_len}, cap is {max}",
                        inner.offset
                    ),
                });
            }
        }

        let length = payload.len() as u32;
        let crc = crc32fast::hash(&payload);

        let write = |w: &mut BufWriter<File>| -> io::Result<()> {
            w.write_all(&length.to_le_bytes())?;
            w.write_all(&crc.to_le_bytes())?;
            w.write_all(&payload)?;
            w.flush()
        };
        write(&mut inner.writer).map_err(|e| StoreError::Write {
            reason: e.to_string(),
        })?;

        if matches!(self.config.sync_mode, SyncMode::EveryWrite) {
            inner
                .writer
                .get_ref()
                .sync_all()
                .map_err(|e| StoreError::Write {
                    reason: e.to_string(),
                })?;
        }

        inner.offset += entry_len;
        Ok(())
    }

    /// Rewrite the log to contain only the live entries.
    ///
    /// Builds the compacted log in a sibling file and renames it over the
    /// original, so a crash mid-compaction leaves the old log intact.
    pub fn compact(&self) -> StoreResult<()> {
        let mut inner = self.inner.lock().expect("log mutex poisoned");

        let tmp_path = self.path.with_extension("compact");
        let mut tmp = BufWriter::new(File::create(&tmp_path)?);
        let mut offset: u64 = 0;

        let mut keys: Vec<&String> = inner.entries.keys().collect();
        keys.sort();
        for key in keys {
            let op = LogOp::Set {
                key: key.clone(),
                value: inner.entries[key].clone(),
            };
            let payload =
                bincode::serialize(&op).map_err(|e| StoreError::Serialization(e.to_string()))?;
            let length = payload.len() as u32;
            let crc = crc32fast::hash(&payload);
            tmp.write_all(&length.to_le_bytes())?;
            tmp.write_all(&crc.to_le_bytes())?;
            tmp.write_all(&payload)?;
            offset += HEADER_SIZE as u64 + payload.len() as u64;
        }
        tmp.flush()?;
        tmp.get_ref().sync_all()?;
        drop(tmp);

        fs::rename(&tmp_path, &self.path)?;

        let file = OpenOptions::new().read(true).append(true).open(&self.path)?;
        inner.writer = BufWriter::new(file);
        inner.offset = offset;

        debug!(offset, "log compacted");
        Ok(())
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        self.inner.lock().expect("log mutex poisoned").entries.len()
    }

    /// Returns `true` if no live keys exist.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current write offset (log file size in bytes).
    pub fn offset(&self) -> u64 {
        self.inner.lock().expect("log mutex poisoned").offset
    }

    /// Path to the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl KeyValueStore for LogKvStore {
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let inner = self.inner.lock().expect("log mutex poisoned");
        Ok(inner.entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        let mut inner = self.inner.lock().expect("log mutex poisoned");
        let op = LogOp::Set {
            key: key.to_string(),
            value: value.to_vec(),
        };
        self.append_op(&mut inner, &op)?;
        inner.entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn remove(&self, key: &str) -> StoreResult<bool> {
        let mut inner = self.inner.lock().expect("log mutex poisoned");
        if !inner.entries.contains_key(key) {
            return Ok(false);
        }
        let op = LogOp::Remove {
            key: key.to_string(),
        };
        self.append_op(&mut inner, &op)?;
        inner.entries.remove(key);
        Ok(true)
    }

    fn keys(&self) -> StoreResult<Vec<String>> {
        let inner = self.inner.lock().expect("log mutex poisoned");
        let mut keys: Vec<String> = inner.entries.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }

    fn contains(&self, key: &str) -> StoreResult<bool> {
        let inner = self.inner.lock().expect("log mutex poisoned");
        Ok(inner.entries.contains_key(key))
    }
}

impl std::fmt::Debug for LogKvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogKvStore")
            .field("path", &self.path)
            .field("key_count", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_store(path: &Path) -> LogKvStore {
        LogKvStore::open(path, LogStoreConfig::default()).unwrap()
    }

    #[test]
    fn set_get_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let kv = open_store(&dir.path().join("kv.log"));

        kv.set("record/1", b"first").unwrap();
        kv.set("record/2", b"second").unwrap();

        assert_eq!(kv.get("record/1").unwrap().unwrap(), b"first");
        assert_eq!(kv.get("record/2").unwrap().unwrap(), b"second");
        assert!(kv.get("record/3").unwrap().is_none());
    }

    #[test]
    fn state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kv.log");

        {
            let kv = open_store(&path);
            kv.set("a", b"alpha").unwrap();
            kv.set("b", b"beta").unwrap();
            kv.set("a", b"alpha-2").unwrap();
            kv.remove("b").unwrap();
        }

        let kv = open_store(&path);
        assert_eq!(kv.get("a").unwrap().unwrap(), b"alpha-2");
        assert!(kv.get("b").unwrap().is_none());
        assert_eq!(kv.len(), 1);
    }

    #[test]
    fn remove_is_idempotent_and_not_logged_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        let kv = open_store(&dir.path().join("kv.log"));

        let before = kv.offset();
        assert!(!kv.remove("never-set").unwrap());
        // Removing an absent key must not grow the log.
        assert_eq!(kv.offset(), before);
    }

    #[test]
    fn crc_corruption_is_skipped_on_replay() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kv.log");

        {
            let kv = open_store(&path);
            kv.set("first", b"one").unwrap();
            kv.set("second", b"two").unwrap();
        }

        // Flip a byte inside the first entry's payload.
        {
            let mut file = OpenOptions::new().read(true).write(true).open(&path).unwrap();
            file.seek(SeekFrom::Start(HEADER_SIZE as u64)).unwrap();
            let mut buf = [0u8; 1];
            file.read_exact(&mut buf).unwrap();
            buf[0] ^= 0xFF;
            file.seek(SeekFrom::Start(HEADER_SIZE as u64)).unwrap();
            file.write_all(&buf).unwrap();
            file.sync_all().unwrap();
        }

        let kv = open_store(&path);
        assert!(kv.get("first").unwrap().is_none());
        assert_eq!(kv.get("second").unwrap().unwrap(), b"two");
    }

    #[test]
    fn torn_tail_is_truncated_and_appends_continue() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kv.log");

        {
            let kv = open_store(&path);
            kv.set("keep", b"kept").unwrap();
            kv.set("torn", b"lost").unwrap();
        }

        // Chop the last 4 bytes, simulating a crash mid-write.
        {
            let file = OpenOptions::new().write(true).open(&path).unwrap();
            let len = file.metadata().unwrap().len();
            file.set_len(len - 4).unwrap();
        }

        let kv = open_store(&path);
        assert_eq!(kv.get("keep").unwrap().unwrap(), b"kept");
        assert!(kv.get("torn").unwrap().is_none());

        // The tail was truncated, so new appends land on a clean boundary.
        kv.set("after", b"recovery").unwrap();
        drop(kv);

        let kv = open_store(&path);
        assert_eq!(kv.get("after").unwrap().unwrap(), b"recovery");
    }

    #[test]
    fn quota_exhaustion_fails_write_and_keeps_state() {
        let dir = tempfile::tempdir().unwrap();
        let config = LogStoreConfig {
            max_log_bytes: Some(64),
            ..LogStoreConfig::default()
        };
        let kv = LogKvStore::open(&dir.path().join("kv.log"), config).unwrap();

        kv.set("small", b"v").unwrap();

        let big = vec![0xAB; 256];
        let err = kv.set("big", &big).unwrap_err();
        assert!(matches!(err, StoreError::Write { .. }));

        // Previous state intact, failed key absent.
        assert_eq!(kv.get("small").unwrap().unwrap(), b"v");
        assert!(kv.get("big").unwrap().is_none());
    }

    #[test]
    fn compact_drops_dead_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kv.log");
        let kv = open_store(&path);

        for i in 0..20 {
            kv.set("churn", format!("value-{i}").as_bytes()).unwrap();
        }
        kv.set("stable", b"here").unwrap();
        let before = kv.offset();

        kv.compact().unwrap();
        assert!(kv.offset() < before);
        assert_eq!(kv.get("churn").unwrap().unwrap(), b"value-19");
        assert_eq!(kv.get("stable").unwrap().unwrap(), b"here");

        // Compacted log replays to the same state.
        drop(kv);
        let kv = open_store(&path);
        assert_eq!(kv.len(), 2);
        assert_eq!(kv.get("churn").unwrap().unwrap(), b"value-19");
    }

    #[test]
    fn keys_are_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let kv = open_store(&dir.path().join("kv.log"));
        kv.set("b", b"2").unwrap();
        kv.set("a", b"1").unwrap();
        assert_eq!(kv.keys().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn sync_every_write_mode() {
        let dir = tempfile::tempdir().unwrap();
        let config = LogStoreConfig {
            sync_mode: SyncMode::EveryWrite,
            ..LogStoreConfig::default()
        };
        let kv = LogKvStore::open(&dir.path().join("kv.log"), config).unwrap();
        kv.set("durable", b"yes").unwrap();
        assert_eq!(kv.get("durable").unwrap().unwrap(), b"yes");
    }
}
