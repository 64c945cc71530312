//! Content-addressable record storage for Veriform.
//!
//! This crate implements the persisted artifact history of the document
//! generator: every generated document is stored as a [`Record`] keyed by a
//! unique id and deduplicated by the digest of its raw bytes, with a single
//! bounded index entry listing the ids most-recently-saved first.
//!
//! # Storage Backends
//!
//! Persistence goes through the injectable [`KeyValueStore`] capability:
//!
//! - [`InMemoryKvStore`] — `HashMap`-based backend for tests and embedding
//! - [`LogKvStore`] — durable single-file backend with CRC-framed entries
//!   and crash recovery
//!
//! # Design Rules
//!
//! 1. Byte-identical content is never stored twice (dedup by content
//!    digest); the second caller's metadata is dropped.
//! 2. Record and index updates apply as one logical unit; a failed write
//!    leaves the previous index state intact.
//! 3. The index never exceeds its cap; eviction removes the oldest record.
//! 4. All mutations are serialized through a single mutation lock.
//! 5. `load_all` skips corrupt entries instead of failing the whole read.
//! 6. All I/O errors surface as typed errors, never silently ignored.

pub mod error;
pub mod kv;
pub mod log;
pub mod memory;
pub mod record;
pub mod records;

// Re-export primary types at crate root for ergonomic imports.
pub use error::{StoreError, StoreResult};
pub use kv::KeyValueStore;
pub use log::{LogKvStore, LogStoreConfig, SyncMode};
pub use memory::InMemoryKvStore;
pub use record::{Record, RecordMeta};
pub use records::{RecordStore, StoreConfig};
