//! High-level SDK for Veriform.
//!
//! Provides a unified API for the document-generator host: save generated
//! documents into the content-addressable store, seal their digests into
//! proof-of-work blocks, and verify the chain on demand. This is the main
//! entry point for applications embedding Veriform.

pub mod archive;
pub mod error;
pub mod payload;

pub use archive::Veriform;
pub use error::{SdkError, SdkResult};
pub use payload::DocumentPayload;

// Re-export key types
pub use veriform_types::{ChainStatus, Digest, RecordId, TransactionId};
pub use veriform_store::{Record, RecordMeta};
pub use veriform_ledger::{Block, CancelToken, ChainInfo, ChainValidation, Transaction};
