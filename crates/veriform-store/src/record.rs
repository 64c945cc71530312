use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use veriform_types::{ChainStatus, Digest, RecordId};

use crate::error::{StoreError, StoreResult};

/// Caller-supplied metadata for a new record.
///
/// The generating layer fills this from the template instance; volatile UI
/// state must already be stripped.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMeta {
    /// Reference to the template the document was generated from.
    pub template_ref: String,
    /// Output file name of the generated artifact.
    pub file_name: String,
    /// Field values the document was generated with.
    pub fields: BTreeMap<String, Value>,
}

impl RecordMeta {
    /// Create metadata with empty fields.
    pub fn new(template_ref: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self {
            template_ref: template_ref.into(),
            file_name: file_name.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Attach a field value.
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    pub(crate) fn validate(&self) -> StoreResult<()> {
        if self.template_ref.trim().is_empty() {
            return Err(StoreError::Validation("template_ref must not be empty".into()));
        }
        if self.file_name.trim().is_empty() {
            return Err(StoreError::Validation("file_name must not be empty".into()));
        }
        Ok(())
    }
}

/// A persisted artifact record.
///
/// Created once by `save`, never mutated except for `chain_status`
/// transitions, and destroyed only by explicit delete/clear. The
/// `content_digest` is the digest of the raw blob bytes and is the
/// deduplication key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Unique record identifier.
    pub id: RecordId,
    /// Reference to the source template.
    pub template_ref: String,
    /// Output file name.
    pub file_name: String,
    /// When the record was saved.
    pub created_at: DateTime<Utc>,
    /// Size of the original blob in bytes.
    pub size_bytes: u64,
    /// Digest of the raw blob bytes (dedup key).
    pub content_digest: Digest,
    /// Field values the document was generated with.
    pub fields: BTreeMap<String, Value>,
    /// Position in the chain-anchoring lifecycle.
    pub chain_status: ChainStatus,
    /// Hex-encoded blob payload, when retention is enabled. `None` means
    /// the caller must reconstruct the content from other sources.
    pub blob: Option<String>,
}

impl Record {
    /// Build a fresh record from metadata and blob content.
    pub(crate) fn build(
        meta: RecordMeta,
        blob: &[u8],
        content_digest: Digest,
        retain_blob: bool,
    ) -> Self {
        Self {
            id: RecordId::new(),
            template_ref: meta.template_ref,
            file_name: meta.file_name,
            created_at: Utc::now(),
            size_bytes: blob.len() as u64,
            content_digest,
            fields: meta.fields,
            chain_status: ChainStatus::NotSubmitted,
            blob: retain_blob.then(|| hex::encode(blob)),
        }
    }

    /// Key under which a record is persisted.
    pub fn storage_key(id: &RecordId) -> String {
        format!("record/{id}")
    }

    /// Serialize for persistence.
    pub fn encode(&self) -> StoreResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Deserialize from persisted bytes.
    pub fn decode(bytes: &[u8]) -> StoreResult<Self> {
        serde_json::from_slice(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Decode the retained blob payload, if any.
    pub fn decoded_blob(&self) -> StoreResult<Option<Vec<u8>>> {
        match &self.blob {
            None => Ok(None),
            Some(encoded) => hex::decode(encoded)
                .map(Some)
                .map_err(|e| StoreError::Validation(format!("undecodable blob payload: {e}"))),
        }
    }
}
