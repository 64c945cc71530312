use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use veriform_digest::Digester;
use veriform_types::Digest;

use crate::error::SdkResult;

/// Canonical payload describing a generated document.
///
/// The template/UI layer builds this AFTER stripping volatile state
/// (ephemeral render flags, focus tracking, and the like); the digest
/// service canonicalizes key order but has no knowledge of which fields
/// are volatile.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DocumentPayload {
    /// Identifier of the source template.
    pub template_id: String,
    /// Template version the document was generated from.
    pub version: u32,
    /// Field values filled into the template.
    pub fields: BTreeMap<String, Value>,
    /// Clause identifiers included in the document, in document order.
    pub clauses: Vec<String>,
    /// Generation timestamp.
    pub timestamp: DateTime<Utc>,
}

impl DocumentPayload {
    /// Create a payload with empty fields and clauses.
    pub fn new(template_id: impl Into<String>, version: u32, timestamp: DateTime<Utc>) -> Self {
        Self {
            template_id: template_id.into(),
            version,
            fields: BTreeMap::new(),
            clauses: Vec::new(),
            timestamp,
        }
    }

    /// Attach a field value.
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    /// Append a clause identifier.
    pub fn with_clause(mut self, clause: impl Into<String>) -> Self {
        self.clauses.push(clause.into());
        self
    }

    /// The canonical digest of this payload.
    ///
    /// Structurally identical payloads digest identically regardless of
    /// field insertion order.
    pub fn content_digest(&self) -> SdkResult<Digest> {
        Ok(Digester::PAYLOAD.digest(self)?)
    }
}
