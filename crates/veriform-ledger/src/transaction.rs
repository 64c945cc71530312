use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use veriform_types::{Digest, RecordId, TransactionId};

/// Kind of ledger transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxKind {
    /// Anchors a generated document's content digest on-chain.
    Deployment,
    /// Free-form payload carried for the host.
    Generic,
}

impl fmt::Display for TxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Deployment => write!(f, "deployment"),
            Self::Generic => write!(f, "generic"),
        }
    }
}

/// Lifecycle status of a transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxStatus {
    /// Built but not yet sealed into a block.
    Pending,
    /// Sealed into an appended block.
    Confirmed,
    /// The enclosing block was never appended.
    Failed,
}

/// Structured transaction payload.
///
/// A closed set of variants rather than a loosely-typed map, so canonical
/// hashing and validation have a fixed contract.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "payload_kind", rename_all = "snake_case")]
pub enum TxPayload {
    /// A generated document anchored by the digest of its bytes.
    ContractDeployment {
        record_id: RecordId,
        template_ref: String,
        content_digest: Digest,
    },
    /// Opaque structured payload supplied by the host.
    Generic { fields: BTreeMap<String, Value> },
}

/// A single ledger transaction.
///
/// Owned exclusively by the block that contains it; immutable after block
/// creation. Amounts and fees are unsigned, so non-negativity holds by
/// construction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub kind: TxKind,
    pub from: String,
    pub to: String,
    pub amount: u64,
    pub fee: u64,
    pub payload: TxPayload,
    /// Signature supplied by an external signer over the content digest,
    /// when one is attached. Signing itself happens outside the core.
    pub signature: Option<String>,
    pub status: TxStatus,
}

impl Transaction {
    /// Build a deployment transaction anchoring a record's content digest.
    pub fn deployment(
        from: impl Into<String>,
        to: impl Into<String>,
        record_id: RecordId,
        template_ref: impl Into<String>,
        content_digest: Digest,
    ) -> Self {
        Self {
            id: TransactionId::new(),
            kind: TxKind::Deployment,
            from: from.into(),
            to: to.into(),
            amount: 0,
            fee: 0,
            payload: TxPayload::ContractDeployment {
                record_id,
                template_ref: template_ref.into(),
                content_digest,
            },
            signature: None,
            status: TxStatus::Pending,
        }
    }

    /// Build a generic transaction carrying a structured payload.
    pub fn generic(
        from: impl Into<String>,
        to: impl Into<String>,
        fields: BTreeMap<String, Value>,
    ) -> Self {
        Self {
            id: TransactionId::new(),
            kind: TxKind::Generic,
            from: from.into(),
            to: to.into(),
            amount: 0,
            fee: 0,
            payload: TxPayload::Generic { fields },
            signature: None,
            status: TxStatus::Pending,
        }
    }

    /// Set amount and fee.
    pub fn with_amount(mut self, amount: u64, fee: u64) -> Self {
        self.amount = amount;
        self.fee = fee;
        self
    }

    /// Attach an externally produced signature.
    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = Some(signature.into());
        self
    }

    /// Stamp the transaction confirmed. Called once when its block is
    /// built, before the block hash is computed.
    pub(crate) fn confirmed(mut self) -> Self {
        self.status = TxStatus::Confirmed;
        self
    }
}
