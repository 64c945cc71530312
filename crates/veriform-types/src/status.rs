use std::fmt;

use serde::{Deserialize, Serialize};

/// A record's position in the chain-anchoring lifecycle.
///
/// Records start as `NotSubmitted`. When the host wraps a record's content
/// digest into a transaction and asks the ledger to mine it, the record
/// moves to `Pending`, then to `Confirmed` on a successful append or
/// `Failed` if mining or persistence fails.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainStatus {
    /// The record has never been submitted to the ledger.
    NotSubmitted,
    /// A block containing the record's digest is being mined.
    Pending,
    /// The record's digest is sealed in an appended block.
    Confirmed,
    /// The last anchoring attempt failed.
    Failed,
}

impl ChainStatus {
    /// Returns `true` once the anchoring attempt has finished, in either
    /// direction.
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Confirmed | Self::Failed)
    }
}

impl Default for ChainStatus {
    fn default() -> Self {
        Self::NotSubmitted
    }
}

impl fmt::Display for ChainStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotSubmitted => write!(f, "not_submitted"),
            Self::Pending => write!(f, "pending"),
            Self::Confirmed => write!(f, "confirmed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}
