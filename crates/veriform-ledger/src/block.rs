use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use veriform_digest::Digester;
use veriform_types::Digest;

use crate::error::LedgerError;
use crate::transaction::Transaction;

/// A sealed group of transactions in the hash chain.
///
/// Invariants:
/// - `hash == digest(index, timestamp, previous_hash, transactions, nonce)`
///   (the difficulty field is not part of the preimage);
/// - for every block except genesis, `previous_hash` equals the previous
///   block's stored hash;
/// - genesis has `index = 0` and the zero-digest sentinel as
///   `previous_hash`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub index: u64,
    pub timestamp: DateTime<Utc>,
    pub previous_hash: Digest,
    pub hash: Digest,
    pub nonce: u64,
    pub difficulty: u8,
    pub transactions: Vec<Transaction>,
}

/// The hash preimage of a block: every immutable field except the stored
/// hash itself.
#[derive(Serialize)]
struct BlockSeal<'a> {
    index: u64,
    timestamp: &'a DateTime<Utc>,
    previous_hash: &'a Digest,
    transactions: &'a [Transaction],
    nonce: u64,
}

impl Block {
    /// The fixed first block of every chain.
    ///
    /// Uses the UNIX epoch as its timestamp so every fresh ledger produces
    /// an identical genesis block.
    pub fn genesis() -> Result<Self, LedgerError> {
        let mut block = Self {
            index: 0,
            timestamp: DateTime::UNIX_EPOCH,
            previous_hash: Digest::zero(),
            hash: Digest::zero(),
            nonce: 0,
            difficulty: 0,
            transactions: Vec::new(),
        };
        block.hash = block.compute_hash()?;
        Ok(block)
    }

    /// Build an unmined candidate extending the given tail.
    pub(crate) fn candidate(
        index: u64,
        previous_hash: Digest,
        difficulty: u8,
        transactions: Vec<Transaction>,
    ) -> Self {
        Self {
            index,
            timestamp: Utc::now(),
            previous_hash,
            hash: Digest::zero(),
            nonce: 0,
            difficulty,
            transactions,
        }
    }

    /// Recompute the block's hash from its immutable fields.
    ///
    /// The preimage is rendered canonically, so recomputation over a block
    /// read back from storage is deterministic.
    pub fn compute_hash(&self) -> Result<Digest, LedgerError> {
        let seal = BlockSeal {
            index: self.index,
            timestamp: &self.timestamp,
            previous_hash: &self.previous_hash,
            transactions: &self.transactions,
            nonce: self.nonce,
        };
        Digester::BLOCK
            .digest(&seal)
            .map_err(|e| LedgerError::Serialization(e.to_string()))
    }

    /// Returns `true` if the stored hash meets the block's difficulty
    /// target.
    pub fn meets_difficulty(&self) -> bool {
        self.hash.meets_difficulty(self.difficulty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genesis_is_deterministic() {
        let a = Block::genesis().unwrap();
        let b = Block::genesis().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.index, 0);
        assert!(a.previous_hash.is_zero());
        assert!(a.transactions.is_empty());
    }

    #[test]
    fn genesis_hash_matches_recomputation() {
        let genesis = Block::genesis().unwrap();
        assert_eq!(genesis.hash, genesis.compute_hash().unwrap());
    }

    #[test]
    fn hash_changes_with_nonce() {
        let mut block = Block::candidate(1, Digest::from_bytes(b"prev"), 2, Vec::new());
        let h0 = block.compute_hash().unwrap();
        block.nonce = 1;
        let h1 = block.compute_hash().unwrap();
        assert_ne!(h0, h1);
    }

    #[test]
    fn hash_covers_previous_hash() {
        let block = Block::candidate(1, Digest::from_bytes(b"prev-a"), 2, Vec::new());
        let mut other = block.clone();
        other.previous_hash = Digest::from_bytes(b"prev-b");
        assert_ne!(
            block.compute_hash().unwrap(),
            other.compute_hash().unwrap()
        );
    }

    #[test]
    fn difficulty_is_not_part_of_the_preimage() {
        let block = Block::candidate(1, Digest::from_bytes(b"prev"), 2, Vec::new());
        let mut other = block.clone();
        other.difficulty = 5;
        assert_eq!(
            block.compute_hash().unwrap(),
            other.compute_hash().unwrap()
        );
    }

    #[test]
    fn serde_roundtrip() {
        let block = Block::genesis().unwrap();
        let json = serde_json::to_string(&block).unwrap();
        let parsed: Block = serde_json::from_str(&json).unwrap();
        assert_eq!(block, parsed);
        // The persisted form still recomputes to the stored hash.
        assert_eq!(parsed.hash, parsed.compute_hash().unwrap());
    }
}
