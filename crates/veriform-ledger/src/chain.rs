//! The append-only block chain and its owning `Ledger` handle.
//!
//! The ledger owns the block sequence; only `create_block` mutates it, and
//! readers (validation, listing) never do. The persisted representation is
//! a single serialized block sequence in index order; traversal is
//! sequential, so no separate index entry is needed.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use veriform_store::KeyValueStore;
use veriform_types::Digest;

use crate::block::Block;
use crate::error::LedgerError;
use crate::miner::{CancelToken, Miner, MinerConfig};
use crate::transaction::Transaction;
use crate::validation::{ChainValidation, ChainValidator};

/// Key of the persisted chain entry.
const CHAIN_KEY: &str = "chain";

/// Configuration for a ledger instance.
#[derive(Clone, Debug, Default)]
pub struct LedgerConfig {
    /// Proof-of-work parameters applied to every created block.
    pub miner: MinerConfig,
}

/// Summary of the current chain state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainInfo {
    pub block_count: u64,
    pub latest_hash: Digest,
}

/// Append-only chain of proof-of-work sealed blocks.
pub struct Ledger {
    chain: RwLock<Vec<Block>>,
    kv: Option<Arc<dyn KeyValueStore>>,
    config: LedgerConfig,
}

impl Ledger {
    /// Create an unpersisted ledger holding only the genesis block.
    pub fn in_memory(config: LedgerConfig) -> Result<Self, LedgerError> {
        Ok(Self {
            chain: RwLock::new(vec![Block::genesis()?]),
            kv: None,
            config,
        })
    }

    /// Open a ledger backed by the given store: load the persisted chain,
    /// or create and persist the genesis block.
    pub fn open(kv: Arc<dyn KeyValueStore>, config: LedgerConfig) -> Result<Self, LedgerError> {
        let chain = match kv.get(CHAIN_KEY).map_err(|e| LedgerError::Storage(e.to_string()))? {
            Some(bytes) => {
                let chain: Vec<Block> = serde_json::from_slice(&bytes)
                    .map_err(|e| LedgerError::Serialization(e.to_string()))?;
                if chain.is_empty() {
                    let genesis = vec![Block::genesis()?];
                    Self::persist(&kv, &genesis)?;
                    genesis
                } else {
                    chain
                }
            }
            None => {
                let genesis = vec![Block::genesis()?];
                Self::persist(&kv, &genesis)?;
                genesis
            }
        };

        info!(blocks = chain.len(), "ledger opened");
        Ok(Self {
            chain: RwLock::new(chain),
            kv: Some(kv),
            config,
        })
    }

    /// The active configuration.
    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    // -----------------------------------------------------------------
    // Operations
    // -----------------------------------------------------------------

    /// Mine and append a block holding the given transactions.
    pub fn create_block(&self, transactions: Vec<Transaction>) -> Result<Block, LedgerError> {
        self.create_block_with_token(transactions, &CancelToken::new())
    }

    /// Mine and append a block, abandoning the search when `cancel` fires.
    ///
    /// On any failure (exhaustion, cancellation, persistence) no block is
    /// appended and no persisted state changes.
    pub fn create_block_with_token(
        &self,
        transactions: Vec<Transaction>,
        cancel: &CancelToken,
    ) -> Result<Block, LedgerError> {
        let (index, previous_hash) = {
            let chain = self.read_chain()?;
            let tail = chain.last().expect("chain contains at least the genesis block");
            (chain.len() as u64, tail.hash)
        };

        // Transactions become immutable once the block exists, so their
        // final status must be stamped before the hash is computed.
        let transactions: Vec<Transaction> =
            transactions.into_iter().map(Transaction::confirmed).collect();

        let mut block = Block::candidate(
            index,
            previous_hash,
            self.config.miner.difficulty,
            transactions,
        );
        Miner::mine(&mut block, &self.config.miner, cancel)?;

        let mut chain = self.write_chain()?;
        let tail = chain.last().expect("chain contains at least the genesis block");
        if block.index != chain.len() as u64 || block.previous_hash != tail.hash {
            return Err(LedgerError::ChainIntegrity {
                index: chain.len() as u64,
                reason: "append attempted against a stale tail".into(),
            });
        }

        chain.push(block.clone());
        if let Some(kv) = &self.kv {
            if let Err(e) = Self::persist(kv, &chain) {
                chain.pop();
                return Err(e);
            }
        }

        debug!(
            index = block.index,
            txs = block.transactions.len(),
            nonce = block.nonce,
            hash = %block.hash.short_hex(),
            "block appended"
        );
        Ok(block)
    }

    /// Recompute every block hash and linkage pointer, collecting every
    /// divergence from the recorded values.
    pub fn validate_chain(&self) -> Result<ChainValidation, LedgerError> {
        let chain = self.read_chain()?;
        Ok(ChainValidator::validate(&chain))
    }

    /// Convenience projection of [`Ledger::validate_chain`]: whether the
    /// chain is valid and, for diagnostics, the first invalid block index.
    pub fn is_chain_valid(&self) -> Result<(bool, Option<u64>), LedgerError> {
        let report = self.validate_chain()?;
        Ok((report.is_valid(), report.first_invalid))
    }

    /// Summary of the current chain state.
    pub fn chain_info(&self) -> Result<ChainInfo, LedgerError> {
        let chain = self.read_chain()?;
        let tail = chain.last().expect("chain contains at least the genesis block");
        Ok(ChainInfo {
            block_count: chain.len() as u64,
            latest_hash: tail.hash,
        })
    }

    /// Snapshot of all blocks in index order.
    pub fn blocks(&self) -> Result<Vec<Block>, LedgerError> {
        Ok(self.read_chain()?.clone())
    }

    /// Number of blocks, genesis included.
    pub fn len(&self) -> Result<u64, LedgerError> {
        Ok(self.read_chain()?.len() as u64)
    }

    // -----------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------

    fn persist(kv: &Arc<dyn KeyValueStore>, chain: &[Block]) -> Result<(), LedgerError> {
        let bytes = serde_json::to_vec(chain)
            .map_err(|e| LedgerError::Serialization(e.to_string()))?;
        kv.set(CHAIN_KEY, &bytes)
            .map_err(|e| LedgerError::Storage(e.to_string()))
    }

    fn read_chain(&self) -> Result<RwLockReadGuard<'_, Vec<Block>>, LedgerError> {
        self.chain
            .read()
            .map_err(|_| LedgerError::Storage("chain lock poisoned".into()))
    }

    fn write_chain(&self) -> Result<RwLockWriteGuard<'_, Vec<Block>>, LedgerError> {
        self.chain
            .write()
            .map_err(|_| LedgerError::Storage("chain lock poisoned".into()))
    }
}

impl std::fmt::Debug for Ledger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let blocks = self.chain.read().map(|c| c.len()).unwrap_or(0);
        f.debug_struct("Ledger")
            .field("blocks", &blocks)
            .field("difficulty", &self.config.miner.difficulty)
            .finish()
    }
}
