use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::block::Block;
use crate::error::LedgerError;

/// Cooperative cancellation handle for a mining search.
///
/// Cloning shares the flag, so a caller can keep one handle and pass the
/// other into `create_block`, then abandon the search from any thread.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create a fresh, uncancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation of the search.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Returns `true` once cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Configuration for the proof-of-work search.
#[derive(Clone, Debug)]
pub struct MinerConfig {
    /// Required number of leading `'0'` characters in the hex form of the
    /// block hash.
    pub difficulty: u8,
    /// Upper bound of the nonce search. Exceeding it fails the operation
    /// with [`LedgerError::MiningExhausted`].
    pub max_nonce: u64,
    /// Nonce interval between cancellation checks and thread yields.
    pub check_interval: u64,
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            difficulty: 2,
            max_nonce: 1 << 24,
            check_interval: 1024,
        }
    }
}

/// Linear proof-of-work search.
///
/// Deliberately a plain nonce-increment loop with no shortcuts: the goal is
/// a locally verifiable proof of minimum work, not cryptographic security
/// against a faster adversary.
pub struct Miner;

impl Miner {
    /// Search for a nonce whose block hash meets the difficulty prefix.
    ///
    /// On success the block's `nonce` and `hash` are set to the winning
    /// values (the first satisfying nonce wins). Every `check_interval`
    /// nonces the search checks the cancel token and yields the thread so
    /// cooperating tasks are never starved indefinitely. On exhaustion or
    /// cancellation the error is returned and the caller must discard the
    /// candidate.
    pub fn mine(
        block: &mut Block,
        config: &MinerConfig,
        cancel: &CancelToken,
    ) -> Result<(), LedgerError> {
        let interval = config.check_interval.max(1);
        let mut nonce = 0u64;

        loop {
            if nonce % interval == 0 {
                if cancel.is_cancelled() {
                    return Err(LedgerError::MiningCancelled);
                }
                std::thread::yield_now();
            }

            block.nonce = nonce;
            let hash = block.compute_hash()?;
            if hash.meets_difficulty(config.difficulty) {
                block.hash = hash;
                debug!(
                    index = block.index,
                    nonce,
                    hash = %hash.short_hex(),
                    difficulty = config.difficulty,
                    "block sealed"
                );
                return Ok(());
            }

            if nonce == config.max_nonce {
                return Err(LedgerError::MiningExhausted {
                    max_nonce: config.max_nonce,
                });
            }
            nonce += 1;
        }
    }
}
