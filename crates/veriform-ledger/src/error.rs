/// Errors produced by ledger operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("mining exhausted: no nonce up to {max_nonce} met the difficulty target")]
    MiningExhausted { max_nonce: u64 },

    #[error("mining cancelled before a block was sealed")]
    MiningCancelled,

    #[error("chain integrity violation at block {index}: {reason}")]
    ChainIntegrity { index: u64, reason: String },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}
