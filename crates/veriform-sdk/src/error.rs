use thiserror::Error;
use veriform_types::RecordId;

#[derive(Debug, Error)]
pub enum SdkError {
    #[error("record not found: {0}")]
    RecordNotFound(RecordId),

    #[error("digest error: {0}")]
    Digest(#[from] veriform_digest::DigestError),

    #[error("store error: {0}")]
    Store(#[from] veriform_store::StoreError),

    #[error("ledger error: {0}")]
    Ledger(#[from] veriform_ledger::LedgerError),
}

pub type SdkResult<T> = Result<T, SdkError>;
