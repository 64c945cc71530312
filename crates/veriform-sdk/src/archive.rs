use std::sync::Arc;

use tracing::{debug, warn};
use veriform_ledger::{
    Block, CancelToken, ChainInfo, ChainValidation, Ledger, LedgerConfig, Transaction,
};
use veriform_store::{
    InMemoryKvStore, KeyValueStore, Record, RecordMeta, RecordStore, StoreConfig,
};
use veriform_types::{ChainStatus, RecordId};

use crate::error::{SdkError, SdkResult};

/// High-level Veriform API.
///
/// Wires the content store and the ledger over one key-value backend and
/// drives the anchoring flow: save a document, seal its content digest into
/// a mined block, verify the chain on demand. The store and the ledger
/// never reference each other; correlation happens only through the
/// content digest carried in the deployment transaction.
pub struct Veriform {
    store: RecordStore,
    ledger: Ledger,
}

impl Veriform {
    /// Create an in-memory instance for tests and embedding.
    pub fn in_memory() -> SdkResult<Self> {
        Self::open(
            Arc::new(InMemoryKvStore::new()),
            StoreConfig::default(),
            LedgerConfig::default(),
        )
    }

    /// Open over an injected backend. Records, the index, and the chain
    /// share the backend under disjoint keys.
    pub fn open(
        kv: Arc<dyn KeyValueStore>,
        store_config: StoreConfig,
        ledger_config: LedgerConfig,
    ) -> SdkResult<Self> {
        let store = RecordStore::with_config(Arc::clone(&kv), store_config);
        let ledger = Ledger::open(kv, ledger_config)?;
        Ok(Self { store, ledger })
    }

    // ---- Document operations ----

    /// Persist a generated document. Returns the existing id when
    /// byte-identical content is already stored.
    pub fn save_document(&self, meta: RecordMeta, blob: &[u8]) -> SdkResult<RecordId> {
        Ok(self.store.save(meta, blob)?)
    }

    /// All stored documents, most-recently-saved first.
    pub fn documents(&self) -> SdkResult<Vec<Record>> {
        Ok(self.store.load_all()?)
    }

    /// Load one document by id.
    pub fn document(&self, id: &RecordId) -> SdkResult<Option<Record>> {
        Ok(self.store.get(id)?)
    }

    /// Delete a document. Idempotent.
    pub fn delete_document(&self, id: &RecordId) -> SdkResult<()> {
        Ok(self.store.delete(id)?)
    }

    /// Delete every stored document.
    pub fn clear_documents(&self) -> SdkResult<()> {
        Ok(self.store.clear()?)
    }

    /// Reconstruct a document's original bytes from its retained payload,
    /// or `None` when the caller must regenerate the content.
    pub fn rebuild_blob(&self, record: &Record) -> SdkResult<Option<Vec<u8>>> {
        Ok(self.store.rebuild_blob(record)?)
    }

    // ---- Anchoring operations ----

    /// Seal a record's content digest into a newly mined block.
    pub fn seal_record(&self, id: &RecordId) -> SdkResult<Block> {
        self.seal_record_with(id, None, &CancelToken::new())
    }

    /// Seal a record, optionally attaching an external signature over its
    /// content digest, abandoning the search when `cancel` fires.
    ///
    /// The record moves `NotSubmitted → Pending → Confirmed`, or to
    /// `Failed` when mining or persistence fails; the failure is then
    /// surfaced to the caller.
    pub fn seal_record_with(
        &self,
        id: &RecordId,
        signature: Option<String>,
        cancel: &CancelToken,
    ) -> SdkResult<Block> {
        let record = self.store.get(id)?.ok_or(SdkError::RecordNotFound(*id))?;
        self.store.update_chain_status(id, ChainStatus::Pending)?;

        let mut tx = Transaction::deployment(
            "generator",
            "registry",
            record.id,
            &record.template_ref,
            record.content_digest,
        );
        if let Some(signature) = signature {
            tx = tx.with_signature(signature);
        }

        match self.ledger.create_block_with_token(vec![tx], cancel) {
            Ok(block) => {
                self.store.update_chain_status(id, ChainStatus::Confirmed)?;
                debug!(
                    id = %id,
                    block = block.index,
                    hash = %block.hash.short_hex(),
                    "record sealed on-chain"
                );
                Ok(block)
            }
            Err(e) => {
                if let Err(status_err) =
                    self.store.update_chain_status(id, ChainStatus::Failed)
                {
                    warn!(id = %id, error = %status_err, "failed to record anchoring failure");
                }
                Err(e.into())
            }
        }
    }

    /// Recompute every block hash and linkage pointer.
    pub fn verify(&self) -> SdkResult<ChainValidation> {
        Ok(self.ledger.validate_chain()?)
    }

    /// Summary of the current chain state.
    pub fn chain_info(&self) -> SdkResult<ChainInfo> {
        Ok(self.ledger.chain_info()?)
    }

    // ---- Accessors ----

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }
}
