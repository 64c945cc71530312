use serde::Serialize;
use veriform_types::Digest;

use crate::canonical::to_canonical_bytes;

/// Domain-separated BLAKE3 digester.
///
/// Each digester carries a domain tag (e.g., `"veriform-blob-v1"`) that is
/// prepended to every hash computation. This prevents cross-type hash
/// collisions: a raw blob and a block seal with identical bytes will
/// produce different digests.
pub struct Digester {
    domain: &'static str,
}

impl Digester {
    /// Digester for raw content blobs (the content-addressing key).
    pub const BLOB: Self = Self {
        domain: "veriform-blob-v1",
    };
    /// Digester for canonical structured payloads.
    pub const PAYLOAD: Self = Self {
        domain: "veriform-payload-v1",
    };
    /// Digester for block seals (proof-of-work preimages).
    pub const BLOCK: Self = Self {
        domain: "veriform-block-v1",
    };

    /// Create a digester with a custom domain tag.
    pub const fn new(domain: &'static str) -> Self {
        Self { domain }
    }

    /// Hash raw bytes with domain separation.
    pub fn digest_bytes(&self, data: &[u8]) -> Digest {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        hasher.update(data);
        Digest::from_hash(*hasher.finalize().as_bytes())
    }

    /// Hash a structured payload in its canonical form.
    ///
    /// Structurally identical payloads produce identical digests regardless
    /// of key insertion order. Pure computation; the only failure mode is
    /// serialization.
    pub fn digest<T: Serialize>(&self, value: &T) -> Result<Digest, DigestError> {
        let bytes = to_canonical_bytes(value)?;
        Ok(self.digest_bytes(&bytes))
    }

    /// Verify that data produces the expected digest.
    pub fn verify(&self, data: &[u8], expected: &Digest) -> bool {
        self.digest_bytes(data) == *expected
    }

    /// The domain tag used by this digester.
    pub fn domain(&self) -> &str {
        self.domain
    }
}

/// Errors from digest operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DigestError {
    #[error("serialization error: {0}")]
    Serialization(String),
}
