//! Deterministic canonical hashing for Veriform.
//!
//! Provides domain-separated BLAKE3 hashing of raw byte buffers and of
//! structured payloads. Structured payloads are rendered to a canonical
//! byte form first (object keys sorted lexicographically, recursively), so
//! structurally identical values hash identically regardless of key
//! insertion order.
//!
//! All hashing wraps BLAKE3 — no custom cryptography.

pub mod canonical;
pub mod hasher;

pub use canonical::to_canonical_bytes;
pub use hasher::{Digester, DigestError};
