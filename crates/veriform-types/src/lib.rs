//! Foundation types for Veriform.
//!
//! This crate provides the identity and status types shared by the digest
//! service, the content store, and the ledger. Every other Veriform crate
//! depends on `veriform-types`.
//!
//! # Key Types
//!
//! - [`Digest`] — fixed-length content hash (BLAKE3, 256-bit)
//! - [`RecordId`] — UUID v7 identifier for a stored record
//! - [`TransactionId`] — UUID v7 identifier for a ledger transaction
//! - [`ChainStatus`] — a record's position in the anchoring lifecycle

pub mod digest;
pub mod error;
pub mod ids;
pub mod status;

pub use digest::Digest;
pub use error::TypeError;
pub use ids::{RecordId, TransactionId};
pub use status::ChainStatus;
