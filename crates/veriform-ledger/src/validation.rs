use serde::{Deserialize, Serialize};

use crate::block::Block;
use crate::error::LedgerError;

/// Result of a full-chain validation pass.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainValidation {
    pub block_count: u64,
    /// Index of the first invalid block, when any check failed.
    pub first_invalid: Option<u64>,
    pub violations: Vec<ChainViolation>,
}

impl ChainValidation {
    /// Returns `true` if every check passed.
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }
}

/// A specific integrity violation detected during validation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainViolation {
    pub index: u64,
    pub kind: ViolationKind,
    pub description: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViolationKind {
    /// The stored hash does not match recomputation over the block's
    /// immutable fields.
    HashMismatch,
    /// `previous_hash` does not equal the prior block's stored hash.
    LinkBreak,
    /// The block's index does not match its chain position.
    IndexGap,
    /// The genesis block lost its zero-sentinel previous hash.
    GenesisTampered,
    /// The stored hash fails the block's own difficulty prefix.
    DifficultyNotMet,
}

/// Chain integrity validator.
///
/// This is the tamper-detection mechanism: any out-of-band mutation of a
/// block's stored fields, including by another process writing to the same
/// persisted chain, is caught by recomputation rather than by signature.
/// Violations are reported, never repaired.
pub struct ChainValidator;

impl ChainValidator {
    /// Validate an entire chain, collecting every violation.
    pub fn validate(blocks: &[Block]) -> ChainValidation {
        let mut violations = Vec::new();

        for (position, block) in blocks.iter().enumerate() {
            let position = position as u64;

            if block.index != position {
                violations.push(ChainViolation {
                    index: position,
                    kind: ViolationKind::IndexGap,
                    description: format!(
                        "block at position {position} carries index {}",
                        block.index
                    ),
                });
            }

            if position == 0 {
                if !block.previous_hash.is_zero() {
                    violations.push(ChainViolation {
                        index: position,
                        kind: ViolationKind::GenesisTampered,
                        description: "genesis previous hash is not the zero sentinel".into(),
                    });
                }
            } else if block.previous_hash != blocks[position as usize - 1].hash {
                violations.push(ChainViolation {
                    index: position,
                    kind: ViolationKind::LinkBreak,
                    description: "previous hash does not match prior block's stored hash".into(),
                });
            }

            match block.compute_hash() {
                Ok(computed) if computed == block.hash => {}
                Ok(_) => violations.push(ChainViolation {
                    index: position,
                    kind: ViolationKind::HashMismatch,
                    description: "stored hash does not match recomputation".into(),
                }),
                Err(e) => violations.push(ChainViolation {
                    index: position,
                    kind: ViolationKind::HashMismatch,
                    description: format!("hash recomputation failed: {e}"),
                }),
            }

            if !block.hash.meets_difficulty(block.difficulty) {
                violations.push(ChainViolation {
                    index: position,
                    kind: ViolationKind::DifficultyNotMet,
                    description: format!(
                        "stored hash fails the difficulty-{} prefix",
                        block.difficulty
                    ),
                });
            }
        }

        let first_invalid = violations.iter().map(|v| v.index).min();
        ChainValidation {
            block_count: blocks.len() as u64,
            first_invalid,
            violations,
        }
    }

    /// Strict variant surfacing the first violation as a typed error.
    pub fn verify(blocks: &[Block]) -> Result<(), LedgerError> {
        let report = Self::validate(blocks);
        match report.first_invalid {
            None => Ok(()),
            Some(index) => {
                let reason = report
                    .violations
                    .iter()
                    .find(|v| v.index == index)
                    .map(|v| v.description.clone())
                    .unwrap_or_else(|| "unknown violation".into());
                Err(LedgerError::ChainIntegrity { index, reason })
            }
        }
    }
}
