//! # pora-types
//!
//! Shared domain types used across the PoRA workspace: the mining context
//! published by the flow, the recall range a miner commits to, the answer it
//! submits, and the submission records of the flow itself.
//!
//! ## Modules
//!
//! - [`constants`] — Sector, load, seal and pad geometry
//! - [`context`] — [`context::MineContext`], [`context::RecallRange`], [`context::EpochRange`]
//! - [`answer`] — [`answer::PoraAnswer`]
//! - [`submission`] — Flow submissions and receipts
//! - [`wire`] — Fixed-width binary codec for answers

pub mod answer;
pub mod constants;
pub mod context;
pub mod submission;
pub mod wire;

pub use primitive_types::U256;

/// Common type aliases.
pub type Hash = [u8; 32];
pub type MinerId = [u8; 32];
pub type Address = [u8; 20];

/// Error types for shared type handling.
#[derive(Debug, thiserror::Error)]
pub enum TypesError {
    /// Input ended before a complete field was read.
    #[error("truncated input: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },

    /// Bytes were left over after decoding.
    #[error("{0} trailing bytes after answer")]
    TrailingBytes(usize),

    /// A numeric word was out of range.
    #[error("invalid word: {0}")]
    Word(#[from] pora_crypto::CryptoError),

    /// Sealed data did not contain exactly one seal batch.
    #[error("sealed data has {actual} units, expected {expected}")]
    SealedDataLength { expected: usize, actual: usize },

    /// The Merkle proof is longer than any supported tree.
    #[error("merkle proof has {0} siblings, maximum is {max}", max = wire::MAX_PROOF_LENGTH)]
    ProofTooLong(usize),

    /// JSON (de)serialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, TypesError>;
