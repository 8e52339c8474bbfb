//! # pora-crypto
//!
//! Hash primitives for the PoRA flow.
//!
//! The primitive suite is fixed: every on-ledger digest is Keccak-256, while the
//! scratch-pad seed and the quality score use BLAKE2b-512. Integers that enter a
//! hash are encoded as 32-byte big-endian words.
//!
//! ## Modules
//!
//! - [`keccak`] — Keccak-256 hashing, Merkle pair hashing, sector leaves
//! - [`blake2b`] — BLAKE2b-512 hashing for pad seeds and quality
//! - [`word`] — 256-bit big-endian word encoding and XOR helpers

pub mod blake2b;
pub mod keccak;
pub mod word;

/// Error types for primitive operations.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// A 256-bit word does not fit in the requested integer width.
    #[error("word {word} does not fit in {bits} bits")]
    WordOverflow { word: String, bits: u32 },

    /// Invalid input length.
    #[error("invalid length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

pub type Result<T> = std::result::Result<T, CryptoError>;
