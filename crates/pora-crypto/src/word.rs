//! 256-bit big-endian word helpers.
//!
//! Every integer that is hashed or put on the wire occupies one 32-byte
//! big-endian word, matching the ledger's ABI encoding.

use crate::{CryptoError, Result};

/// Encode a `u64` as a 32-byte big-endian word.
pub fn encode_u256(value: u64) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[24..].copy_from_slice(&value.to_be_bytes());
    word
}

/// Decode a 32-byte big-endian word into a `u64`.
///
/// # Errors
///
/// Returns [`CryptoError::WordOverflow`] if any of the high 24 bytes is set.
pub fn decode_u64(word: &[u8; 32]) -> Result<u64> {
    if word[..24].iter().any(|b| *b != 0) {
        return Err(CryptoError::WordOverflow {
            word: hex::encode(word),
            bits: 64,
        });
    }
    let mut low = [0u8; 8];
    low.copy_from_slice(&word[24..]);
    Ok(u64::from_be_bytes(low))
}

/// Read a 32-byte word from a slice.
///
/// # Errors
///
/// Returns [`CryptoError::InvalidLength`] if `bytes` is not exactly 32 bytes.
pub fn to_word(bytes: &[u8]) -> Result<[u8; 32]> {
    bytes.try_into().map_err(|_| CryptoError::InvalidLength {
        expected: 32,
        actual: bytes.len(),
    })
}

/// XOR two 32-byte words.
pub fn xor32(a: &[u8; 32], b: &[u8; 32]) -> [u8; 32] {
    let mut out = [0u8; 32];
    for (o, (x, y)) in out.iter_mut().zip(a.iter().zip(b.iter())) {
        *o = x ^ y;
    }
    out
}
