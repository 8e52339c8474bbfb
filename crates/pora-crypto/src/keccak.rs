//! Keccak-256 hashing.
//!
//! This is the legacy Keccak padding (as used by the EVM), not NIST SHA3-256.
//! Merkle nodes are `keccak256(left || right)` with no domain prefix, and a
//! sector leaf is the hash of the raw 256-byte sector.

use sha3::{Digest, Keccak256};

/// Keccak-256 of the empty string.
pub const KECCAK_EMPTY: [u8; 32] = [
    0xc5, 0xd2, 0x46, 0x01, 0x86, 0xf7, 0x23, 0x3c, 0x92, 0x7e, 0x7d, 0xb2, 0xdc, 0xc7, 0x03, 0xc0,
    0xe5, 0x00, 0xb6, 0x53, 0xca, 0x82, 0x27, 0x3b, 0x7b, 0xfa, 0xd8, 0x04, 0x5d, 0x85, 0xa4, 0x70,
];

/// The all-zero 32-byte value. Used as the flow sentinel and as "no root yet".
pub const ZERO_HASH: [u8; 32] = [0u8; 32];

/// Compute Keccak-256 of the input data.
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    keccak256_concat(&[data])
}

/// Compute Keccak-256 over the concatenation of `parts` without allocating.
pub fn keccak256_concat(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    for part in parts {
        hasher.update(part);
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    out
}

/// Hash two sibling nodes into their parent: `keccak256(left || right)`.
pub fn hash_pair(left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
    keccak256_concat(&[&left[..], &right[..]])
}

/// Hash a sector into its Merkle leaf.
pub fn sector_leaf(sector: &[u8]) -> [u8; 32] {
    keccak256(sector)
}
