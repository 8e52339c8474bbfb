//! Recall position, quality score and targets.
//!
//! ```text
//! loads            = mine_length / SECTORS_PER_LOAD
//! real_offset      = (chunk_offset & shard_mask) | shard_id          (< loads)
//! recall_position  = start + real_offset * SECTORS_PER_LOAD + seal_offset * SECTORS_PER_SEAL
//! quality          = be256(blake2b512(be256(seal_offset) || seed || 0^32 || mixed)[..32])
//! target           = floor((2^256 - 1) / difficulty)
//! ```
//!
//! An answer qualifies when `quality <= target / shards`.

use pora_crypto::blake2b::blake2b512_concat;
use pora_crypto::word::encode_u256;
use pora_types::constants::{SECTORS_PER_LOAD, SECTORS_PER_SEAL};
use pora_types::context::RecallRange;
use pora_types::{Hash, U256};

use crate::scratch_pad::{PadItem, ScratchPad};
use crate::{MineError, Result};

/// Derive the recall position selected by `pad` within `range`.
///
/// # Errors
///
/// Returns [`MineError::RecallOutOfBound`] when the sharded load index falls
/// past the end of the range.
pub fn recall_position(range: &RecallRange, pad: &ScratchPad, seal_offset: u64) -> Result<u64> {
    let loads = range.mine_length / SECTORS_PER_LOAD;
    let chunk_offset = pad.chunk_offset(loads)?;
    let real_offset = (chunk_offset & range.shard_mask) | range.shard_id;
    if real_offset >= loads {
        return Err(MineError::RecallOutOfBound {
            offset: real_offset,
            loads,
        });
    }
    Ok(range.start_position + real_offset * SECTORS_PER_LOAD + seal_offset * SECTORS_PER_SEAL)
}

/// Quality of a mixed seal batch. Lower is better.
pub fn compute_quality(seal_offset: u64, pad_seed: &PadItem, mixed: &[Hash]) -> U256 {
    let mut parts: Vec<&[u8]> = Vec::with_capacity(3 + mixed.len());
    let offset_word = encode_u256(seal_offset);
    parts.push(&offset_word);
    parts.push(pad_seed);
    parts.push(&[0u8; 32]);
    parts.extend(mixed.iter().map(|unit| unit.as_slice()));
    let digest = blake2b512_concat(&parts);
    U256::from_big_endian(&digest[..32])
}

/// Target for a difficulty; difficulty 0 is treated as 1.
pub fn difficulty_to_target(difficulty: U256) -> U256 {
    U256::MAX / difficulty.max(U256::one())
}

/// Difficulty implied by a target.
pub fn target_to_difficulty(target: U256) -> U256 {
    U256::MAX / target.max(U256::one())
}
