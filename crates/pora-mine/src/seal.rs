//! Sealing and unsealing of sector data.
//!
//! Sealing binds raw data to a miner, the context it was sealed under and
//! its flow position, so the sealed form cannot be shared between miners or
//! positions. Each unit is masked by the hash of the previous sealed unit:
//!
//! ```text
//! input_0      = miner_id || context_digest || be256(start_position)
//! sealed_i     = unit_i XOR keccak(input_i)
//! input_(i+1)  = sealed_i
//! ```
//!
//! Unsealing replays the chain from the sealed units, so any batch can be
//! unsealed independently of the others.

use pora_crypto::keccak::{keccak256, keccak256_concat};
use pora_crypto::word::{encode_u256, xor32};
use pora_types::constants::{BYTES_PER_SECTOR, BYTES_PER_UNIT};
use pora_types::Hash;

use crate::{MineError, Result};

fn first_mask(miner_id: &Hash, context_digest: &Hash, start_position: u64) -> Hash {
    keccak256_concat(&[miner_id, context_digest, &encode_u256(start_position)])
}

/// Seal `units` starting at flow position `start_position`.
pub fn seal(miner_id: &Hash, context_digest: &Hash, start_position: u64, units: &[Hash]) -> Vec<Hash> {
    let mut mask = first_mask(miner_id, context_digest, start_position);
    units
        .iter()
        .map(|unit| {
            let sealed = xor32(unit, &mask);
            mask = keccak256(&sealed);
            sealed
        })
        .collect()
}

/// Invert [`seal`].
pub fn unseal(
    miner_id: &Hash,
    context_digest: &Hash,
    start_position: u64,
    sealed: &[Hash],
) -> Vec<Hash> {
    let mut mask = first_mask(miner_id, context_digest, start_position);
    sealed
        .iter()
        .map(|unit| {
            let raw = xor32(unit, &mask);
            mask = keccak256(unit);
            raw
        })
        .collect()
}

/// Split sector data into 32-byte units.
///
/// # Errors
///
/// Returns [`MineError::MalformedSealedData`] for partial sectors.
pub fn units_from_sectors(data: &[u8]) -> Result<Vec<Hash>> {
    if !data.len().is_multiple_of(BYTES_PER_SECTOR) {
        return Err(MineError::MalformedSealedData {
            expected: data.len().next_multiple_of(BYTES_PER_SECTOR) / BYTES_PER_UNIT,
            actual: data.len() / BYTES_PER_UNIT,
        });
    }
    Ok(data
        .chunks(BYTES_PER_UNIT)
        .map(|chunk| {
            let mut unit = [0u8; 32];
            unit.copy_from_slice(chunk);
            unit
        })
        .collect())
}
