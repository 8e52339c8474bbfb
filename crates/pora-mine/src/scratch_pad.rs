//! Scratch pad generation and mixing.
//!
//! The pad is a strictly sequential hash chain, so it cannot be computed
//! faster than one element at a time. Its last element picks the load to
//! recall; its elements are then XORed into the recalled sealed data.
//!
//! ```text
//! seed          = blake2b512(miner_id || nonce || subtask_digest || recall_digest)
//! pad[0]        = step(seed)
//! pad[i + 1]    = step(pad[i])
//! step(x)       = keccak(x) || keccak(keccak(x) || x[32..64])    (double Keccak)
//!               | blake2b512(x)                                    (BLAKE2b)
//! chunk_offset  = be256(keccak(pad[last])) mod loads
//! ```

use pora_crypto::blake2b::{blake2b512, blake2b512_concat};
use pora_crypto::keccak::{keccak256, keccak256_concat};
use pora_crypto::word::xor32;
use pora_types::constants::{
    BHASHES_PER_PAD, BHASHES_PER_SEAL, BYTES_PER_BHASH, SEALS_PER_LOAD, SEALS_PER_PAD,
    UNITS_PER_SEAL,
};
use pora_types::context::{MineContext, RecallRange};
use pora_types::{Hash, U256};
use serde::{Deserialize, Serialize};

use crate::{MineError, Result};

/// One pad element.
pub type PadItem = [u8; BYTES_PER_BHASH];

/// Pad chain step function.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PadHasher {
    /// Two chained Keccak-256 rounds; the ledger's native hash.
    #[default]
    DoubleKeccak,
    /// One BLAKE2b-512 round.
    Blake2b,
}

impl PadHasher {
    fn step(self, input: &PadItem) -> PadItem {
        match self {
            Self::DoubleKeccak => {
                let first = keccak256(input);
                let second = keccak256_concat(&[&first, &input[32..]]);
                let mut out = [0u8; BYTES_PER_BHASH];
                out[..32].copy_from_slice(&first);
                out[32..].copy_from_slice(&second);
                out
            }
            Self::Blake2b => blake2b512(input),
        }
    }
}

/// Seed of the pad for one mining attempt.
pub fn pad_seed(miner_id: &Hash, nonce: &Hash, subtask_digest: &Hash, recall_digest: &Hash) -> PadItem {
    blake2b512_concat(&[miner_id, nonce, subtask_digest, recall_digest])
}

/// An expanded scratch pad.
#[derive(Clone, Debug)]
pub struct ScratchPad {
    seed: PadItem,
    items: Vec<PadItem>,
}

impl ScratchPad {
    /// Expand a pad from its seed.
    pub fn generate(seed: PadItem, hasher: PadHasher) -> Self {
        let mut items = Vec::with_capacity(BHASHES_PER_PAD);
        let mut current = seed;
        for _ in 0..BHASHES_PER_PAD {
            current = hasher.step(&current);
            items.push(current);
        }
        Self { seed, items }
    }

    /// Seed and expand the pad for `(miner_id, nonce)` in `context` over `range`.
    pub fn for_attempt(
        miner_id: &Hash,
        nonce: &Hash,
        context: &MineContext,
        range: &RecallRange,
        hasher: PadHasher,
    ) -> Self {
        let seed = pad_seed(miner_id, nonce, &context.subtask_digest(), &range.digest());
        Self::generate(seed, hasher)
    }

    pub fn seed(&self) -> &PadItem {
        &self.seed
    }

    pub fn items(&self) -> &[PadItem] {
        &self.items
    }

    /// Last element of the chain.
    pub fn last(&self) -> &PadItem {
        // generate() always fills BHASHES_PER_PAD > 0 items
        &self.items[BHASHES_PER_PAD - 1]
    }

    /// Load index selected by the pad, before sharding.
    ///
    /// # Errors
    ///
    /// Returns [`MineError::RecallOutOfBound`] when the range holds no load.
    pub fn chunk_offset(&self, loads: u64) -> Result<u64> {
        if loads == 0 {
            return Err(MineError::RecallOutOfBound { offset: 0, loads });
        }
        let value = U256::from_big_endian(&keccak256(self.last()));
        Ok((value % U256::from(loads)).low_u64())
    }

    /// XOR one sealed batch with the pad slice assigned to `seal_offset`.
    ///
    /// Unit `i` takes the first half of element `i / 2` for even `i` and the
    /// second half for odd `i`.
    ///
    /// # Errors
    ///
    /// Returns [`MineError::InvalidSealOffset`] or
    /// [`MineError::MalformedSealedData`].
    pub fn mix(&self, seal_offset: u64, sealed: &[Hash]) -> Result<Vec<Hash>> {
        if seal_offset >= SEALS_PER_LOAD {
            return Err(MineError::InvalidSealOffset(seal_offset));
        }
        if sealed.len() != UNITS_PER_SEAL {
            return Err(MineError::MalformedSealedData {
                expected: UNITS_PER_SEAL,
                actual: sealed.len(),
            });
        }
        let base = (seal_offset % SEALS_PER_PAD) as usize * BHASHES_PER_SEAL;
        Ok(sealed
            .iter()
            .enumerate()
            .map(|(i, unit)| {
                let item = &self.items[base + i / 2];
                let mut half = [0u8; 32];
                if i % 2 == 0 {
                    half.copy_from_slice(&item[..32]);
                } else {
                    half.copy_from_slice(&item[32..]);
                }
                xor32(unit, &half)
            })
            .collect())
    }
}
