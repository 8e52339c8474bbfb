//! Fixed-width binary codec for [`PoraAnswer`].
//!
//! Every field is one 32-byte big-endian word, in ledger ABI order.
//!
//! ## Wire format
//!
//! ```text
//! PoraAnswer {
//!     context_digest:        word,
//!     nonce:                 word,
//!     miner_id:              word,
//!     start_position:        u256,
//!     mine_length:           u256,
//!     shard_id:              u256,
//!     shard_mask:            u256,
//!     recall_position:       u256,
//!     seal_offset:           u256,
//!     sealed_context_digest: word,
//!     sealed_data:           word[128],
//!     proof_length:          u256,
//!     merkle_proof:          word[proof_length],  // leaf toward root
//! }
//! ```

use pora_crypto::word::{decode_u64, encode_u256, to_word};

use crate::answer::PoraAnswer;
use crate::constants::{MAX_TREE_HEIGHT, SEAL_HEIGHT, UNITS_PER_SEAL};
use crate::context::RecallRange;
use crate::{Hash, Result, TypesError};

/// Longest Merkle proof accepted by the decoder.
pub const MAX_PROOF_LENGTH: usize = (MAX_TREE_HEIGHT - SEAL_HEIGHT) as usize;

const WORD: usize = 32;
const HEAD_WORDS: usize = 10;

/// Encoded size of an answer carrying `proof_len` siblings.
pub fn encoded_len(proof_len: usize) -> usize {
    (HEAD_WORDS + UNITS_PER_SEAL + 1 + proof_len) * WORD
}

/// Encode an answer.
///
/// # Errors
///
/// Returns [`TypesError::SealedDataLength`] unless `sealed_data` holds exactly
/// one seal batch, and [`TypesError::ProofTooLong`] for oversized proofs.
pub fn encode_answer(answer: &PoraAnswer) -> Result<Vec<u8>> {
    if answer.sealed_data.len() != UNITS_PER_SEAL {
        return Err(TypesError::SealedDataLength {
            expected: UNITS_PER_SEAL,
            actual: answer.sealed_data.len(),
        });
    }
    if answer.merkle_proof.len() > MAX_PROOF_LENGTH {
        return Err(TypesError::ProofTooLong(answer.merkle_proof.len()));
    }

    let mut out = Vec::with_capacity(encoded_len(answer.merkle_proof.len()));
    out.extend_from_slice(&answer.context_digest);
    out.extend_from_slice(&answer.nonce);
    out.extend_from_slice(&answer.miner_id);
    out.extend_from_slice(&encode_u256(answer.range.start_position));
    out.extend_from_slice(&encode_u256(answer.range.mine_length));
    out.extend_from_slice(&encode_u256(answer.range.shard_id));
    out.extend_from_slice(&encode_u256(answer.range.shard_mask));
    out.extend_from_slice(&encode_u256(answer.recall_position));
    out.extend_from_slice(&encode_u256(answer.seal_offset));
    out.extend_from_slice(&answer.sealed_context_digest);
    for unit in &answer.sealed_data {
        out.extend_from_slice(unit);
    }
    out.extend_from_slice(&encode_u256(answer.merkle_proof.len() as u64));
    for sibling in &answer.merkle_proof {
        out.extend_from_slice(sibling);
    }
    Ok(out)
}

/// Decode an answer, rejecting truncated, oversized or trailing input.
///
/// # Errors
///
/// Returns [`TypesError::Truncated`], [`TypesError::TrailingBytes`],
/// [`TypesError::ProofTooLong`] or [`TypesError::Word`] when a numeric field
/// does not fit in 64 bits.
pub fn decode_answer(data: &[u8]) -> Result<PoraAnswer> {
    let mut reader = WordReader { data, pos: 0 };

    let context_digest = reader.word()?;
    let nonce = reader.word()?;
    let miner_id = reader.word()?;
    let range = RecallRange {
        start_position: reader.u64()?,
        mine_length: reader.u64()?,
        shard_id: reader.u64()?,
        shard_mask: reader.u64()?,
    };
    let recall_position = reader.u64()?;
    let seal_offset = reader.u64()?;
    let sealed_context_digest = reader.word()?;

    let mut sealed_data = Vec::with_capacity(UNITS_PER_SEAL);
    for _ in 0..UNITS_PER_SEAL {
        sealed_data.push(reader.word()?);
    }

    let proof_len = reader.u64()?;
    if proof_len > MAX_PROOF_LENGTH as u64 {
        return Err(TypesError::ProofTooLong(proof_len as usize));
    }
    let mut merkle_proof = Vec::with_capacity(proof_len as usize);
    for _ in 0..proof_len {
        merkle_proof.push(reader.word()?);
    }

    let rest = data.len() - reader.pos;
    if rest != 0 {
        return Err(TypesError::TrailingBytes(rest));
    }

    Ok(PoraAnswer {
        context_digest,
        nonce,
        miner_id,
        range,
        recall_position,
        seal_offset,
        sealed_context_digest,
        sealed_data,
        merkle_proof,
    })
}

struct WordReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl WordReader<'_> {
    fn word(&mut self) -> Result<Hash> {
        let end = self.pos + WORD;
        let bytes = self.data.get(self.pos..end).ok_or(TypesError::Truncated {
            needed: end,
            available: self.data.len(),
        })?;
        self.pos = end;
        Ok(to_word(bytes)?)
    }

    fn u64(&mut self) -> Result<u64> {
        let word = self.word()?;
        Ok(decode_u64(&word)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(proof_len: usize) -> PoraAnswer {
        PoraAnswer {
            context_digest: [0x11; 32],
            nonce: [0x22; 32],
            miner_id: [0x33; 32],
            range: RecallRange {
                start_position: 1 << 25,
                mine_length: 1 << 30,
                shard_id: 3,
                shard_mask: u64::MAX << 2,
            },
            recall_position: (1 << 25) + 7 * 1024 + 11 * 16,
            seal_offset: 11,
            sealed_context_digest: [0x44; 32],
            sealed_data: (0..128u8).map(|i| [i; 32]).collect(),
            merkle_proof: (0..proof_len as u8).map(|i| [0x80 | i; 32]).collect(),
        }
    }

    #[test]
    fn test_encode_layout() {
        let answer = sample(3);
        let bytes = encode_answer(&answer).expect("encode");
        assert_eq!(bytes.len(), encoded_len(3));
        assert_eq!(&bytes[..32], &[0x11; 32]);
        // shard_mask word
        assert_eq!(&bytes[6 * 32 + 24..7 * 32], &(u64::MAX << 2).to_be_bytes());
        // first sealed unit follows the ten head words
        assert_eq!(&bytes[10 * 32..11 * 32], &[0u8; 32]);
        assert_eq!(bytes[(10 + 128) * 32 + 31], 3);
    }

    #[test]
    fn test_decode_inverts_encode() {
        let answer = sample(12);
        let bytes = encode_answer(&answer).expect("encode");
        assert_eq!(decode_answer(&bytes).expect("decode"), answer);
    }

    #[test]
    fn test_decode_truncated() {
        let bytes = encode_answer(&sample(2)).expect("encode");
        let err = decode_answer(&bytes[..bytes.len() - 1]).expect_err("truncated");
        assert!(matches!(err, TypesError::Truncated { .. }));
    }

    #[test]
    fn test_decode_trailing_bytes() {
        let mut bytes = encode_answer(&sample(2)).expect("encode");
        bytes.push(0);
        assert!(matches!(
            decode_answer(&bytes),
            Err(TypesError::TrailingBytes(1))
        ));
    }

    #[test]
    fn test_decode_rejects_wide_number() {
        let mut bytes = encode_answer(&sample(0)).expect("encode");
        // high byte of the recall_position word
        bytes[7 * 32] = 1;
        assert!(matches!(decode_answer(&bytes), Err(TypesError::Word(_))));
    }

    #[test]
    fn test_decode_rejects_long_proof() {
        let mut bytes = encode_answer(&sample(0)).expect("encode");
        let len_word = (10 + 128) * 32;
        bytes[len_word + 31] = (MAX_PROOF_LENGTH + 1) as u8;
        assert!(matches!(
            decode_answer(&bytes),
            Err(TypesError::ProofTooLong(_))
        ));
    }

    #[test]
    fn test_encode_rejects_partial_seal() {
        let mut answer = sample(0);
        answer.sealed_data.pop();
        assert!(matches!(
            encode_answer(&answer),
            Err(TypesError::SealedDataLength { expected: 128, actual: 127 })
        ));
    }
}
