//! Mining context and recall range.
//!
//! ```text
//! context.digest = keccak(blockDigest || flowRoot || be256(flowLength))
//! subtaskDigest  = keccak(context.digest || context.blockDigest)
//! recallDigest   = keccak(be256(start) || be256(mineLength) || be256(shardId) || be256(shardMask))
//! ```

use pora_crypto::keccak::{keccak256_concat, KECCAK_EMPTY, ZERO_HASH};
use pora_crypto::word::encode_u256;
use serde::{Deserialize, Serialize};
use serde_with::serde_as;

use crate::Hash;

/// Snapshot of the flow taken at an epoch boundary. Miners must answer
/// against the current context.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MineContext {
    /// Epoch number; `0` means mining has not started.
    pub epoch: u64,
    /// Block number at which the epoch started.
    pub mine_start: u64,
    /// Committed flow root.
    #[serde_as(as = "serde_with::hex::Hex")]
    pub flow_root: Hash,
    /// Flow length in sectors, sentinel included.
    pub flow_length: u64,
    /// Digest of the block that opened the epoch.
    #[serde_as(as = "serde_with::hex::Hex")]
    pub block_digest: Hash,
    #[serde_as(as = "serde_with::hex::Hex")]
    pub digest: Hash,
}

impl MineContext {
    /// Build a context, deriving its digest.
    pub fn new(
        epoch: u64,
        mine_start: u64,
        flow_root: Hash,
        flow_length: u64,
        block_digest: Hash,
    ) -> Self {
        Self {
            epoch,
            mine_start,
            flow_root,
            flow_length,
            block_digest,
            digest: Self::compute_digest(&block_digest, &flow_root, flow_length),
        }
    }

    /// The context before the first epoch. Its digest is the hash of the
    /// empty string so it never collides with a real context.
    pub fn genesis() -> Self {
        Self {
            epoch: 0,
            mine_start: 0,
            flow_root: ZERO_HASH,
            flow_length: 0,
            block_digest: ZERO_HASH,
            digest: KECCAK_EMPTY,
        }
    }

    /// `keccak(blockDigest || flowRoot || be256(flowLength))`.
    pub fn compute_digest(block_digest: &Hash, flow_root: &Hash, flow_length: u64) -> Hash {
        keccak256_concat(&[block_digest, flow_root, &encode_u256(flow_length)])
    }

    /// Digest binding the pad seed to this context.
    pub fn subtask_digest(&self) -> Hash {
        keccak256_concat(&[&self.digest, &self.block_digest])
    }

    /// Whether mining is open in this context.
    pub fn is_started(&self) -> bool {
        self.epoch > 0
    }
}

/// The part of the flow a miner commits to recall from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecallRange {
    /// First sector of the range.
    pub start_position: u64,
    /// Range length in sectors.
    pub mine_length: u64,
    /// Shard this miner stores; must be zero under `shard_mask`.
    pub shard_id: u64,
    /// High ones select the load index bits taken from the pad.
    pub shard_mask: u64,
}

impl RecallRange {
    /// An unsharded range.
    pub fn full(start_position: u64, mine_length: u64) -> Self {
        Self {
            start_position,
            mine_length,
            shard_id: 0,
            shard_mask: u64::MAX,
        }
    }

    /// One past the last sector of the range.
    pub fn end_position(&self) -> u64 {
        self.start_position.saturating_add(self.mine_length)
    }

    pub fn digest(&self) -> Hash {
        keccak256_concat(&[
            &encode_u256(self.start_position),
            &encode_u256(self.mine_length),
            &encode_u256(self.shard_id),
            &encode_u256(self.shard_mask),
        ])
    }
}

/// Flow positions `[start, end)` first covered by a context.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochRange {
    pub start: u64,
    pub end: u64,
}

impl EpochRange {
    /// Whether the span `[position, position + len)` was completed inside this
    /// range, i.e. its last sector lies in `[start, end)`.
    pub fn completes_span(&self, position: u64, len: u64) -> bool {
        position
            .checked_add(len)
            .is_some_and(|span_end| self.start < span_end && span_end <= self.end)
    }
}
