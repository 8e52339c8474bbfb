//! # pora-mine
//!
//! Proof of Random Access over the flow.
//!
//! A miner proves it still holds the data under a committed flow root by
//! recalling a pseudorandom seal batch, selected by a nonce-dependent scratch
//! pad, and showing that the batch mixed with that pad hashes below the
//! current target.
//!
//! ## Modules
//!
//! - [`seal`] — Chained-hash sealing of sector data to a miner and context
//! - [`scratch_pad`] — Pad seed, pad expansion, recall offset and mixing
//! - [`quality`] — Recall position, quality score and difficulty targets
//! - [`range`] — Mining range and shard checks
//! - [`difficulty`] — Per-epoch target controller
//! - [`registry`] — Miner records and beneficiaries
//! - [`validator`] — The ordered answer verification pipeline
//! - [`miner`] — Off-ledger nonce search producing answers
//! - [`storage`] — Sealed batch storage consulted by the miner

pub mod difficulty;
pub mod miner;
pub mod quality;
pub mod range;
pub mod registry;
pub mod scratch_pad;
pub mod seal;
pub mod storage;
pub mod validator;

use primitive_types::U256;

/// Broad class of a rejection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Misaligned, overflowing or undersized range, or malformed answer.
    Structural,
    /// Invalid shard parameters.
    Shard,
    /// Answer not bound to the current context or its sealing epoch.
    Binding,
    /// Merkle proof does not reach the flow root.
    Proof,
    /// Quality above the target.
    Quality,
    /// Caller not allowed to perform the operation.
    Permission,
    /// History slot evicted or never written.
    Index,
    /// Already mined this epoch, or quota exhausted.
    Conflict,
    /// Invalid configuration.
    Config,
}

/// Error types for mining and answer validation.
#[derive(Clone, Debug, thiserror::Error)]
pub enum MineError {
    /// `start + mine_length` exceeds the flow length.
    #[error("mining range overflow: {start} + {length} > {flow_length}")]
    RangeOverflow {
        start: u64,
        length: u64,
        flow_length: u64,
    },

    /// Range longer than the sharded maximum.
    #[error("mining range too long: {length} > {max}")]
    RangeTooLong { length: u64, max: u64 },

    /// Range start not aligned.
    #[error("start position is not aligned: {0}")]
    StartNotAligned(u64),

    /// Range shorter than the required minimum.
    #[error("mining range too short: {length} < {min}")]
    RangeTooShort { length: u64, min: u64 },

    /// Seal offset outside the load.
    #[error("invalid seal offset {0}")]
    InvalidSealOffset(u64),

    /// Recall position inconsistent with the range or seal offset.
    #[error("recall position {0} is not a valid seal position in the range")]
    RecallOutsideRange(u64),

    /// Sealed data is not one seal batch.
    #[error("sealed data has {actual} units, expected {expected}")]
    MalformedSealedData { expected: usize, actual: usize },

    /// Derived load index past the end of the range.
    #[error("recall position out of bound: load {offset} of {loads}")]
    RecallOutOfBound { offset: u64, loads: u64 },

    /// Shard id overlaps the shard mask.
    #[error("masked bits should be zero: shard id {shard_id:#x}, mask {shard_mask:#x}")]
    MaskedBitsNonZero { shard_id: u64, shard_mask: u64 },

    /// Shard mask is not a block of high ones.
    #[error("invalid shard mask {0:#x}")]
    InvalidShardMask(u64),

    /// More shards than allowed.
    #[error("too many shards: {shards} > {max}")]
    TooManyShards { shards: u64, max: u64 },

    /// No epoch has started.
    #[error("mining has not started")]
    MiningNotStarted,

    /// Answer built for a different context.
    #[error("context digest mismatch")]
    ContextDigestMismatch,

    /// Sealed context unknown, or its range does not cover the recalled batch.
    #[error("invalid sealed context digest: {0}")]
    InvalidSealedContextDigest(String),

    /// Proof root differs from the flow root.
    #[error("merkle root mismatch")]
    MerkleRootMismatch,

    /// Proof length does not match the flow tree height.
    #[error("merkle proof length {actual}, expected {expected}")]
    ProofLengthMismatch { expected: usize, actual: usize },

    /// Claimed recall position differs from the derived one.
    #[error("recall position mismatch: claimed {claimed}, derived {derived}")]
    RecallPositionMismatch { claimed: u64, derived: u64 },

    /// Quality above the target.
    #[error("do not reach target quality: {quality:#x} > {target:#x}")]
    InsufficientQuality { quality: U256, target: U256 },

    /// Miner not registered.
    #[error("unknown miner {0}")]
    UnknownMiner(String),

    /// Caller is not the miner's beneficiary.
    #[error("caller is not the beneficiary of miner {0}")]
    NotBeneficiary(String),

    /// Digest history slot unavailable.
    #[error("history unavailable: {0}")]
    HistoryUnavailable(String),

    /// Miner storage holds no sealed batch at this position.
    #[error("no sealed data at position {0}")]
    MissingSealData(u64),

    /// Miner already has an accepted answer in this epoch.
    #[error("miner {miner} already mined in epoch {epoch}")]
    AlreadyMined { miner: String, epoch: u64 },

    /// Epoch submission quota exhausted.
    #[error("submission limit reached for epoch {epoch}: {limit}")]
    SubmissionLimitReached { epoch: u64, limit: u64 },

    /// Miner id already registered.
    #[error("miner {0} already registered")]
    MinerAlreadyRegistered(String),

    /// Invalid configuration value.
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

impl MineError {
    /// Broad class of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::RangeOverflow { .. }
            | Self::RangeTooLong { .. }
            | Self::StartNotAligned(_)
            | Self::RangeTooShort { .. }
            | Self::InvalidSealOffset(_)
            | Self::RecallOutsideRange(_)
            | Self::MalformedSealedData { .. }
            | Self::RecallOutOfBound { .. } => ErrorKind::Structural,
            Self::MaskedBitsNonZero { .. }
            | Self::InvalidShardMask(_)
            | Self::TooManyShards { .. } => ErrorKind::Shard,
            Self::MiningNotStarted
            | Self::ContextDigestMismatch
            | Self::InvalidSealedContextDigest(_) => ErrorKind::Binding,
            Self::MerkleRootMismatch | Self::ProofLengthMismatch { .. } => ErrorKind::Proof,
            Self::RecallPositionMismatch { .. } | Self::InsufficientQuality { .. } => {
                ErrorKind::Quality
            }
            Self::UnknownMiner(_) | Self::NotBeneficiary(_) => ErrorKind::Permission,
            Self::HistoryUnavailable(_) | Self::MissingSealData(_) => ErrorKind::Index,
            Self::AlreadyMined { .. }
            | Self::SubmissionLimitReached { .. }
            | Self::MinerAlreadyRegistered(_) => ErrorKind::Conflict,
            Self::InvalidConfig(_) => ErrorKind::Config,
        }
    }
}

impl From<pora_flow::FlowError> for MineError {
    fn from(err: pora_flow::FlowError) -> Self {
        match err {
            pora_flow::FlowError::UnavailableIndex(_) => Self::HistoryUnavailable(err.to_string()),
            pora_flow::FlowError::UnknownContextDigest(_) => {
                Self::InvalidSealedContextDigest(err.to_string())
            }
            other => Self::InvalidConfig(other.to_string()),
        }
    }
}

/// Convenience result type for mining operations.
pub type Result<T> = std::result::Result<T, MineError>;
