//! # pora-flow
//!
//! The flow: an append-only log of every sector ever submitted, summarised by
//! an incremental Merkle accumulator, plus the per-epoch mining contexts
//! derived from it.
//!
//! Position 0 of the flow is a sentinel holding 32 zero bytes, so a flow that
//! holds `n` sectors has length `n + 1`. Every gap, whether alignment padding
//! or the tail of the tree, is filled with the hash of an all-zero sector.
//!
//! ## Modules
//!
//! - [`merkle`] — Incremental Merkle accumulator with per-height pending slots.
//! - [`history`] — Fixed-capacity ring buffer of context digests.
//! - [`tree`] — Full in-memory flow tree for proofs and cross-checks.
//! - [`flow`] — Submission handling, epoch rollover and mining contexts.

pub mod flow;
pub mod history;
pub mod merkle;
pub mod tree;

pub use flow::{Flow, FlowConfig, FlowProvider};

/// Error types for flow operations.
#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    /// A node was pushed at a position not aligned to its height.
    #[error("node of height {height} is not aligned at position {position}")]
    Alignment { position: u64, height: u32 },

    /// Node height above the configured tree height.
    #[error("invalid node height {height}, maximum is {max}")]
    InvalidHeight { height: u32, max: u32 },

    /// Appending would exceed the tree capacity.
    #[error("flow capacity exceeded: {required} sectors, capacity {capacity}")]
    CapacityExceeded { required: u64, capacity: u64 },

    /// Submission failed validation.
    #[error("invalid submission: {0}")]
    InvalidSubmission(String),

    /// Position outside the flow.
    #[error("position {position} out of range, flow length {length}")]
    PositionOutOfRange { position: u64, length: u64 },

    /// Digest history slot has been evicted or never written.
    #[error("history index {0} unavailable")]
    UnavailableIndex(u64),

    /// No epoch range recorded for a context digest.
    #[error("unknown context digest {0}")]
    UnknownContextDigest(String),

    /// Invalid configuration value.
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

/// Convenience result type for flow operations.
pub type Result<T> = std::result::Result<T, FlowError>;
