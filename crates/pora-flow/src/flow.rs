//! Flow ledger state.
//!
//! Accepts submissions into the accumulator and, at every epoch boundary,
//! commits the root and publishes a new [`MineContext`]. Each context digest is
//! remembered together with the flow range it first covered, so the validator
//! can check that a sealed batch was sealed under a context that already
//! contained it.
//!
//! ```text
//! epoch(block)       = (block - first_block) / blocks_per_epoch + 1
//! range(context_k)   = [context_{k-1}.flow_length, context_k.flow_length)
//! ```

use std::collections::HashMap;

use pora_types::context::{EpochRange, MineContext};
use pora_types::submission::{Submission, SubmissionReceipt};
use pora_types::Hash;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::history::DigestHistory;
use crate::merkle::{IncrementalMerkle, DEFAULT_MAX_HEIGHT};
use crate::{FlowError, Result};

/// Read access to the flow, as needed by the mining validator.
pub trait FlowProvider {
    /// Context of the current epoch.
    fn current_context(&self) -> MineContext;

    /// Flow range first covered by the context with `digest`.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::UnknownContextDigest`] for digests never published
    /// or already evicted from the history.
    fn epoch_range(&self, digest: &Hash) -> Result<EpochRange>;

    /// Context digest published at history `index`.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::UnavailableIndex`] for evicted or future indices.
    fn context_digest_at(&self, index: u64) -> Result<Hash>;
}

/// Flow configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FlowConfig {
    /// Blocks per epoch.
    #[serde(default = "default_blocks_per_epoch")]
    pub blocks_per_epoch: u64,
    /// Block at which epoch 1 starts.
    #[serde(default)]
    pub first_block: u64,
    /// Context digests kept for sealed-context lookups.
    #[serde(default = "default_root_history")]
    pub root_history: usize,
    /// Tree height; capacity is `2^max_height` sectors.
    #[serde(default = "default_max_height")]
    pub max_height: u32,
}

fn default_blocks_per_epoch() -> u64 {
    100
}

fn default_root_history() -> usize {
    1000
}

fn default_max_height() -> u32 {
    DEFAULT_MAX_HEIGHT
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            blocks_per_epoch: default_blocks_per_epoch(),
            first_block: 0,
            root_history: default_root_history(),
            max_height: default_max_height(),
        }
    }
}

/// The flow ledger.
#[derive(Clone, Debug)]
pub struct Flow {
    config: FlowConfig,
    tree: IncrementalMerkle,
    history: DigestHistory,
    epoch_ranges: HashMap<Hash, EpochRange>,
    context: MineContext,
    submissions: u64,
}

impl Flow {
    /// # Errors
    ///
    /// Returns [`FlowError::InvalidConfig`] for a zero epoch length, an empty
    /// history or an unsupported tree height.
    pub fn new(config: FlowConfig) -> Result<Self> {
        if config.blocks_per_epoch == 0 {
            return Err(FlowError::InvalidConfig(
                "blocks_per_epoch must be positive".into(),
            ));
        }
        let tree = IncrementalMerkle::new(config.max_height)?;
        let history = DigestHistory::new(config.root_history)?;
        Ok(Self {
            config,
            tree,
            history,
            epoch_ranges: HashMap::new(),
            context: MineContext::genesis(),
            submissions: 0,
        })
    }

    pub fn config(&self) -> &FlowConfig {
        &self.config
    }

    /// Append a segment.
    ///
    /// The first node is placed at the next multiple of its size, the gap
    /// filled with empty subtrees; every later node must then be aligned
    /// without further padding. Validation happens before any mutation.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::InvalidSubmission`], [`FlowError::InvalidHeight`]
    /// or [`FlowError::CapacityExceeded`].
    pub fn submit(&mut self, submission: &Submission) -> Result<SubmissionReceipt> {
        let start = self.validate_submission(submission)?;
        let before = self.tree.current_length();

        let mut nodes = submission.nodes.iter();
        if let Some(first) = nodes.next() {
            self.tree.insert_node(first.root, first.height)?;
        }
        for node in nodes {
            self.tree.push_node(node.root, node.height)?;
        }

        let receipt = SubmissionReceipt {
            index: self.submissions,
            start_position: start,
            appended_length: self.tree.current_length() - before,
            total_length: self.tree.current_length(),
        };
        self.submissions += 1;
        info!(
            index = receipt.index,
            start = receipt.start_position,
            length = submission.length,
            total = receipt.total_length,
            "flow submission appended"
        );
        Ok(receipt)
    }

    /// Advance ledger time.
    ///
    /// # Returns
    ///
    /// The new context when `number` opens a new epoch.
    pub fn on_block(&mut self, number: u64, block_digest: Hash) -> Option<MineContext> {
        if number < self.config.first_block {
            return None;
        }
        let epoch = (number - self.config.first_block) / self.config.blocks_per_epoch + 1;
        if epoch <= self.context.epoch {
            return None;
        }
        Some(self.make_context(epoch, number, block_digest))
    }

    /// Commit pending nodes and publish a context for `epoch`.
    fn make_context(&mut self, epoch: u64, number: u64, block_digest: Hash) -> MineContext {
        let root = self.tree.commit_root();
        let length = self.tree.current_length();
        let context = MineContext::new(epoch, number, root, length, block_digest);

        let range = EpochRange {
            start: self.context.flow_length,
            end: length,
        };
        let (index, evicted) = self.history.insert(context.digest);
        if let Some(old) = evicted {
            if !self.history.contains(&old) {
                self.epoch_ranges.remove(&old);
            }
        }
        self.epoch_ranges.insert(context.digest, range);

        info!(
            epoch,
            block = number,
            flow_length = length,
            history_index = index,
            "new mining context"
        );
        self.context = context.clone();
        context
    }

    /// Committed root.
    pub fn root(&self) -> Hash {
        self.tree.root()
    }

    /// Current flow length in sectors, uncommitted nodes included.
    pub fn current_length(&self) -> u64 {
        self.tree.current_length()
    }

    pub fn unstaged_height(&self) -> u32 {
        self.tree.unstaged_height()
    }

    /// Number of accepted submissions.
    pub fn submission_count(&self) -> u64 {
        self.submissions
    }

    pub fn epoch(&self) -> u64 {
        self.context.epoch
    }

    /// Dry-run placement of a submission.
    ///
    /// # Returns
    ///
    /// The position its first node will land at.
    fn validate_submission(&self, submission: &Submission) -> Result<u64> {
        let (first, rest) = submission.nodes.split_first().ok_or_else(|| {
            FlowError::InvalidSubmission("submission has no nodes".into())
        })?;

        let max = self.tree.max_height();
        if let Some(bad) = submission.nodes.iter().find(|n| n.height > max) {
            return Err(FlowError::InvalidHeight {
                height: bad.height,
                max,
            });
        }

        let span = submission.node_span();
        let last = submission.nodes.last().map_or(0, |n| 1u64 << n.height);
        if submission.length == 0
            || submission.length > span
            || submission.length <= span - last
        {
            debug!(
                length = submission.length,
                span, "submission length does not match its nodes"
            );
            return Err(FlowError::InvalidSubmission(format!(
                "length {} does not fit nodes spanning {span} sectors",
                submission.length
            )));
        }

        let capacity = self.tree.capacity();
        let exceeded = |required: u64| FlowError::CapacityExceeded { required, capacity };
        let start = self
            .tree
            .current_length()
            .next_multiple_of(1u64 << first.height);
        let mut position = start
            .checked_add(1u64 << first.height)
            .ok_or_else(|| exceeded(u64::MAX))?;
        for node in rest {
            let size = 1u64 << node.height;
            if !position.is_multiple_of(size) {
                return Err(FlowError::InvalidSubmission(format!(
                    "node of height {} would be misaligned at {position}",
                    node.height
                )));
            }
            position = position
                .checked_add(size)
                .ok_or_else(|| exceeded(u64::MAX))?;
        }
        if position > capacity {
            return Err(exceeded(position));
        }
        Ok(start)
    }
}

impl FlowProvider for Flow {
    fn current_context(&self) -> MineContext {
        self.context.clone()
    }

    fn epoch_range(&self, digest: &Hash) -> Result<EpochRange> {
        self.epoch_ranges
            .get(digest)
            .copied()
            .ok_or_else(|| FlowError::UnknownContextDigest(hex_prefix(digest)))
    }

    fn context_digest_at(&self, index: u64) -> Result<Hash> {
        self.history.at(index)
    }
}

fn hex_prefix(digest: &Hash) -> String {
    digest[..8].iter().map(|b| format!("{b:02x}")).collect()
}
