//! Full in-memory flow tree.
//!
//! Keeps every leaf hash so it can answer Merkle proofs for any position.
//! Miners hold one of these over the data they store; the ledger only needs
//! the [`crate::merkle::IncrementalMerkle`] accumulator. Both produce the same
//! root for the same sequence of leaves.

use pora_crypto::keccak::{hash_pair, sector_leaf, ZERO_HASH};
use pora_types::constants::BYTES_PER_SECTOR;
use pora_types::submission::{Submission, SubmissionNode};
use pora_types::Hash;

use crate::merkle::{bit_length, zero_hashes};
use crate::{FlowError, Result};

#[derive(Clone, Debug)]
pub struct FlowTree {
    leaves: Vec<Hash>,
    zeros: Vec<Hash>,
}

impl Default for FlowTree {
    fn default() -> Self {
        Self::new()
    }
}

impl FlowTree {
    /// A tree holding only the sentinel.
    pub fn new() -> Self {
        Self {
            leaves: vec![ZERO_HASH],
            zeros: zero_hashes(64),
        }
    }

    /// Number of leaves, sentinel included.
    pub fn len(&self) -> u64 {
        self.leaves.len() as u64
    }

    /// Never true: the sentinel is always present.
    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    pub fn leaf(&self, position: u64) -> Option<Hash> {
        self.leaves.get(position as usize).copied()
    }

    /// Pad with empty leaves up to the next multiple of `2^height`.
    pub fn pad_to(&mut self, height: u32) {
        let target = self.len().next_multiple_of(1u64 << height);
        self.leaves.resize(target as usize, self.zeros[0]);
    }

    /// Append leaf hashes, returning the position of the first one.
    pub fn append_leaves(&mut self, leaves: &[Hash]) -> u64 {
        let start = self.len();
        self.leaves.extend_from_slice(leaves);
        start
    }

    /// Hash raw sector data into leaves and append them.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::InvalidSubmission`] unless `data` is a whole number
    /// of sectors.
    pub fn append_sectors(&mut self, data: &[u8]) -> Result<u64> {
        let leaves = sector_leaves(data)?;
        Ok(self.append_leaves(&leaves))
    }

    /// Append a segment the way the flow does: pad to the first node's
    /// height, then append the leaves.
    ///
    /// # Returns
    ///
    /// The flow position of the segment.
    pub fn append_segment(&mut self, leaves: &[Hash]) -> u64 {
        if let Some(first) = segment_nodes(leaves).first() {
            self.pad_to(first.height);
        }
        self.append_leaves(leaves)
    }

    /// Height of the committed tree, `bitLength(len - 1)`.
    pub fn height(&self) -> u32 {
        bit_length(self.len() - 1)
    }

    /// Root over all leaves, padded with empty subtrees to `2^height`.
    pub fn root(&self) -> Hash {
        let layers = self.layers();
        layers
            .last()
            .and_then(|top| top.first().copied())
            .unwrap_or(ZERO_HASH)
    }

    /// Sibling hashes for the leaf at `position`, from the leaf upward.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::PositionOutOfRange`] past the last leaf.
    pub fn proof(&self, position: u64) -> Result<Vec<Hash>> {
        self.proof_at_height(position, 0)
    }

    /// Sibling hashes for the height-`height` subtree containing `position`,
    /// from that subtree upward to the root.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::PositionOutOfRange`] past the last leaf and
    /// [`FlowError::InvalidHeight`] above the tree height.
    pub fn proof_at_height(&self, position: u64, height: u32) -> Result<Vec<Hash>> {
        if position >= self.len() {
            return Err(FlowError::PositionOutOfRange {
                position,
                length: self.len(),
            });
        }
        if height > self.height() {
            return Err(FlowError::InvalidHeight {
                height,
                max: self.height(),
            });
        }
        let layers = self.layers();
        let mut index = (position >> height) as usize;
        let mut siblings = Vec::with_capacity((self.height() - height) as usize);
        for (level, layer) in layers
            .iter()
            .enumerate()
            .take(layers.len() - 1)
            .skip(height as usize)
        {
            let sibling = layer
                .get(index ^ 1)
                .copied()
                .unwrap_or(self.zeros[level]);
            siblings.push(sibling);
            index >>= 1;
        }
        Ok(siblings)
    }

    /// Root of the height-`height` subtree starting at `start`, padding
    /// missing leaves with the empty leaf.
    pub fn subtree_root(&self, start: u64, height: u32) -> Hash {
        let size = 1usize << height;
        let begin = (start as usize).min(self.leaves.len());
        let end = (begin + size).min(self.leaves.len());
        let mut layer: Vec<Hash> = self.leaves[begin..end].to_vec();
        layer.resize(size, self.zeros[0]);
        reduce(layer, &self.zeros)
    }

    /// Every level of the padded tree, leaves first, root last.
    fn layers(&self) -> Vec<Vec<Hash>> {
        let height = self.height() as usize;
        let mut layers = Vec::with_capacity(height + 1);
        layers.push(self.leaves.clone());
        for level in 0..height {
            let below = &layers[level];
            let next: Vec<Hash> = below
                .chunks(2)
                .map(|pair| match pair {
                    [left, right] => hash_pair(left, right),
                    [left] => hash_pair(left, &self.zeros[level]),
                    _ => self.zeros[level + 1],
                })
                .collect();
            layers.push(next);
        }
        layers
    }
}

/// Fold a power-of-two layer down to its root.
fn reduce(mut layer: Vec<Hash>, zeros: &[Hash]) -> Hash {
    let mut level = 0;
    while layer.len() > 1 {
        layer = layer
            .chunks(2)
            .map(|pair| match pair {
                [left, right] => hash_pair(left, right),
                [left] => hash_pair(left, &zeros[level]),
                _ => zeros[level + 1],
            })
            .collect();
        level += 1;
    }
    layer.first().copied().unwrap_or(zeros[0])
}

/// Hash sector data into leaves.
///
/// # Errors
///
/// Returns [`FlowError::InvalidSubmission`] for empty or partial-sector data.
pub fn sector_leaves(data: &[u8]) -> Result<Vec<Hash>> {
    if data.is_empty() || !data.len().is_multiple_of(BYTES_PER_SECTOR) {
        return Err(FlowError::InvalidSubmission(format!(
            "data length {} is not a positive multiple of {BYTES_PER_SECTOR}",
            data.len()
        )));
    }
    Ok(data.chunks(BYTES_PER_SECTOR).map(sector_leaf).collect())
}

/// Split a segment into aligned subtree roots, largest first.
///
/// A segment of `n` leaves becomes one node per set bit of `n`.
pub fn segment_nodes(leaves: &[Hash]) -> Vec<SubmissionNode> {
    let zeros = zero_hashes(u64::BITS);
    let mut nodes = Vec::new();
    let mut offset = 0usize;
    let n = leaves.len() as u64;
    for height in (0..u64::BITS).rev() {
        if n & (1u64 << height) == 0 {
            continue;
        }
        let size = 1usize << height;
        let root = reduce(leaves[offset..offset + size].to_vec(), &zeros);
        nodes.push(SubmissionNode { root, height });
        offset += size;
    }
    nodes
}

/// Build the flow submission for a segment of leaves.
pub fn segment_submission(leaves: &[Hash]) -> Submission {
    Submission {
        length: leaves.len() as u64,
        tags: Vec::new(),
        nodes: segment_nodes(leaves),
    }
}

/// Recompute a root from a node, its index at its height, and its siblings.
pub fn root_from_proof(node: Hash, mut index: u64, siblings: &[Hash]) -> Hash {
    let mut current = node;
    for sibling in siblings {
        current = if index & 1 == 1 {
            hash_pair(sibling, &current)
        } else {
            hash_pair(&current, sibling)
        };
        index >>= 1;
    }
    current
}
