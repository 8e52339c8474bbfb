//! Incremental Merkle accumulator.
//!
//! The accumulator keeps one pending slot per height, like a binary counter:
//! bit `h` of the flow length is set exactly when slot `h` holds the left
//! sibling of a height-`h` subtree that is still waiting for its right half.
//! Pushing a node carries upward through occupied slots.
//!
//! ```text
//! push(node, h):  while slot[h] occupied { node = keccak(slot[h] || node); slot[h] = None; h += 1 }
//!                 slot[h] = node
//! commit:         H = bitLength(length - 1)
//!                 fold slots 0..H bottom-up, padding absent halves with zero[h]
//! zero[0]         = keccak(0^256)
//! zero[h + 1]     = keccak(zero[h] || zero[h])
//! ```
//!
//! Pushes only touch the pending slots; the published root changes on
//! [`IncrementalMerkle::commit_root`].

use pora_crypto::keccak::{hash_pair, sector_leaf, ZERO_HASH};
use pora_types::constants::{BYTES_PER_SECTOR, MAX_TREE_HEIGHT};
use pora_types::Hash;
use tracing::trace;

use crate::{FlowError, Result};

/// Default tree height: 2^48 sectors (64 PiB).
pub const DEFAULT_MAX_HEIGHT: u32 = 48;

/// Hashes of all-empty subtrees, indexed by height.
pub fn zero_hashes(max_height: u32) -> Vec<Hash> {
    let mut zeros = Vec::with_capacity(max_height as usize + 1);
    let mut current = sector_leaf(&[0u8; BYTES_PER_SECTOR]);
    zeros.push(current);
    for _ in 0..max_height {
        current = hash_pair(&current, &current);
        zeros.push(current);
    }
    zeros
}

/// Number of bits needed to represent `value`.
pub fn bit_length(value: u64) -> u32 {
    u64::BITS - value.leading_zeros()
}

/// Incremental Merkle accumulator over the flow.
#[derive(Clone, Debug)]
pub struct IncrementalMerkle {
    max_height: u32,
    length: u64,
    pending: Vec<Option<Hash>>,
    zeros: Vec<Hash>,
    unstaged_height: u32,
    root: Hash,
}

impl IncrementalMerkle {
    /// Create an accumulator holding only the sentinel.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::InvalidConfig`] if `max_height` is 0 or leaves no
    /// room for a `u64` capacity.
    pub fn new(max_height: u32) -> Result<Self> {
        if max_height == 0 || max_height >= MAX_TREE_HEIGHT {
            return Err(FlowError::InvalidConfig(format!(
                "max tree height must be in 1..{MAX_TREE_HEIGHT}, got {max_height}"
            )));
        }
        let mut pending = vec![None; max_height as usize + 1];
        pending[0] = Some(ZERO_HASH);
        Ok(Self {
            max_height,
            length: 1,
            pending,
            zeros: zero_hashes(max_height),
            unstaged_height: 1,
            root: ZERO_HASH,
        })
    }

    /// Insert a node of `height`, first padding the flow with empty subtrees
    /// up to the next multiple of `2^height`.
    ///
    /// # Returns
    ///
    /// The flow position of the inserted node.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::InvalidHeight`] or [`FlowError::CapacityExceeded`];
    /// the accumulator is untouched on error.
    pub fn insert_node(&mut self, hash: Hash, height: u32) -> Result<u64> {
        self.check_height(height)?;
        let size = 1u64 << height;
        let start = self.length.next_multiple_of(size);
        self.check_capacity(start, size)?;

        while self.length < start {
            let pad_height = self.length.trailing_zeros().min(height);
            self.push_node(self.zeros[pad_height as usize], pad_height)?;
        }
        self.push_node(hash, height)?;
        Ok(start)
    }

    /// Push a node of `height` at the current length, without padding.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::Alignment`] if the current length is not a multiple
    /// of `2^height`, plus the errors of [`Self::insert_node`].
    pub fn push_node(&mut self, hash: Hash, height: u32) -> Result<()> {
        self.check_height(height)?;
        let size = 1u64 << height;
        if !self.length.is_multiple_of(size) {
            return Err(FlowError::Alignment {
                position: self.length,
                height,
            });
        }
        self.check_capacity(self.length, size)?;

        let mut node = hash;
        let mut h = height as usize;
        while let Some(left) = self.pending[h].take() {
            node = hash_pair(&left, &node);
            h += 1;
        }
        self.pending[h] = Some(node);
        self.length += size;
        self.unstaged_height = self.unstaged_height.min(height + 1);
        trace!(height, length = self.length, "pushed flow node");
        Ok(())
    }

    /// Fold all pending nodes into the root.
    ///
    /// The committed tree has height `bitLength(length - 1)`; idempotent when
    /// nothing was pushed since the previous commit.
    pub fn commit_root(&mut self) -> Hash {
        let top = bit_length(self.length - 1);
        let mut acc: Option<Hash> = None;
        for h in 0..top as usize {
            acc = match (self.pending[h], acc) {
                (Some(left), Some(right)) => Some(hash_pair(&left, &right)),
                (Some(left), None) => Some(hash_pair(&left, &self.zeros[h])),
                (None, Some(left)) => Some(hash_pair(&left, &self.zeros[h])),
                (None, None) => None,
            };
        }
        self.root = match self.pending[top as usize] {
            Some(full) => full,
            None => acc.unwrap_or(self.zeros[top as usize]),
        };
        self.unstaged_height = top + 1;
        self.root
    }

    /// Root as of the last commit.
    pub fn root(&self) -> Hash {
        self.root
    }

    /// Flow length in sectors, sentinel included.
    pub fn current_length(&self) -> u64 {
        self.length
    }

    /// Lowest 1-based tree level whose hashes are not yet in the root.
    pub fn unstaged_height(&self) -> u32 {
        self.unstaged_height
    }

    pub fn max_height(&self) -> u32 {
        self.max_height
    }

    /// Sector capacity, `2^max_height`.
    pub fn capacity(&self) -> u64 {
        1u64 << self.max_height
    }

    /// Hash of an all-empty subtree of `height`.
    pub fn zero_hash(&self, height: u32) -> Option<Hash> {
        self.zeros.get(height as usize).copied()
    }

    fn check_height(&self, height: u32) -> Result<()> {
        if height > self.max_height {
            return Err(FlowError::InvalidHeight {
                height,
                max: self.max_height,
            });
        }
        Ok(())
    }

    fn check_capacity(&self, start: u64, size: u64) -> Result<()> {
        let required = start.saturating_add(size);
        if required > self.capacity() {
            return Err(FlowError::CapacityExceeded {
                required,
                capacity: self.capacity(),
            });
        }
        Ok(())
    }
}
