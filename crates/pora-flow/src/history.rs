//! Ring buffer of recent context digests.
//!
//! Indices grow without bound; only the last `capacity` of them are readable.
//! After `k` inserts the available window is `[max(0, k - capacity), k)`.

use std::collections::HashMap;

use pora_types::Hash;

use crate::{FlowError, Result};

#[derive(Clone, Debug)]
pub struct DigestHistory {
    capacity: usize,
    slots: Vec<Hash>,
    next_index: u64,
    latest_index: HashMap<Hash, u64>,
}

impl DigestHistory {
    /// # Errors
    ///
    /// Returns [`FlowError::InvalidConfig`] for a zero capacity.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(FlowError::InvalidConfig(
                "digest history capacity must be positive".into(),
            ));
        }
        Ok(Self {
            capacity,
            slots: Vec::with_capacity(capacity),
            next_index: 0,
            latest_index: HashMap::new(),
        })
    }

    /// Append a digest.
    ///
    /// # Returns
    ///
    /// The digest's index, and the digest that fell out of the window, if any.
    pub fn insert(&mut self, digest: Hash) -> (u64, Option<Hash>) {
        let index = self.next_index;
        let slot = self.slot(index);
        let evicted = if self.slots.len() < self.capacity {
            self.slots.push(digest);
            None
        } else {
            let old = std::mem::replace(&mut self.slots[slot], digest);
            let old_index = index - self.capacity as u64;
            if self.latest_index.get(&old) == Some(&old_index) {
                self.latest_index.remove(&old);
            }
            Some(old)
        };
        self.latest_index.insert(digest, index);
        self.next_index += 1;
        (index, evicted)
    }

    /// Digest stored at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::UnavailableIndex`] for evicted or future indices.
    pub fn at(&self, index: u64) -> Result<Hash> {
        if !self.available(index) {
            return Err(FlowError::UnavailableIndex(index));
        }
        Ok(self.slots[self.slot(index)])
    }

    pub fn available(&self, index: u64) -> bool {
        index < self.next_index && self.next_index - index <= self.capacity as u64
    }

    /// Whether `digest` is inside the window.
    pub fn contains(&self, digest: &Hash) -> bool {
        self.latest_index.contains_key(digest)
    }

    /// Number of digests ever inserted.
    pub fn len(&self) -> u64 {
        self.next_index
    }

    pub fn is_empty(&self) -> bool {
        self.next_index == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn slot(&self, index: u64) -> usize {
        (index % self.capacity as u64) as usize
    }
}
