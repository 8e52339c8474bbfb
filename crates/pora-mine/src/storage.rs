//! Sealed data storage used by the miner.
//!
//! A batch is sealed under the first context whose flow range completes it,
//! which is the context the validator will look up through
//! `sealed_context_digest`.

use pora_flow::tree::{sector_leaves, segment_submission, FlowTree};
use pora_types::constants::{BYTES_PER_SECTOR, SEAL_HEIGHT, SECTORS_PER_SEAL};
use pora_types::context::{EpochRange, MineContext};
use pora_types::submission::Submission;
use pora_types::{Hash, MinerId};
use tracing::debug;

use crate::seal::{seal, units_from_sectors};
use crate::{MineError, Result};

/// Storage a miner reads seal batches and proofs from.
pub trait MinerStorage {
    /// Digest of the context the batch at `position` is sealed under.
    fn sealing_context(&self, position: u64) -> Option<Hash>;

    /// Sealed units of the batch starting at `position`.
    fn read_seal(&self, position: u64) -> Option<Vec<Hash>>;

    /// Sibling hashes from the seal subtree at `position` to the flow root.
    ///
    /// # Errors
    ///
    /// Returns [`MineError::MissingSealData`] past the end of the flow.
    fn seal_proof(&self, position: u64) -> Result<Vec<Hash>>;
}

/// In-memory replica of the flow holding every appended segment.
///
/// Proofs are taken against the full local tree, so the replica must not run
/// ahead of the context being mined.
#[derive(Clone, Debug)]
pub struct LocalStorage {
    miner_id: MinerId,
    tree: FlowTree,
    /// `(start position, raw sector data)`, ordered by position.
    segments: Vec<(u64, Vec<u8>)>,
    /// Range each context completed, with its digest.
    contexts: Vec<(EpochRange, Hash)>,
}

impl LocalStorage {
    pub fn new(miner_id: MinerId) -> Self {
        Self {
            miner_id,
            tree: FlowTree::new(),
            segments: Vec::new(),
            contexts: Vec::new(),
        }
    }

    /// Store raw sector data as the next flow segment.
    ///
    /// # Returns
    ///
    /// The submission to append to the flow.
    ///
    /// # Errors
    ///
    /// Returns [`MineError::MalformedSealedData`] for empty or partial-sector data.
    pub fn append(&mut self, data: &[u8]) -> Result<Submission> {
        units_from_sectors(data)?;
        let leaves = sector_leaves(data).map_err(|_| MineError::MalformedSealedData {
            expected: BYTES_PER_SECTOR,
            actual: data.len(),
        })?;
        let start = self.tree.append_segment(&leaves);
        self.segments.push((start, data.to_vec()));
        debug!(start, sectors = leaves.len(), "segment stored");
        Ok(segment_submission(&leaves))
    }

    /// Record a newly published context.
    pub fn observe(&mut self, context: &MineContext) {
        let start = self.contexts.last().map_or(0, |(range, _)| range.end);
        if context.flow_length <= start {
            return;
        }
        self.contexts.push((
            EpochRange {
                start,
                end: context.flow_length,
            },
            context.digest,
        ));
    }

    /// Local flow length, sentinel included.
    pub fn flow_length(&self) -> u64 {
        self.tree.len()
    }

    pub fn root(&self) -> Hash {
        self.tree.root()
    }

    /// Raw data of one sector. Padding reads as zeros; the sentinel has none.
    pub fn sector(&self, position: u64) -> Option<&[u8]> {
        const ZERO_SECTOR: [u8; BYTES_PER_SECTOR] = [0u8; BYTES_PER_SECTOR];
        if position == 0 || position >= self.tree.len() {
            return None;
        }
        let idx = self.segments.partition_point(|(start, _)| *start <= position);
        if let Some((start, data)) = idx.checked_sub(1).and_then(|i| self.segments.get(i)) {
            let offset = (position - start) as usize * BYTES_PER_SECTOR;
            if let Some(sector) = data.get(offset..offset + BYTES_PER_SECTOR) {
                return Some(sector);
            }
        }
        Some(&ZERO_SECTOR)
    }
}

impl MinerStorage for LocalStorage {
    fn sealing_context(&self, position: u64) -> Option<Hash> {
        self.contexts
            .iter()
            .find(|(range, _)| range.completes_span(position, SECTORS_PER_SEAL))
            .map(|(_, digest)| *digest)
    }

    fn read_seal(&self, position: u64) -> Option<Vec<Hash>> {
        let context_digest = self.sealing_context(position)?;
        let mut data = Vec::with_capacity(SECTORS_PER_SEAL as usize * BYTES_PER_SECTOR);
        for p in position..position.checked_add(SECTORS_PER_SEAL)? {
            data.extend_from_slice(self.sector(p)?);
        }
        let units = units_from_sectors(&data).ok()?;
        Some(seal(&self.miner_id, &context_digest, position, &units))
    }

    fn seal_proof(&self, position: u64) -> Result<Vec<Hash>> {
        self.tree
            .proof_at_height(position, SEAL_HEIGHT)
            .map_err(|_| MineError::MissingSealData(position))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seal::unseal;

    fn data(sectors: usize, salt: u8) -> Vec<u8> {
        (0..sectors * BYTES_PER_SECTOR)
            .map(|i| (i as u8).wrapping_mul(31).wrapping_add(salt))
            .collect()
    }

    #[test]
    fn test_append_places_segment_like_flow() {
        let mut storage = LocalStorage::new([1u8; 32]);
        let submission = storage.append(&data(32, 1)).expect("append");
        assert_eq!(submission.length, 32);
        assert_eq!(storage.flow_length(), 64);
        assert!(storage.sector(0).is_none());
        assert_eq!(storage.sector(5), Some(&[0u8; BYTES_PER_SECTOR][..]));
        assert_eq!(
            storage.sector(32).expect("first"),
            &data(32, 1)[..BYTES_PER_SECTOR]
        );
        assert!(storage.sector(64).is_none());
        assert!(storage.append(&[0u8; 100]).is_err());
        assert!(storage.append(&[]).is_err());
    }

    #[test]
    fn test_seal_batches_use_completing_context() {
        let mut storage = LocalStorage::new([1u8; 32]);
        storage.append(&data(32, 1)).expect("append");
        let first = MineContext::new(1, 0, storage.root(), storage.flow_length(), [7u8; 32]);
        storage.observe(&first);
        storage.append(&data(64, 2)).expect("append");
        let second = MineContext::new(2, 100, storage.root(), storage.flow_length(), [8u8; 32]);
        storage.observe(&second);
        storage.observe(&second);

        assert_eq!(storage.sealing_context(32), Some(first.digest));
        assert_eq!(storage.sealing_context(48), Some(first.digest));
        assert_eq!(storage.sealing_context(64), Some(second.digest));
        assert_eq!(storage.sealing_context(storage.flow_length()), None);

        let sealed = storage.read_seal(64).expect("sealed");
        let raw = unseal(&[1u8; 32], &second.digest, 64, &sealed);
        let expected = units_from_sectors(&data(64, 2)[..16 * BYTES_PER_SECTOR]).expect("units");
        assert_eq!(raw, expected);
    }

    #[test]
    fn test_sentinel_batch_unreadable() {
        let mut storage = LocalStorage::new([1u8; 32]);
        storage.append(&data(16, 1)).expect("append");
        let ctx = MineContext::new(1, 0, storage.root(), storage.flow_length(), [7u8; 32]);
        storage.observe(&ctx);
        assert!(storage.read_seal(0).is_none());
        assert!(storage.read_seal(16).is_some());
        assert_eq!(
            storage.seal_proof(16).expect("proof").len(),
            storage.tree.height() as usize - SEAL_HEIGHT as usize
        );
        assert!(storage.seal_proof(1 << 20).is_err());
    }
}
