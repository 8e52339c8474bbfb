//! Off-ledger nonce search.
//!
//! For each nonce the miner expands the scratch pad once, recalls the load it
//! selects and scores all of that load's seal batches, returning the first
//! one whose quality meets the target.

use pora_types::answer::PoraAnswer;
use pora_types::constants::SEALS_PER_LOAD;
use pora_types::context::{MineContext, RecallRange};
use pora_types::{Hash, MinerId, U256};
use rand::RngCore;
use tracing::{debug, trace};

use crate::quality::{compute_quality, recall_position};
use crate::range::{num_shards, scale_target};
use crate::scratch_pad::{PadHasher, ScratchPad};
use crate::storage::MinerStorage;
use crate::{MineError, Result};

/// Draw a random 32-byte nonce.
pub fn random_nonce<R: RngCore>(rng: &mut R) -> Hash {
    let mut nonce = [0u8; 32];
    rng.fill_bytes(&mut nonce);
    nonce
}

#[derive(Clone, Debug)]
pub struct Miner {
    miner_id: MinerId,
    range: RecallRange,
    hasher: PadHasher,
}

impl Miner {
    pub fn new(miner_id: MinerId, range: RecallRange, hasher: PadHasher) -> Self {
        Self {
            miner_id,
            range,
            hasher,
        }
    }

    pub fn miner_id(&self) -> &MinerId {
        &self.miner_id
    }

    pub fn range(&self) -> &RecallRange {
        &self.range
    }

    /// Build the answer for `nonce` at `seal_offset`, whatever its quality.
    ///
    /// # Errors
    ///
    /// Returns [`MineError::RecallOutOfBound`] when the nonce selects a load
    /// outside the shard, or [`MineError::MissingSealData`] when storage does
    /// not hold the recalled batch.
    pub fn build_answer<S: MinerStorage>(
        &self,
        context: &MineContext,
        nonce: Hash,
        seal_offset: u64,
        storage: &S,
    ) -> Result<PoraAnswer> {
        let pad = self.pad(context, &nonce);
        let position = recall_position(&self.range, &pad, seal_offset)?;
        let sealed = storage
            .read_seal(position)
            .ok_or(MineError::MissingSealData(position))?;
        self.answer(context, nonce, seal_offset, position, sealed, storage)
    }

    /// Try every seal batch of the load `nonce` selects.
    ///
    /// # Returns
    ///
    /// The first answer with quality within `target` scaled by the shard
    /// count, or `None`.
    ///
    /// # Errors
    ///
    /// See [`Self::build_answer`].
    pub fn attempt<S: MinerStorage>(
        &self,
        context: &MineContext,
        nonce: Hash,
        target: U256,
        storage: &S,
    ) -> Result<Option<PoraAnswer>> {
        let pad = self.pad(context, &nonce);
        let effective_target = scale_target(target, num_shards(self.range.shard_mask));
        for seal_offset in 0..SEALS_PER_LOAD {
            let position = recall_position(&self.range, &pad, seal_offset)?;
            let Some(sealed) = storage.read_seal(position) else {
                trace!(position, "seal batch not stored");
                continue;
            };
            let mixed = pad.mix(seal_offset, &sealed)?;
            let quality = compute_quality(seal_offset, pad.seed(), &mixed);
            if quality <= effective_target {
                let answer = self.answer(context, nonce, seal_offset, position, sealed, storage)?;
                return Ok(Some(answer));
            }
        }
        Ok(None)
    }

    /// Search random nonces until an answer is found or `max_attempts` runs out.
    ///
    /// Nonces that select a load outside this miner's shard are skipped.
    ///
    /// # Errors
    ///
    /// Returns storage errors from [`Self::attempt`].
    pub fn mine<S: MinerStorage, R: RngCore>(
        &self,
        context: &MineContext,
        target: U256,
        storage: &S,
        rng: &mut R,
        max_attempts: u64,
    ) -> Result<Option<PoraAnswer>> {
        for attempt in 0..max_attempts {
            let nonce = random_nonce(rng);
            match self.attempt(context, nonce, target, storage) {
                Ok(Some(answer)) => {
                    debug!(
                        attempt,
                        recall_position = answer.recall_position,
                        seal_offset = answer.seal_offset,
                        "answer found"
                    );
                    return Ok(Some(answer));
                }
                Ok(None) | Err(MineError::RecallOutOfBound { .. }) => {}
                Err(e) => return Err(e),
            }
        }
        debug!(max_attempts, epoch = context.epoch, "no answer found");
        Ok(None)
    }

    fn pad(&self, context: &MineContext, nonce: &Hash) -> ScratchPad {
        ScratchPad::for_attempt(&self.miner_id, nonce, context, &self.range, self.hasher)
    }

    fn answer<S: MinerStorage>(
        &self,
        context: &MineContext,
        nonce: Hash,
        seal_offset: u64,
        position: u64,
        sealed: Vec<Hash>,
        storage: &S,
    ) -> Result<PoraAnswer> {
        let sealed_context_digest = storage
            .sealing_context(position)
            .ok_or(MineError::MissingSealData(position))?;
        Ok(PoraAnswer {
            context_digest: context.digest,
            nonce,
            miner_id: self.miner_id,
            range: self.range,
            recall_position: position,
            seal_offset,
            sealed_context_digest,
            sealed_data: sealed,
            merkle_proof: storage.seal_proof(position)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quality::difficulty_to_target;
    use crate::storage::LocalStorage;
    use crate::validator::{MineConfig, PoraMine, RewardClaim};
    use pora_flow::{Flow, FlowConfig};
    use pora_types::constants::{BYTES_PER_SECTOR, SECTORS_PER_LOAD, SECTORS_PER_SEAL};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const MINER: MinerId = [0x11; 32];

    fn setup(sectors: usize) -> (Flow, LocalStorage, MineContext) {
        let mut flow = Flow::new(FlowConfig::default()).expect("flow");
        let mut storage = LocalStorage::new(MINER);
        let data: Vec<u8> = (0..sectors * BYTES_PER_SECTOR)
            .map(|i| (i % 251) as u8)
            .collect();
        let submission = storage.append(&data).expect("append");
        flow.submit(&submission).expect("submit");
        let context = flow.on_block(0, [0x42; 32]).expect("epoch 1");
        storage.observe(&context);
        (flow, storage, context)
    }

    fn mine_with_difficulty(difficulty: u64) -> PoraMine {
        let mut mine = PoraMine::new(MineConfig {
            initial_difficulty: difficulty,
            ..MineConfig::default()
        })
        .expect("mine");
        mine.registry_mut()
            .register(MINER, [0xbe; 20])
            .expect("register");
        mine
    }

    #[test]
    fn test_local_storage_tracks_flow() {
        let (flow, storage, context) = setup(2048);
        assert_eq!(storage.flow_length(), flow.current_length());
        assert_eq!(storage.root(), context.flow_root);
        assert_eq!(context.flow_length, 4096);
    }

    #[test]
    fn test_build_answer_is_deterministic_and_valid() {
        let (flow, storage, context) = setup(2048);
        let miner = Miner::new(MINER, RecallRange::full(0, 4096), PadHasher::DoubleKeccak);
        let nonce = [3u8; 32];
        let a = miner.build_answer(&context, nonce, 11, &storage).expect("answer");
        let b = miner.build_answer(&context, nonce, 11, &storage).expect("answer");
        assert_eq!(a, b);
        assert_eq!(a.recall_position % SECTORS_PER_LOAD, 11 * SECTORS_PER_SEAL);

        let mine = mine_with_difficulty(1);
        let verdict = mine.dry_run(&flow, &a).expect("valid at difficulty 1");
        assert_eq!(verdict.recall_position, a.recall_position);
    }

    #[test]
    fn test_mine_finds_accepted_answer() {
        let (flow, storage, context) = setup(2048);
        let miner = Miner::new(MINER, RecallRange::full(0, 4096), PadHasher::DoubleKeccak);
        let mut mine = mine_with_difficulty(64);
        let mut rng = StdRng::seed_from_u64(7);
        let answer = miner
            .mine(&context, mine.target(), &storage, &mut rng, 64)
            .expect("mine")
            .expect("answer within 64 nonces");

        let mut rewards: Vec<RewardClaim> = Vec::new();
        mine.submit(&flow, &mut rewards, &answer).expect("accepted");
        assert_eq!(rewards.len(), 1);
        assert_eq!(rewards[0].beneficiary, [0xbe; 20]);
        assert_eq!(rewards[0].recall_position, answer.recall_position);
    }

    #[test]
    fn test_attempt_respects_target() {
        let (_flow, storage, context) = setup(2048);
        let miner = Miner::new(MINER, RecallRange::full(0, 4096), PadHasher::DoubleKeccak);
        let none = miner
            .attempt(&context, [5u8; 32], U256::zero(), &storage)
            .expect("attempt");
        assert!(none.is_none());
        let some = miner
            .attempt(&context, [5u8; 32], difficulty_to_target(U256::one()), &storage)
            .expect("attempt")
            .expect("everything qualifies");
        assert!(some.recall_position > 0);
    }
}
