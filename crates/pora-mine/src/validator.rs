//! Answer validation.
//!
//! [`PoraMine`] owns the miner registry and the difficulty state and checks
//! answers against a [`FlowProvider`]. Every answer runs the same ordered
//! pipeline and the first failing stage rejects it:
//!
//! 1. range: overflow, length, alignment, minimum length, recall position
//! 2. shard: mask shape, shard count, shard id
//! 3. binding: mining started, current context, sealing epoch
//! 4. proof: unseal, hash the seal subtree, fold the proof to the flow root
//! 5. quality: recompute the recall position and compare quality to target
//!
//! State changes only after the whole pipeline has passed.

use pora_crypto::keccak::{hash_pair, sector_leaf};
use pora_flow::merkle::{bit_length, zero_hashes};
use pora_flow::tree::root_from_proof;
use pora_flow::FlowProvider;
use pora_types::answer::PoraAnswer;
use pora_types::constants::{SEAL_HEIGHT, SECTORS_PER_SEAL, UNITS_PER_SEAL, UNITS_PER_SECTOR};
use pora_types::context::MineContext;
use pora_types::{Address, Hash, MinerId, U256};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::difficulty::DifficultyState;
use crate::quality::{compute_quality, recall_position};
use crate::range::{check_range, check_recall, check_shard, scale_target};
use crate::registry::MinerRegistry;
use crate::scratch_pad::{PadHasher, ScratchPad};
use crate::seal::unseal;
use crate::{MineError, Result};

/// Validator configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MineConfig {
    /// Difficulty before the first retarget.
    #[serde(default = "default_initial_difficulty")]
    pub initial_difficulty: u64,
    /// Blocks per mining epoch the rate is measured against.
    #[serde(default = "default_target_mine_blocks")]
    pub target_mine_blocks: u64,
    /// Accepted answers targeted per epoch; the quota is twice this.
    #[serde(default = "default_target_submissions")]
    pub target_submissions: u64,
    #[serde(default = "default_max_shards")]
    pub max_shards: u64,
    /// Bound on the per-epoch target change factor.
    #[serde(default = "default_adjust_ratio")]
    pub adjust_ratio: u64,
    #[serde(default)]
    pub fixed_difficulty: bool,
    #[serde(default)]
    pub pad_hasher: PadHasher,
}

fn default_initial_difficulty() -> u64 {
    180_000
}

fn default_target_mine_blocks() -> u64 {
    100
}

fn default_target_submissions() -> u64 {
    10
}

fn default_max_shards() -> u64 {
    32
}

fn default_adjust_ratio() -> u64 {
    20
}

impl Default for MineConfig {
    fn default() -> Self {
        Self {
            initial_difficulty: default_initial_difficulty(),
            target_mine_blocks: default_target_mine_blocks(),
            target_submissions: default_target_submissions(),
            max_shards: default_max_shards(),
            adjust_ratio: default_adjust_ratio(),
            fixed_difficulty: false,
            pad_hasher: PadHasher::default(),
        }
    }
}

impl MineConfig {
    /// # Errors
    ///
    /// Returns [`MineError::InvalidConfig`] naming the first bad field.
    pub fn validate(&self) -> Result<()> {
        if self.initial_difficulty == 0 {
            return Err(MineError::InvalidConfig(
                "initial_difficulty must be positive".into(),
            ));
        }
        if self.target_mine_blocks == 0 {
            return Err(MineError::InvalidConfig(
                "target_mine_blocks must be positive".into(),
            ));
        }
        if self.target_submissions == 0 {
            return Err(MineError::InvalidConfig(
                "target_submissions must be positive".into(),
            ));
        }
        if !self.max_shards.is_power_of_two() {
            return Err(MineError::InvalidConfig(format!(
                "max_shards must be a power of two, got {}",
                self.max_shards
            )));
        }
        if self.adjust_ratio == 0 {
            return Err(MineError::InvalidConfig(
                "adjust_ratio must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Reward notification for an accepted answer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RewardClaim {
    pub epoch: u64,
    pub beneficiary: Address,
    pub miner_id: MinerId,
    pub recall_position: u64,
}

/// Receives rewards for accepted answers.
pub trait RewardSink {
    fn claim_mine_reward(&mut self, claim: RewardClaim);
}

impl RewardSink for Vec<RewardClaim> {
    fn claim_mine_reward(&mut self, claim: RewardClaim) {
        self.push(claim);
    }
}

/// Outcome of a passing answer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Verdict {
    pub epoch: u64,
    pub recall_position: u64,
    pub quality: U256,
    /// Target after scaling by the shard count.
    pub effective_target: U256,
}

/// The mining validator.
#[derive(Clone, Debug)]
pub struct PoraMine {
    config: MineConfig,
    difficulty: DifficultyState,
    registry: MinerRegistry,
    /// Last epoch the difficulty state was rolled to.
    epoch: u64,
    mine_start: u64,
}

impl PoraMine {
    /// # Errors
    ///
    /// Returns [`MineError::InvalidConfig`] if the config does not validate.
    pub fn new(config: MineConfig) -> Result<Self> {
        config.validate()?;
        let difficulty = DifficultyState::new(
            config.initial_difficulty,
            config.target_submissions,
            config.target_mine_blocks,
            config.adjust_ratio,
            config.fixed_difficulty,
        );
        Ok(Self {
            config,
            difficulty,
            registry: MinerRegistry::new(),
            epoch: 0,
            mine_start: 0,
        })
    }

    pub fn config(&self) -> &MineConfig {
        &self.config
    }

    pub fn difficulty(&self) -> &DifficultyState {
        &self.difficulty
    }

    pub fn registry(&self) -> &MinerRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut MinerRegistry {
        &mut self.registry
    }

    /// Epoch the validator has accounted up to.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Current unscaled target.
    pub fn target(&self) -> U256 {
        self.difficulty.target
    }

    /// Roll the difficulty state over to `context` if its epoch is newer.
    pub fn observe(&mut self, context: &MineContext) {
        self.difficulty = self.rolled_difficulty(context);
        if context.epoch > self.epoch {
            self.epoch = context.epoch;
            self.mine_start = context.mine_start;
        }
    }

    /// Check `answer` without changing any state.
    ///
    /// # Errors
    ///
    /// Returns the first failing check; see [`MineError::kind`].
    pub fn dry_run<F: FlowProvider>(&self, flow: &F, answer: &PoraAnswer) -> Result<Verdict> {
        let context = flow.current_context();
        let difficulty = self.rolled_difficulty(&context);
        self.check(flow, &context, &difficulty, answer)
            .inspect_err(|e| log_rejection(answer, e))
    }

    /// Check `answer` and, if it passes, credit the miner.
    ///
    /// # Errors
    ///
    /// Returns the first failing check; nothing is changed on error.
    pub fn submit<F: FlowProvider, R: RewardSink>(
        &mut self,
        flow: &F,
        rewards: &mut R,
        answer: &PoraAnswer,
    ) -> Result<Verdict> {
        let context = flow.current_context();
        let mut difficulty = self.rolled_difficulty(&context);
        let verdict = self
            .check(flow, &context, &difficulty, answer)
            .inspect_err(|e| log_rejection(answer, e))?;

        self.registry.mark_mined(&answer.miner_id, verdict.epoch)?;
        let beneficiary = self
            .registry
            .get(&answer.miner_id)
            .map(|record| record.beneficiary)
            .ok_or_else(|| MineError::UnknownMiner(hex::encode(answer.miner_id)))?;
        difficulty.record_submission();
        self.difficulty = difficulty;
        if context.epoch > self.epoch {
            self.epoch = context.epoch;
            self.mine_start = context.mine_start;
        }

        rewards.claim_mine_reward(RewardClaim {
            epoch: verdict.epoch,
            beneficiary,
            miner_id: answer.miner_id,
            recall_position: verdict.recall_position,
        });
        info!(
            epoch = verdict.epoch,
            miner = %hex::encode(answer.miner_id),
            recall_position = verdict.recall_position,
            submissions = self.difficulty.current_submissions,
            "answer accepted"
        );
        Ok(verdict)
    }

    /// Difficulty state as it will be once `context` is accounted for.
    fn rolled_difficulty(&self, context: &MineContext) -> DifficultyState {
        let mut difficulty = self.difficulty.clone();
        // the first epoch has no previous one to measure
        if context.epoch > self.epoch && self.epoch > 0 {
            difficulty.on_epoch_rollover(context.mine_start.saturating_sub(self.mine_start));
        }
        difficulty
    }

    fn check<F: FlowProvider>(
        &self,
        flow: &F,
        context: &MineContext,
        difficulty: &DifficultyState,
        answer: &PoraAnswer,
    ) -> Result<Verdict> {
        if !context.is_started() {
            return Err(MineError::MiningNotStarted);
        }
        self.registry
            .check_can_mine(&answer.miner_id, context.epoch)?;
        if !difficulty.can_submit() {
            return Err(MineError::SubmissionLimitReached {
                epoch: context.epoch,
                limit: difficulty.submission_limit(),
            });
        }

        // range
        check_range(&answer.range, context.flow_length)?;
        check_recall(&answer.range, answer.recall_position, answer.seal_offset)?;
        if answer.sealed_data.len() != UNITS_PER_SEAL {
            return Err(MineError::MalformedSealedData {
                expected: UNITS_PER_SEAL,
                actual: answer.sealed_data.len(),
            });
        }

        // shard
        let shards = check_shard(&answer.range, self.config.max_shards)?;

        // binding
        if answer.context_digest != context.digest {
            return Err(MineError::ContextDigestMismatch);
        }
        let sealed_range = flow.epoch_range(&answer.sealed_context_digest)?;
        if !sealed_range.completes_span(answer.recall_position, SECTORS_PER_SEAL) {
            return Err(MineError::InvalidSealedContextDigest(format!(
                "batch at {} not completed in [{}, {})",
                answer.recall_position, sealed_range.start, sealed_range.end
            )));
        }

        // proof
        let units = unseal(
            &answer.miner_id,
            &answer.sealed_context_digest,
            answer.recall_position,
            &answer.sealed_data,
        );
        let expected = bit_length(context.flow_length.saturating_sub(1))
            .saturating_sub(SEAL_HEIGHT) as usize;
        if answer.merkle_proof.len() != expected {
            return Err(MineError::ProofLengthMismatch {
                expected,
                actual: answer.merkle_proof.len(),
            });
        }
        let root = root_from_proof(
            seal_root(&units),
            answer.recall_position >> SEAL_HEIGHT,
            &answer.merkle_proof,
        );
        if root != context.flow_root {
            return Err(MineError::MerkleRootMismatch);
        }

        // quality
        let pad = ScratchPad::for_attempt(
            &answer.miner_id,
            &answer.nonce,
            context,
            &answer.range,
            self.config.pad_hasher,
        );
        let derived = recall_position(&answer.range, &pad, answer.seal_offset)?;
        if derived != answer.recall_position {
            return Err(MineError::RecallPositionMismatch {
                claimed: answer.recall_position,
                derived,
            });
        }
        let mixed = pad.mix(answer.seal_offset, &answer.sealed_data)?;
        let quality = compute_quality(answer.seal_offset, pad.seed(), &mixed);
        let effective_target = scale_target(difficulty.target, shards);
        if quality > effective_target {
            return Err(MineError::InsufficientQuality {
                quality,
                target: effective_target,
            });
        }

        Ok(Verdict {
            epoch: context.epoch,
            recall_position: answer.recall_position,
            quality,
            effective_target,
        })
    }
}

/// Root of the height-4 subtree over one batch of unsealed units.
///
/// Missing sectors count as empty leaves, so fewer than 128 units still fold
/// to a full-height subtree root.
pub fn seal_root(units: &[Hash]) -> Hash {
    let zeros = zero_hashes(SEAL_HEIGHT);
    let mut layer: Vec<Hash> = units
        .chunks(UNITS_PER_SECTOR)
        .map(|sector| sector_leaf(&sector.concat()))
        .collect();
    for empty in zeros.iter().take(SEAL_HEIGHT as usize) {
        let mut nodes = layer.iter();
        let mut next = Vec::with_capacity(layer.len().div_ceil(2));
        while let Some(left) = nodes.next() {
            next.push(hash_pair(left, nodes.next().unwrap_or(empty)));
        }
        layer = next;
    }
    layer
        .first()
        .copied()
        .unwrap_or(zeros[SEAL_HEIGHT as usize])
}

fn log_rejection(answer: &PoraAnswer, err: &MineError) {
    debug!(
        miner = %hex::encode(answer.miner_id),
        recall_position = answer.recall_position,
        kind = ?err.kind(),
        error = %err,
        "answer rejected"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use pora_flow::tree::FlowTree;

    #[test]
    fn test_config_defaults_and_validation() {
        let config = MineConfig::default();
        config.validate().expect("defaults are valid");
        assert_eq!(config.initial_difficulty, 180_000);
        assert_eq!(config.max_shards, 32);

        let bad = MineConfig {
            max_shards: 3,
            ..MineConfig::default()
        };
        assert_eq!(
            PoraMine::new(bad).expect_err("bad shards").kind(),
            ErrorKind::Config
        );
        let bad = MineConfig {
            target_submissions: 0,
            ..MineConfig::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_config_from_partial_json() {
        let config: MineConfig =
            serde_json::from_str(r#"{"initial_difficulty": 1, "pad_hasher": "blake2b"}"#)
                .expect("parse");
        assert_eq!(config.initial_difficulty, 1);
        assert_eq!(config.pad_hasher, PadHasher::Blake2b);
        assert_eq!(config.target_submissions, 10);
    }

    #[test]
    fn test_seal_root_matches_tree() {
        let units: Vec<Hash> = (0..UNITS_PER_SEAL).map(|i| [i as u8; 32]).collect();
        let leaves: Vec<Hash> = units
            .chunks(UNITS_PER_SECTOR)
            .map(|s| sector_leaf(&s.concat()))
            .collect();
        let mut tree = FlowTree::new();
        tree.pad_to(SEAL_HEIGHT);
        let start = tree.append_leaves(&leaves);
        assert_eq!(start, 16);
        assert_eq!(seal_root(&units), tree.subtree_root(16, SEAL_HEIGHT));
    }

    #[test]
    fn test_seal_root_pads_short_batch() {
        let units: Vec<Hash> = (0..UNITS_PER_SECTOR * 3).map(|i| [i as u8; 32]).collect();
        let leaves: Vec<Hash> = units
            .chunks(UNITS_PER_SECTOR)
            .map(|s| sector_leaf(&s.concat()))
            .collect();
        let mut tree = FlowTree::new();
        tree.pad_to(SEAL_HEIGHT);
        tree.append_leaves(&leaves);
        assert_eq!(seal_root(&units), tree.subtree_root(16, SEAL_HEIGHT));
        assert_eq!(seal_root(&[]), zero_hashes(SEAL_HEIGHT)[SEAL_HEIGHT as usize]);
    }

    #[test]
    fn test_rollover_skipped_for_first_epoch() {
        let mut mine = PoraMine::new(MineConfig::default()).expect("mine");
        let target = mine.target();
        let ctx = MineContext::new(1, 100, [1u8; 32], 2, [2u8; 32]);
        mine.observe(&ctx);
        assert_eq!(mine.target(), target);
        assert_eq!(mine.epoch(), 1);

        // no submissions in epoch 1 eases the target by the full ratio
        let ctx = MineContext::new(2, 200, [1u8; 32], 2, [3u8; 32]);
        mine.observe(&ctx);
        assert_eq!(mine.target(), target.saturating_mul(U256::from(20u64)));
        assert_eq!(mine.epoch(), 2);

        // observing the same epoch again is a no-op
        mine.observe(&ctx);
        assert_eq!(mine.target(), target.saturating_mul(U256::from(20u64)));
    }
}
