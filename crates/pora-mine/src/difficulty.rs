//! Per-epoch target controller.
//!
//! At each epoch rollover the target moves toward the configured submission
//! rate. The observed rate is compared against `target_submissions` per
//! `target_mine_blocks` blocks:
//!
//! ```text
//! new_target = old_target * target_submissions * elapsed_blocks
//!              / (current_submissions * target_mine_blocks)
//! clamp(new_target, old_target / adjust_ratio, old_target * adjust_ratio)
//! ```
//!
//! More submissions than targeted lowers the target (harder); an epoch with
//! no submissions raises it by the full `adjust_ratio`. Products are taken in
//! 512 bits and the result saturates at `2^256 - 1`.

use pora_types::U256;
use primitive_types::U512;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::quality::{difficulty_to_target, target_to_difficulty};

/// Difficulty and submission accounting for the current epoch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DifficultyState {
    pub target: U256,
    pub current_submissions: u64,
    pub target_submissions: u64,
    pub target_mine_blocks: u64,
    pub adjust_ratio: u64,
    /// Never adjust the target.
    pub fixed: bool,
}

impl DifficultyState {
    pub fn new(
        initial_difficulty: u64,
        target_submissions: u64,
        target_mine_blocks: u64,
        adjust_ratio: u64,
        fixed: bool,
    ) -> Self {
        Self {
            target: difficulty_to_target(U256::from(initial_difficulty)),
            current_submissions: 0,
            target_submissions,
            target_mine_blocks,
            adjust_ratio,
            fixed,
        }
    }

    pub fn difficulty(&self) -> U256 {
        target_to_difficulty(self.target)
    }

    /// Whether the epoch quota still has room.
    pub fn can_submit(&self) -> bool {
        self.current_submissions < self.submission_limit()
    }

    /// Accepted answers allowed per epoch.
    pub fn submission_limit(&self) -> u64 {
        self.target_submissions.saturating_mul(2)
    }

    pub fn record_submission(&mut self) {
        self.current_submissions += 1;
    }

    /// Close the epoch: retarget, then reset the submission count.
    ///
    /// # Arguments
    ///
    /// * `elapsed_blocks` - Blocks between the start of the closed epoch and
    ///   the new one; 0 means unknown and is read as `target_mine_blocks`.
    pub fn on_epoch_rollover(&mut self, elapsed_blocks: u64) {
        let old = self.target;
        if !self.fixed && self.adjust_ratio > 1 {
            self.target = self.retarget(elapsed_blocks);
        }
        info!(
            submissions = self.current_submissions,
            elapsed_blocks,
            old_target = %format!("{old:#x}"),
            new_target = %format!("{:#x}", self.target),
            "difficulty rollover"
        );
        self.current_submissions = 0;
    }

    fn retarget(&self, elapsed_blocks: u64) -> U256 {
        let old = self.target;
        let ratio = U512::from(self.adjust_ratio);
        let upper = old.full_mul(U256::from(self.adjust_ratio));
        let lower = U512::from(old) / ratio;

        let proposed = if self.current_submissions == 0 {
            upper
        } else {
            let elapsed = if elapsed_blocks == 0 {
                self.target_mine_blocks
            } else {
                elapsed_blocks
            };
            let numerator = old.full_mul(U256::from(self.target_submissions))
                * U512::from(elapsed);
            let denominator =
                U512::from(self.current_submissions) * U512::from(self.target_mine_blocks.max(1));
            numerator / denominator
        };

        let clamped = proposed.clamp(lower, upper);
        U256::try_from(clamped)
            .unwrap_or(U256::MAX)
            .max(U256::one())
    }
}
