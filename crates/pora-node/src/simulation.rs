//! Local single-miner simulation.
//!
//! Each epoch appends a random segment to the flow, opens a new context,
//! searches for an answer and submits it to the validator.

use pora_flow::Flow;
use pora_mine::miner::Miner;
use pora_mine::range::{floor_to_load, num_shards};
use pora_mine::storage::LocalStorage;
use pora_mine::validator::PoraMine;
use pora_types::constants::{BYTES_PER_SECTOR, MAX_MINING_LENGTH};
use pora_types::context::RecallRange;
use pora_types::MinerId;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::NodeConfig;
use crate::rewards::{RewardBook, RewardSummary};

/// Outcome of one simulated epoch.
#[derive(Debug, Serialize)]
pub struct EpochReport {
    pub epoch: u64,
    pub flow_length: u64,
    /// Decimal difficulty the epoch was mined at.
    pub difficulty: String,
    pub accepted: bool,
}

#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub epochs: Vec<EpochReport>,
    pub rewards: RewardSummary,
    pub flow_root: String,
}

pub struct Simulation {
    config: NodeConfig,
    flow: Flow,
    mine: PoraMine,
    storage: LocalStorage,
    miner_id: MinerId,
    rewards: RewardBook,
    rng: StdRng,
}

impl Simulation {
    pub fn new(config: NodeConfig) -> anyhow::Result<Self> {
        let flow = Flow::new(config.flow.clone())?;
        let mut mine = PoraMine::new(config.mine.clone())?;
        let miner_id = mine
            .registry_mut()
            .request_miner_id(config.miner.beneficiary, config.miner.seed)?;
        Ok(Self {
            storage: LocalStorage::new(miner_id),
            rng: StdRng::seed_from_u64(config.simulation.rng_seed),
            config,
            flow,
            mine,
            miner_id,
            rewards: RewardBook::default(),
        })
    }

    pub fn run(&mut self) -> anyhow::Result<RunSummary> {
        let mut epochs = Vec::new();
        for i in 0..self.config.simulation.epochs {
            if let Some(report) = self.step(i)? {
                epochs.push(report);
            }
        }
        Ok(RunSummary {
            epochs,
            rewards: self.rewards.summary(),
            flow_root: hex::encode(self.flow.root()),
        })
    }

    pub fn rewards(&self) -> &RewardBook {
        &self.rewards
    }

    fn step(&mut self, i: u64) -> anyhow::Result<Option<EpochReport>> {
        let sectors = self.config.simulation.segment_sectors as usize;
        let mut data = vec![0u8; sectors * BYTES_PER_SECTOR];
        self.rng.fill_bytes(&mut data);
        let submission = self.storage.append(&data)?;
        self.flow.submit(&submission)?;

        let flow_config = self.flow.config();
        let block = flow_config.first_block + i * flow_config.blocks_per_epoch;
        let mut block_digest = [0u8; 32];
        self.rng.fill_bytes(&mut block_digest);
        let Some(context) = self.flow.on_block(block, block_digest) else {
            warn!(block, "block did not open an epoch");
            return Ok(None);
        };
        self.storage.observe(&context);
        self.mine.observe(&context);

        let shard_mask = self.config.miner.shard_mask();
        let shards = num_shards(shard_mask);
        let range = RecallRange {
            start_position: 0,
            mine_length: floor_to_load(
                context
                    .flow_length
                    .min(MAX_MINING_LENGTH.saturating_mul(shards)),
            ),
            shard_id: self.config.miner.shard_id,
            shard_mask,
        };
        let miner = Miner::new(self.miner_id, range, self.config.mine.pad_hasher);
        let difficulty = self.mine.difficulty().difficulty().to_string();

        let found = miner.mine(
            &context,
            self.mine.target(),
            &self.storage,
            &mut self.rng,
            self.config.miner.max_attempts,
        )?;
        let accepted = match found {
            Some(answer) => match self.mine.submit(&self.flow, &mut self.rewards, &answer) {
                Ok(_) => true,
                Err(e) => {
                    warn!(epoch = context.epoch, error = %e, "answer rejected");
                    false
                }
            },
            None => false,
        };
        info!(
            epoch = context.epoch,
            flow_length = context.flow_length,
            %difficulty,
            accepted,
            "epoch simulated"
        );
        Ok(Some(EpochReport {
            epoch: context.epoch,
            flow_length: context.flow_length,
            difficulty,
            accepted,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pora_types::constants::SECTORS_PER_LOAD;

    fn config() -> NodeConfig {
        let mut config = NodeConfig::default();
        config.mine.initial_difficulty = 4;
        config.simulation.epochs = 3;
        config.simulation.segment_sectors = 1024;
        config.miner.max_attempts = 64;
        config
    }

    #[test]
    fn test_simulation_credits_each_epoch() {
        let mut sim = Simulation::new(config()).expect("simulation");
        let summary = sim.run().expect("run");
        assert_eq!(summary.epochs.len(), 3);
        assert!(summary.epochs.iter().all(|e| e.accepted));
        assert_eq!(summary.rewards.claims, 3);
        assert_eq!(sim.rewards().count_for(&[0x01; 20]), 3);
        let epochs: Vec<u64> = sim.rewards().claims().iter().map(|c| c.epoch).collect();
        assert_eq!(epochs, vec![1, 2, 3]);
    }

    #[test]
    fn test_flow_grows_each_epoch() {
        let mut sim = Simulation::new(config()).expect("simulation");
        let summary = sim.run().expect("run");
        let lengths: Vec<u64> = summary.epochs.iter().map(|e| e.flow_length).collect();
        assert_eq!(lengths, vec![2048, 3072, 4096]);
    }

    #[test]
    fn test_sharded_miner_recalls_own_loads() {
        let mut config = config();
        config.miner.shard_bits = 1;
        config.miner.shard_id = 1;
        let mut sim = Simulation::new(config).expect("simulation");
        let summary = sim.run().expect("run");
        assert!(summary.epochs.iter().all(|e| e.accepted));
        for claim in sim.rewards().claims() {
            assert_eq!((claim.recall_position / SECTORS_PER_LOAD) % 2, 1);
        }
    }
}
