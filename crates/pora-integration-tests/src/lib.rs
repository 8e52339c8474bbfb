//! Integration tests for PoRA mining over the flow.
//!
//! The library part is a small harness shared by the tests under `tests/`:
//! a flow with one local storage replica per miner, advanced epoch by epoch.
//!
//! Run all integration tests:
//! ```sh
//! cargo test -p pora-integration-tests
//! ```

use pora_crypto::keccak::keccak256;
use pora_crypto::word::encode_u256;
use pora_flow::{Flow, FlowConfig};
use pora_mine::miner::Miner;
use pora_mine::storage::LocalStorage;
use pora_mine::validator::{MineConfig, PoraMine};
use pora_mine::MineError;
use pora_types::answer::PoraAnswer;
use pora_types::constants::BYTES_PER_SECTOR;
use pora_types::context::MineContext;
use pora_types::submission::SubmissionReceipt;
use pora_types::{Address, MinerId};

/// Deterministic sector data.
pub fn sector_data(sectors: usize, salt: u8) -> Vec<u8> {
    (0..sectors * BYTES_PER_SECTOR)
        .map(|i| ((i / 7) as u8) ^ salt)
        .collect()
}

/// Beneficiary used for miner `i` in the tests.
pub fn beneficiary(i: u8) -> Address {
    [0xb0 | i; 20]
}

/// A flow plus one storage replica per miner.
pub struct Harness {
    pub flow: Flow,
    pub storages: Vec<LocalStorage>,
    next_block: u64,
}

impl Harness {
    pub fn new(config: FlowConfig, miners: &[MinerId]) -> Self {
        let next_block = config.first_block;
        Self {
            flow: Flow::new(config).expect("flow config"),
            storages: miners.iter().map(|id| LocalStorage::new(*id)).collect(),
            next_block,
        }
    }

    /// Append the same segment to the flow and every replica.
    pub fn append(&mut self, sectors: usize, salt: u8) -> SubmissionReceipt {
        let data = sector_data(sectors, salt);
        let mut submission = None;
        for storage in &mut self.storages {
            submission = Some(storage.append(&data).expect("append"));
        }
        let submission = submission.expect("at least one miner");
        self.flow.submit(&submission).expect("submit")
    }

    /// Open the next epoch and let every replica see its context.
    pub fn next_epoch(&mut self) -> MineContext {
        let block = self.next_block;
        self.next_block += self.flow.config().blocks_per_epoch;
        let context = self
            .flow
            .on_block(block, keccak256(&encode_u256(block)))
            .expect("block opens an epoch");
        for storage in &mut self.storages {
            storage.observe(&context);
        }
        context
    }

    pub fn storage(&self, i: usize) -> &LocalStorage {
        &self.storages[i]
    }
}

/// A validator with `miners` registered to [`beneficiary`]`(i)`.
pub fn validator(config: MineConfig, miners: &[MinerId]) -> PoraMine {
    let mut mine = PoraMine::new(config).expect("mine config");
    for (i, id) in miners.iter().enumerate() {
        mine.registry_mut()
            .register(*id, beneficiary(i as u8))
            .expect("register");
    }
    mine
}

/// Answer at `seal_offset` for the first nonce that recalls a stored batch.
pub fn first_answer<S: pora_mine::storage::MinerStorage>(
    miner: &Miner,
    context: &MineContext,
    storage: &S,
    seal_offset: u64,
) -> PoraAnswer {
    for n in 0u64..1024 {
        match miner.build_answer(context, keccak256(&encode_u256(n)), seal_offset, storage) {
            Ok(answer) => return answer,
            Err(MineError::RecallOutOfBound { .. } | MineError::MissingSealData(_)) => {}
            Err(e) => panic!("building answer: {e}"),
        }
    }
    panic!("no nonce recalls a stored batch")
}
