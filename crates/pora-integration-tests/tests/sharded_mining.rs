//! Integration test: sharded miners.
//!
//! 1. A miner holding shard 3 of 8 only ever recalls loads congruent to 3
//! 2. Its answers compete against one eighth of the target
//! 3. A range too short for the shard id yields no recallable load
//! 4. Malformed shard parameters are rejected before any hashing

use pora_flow::FlowConfig;
use pora_integration_tests::{beneficiary, validator, Harness};
use pora_mine::miner::Miner;
use pora_mine::registry::derive_miner_id;
use pora_mine::scratch_pad::PadHasher;
use pora_mine::validator::MineConfig;
use pora_mine::{ErrorKind, MineError};
use pora_types::constants::SECTORS_PER_LOAD;
use pora_types::context::RecallRange;
use pora_types::U256;
use rand::rngs::StdRng;
use rand::SeedableRng;

fn easy() -> MineConfig {
    MineConfig {
        initial_difficulty: 1,
        ..MineConfig::default()
    }
}

#[test]
fn sharded_answer_quality_scaled() {
    let miner_id = derive_miner_id(&beneficiary(0), 9);

    // =========================================================
    // Step 1: 32 loads of flow, miner on shard 3 of 8
    // =========================================================
    let mut harness = Harness::new(FlowConfig::default(), &[miner_id]);
    harness.append(16384, 3);
    let context = harness.next_epoch();
    assert_eq!(context.flow_length, 32 * SECTORS_PER_LOAD);

    let range = RecallRange {
        start_position: 0,
        mine_length: context.flow_length,
        shard_id: 3,
        shard_mask: u64::MAX - 7,
    };
    let miner = Miner::new(miner_id, range, PadHasher::DoubleKeccak);
    let mine = validator(easy(), &[miner_id]);

    // =========================================================
    // Step 2: Accept exactly when quality is under MAX / 8
    // =========================================================
    let shard_target = U256::MAX / U256::from(8u64);
    let (mut accepted, mut rejected) = (0, 0);
    for n in 0u8..24 {
        let answer = miner
            .build_answer(&context, [n; 32], u64::from(n % 64), harness.storage(0))
            .expect("answer");
        assert_eq!((answer.recall_position / SECTORS_PER_LOAD) % 8, 3);

        match mine.dry_run(&harness.flow, &answer) {
            Ok(verdict) => {
                assert_eq!(verdict.effective_target, shard_target);
                assert!(verdict.quality <= shard_target);
                assert!(verdict.quality.byte(31) < 0x20);
                accepted += 1;
            }
            Err(MineError::InsufficientQuality { quality, target }) => {
                assert_eq!(target, shard_target);
                assert!(quality.byte(31) >= 0x20);
                rejected += 1;
            }
            Err(e) => panic!("unexpected rejection: {e}"),
        }
    }
    assert_eq!(accepted + rejected, 24);
}

#[test]
fn sharded_range_too_short_for_shard() {
    let miner_id = derive_miner_id(&beneficiary(0), 9);

    // =========================================================
    // Step 1: Build a flow of exactly 5 loads
    // =========================================================
    let mut harness = Harness::new(FlowConfig::default(), &[miner_id]);
    harness.append(1024, 1);
    harness.append(2048, 2);
    harness.append(1024, 3);
    let context = harness.next_epoch();
    assert_eq!(context.flow_length, 5 * SECTORS_PER_LOAD);

    // =========================================================
    // Step 2: Shard 7 of 8 has no load below index 5
    // =========================================================
    let range = RecallRange {
        start_position: 0,
        mine_length: context.flow_length,
        shard_id: 7,
        shard_mask: u64::MAX << 3,
    };
    let miner = Miner::new(miner_id, range, PadHasher::DoubleKeccak);
    let err = miner
        .build_answer(&context, [1u8; 32], 0, harness.storage(0))
        .expect_err("out of bound");
    assert!(matches!(err, MineError::RecallOutOfBound { offset: 7, loads: 5 }));
    assert_eq!(err.kind(), ErrorKind::Structural);

    let mut rng = StdRng::seed_from_u64(5);
    let found = miner
        .mine(&context, U256::MAX, harness.storage(0), &mut rng, 16)
        .expect("out-of-bound nonces are skipped");
    assert!(found.is_none());
}

#[test]
fn malformed_shards_rejected() {
    let miner_id = derive_miner_id(&beneficiary(0), 9);
    let mut harness = Harness::new(FlowConfig::default(), &[miner_id]);
    harness.append(16384, 3);
    let context = harness.next_epoch();
    let mine = validator(easy(), &[miner_id]);

    let honest = RecallRange {
        start_position: 0,
        mine_length: context.flow_length,
        shard_id: 1,
        shard_mask: u64::MAX - 1,
    };
    let miner = Miner::new(miner_id, honest, PadHasher::DoubleKeccak);
    let answer = miner
        .build_answer(&context, [4u8; 32], 2, harness.storage(0))
        .expect("answer");

    // shard id overlapping the mask
    let mut overlapping = answer.clone();
    overlapping.range.shard_id = 3;
    let err = mine
        .dry_run(&harness.flow, &overlapping)
        .expect_err("masked bits set");
    assert!(matches!(err, MineError::MaskedBitsNonZero { .. }));
    assert_eq!(err.kind(), ErrorKind::Shard);
    assert!(err.to_string().contains("masked bits should be zero"));

    // 64 shards against a limit of 32
    let mut too_many = answer.clone();
    too_many.range.shard_mask = u64::MAX << 6;
    too_many.range.shard_id = 0;
    let err = mine.dry_run(&harness.flow, &too_many).expect_err("too many");
    assert!(matches!(err, MineError::TooManyShards { shards: 64, max: 32 }));

    // mask with a hole
    let mut holed = answer.clone();
    holed.range.shard_mask = u64::MAX ^ 0b100;
    holed.range.shard_id = 0;
    let err = mine.dry_run(&harness.flow, &holed).expect_err("bad mask");
    assert_eq!(err.kind(), ErrorKind::Shard);
}
