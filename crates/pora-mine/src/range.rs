//! Mining range and shard checks.
//!
//! A shard mask is a block of high ones; its trailing zeros select how many
//! shards the load index space is split into. Each shard may cover up to
//! [`MAX_MINING_LENGTH`] sectors, so a sharded miner may declare a
//! proportionally longer range and competes against a proportionally lower
//! target.
//!
//! ```text
//! shards       = 2^trailing_zeros(shard_mask)
//! max_length   = MAX_MINING_LENGTH * shards
//! min_length   = floor_to_load(min(flow_length, max_length))
//! ```

use pora_types::constants::{
    MAX_MINING_LENGTH, SECTORS_PER_LOAD, SECTORS_PER_SEAL, SEALS_PER_LOAD, START_ALIGNMENT,
};
use pora_types::context::RecallRange;
use pora_types::U256;

use crate::{MineError, Result};

/// Shards implied by `shard_mask`, without validating its shape.
pub fn num_shards(shard_mask: u64) -> u64 {
    1u64.checked_shl(shard_mask.trailing_zeros()).unwrap_or(u64::MAX)
}

/// Round down to a whole number of loads.
pub fn floor_to_load(sectors: u64) -> u64 {
    sectors - sectors % SECTORS_PER_LOAD
}

/// Check the range against the flow, in order: overflow, length, alignment,
/// minimum length.
///
/// # Errors
///
/// Returns [`MineError::RangeOverflow`], [`MineError::RangeTooLong`],
/// [`MineError::StartNotAligned`] or [`MineError::RangeTooShort`].
pub fn check_range(range: &RecallRange, flow_length: u64) -> Result<()> {
    let overflow = MineError::RangeOverflow {
        start: range.start_position,
        length: range.mine_length,
        flow_length,
    };
    let end = range
        .start_position
        .checked_add(range.mine_length)
        .ok_or_else(|| overflow.clone())?;
    if end > flow_length {
        return Err(overflow);
    }

    let max = MAX_MINING_LENGTH.saturating_mul(num_shards(range.shard_mask));
    if range.mine_length > max {
        return Err(MineError::RangeTooLong {
            length: range.mine_length,
            max,
        });
    }

    if !range.start_position.is_multiple_of(START_ALIGNMENT) {
        return Err(MineError::StartNotAligned(range.start_position));
    }

    let min = floor_to_load(flow_length.min(max));
    if range.mine_length < min {
        return Err(MineError::RangeTooShort {
            length: range.mine_length,
            min,
        });
    }
    Ok(())
}

/// Check the shard mask shape, shard count and shard id.
///
/// # Returns
///
/// The number of shards.
///
/// # Errors
///
/// Returns [`MineError::InvalidShardMask`], [`MineError::TooManyShards`] or
/// [`MineError::MaskedBitsNonZero`].
pub fn check_shard(range: &RecallRange, max_shards: u64) -> Result<u64> {
    let low = !range.shard_mask;
    if range.shard_mask == 0 || low & low.wrapping_add(1) != 0 {
        return Err(MineError::InvalidShardMask(range.shard_mask));
    }
    let shards = low + 1;
    if shards > max_shards {
        return Err(MineError::TooManyShards {
            shards,
            max: max_shards,
        });
    }
    if range.shard_id & range.shard_mask != 0 {
        return Err(MineError::MaskedBitsNonZero {
            shard_id: range.shard_id,
            shard_mask: range.shard_mask,
        });
    }
    Ok(shards)
}

/// Check that the claimed recall position is a seal batch inside the range
/// at `seal_offset`.
///
/// # Errors
///
/// Returns [`MineError::InvalidSealOffset`] or [`MineError::RecallOutsideRange`].
pub fn check_recall(range: &RecallRange, recall_position: u64, seal_offset: u64) -> Result<()> {
    if seal_offset >= SEALS_PER_LOAD {
        return Err(MineError::InvalidSealOffset(seal_offset));
    }
    let outside = MineError::RecallOutsideRange(recall_position);
    let load_position = recall_position
        .checked_sub(range.start_position)
        .and_then(|rel| rel.checked_sub(seal_offset * SECTORS_PER_SEAL))
        .ok_or_else(|| outside.clone())?;
    if !load_position.is_multiple_of(SECTORS_PER_LOAD)
        || recall_position.saturating_add(SECTORS_PER_SEAL) > range.end_position()
    {
        return Err(outside);
    }
    Ok(())
}

/// Target a single shard competes against.
pub fn scale_target(target: U256, shards: u64) -> U256 {
    target / U256::from(shards.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TB: u64 = (1 << 40) / 256;
    const GB: u64 = (1 << 30) / 256;
    const KB: u64 = 1024 / 256;

    fn range(start: u64, length: u64, shard_mask: u64) -> RecallRange {
        RecallRange {
            start_position: start,
            mine_length: length,
            shard_id: 0,
            shard_mask,
        }
    }

    #[test]
    fn test_basic_range_checks() {
        let flow = 10 * TB;
        let check = |start, length| check_range(&range(start, length, u64::MAX), flow);

        assert!(matches!(check(3 * TB, 8 * TB), Err(MineError::RangeOverflow { .. })));
        assert!(matches!(
            check(2 * TB - GB, 8 * TB),
            Err(MineError::StartNotAligned(_))
        ));
        assert!(matches!(
            check(2 * TB, 8 * TB - 8 * GB),
            Err(MineError::RangeTooShort { .. })
        ));
        check(2 * TB, 8 * TB).expect("full-length range");
        check(8 * GB, 8 * TB).expect("aligned start");
        assert!(matches!(check(0, 8 * TB + 1024), Err(MineError::RangeTooLong { .. })));
    }

    #[test]
    fn test_tail_range_rounded_to_load() {
        let flow = 8 * TB - 1;
        check_range(&range(0, 8 * TB - 256 * KB, u64::MAX), flow).expect("tail rounded down");
        assert!(matches!(
            check_range(&range(8 * GB, 8 * TB - 16 * GB, u64::MAX), flow),
            Err(MineError::RangeTooShort { .. })
        ));
    }

    #[test]
    fn test_sharded_range_checks() {
        let mask = u64::MAX - 1;
        let flow = 20 * TB;
        let check = |start, length, flow| check_range(&range(start, length, mask), flow);

        assert!(matches!(
            check(6 * TB, 16 * TB, flow),
            Err(MineError::RangeOverflow { .. })
        ));
        assert!(matches!(
            check(4 * TB - GB, 16 * TB, flow),
            Err(MineError::StartNotAligned(_))
        ));
        assert!(matches!(
            check(4 * TB, 16 * TB - 8 * GB, flow),
            Err(MineError::RangeTooShort { .. })
        ));
        check(4 * TB, 16 * TB, flow).expect("two shards double the length");
        check(16 * GB, 16 * TB, flow).expect("aligned start");

        let flow = 16 * TB - 1;
        check(0, 16 * TB - 256 * KB, flow).expect("tail rounded down");
        assert!(matches!(
            check(8 * GB, 16 * TB - 16 * GB, flow),
            Err(MineError::RangeTooShort { .. })
        ));
    }

    #[test]
    fn test_overflowing_range() {
        assert!(matches!(
            check_range(&range(u64::MAX, 2, u64::MAX), u64::MAX),
            Err(MineError::RangeOverflow { .. })
        ));
    }

    #[test]
    fn test_shard_checks() {
        let mut r = range(0, 0, u64::MAX - 1);
        r.shard_id = 3;
        assert!(matches!(
            check_shard(&r, 32),
            Err(MineError::MaskedBitsNonZero { .. })
        ));
        r.shard_id = 1;
        assert_eq!(check_shard(&r, 32).expect("valid"), 2);

        r.shard_mask = u64::MAX << 3;
        r.shard_id = 7;
        assert_eq!(check_shard(&r, 32).expect("valid"), 8);

        r.shard_mask = u64::MAX << 6;
        r.shard_id = 0;
        assert!(matches!(
            check_shard(&r, 32),
            Err(MineError::TooManyShards { shards: 64, max: 32 })
        ));

        for bad in [0u64, 0b1011, u64::MAX ^ 0b100] {
            r.shard_mask = bad;
            assert!(matches!(
                check_shard(&r, 32),
                Err(MineError::InvalidShardMask(_))
            ));
        }
    }

    #[test]
    fn test_num_shards() {
        assert_eq!(num_shards(u64::MAX), 1);
        assert_eq!(num_shards(u64::MAX << 5), 32);
        assert_eq!(num_shards(0), u64::MAX);
    }

    #[test]
    fn test_recall_checks() {
        let r = range(START_ALIGNMENT, 4 * SECTORS_PER_LOAD, u64::MAX);
        let load = START_ALIGNMENT + 2 * SECTORS_PER_LOAD;
        check_recall(&r, load + 11 * SECTORS_PER_SEAL, 11).expect("valid");
        check_recall(&r, r.end_position() - SECTORS_PER_SEAL, 63).expect("last batch");
        assert!(matches!(
            check_recall(&r, load + 11 * SECTORS_PER_SEAL, 12),
            Err(MineError::RecallOutsideRange(_))
        ));
        assert!(matches!(
            check_recall(&r, load + 1, 0),
            Err(MineError::RecallOutsideRange(_))
        ));
        assert!(matches!(
            check_recall(&r, 0, 0),
            Err(MineError::RecallOutsideRange(_))
        ));
        assert!(matches!(
            check_recall(&r, r.end_position(), 0),
            Err(MineError::RecallOutsideRange(_))
        ));
        assert!(matches!(
            check_recall(&r, load, 64),
            Err(MineError::InvalidSealOffset(64))
        ));
    }

    #[test]
    fn test_scale_target() {
        assert_eq!(scale_target(U256::MAX, 1), U256::MAX);
        assert_eq!(scale_target(U256::from(800u64), 8), U256::from(100u64));
    }
}
