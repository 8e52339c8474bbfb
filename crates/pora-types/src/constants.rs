//! Storage and mining geometry.
//!
//! All positions and lengths in the flow are counted in sectors. These values
//! must match bit-for-bit across every implementation.

/// Bytes per sector, the atomic storage unit.
pub const BYTES_PER_SECTOR: usize = 256;

/// Bytes per hashed unit inside a sector.
pub const BYTES_PER_UNIT: usize = 32;

/// Units per sector.
pub const UNITS_PER_SECTOR: usize = BYTES_PER_SECTOR / BYTES_PER_UNIT;

/// Sectors per load, the unit recalled by one mining attempt.
pub const SECTORS_PER_LOAD: u64 = 1024;

/// Sectors per seal batch, the unit that is sealed, mixed and proven.
pub const SECTORS_PER_SEAL: u64 = 16;

/// Height of a seal batch's Merkle subtree (`2^4 = 16` sectors).
pub const SEAL_HEIGHT: u32 = 4;

/// Units per seal batch.
pub const UNITS_PER_SEAL: usize = SECTORS_PER_SEAL as usize * UNITS_PER_SECTOR;

/// Seal batches per load.
pub const SEALS_PER_LOAD: u64 = SECTORS_PER_LOAD / SECTORS_PER_SEAL;

/// Bytes per scratch-pad element (one BLAKE2b-512 width).
pub const BYTES_PER_BHASH: usize = 64;

/// Scratch-pad elements consumed by one seal batch.
pub const BHASHES_PER_SEAL: usize = UNITS_PER_SEAL * BYTES_PER_UNIT / BYTES_PER_BHASH;

/// Seal batches covered by one scratch pad before it wraps.
pub const SEALS_PER_PAD: u64 = 16;

/// Elements in one scratch pad.
pub const BHASHES_PER_PAD: usize = BHASHES_PER_SEAL * SEALS_PER_PAD as usize;

/// Maximum mining range per shard: 8 TiB of sectors.
pub const MAX_MINING_LENGTH: u64 = (8 << 40) / BYTES_PER_SECTOR as u64;

/// Alignment of a mining range start: 8 GiB of sectors.
pub const START_ALIGNMENT: u64 = (8 << 30) / BYTES_PER_SECTOR as u64;

/// Largest supported flow tree height.
pub const MAX_TREE_HEIGHT: u32 = 64;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geometry() {
        assert_eq!(UNITS_PER_SEAL, 128);
        assert_eq!(SEALS_PER_LOAD, 64);
        assert_eq!(BHASHES_PER_SEAL, 64);
        assert_eq!(BHASHES_PER_PAD, 1024);
        assert_eq!(1u64 << SEAL_HEIGHT, SECTORS_PER_SEAL);
    }

    #[test]
    fn test_range_limits() {
        assert_eq!(MAX_MINING_LENGTH, 1 << 35);
        assert_eq!(START_ALIGNMENT, 1 << 25);
        assert_eq!(MAX_MINING_LENGTH % SECTORS_PER_LOAD, 0);
    }
}
