//! Miner registry.
//!
//! Each miner id maps to the address that receives its rewards and the last
//! epoch in which it had an answer accepted. Only the current beneficiary may
//! hand the miner over to a new one.

use std::collections::HashMap;

use pora_crypto::keccak::keccak256_concat;
use pora_crypto::word::encode_u256;
use pora_types::{Address, MinerId};
use serde::{Deserialize, Serialize};
use serde_with::serde_as;
use tracing::info;

use crate::{MineError, Result};

#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinerRecord {
    #[serde_as(as = "serde_with::hex::Hex")]
    pub miner_id: MinerId,
    #[serde_as(as = "serde_with::hex::Hex")]
    pub beneficiary: Address,
    /// 0 until the first accepted answer.
    pub last_mined_epoch: u64,
}

/// Derive a miner id from its first beneficiary and a seed.
pub fn derive_miner_id(beneficiary: &Address, seed: u64) -> MinerId {
    keccak256_concat(&[&beneficiary[..], &encode_u256(seed)[..]])
}

#[derive(Clone, Debug, Default)]
pub struct MinerRegistry {
    miners: HashMap<MinerId, MinerRecord>,
}

impl MinerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    ///
    /// Returns [`MineError::MinerAlreadyRegistered`] for a known id.
    pub fn register(&mut self, miner_id: MinerId, beneficiary: Address) -> Result<()> {
        if self.miners.contains_key(&miner_id) {
            return Err(MineError::MinerAlreadyRegistered(hex::encode(miner_id)));
        }
        self.miners.insert(
            miner_id,
            MinerRecord {
                miner_id,
                beneficiary,
                last_mined_epoch: 0,
            },
        );
        info!(
            miner = %hex::encode(miner_id),
            beneficiary = %hex::encode(beneficiary),
            "miner registered"
        );
        Ok(())
    }

    /// Register a miner under [`derive_miner_id`].
    ///
    /// # Errors
    ///
    /// Returns [`MineError::MinerAlreadyRegistered`] if the seed was used.
    pub fn request_miner_id(&mut self, beneficiary: Address, seed: u64) -> Result<MinerId> {
        let miner_id = derive_miner_id(&beneficiary, seed);
        self.register(miner_id, beneficiary)?;
        Ok(miner_id)
    }

    /// Hand `miner_id` over to `new_beneficiary`.
    ///
    /// # Errors
    ///
    /// Returns [`MineError::UnknownMiner`], or [`MineError::NotBeneficiary`]
    /// when `caller` is not the current beneficiary.
    pub fn transfer_beneficiary(
        &mut self,
        caller: &Address,
        miner_id: &MinerId,
        new_beneficiary: Address,
    ) -> Result<()> {
        let record = self
            .miners
            .get_mut(miner_id)
            .ok_or_else(|| MineError::UnknownMiner(hex::encode(miner_id)))?;
        if record.beneficiary != *caller {
            return Err(MineError::NotBeneficiary(hex::encode(miner_id)));
        }
        record.beneficiary = new_beneficiary;
        info!(
            miner = %hex::encode(miner_id),
            beneficiary = %hex::encode(new_beneficiary),
            "beneficiary transferred"
        );
        Ok(())
    }

    pub fn get(&self, miner_id: &MinerId) -> Option<&MinerRecord> {
        self.miners.get(miner_id)
    }

    pub fn len(&self) -> usize {
        self.miners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.miners.is_empty()
    }

    /// Check that `miner_id` may have an answer accepted in `epoch`.
    ///
    /// # Errors
    ///
    /// Returns [`MineError::UnknownMiner`] or [`MineError::AlreadyMined`].
    pub fn check_can_mine(&self, miner_id: &MinerId, epoch: u64) -> Result<&MinerRecord> {
        let record = self
            .get(miner_id)
            .ok_or_else(|| MineError::UnknownMiner(hex::encode(miner_id)))?;
        if record.last_mined_epoch >= epoch {
            return Err(MineError::AlreadyMined {
                miner: hex::encode(miner_id),
                epoch,
            });
        }
        Ok(record)
    }

    /// Record an accepted answer in `epoch`.
    ///
    /// # Errors
    ///
    /// See [`Self::check_can_mine`].
    pub fn mark_mined(&mut self, miner_id: &MinerId, epoch: u64) -> Result<()> {
        self.check_can_mine(miner_id, epoch)?;
        if let Some(record) = self.miners.get_mut(miner_id) {
            record.last_mined_epoch = epoch;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    const ALICE: Address = [0xa1; 20];
    const BOB: Address = [0xb0; 20];

    #[test]
    fn test_register_and_duplicate() {
        let mut registry = MinerRegistry::new();
        registry.register([1u8; 32], ALICE).expect("register");
        assert_eq!(registry.len(), 1);
        let err = registry.register([1u8; 32], BOB).expect_err("duplicate");
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(
            registry.get(&[1u8; 32]).expect("record").beneficiary,
            ALICE
        );
    }

    #[test]
    fn test_request_miner_id_is_derived() {
        let mut registry = MinerRegistry::new();
        let id = registry.request_miner_id(ALICE, 7).expect("request");
        assert_eq!(id, derive_miner_id(&ALICE, 7));
        assert_ne!(id, derive_miner_id(&ALICE, 8));
        assert!(registry.request_miner_id(ALICE, 7).is_err());
    }

    #[test]
    fn test_transfer_requires_beneficiary() {
        let mut registry = MinerRegistry::new();
        registry.register([1u8; 32], ALICE).expect("register");
        let err = registry
            .transfer_beneficiary(&BOB, &[1u8; 32], BOB)
            .expect_err("not beneficiary");
        assert_eq!(err.kind(), ErrorKind::Permission);

        registry
            .transfer_beneficiary(&ALICE, &[1u8; 32], BOB)
            .expect("transfer");
        assert_eq!(registry.get(&[1u8; 32]).expect("record").beneficiary, BOB);

        assert!(matches!(
            registry.transfer_beneficiary(&ALICE, &[2u8; 32], BOB),
            Err(MineError::UnknownMiner(_))
        ));
    }

    #[test]
    fn test_mark_mined_once_per_epoch() {
        let mut registry = MinerRegistry::new();
        registry.register([1u8; 32], ALICE).expect("register");
        registry.mark_mined(&[1u8; 32], 3).expect("first");
        assert!(matches!(
            registry.mark_mined(&[1u8; 32], 3),
            Err(MineError::AlreadyMined { epoch: 3, .. })
        ));
        assert!(registry.mark_mined(&[1u8; 32], 2).is_err());
        registry.mark_mined(&[1u8; 32], 4).expect("next epoch");
        assert_eq!(
            registry.get(&[1u8; 32]).expect("record").last_mined_epoch,
            4
        );
    }
}
