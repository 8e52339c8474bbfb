//! In-memory reward book.

use std::collections::BTreeMap;

use pora_mine::validator::{RewardClaim, RewardSink};
use pora_types::Address;
use serde::Serialize;

#[derive(Debug, Default)]
pub struct RewardBook {
    claims: Vec<RewardClaim>,
    per_beneficiary: BTreeMap<Address, u64>,
}

/// Totals for the run summary.
#[derive(Debug, Serialize)]
pub struct RewardSummary {
    pub claims: usize,
    /// Claims per beneficiary, hex keyed.
    pub beneficiaries: BTreeMap<String, u64>,
}

impl RewardBook {
    pub fn claims(&self) -> &[RewardClaim] {
        &self.claims
    }

    pub fn count_for(&self, beneficiary: &Address) -> u64 {
        self.per_beneficiary.get(beneficiary).copied().unwrap_or(0)
    }

    pub fn summary(&self) -> RewardSummary {
        RewardSummary {
            claims: self.claims.len(),
            beneficiaries: self
                .per_beneficiary
                .iter()
                .map(|(addr, n)| (hex::encode(addr), *n))
                .collect(),
        }
    }
}

impl RewardSink for RewardBook {
    fn claim_mine_reward(&mut self, claim: RewardClaim) {
        *self.per_beneficiary.entry(claim.beneficiary).or_insert(0) += 1;
        self.claims.push(claim);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_book_counts_claims() {
        let mut book = RewardBook::default();
        for epoch in 1..=3 {
            book.claim_mine_reward(RewardClaim {
                epoch,
                beneficiary: [epoch as u8 % 2; 20],
                miner_id: [0u8; 32],
                recall_position: 0,
            });
        }
        assert_eq!(book.claims().len(), 3);
        assert_eq!(book.count_for(&[1u8; 20]), 2);
        assert_eq!(book.count_for(&[0u8; 20]), 1);
        let summary = book.summary();
        assert_eq!(summary.beneficiaries.get(&"01".repeat(20)), Some(&2));
    }
}
