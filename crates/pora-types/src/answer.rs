//! Mining answer submitted to the validator.

use serde::{Deserialize, Serialize};
use serde_with::serde_as;

use crate::context::RecallRange;
use crate::{Hash, MinerId};

/// A candidate proof of random access.
///
/// `sealed_data` holds one seal batch (128 units of 32 bytes) exactly as the
/// miner stores it. `merkle_proof` lists the sibling hashes from the seal
/// subtree root upward to the committed flow root.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoraAnswer {
    #[serde_as(as = "serde_with::hex::Hex")]
    pub context_digest: Hash,
    #[serde_as(as = "serde_with::hex::Hex")]
    pub nonce: Hash,
    #[serde_as(as = "serde_with::hex::Hex")]
    pub miner_id: MinerId,
    pub range: RecallRange,
    /// First sector of the recalled seal batch.
    pub recall_position: u64,
    /// Index of the seal batch inside the recalled load.
    pub seal_offset: u64,
    /// Context under which the batch was sealed.
    #[serde_as(as = "serde_with::hex::Hex")]
    pub sealed_context_digest: Hash,
    #[serde_as(as = "Vec<serde_with::hex::Hex>")]
    pub sealed_data: Vec<Hash>,
    #[serde_as(as = "Vec<serde_with::hex::Hex>")]
    pub merkle_proof: Vec<Hash>,
}

impl PoraAnswer {
    /// Serialize to JSON.
    ///
    /// # Errors
    ///
    /// Returns [`crate::TypesError::Serialization`] on failure.
    pub fn to_json(&self) -> crate::Result<String> {
        serde_json::to_string(self).map_err(|e| crate::TypesError::Serialization(e.to_string()))
    }

    /// Deserialize from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`crate::TypesError::Serialization`] on malformed input.
    pub fn from_json(json: &str) -> crate::Result<Self> {
        serde_json::from_str(json).map_err(|e| crate::TypesError::Serialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PoraAnswer {
        PoraAnswer {
            context_digest: [1u8; 32],
            nonce: [2u8; 32],
            miner_id: [3u8; 32],
            range: RecallRange::full(0, 1 << 20),
            recall_position: 11 * 16,
            seal_offset: 11,
            sealed_context_digest: [4u8; 32],
            sealed_data: vec![[5u8; 32]; 128],
            merkle_proof: vec![[6u8; 32]; 3],
        }
    }

    #[test]
    fn test_json_roundtrip() {
        let answer = sample();
        let json = answer.to_json().expect("serialize");
        assert!(json.contains(&"05".repeat(32)));
        assert_eq!(PoraAnswer::from_json(&json).expect("deserialize"), answer);
    }

    #[test]
    fn test_json_rejects_short_hash() {
        let json = sample()
            .to_json()
            .expect("serialize")
            .replacen(&"01".repeat(32), "0101", 1);
        assert!(PoraAnswer::from_json(&json).is_err());
    }
}
