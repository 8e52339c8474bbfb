//! Flow submissions.
//!
//! A submission is a data segment already reduced to the roots of aligned
//! subtrees, largest first. A segment of 3 * 2^10 sectors, for instance, is
//! submitted as a height-11 node followed by a height-10 node.

use serde::{Deserialize, Serialize};
use serde_with::serde_as;

use crate::Hash;

/// Root of one aligned subtree of a submission.
#[serde_as]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionNode {
    #[serde_as(as = "serde_with::hex::Hex")]
    pub root: Hash,
    /// `log2` of the sectors under `root`.
    pub height: u32,
}

#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    /// Data length in sectors, before padding of the last node.
    pub length: u64,
    /// Opaque application tags.
    #[serde_as(as = "serde_with::hex::Hex")]
    #[serde(default)]
    pub tags: Vec<u8>,
    pub nodes: Vec<SubmissionNode>,
}

impl Submission {
    /// Sectors covered by all nodes, padding of the last node included.
    pub fn node_span(&self) -> u64 {
        self.nodes
            .iter()
            .map(|n| 1u64.checked_shl(n.height).unwrap_or(0))
            .fold(0u64, u64::saturating_add)
    }
}

/// Returned by the flow for an accepted submission.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionReceipt {
    /// Sequence number of the submission.
    pub index: u64,
    /// Flow position of the first node, after alignment padding.
    pub start_position: u64,
    /// Sectors added to the flow, padding included.
    pub appended_length: u64,
    /// Flow length after the submission.
    pub total_length: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_span() {
        let sub = Submission {
            length: 3 * 1024,
            tags: vec![],
            nodes: vec![
                SubmissionNode { root: [0u8; 32], height: 11 },
                SubmissionNode { root: [0u8; 32], height: 10 },
            ],
        };
        assert_eq!(sub.node_span(), 3 * 1024);
    }

    #[test]
    fn test_tags_default_empty() {
        let json = r#"{"length":1,"nodes":[]}"#;
        let sub: Submission = serde_json::from_str(json).expect("deserialize");
        assert!(sub.tags.is_empty());
    }
}
