use alloy_primitives::B256;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::identity::Identity;
use crate::crypto::leaf::hash_sorted_pair;

/// Sibling path proving one leaf's membership under a root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EligibilityProof {
    pub leaf: B256,
    /// Sibling hashes from the leaf level upward, root excluded.
    pub path: Vec<B256>,
}

impl EligibilityProof {
    pub fn verify(&self, root: B256) -> bool {
        verify_proof(self.leaf, &self.path, root)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
    #[error("cannot build an eligibility tree from zero leaves")]
    Empty,
}

/// Binary Merkle tree over a campaign's eligible leaves.
///
/// Leaves are deduplicated and sorted before building, so the root depends
/// only on the leaf set. Internal nodes use [`hash_sorted_pair`]. When a level
/// has an odd count the last node is promoted unchanged to the next level and
/// contributes no proof element there.
#[derive(Debug, Clone)]
pub struct EligibilityTree {
    /// `levels[0]` holds the sorted leaves, the last level holds the root.
    levels: Vec<Vec<B256>>,
    duplicates: usize,
}

impl EligibilityTree {
    pub fn build<I>(leaves: I) -> Result<Self, TreeError>
    where
        I: IntoIterator<Item = B256>,
    {
        let mut base: Vec<B256> = leaves.into_iter().collect();
        let supplied = base.len();
        base.sort_unstable();
        base.dedup();

        if base.is_empty() {
            return Err(TreeError::Empty);
        }

        let duplicates = supplied - base.len();
        if duplicates > 0 {
            warn!(duplicates, "duplicate leaves dropped while building eligibility tree");
        }

        let mut levels = vec![base];
        while let Some(level) = levels.last().filter(|level| level.len() > 1) {
            let next = level
                .chunks(2)
                .map(|pair| match pair {
                    [left, right] => hash_sorted_pair(*left, *right),
                    [single] => *single,
                    _ => unreachable!("chunks(2) yields one or two nodes"),
                })
                .collect();
            levels.push(next);
        }

        Ok(Self { levels, duplicates })
    }

    /// Build from identities, hashing each with the canonical leaf function.
    pub fn from_identities(identities: &[Identity]) -> Result<Self, TreeError> {
        Self::build(identities.iter().map(Identity::leaf))
    }

    pub fn root(&self) -> B256 {
        // `build` guarantees at least one level with exactly one node on top.
        self.levels[self.levels.len() - 1][0]
    }

    /// Sorted, deduplicated leaves.
    pub fn leaves(&self) -> &[B256] {
        &self.levels[0]
    }

    pub fn len(&self) -> usize {
        self.levels[0].len()
    }

    /// Always false: `build` rejects an empty leaf set.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Number of duplicate leaves removed during the build.
    pub fn duplicates(&self) -> usize {
        self.duplicates
    }

    /// Number of levels above the leaves.
    pub fn depth(&self) -> usize {
        self.levels.len() - 1
    }

    pub fn contains(&self, leaf: B256) -> bool {
        self.levels[0].binary_search(&leaf).is_ok()
    }

    /// Proof for `leaf`, or `None` if the leaf is not in the tree.
    pub fn prove(&self, leaf: B256) -> Option<EligibilityProof> {
        let index = self.levels[0].binary_search(&leaf).ok()?;
        Some(self.prove_index(index))
    }

    /// Proofs for every leaf, derived from this single build.
    pub fn proofs(&self) -> impl Iterator<Item = EligibilityProof> + '_ {
        (0..self.len()).map(|index| self.prove_index(index))
    }

    fn prove_index(&self, mut index: usize) -> EligibilityProof {
        let leaf = self.levels[0][index];
        let mut path = Vec::with_capacity(self.depth());
        for level in &self.levels[..self.levels.len() - 1] {
            if let Some(sibling) = level.get(index ^ 1) {
                path.push(*sibling);
            }
            index /= 2;
        }
        EligibilityProof { leaf, path }
    }
}

/// Recompute a root from `leaf` and `proof` with the sorted-pair rule and
/// compare it against `root`.
pub fn verify_proof(leaf: B256, proof: &[B256], root: B256) -> bool {
    compute_root(leaf, proof) == root
}

/// Fold `proof` over `leaf` with the sorted-pair rule.
pub fn compute_root(leaf: B256, proof: &[B256]) -> B256 {
    proof
        .iter()
        .fold(leaf, |node, sibling| hash_sorted_pair(node, *sibling))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::leaf::hash_identity;

    fn leaves(names: &[&str]) -> Vec<B256> {
        names.iter().map(|n| hash_identity(n)).collect()
    }

    #[test]
    fn test_empty_input_rejected() {
        assert_eq!(
            EligibilityTree::build(Vec::<B256>::new()).unwrap_err(),
            TreeError::Empty
        );
    }

    #[test]
    fn test_single_leaf_root_is_leaf() {
        let leaf = hash_identity("solo@x.com");
        let tree = EligibilityTree::build([leaf]).unwrap();
        assert_eq!(tree.root(), leaf);
        let proof = tree.prove(leaf).unwrap();
        assert!(proof.path.is_empty());
        assert!(proof.verify(tree.root()));
    }

    #[test]
    fn test_two_leaves_root_is_sorted_pair() {
        let l = leaves(&["a@x.com", "b@x.com"]);
        let tree = EligibilityTree::build(l.clone()).unwrap();
        assert_eq!(tree.root(), hash_sorted_pair(l[0], l[1]));
        assert_eq!(tree.depth(), 1);
    }

    #[test]
    fn test_root_independent_of_order() {
        let mut l = leaves(&["a@x.com", "b@x.com", "c@x.com", "d@x.com", "e@x.com"]);
        let forward = EligibilityTree::build(l.clone()).unwrap().root();
        l.reverse();
        let backward = EligibilityTree::build(l.clone()).unwrap().root();
        l.swap(0, 3);
        let shuffled = EligibilityTree::build(l).unwrap().root();
        assert_eq!(forward, backward);
        assert_eq!(forward, shuffled);
    }

    #[test]
    fn test_duplicates_dropped_and_counted() {
        let mut l = leaves(&["a@x.com", "b@x.com", "c@x.com"]);
        let clean = EligibilityTree::build(l.clone()).unwrap();
        l.push(l[1]);
        l.push(l[0]);
        let dup = EligibilityTree::build(l).unwrap();
        assert_eq!(dup.duplicates(), 2);
        assert_eq!(dup.len(), 3);
        assert_eq!(dup.root(), clean.root());
    }

    #[test]
    fn test_every_leaf_proves_for_many_sizes() {
        for size in 1..=33usize {
            let l: Vec<B256> = (0..size)
                .map(|i| hash_identity(&format!("user{i}@x.com")))
                .collect();
            let tree = EligibilityTree::build(l.clone()).unwrap();
            for leaf in &l {
                let proof = tree.prove(*leaf).unwrap();
                assert!(
                    verify_proof(*leaf, &proof.path, tree.root()),
                    "size {size}: proof failed"
                );
            }
            assert_eq!(tree.proofs().count(), size);
        }
    }

    #[test]
    fn test_odd_node_is_promoted() {
        let l = leaves(&["a@x.com", "b@x.com", "c@x.com"]);
        let tree = EligibilityTree::build(l).unwrap();
        let sorted = tree.leaves().to_vec();
        let expected = hash_sorted_pair(hash_sorted_pair(sorted[0], sorted[1]), sorted[2]);
        assert_eq!(tree.root(), expected);
        // The promoted leaf only needs one sibling: the hash of the other pair.
        assert_eq!(tree.prove(sorted[2]).unwrap().path.len(), 1);
    }

    #[test]
    fn test_absent_leaf_not_found() {
        let tree = EligibilityTree::build(leaves(&["a@x.com", "b@x.com"])).unwrap();
        assert!(tree.prove(hash_identity("mallory@x.com")).is_none());
        assert!(!tree.contains(hash_identity("mallory@x.com")));
    }

    #[test]
    fn test_proof_not_reusable_across_leaves() {
        let l = leaves(&["a@x.com", "b@x.com", "c@x.com", "d@x.com"]);
        let tree = EligibilityTree::build(l.clone()).unwrap();
        let proof_a = tree.prove(l[0]).unwrap();
        for other in &l[1..] {
            assert!(!verify_proof(*other, &proof_a.path, tree.root()));
        }
    }

    #[test]
    fn test_tampered_proof_fails() {
        let l = leaves(&["a@x.com", "b@x.com", "c@x.com", "d@x.com"]);
        let tree = EligibilityTree::build(l.clone()).unwrap();
        let mut proof = tree.prove(l[2]).unwrap();
        proof.path[0] = B256::repeat_byte(0x11);
        assert!(!proof.verify(tree.root()));
    }

    #[test]
    fn test_proofs_match_prove() {
        let l = leaves(&["a@x.com", "b@x.com", "c@x.com", "d@x.com", "e@x.com"]);
        let tree = EligibilityTree::build(l).unwrap();
        for proof in tree.proofs() {
            assert_eq!(Some(proof.clone()), tree.prove(proof.leaf));
        }
    }
}
