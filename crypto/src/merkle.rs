//! Append-only Merkle tree of fixed depth.
//!
//! Only the occupied part of the tree is materialised: level `l` holds
//! `ceil(len / 2^l)` nodes and every missing node is the precomputed empty
//! subtree hash for that level. Inserting a leaf rehashes one path, so a
//! depth-32 tree costs memory proportional to its members, not its capacity.

use std::collections::HashMap;
use std::fmt;

use cohort_types::{Commitment, MerkleRoot, NodeHash};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::hash::{blake2b_256, hash_pair};

/// Deepest tree the primitive accepts (`2^32` leaves).
pub const MAX_TREE_DEPTH: u8 = 32;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TreeError {
    #[error("tree depth {0} is outside 1..={MAX_TREE_DEPTH}")]
    InvalidDepth(u8),

    #[error("tree is full ({capacity} leaves)")]
    Full { capacity: u64 },

    #[error("leaf index {index} out of range (tree holds {len} leaves)")]
    IndexOutOfRange { index: usize, len: usize },
}

/// Incremental Merkle tree over 256-bit leaves.
#[derive(Clone)]
pub struct IncrementalMerkleTree {
    depth: u8,
    /// `zeros[l]` is the root of an empty subtree of height `l`.
    zeros: Vec<[u8; 32]>,
    /// `layers[0]` are the leaves, `layers[depth]` holds at most the root.
    layers: Vec<Vec<[u8; 32]>>,
    positions: HashMap<Commitment, usize>,
}

impl IncrementalMerkleTree {
    /// Create an empty tree whose empty leaves are zero.
    pub fn new(depth: u8) -> Result<Self, TreeError> {
        Self::with_zero_leaf(depth, [0u8; 32])
    }

    /// Create an empty tree whose empty-leaf value is derived from `seed`.
    ///
    /// Two trees built from the same seed, depth and leaves always share a
    /// root, while trees with different seeds never collide on empty slots.
    pub fn with_seed(seed: &[u8], depth: u8) -> Result<Self, TreeError> {
        Self::with_zero_leaf(depth, blake2b_256(seed))
    }

    fn with_zero_leaf(depth: u8, zero_leaf: [u8; 32]) -> Result<Self, TreeError> {
        if depth == 0 || depth > MAX_TREE_DEPTH {
            return Err(TreeError::InvalidDepth(depth));
        }
        let mut zeros = Vec::with_capacity(depth as usize + 1);
        zeros.push(zero_leaf);
        for level in 0..depth as usize {
            let z = zeros[level];
            zeros.push(hash_pair(&z, &z));
        }
        Ok(Self {
            depth,
            zeros,
            layers: vec![Vec::new(); depth as usize + 1],
            positions: HashMap::new(),
        })
    }

    pub fn depth(&self) -> u8 {
        self.depth
    }

    /// Maximum number of leaves (`2^depth`).
    pub fn capacity(&self) -> u64 {
        1u64 << self.depth
    }

    pub fn len(&self) -> usize {
        self.layers[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers[0].is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.len() as u64 >= self.capacity()
    }

    /// Current root. An empty tree reports the empty-subtree hash of its depth.
    pub fn root(&self) -> MerkleRoot {
        let top = self.layers[self.depth as usize]
            .first()
            .copied()
            .unwrap_or(self.zeros[self.depth as usize]);
        MerkleRoot::new(top)
    }

    /// Leaves in insertion order.
    pub fn leaves(&self) -> impl Iterator<Item = Commitment> + '_ {
        self.layers[0].iter().map(|leaf| Commitment::new(*leaf))
    }

    /// Append a leaf and return its index.
    pub fn insert(&mut self, leaf: Commitment) -> Result<usize, TreeError> {
        if self.is_full() {
            return Err(TreeError::Full {
                capacity: self.capacity(),
            });
        }
        let index = self.len();
        self.layers[0].push(leaf.into_bytes());
        self.positions.entry(leaf).or_insert(index);

        let mut idx = index;
        for level in 0..self.depth as usize {
            let parent = idx / 2;
            let left = self.layers[level][parent * 2];
            let right = self.layers[level]
                .get(parent * 2 + 1)
                .copied()
                .unwrap_or(self.zeros[level]);
            let node = hash_pair(&left, &right);
            let above = &mut self.layers[level + 1];
            if parent < above.len() {
                above[parent] = node;
            } else {
                above.push(node);
            }
            idx = parent;
        }
        Ok(index)
    }

    /// Append several leaves in order. Fails without inserting anything when
    /// the batch would overflow the tree.
    pub fn insert_many<I>(&mut self, leaves: I) -> Result<(), TreeError>
    where
        I: IntoIterator<Item = Commitment>,
        I::IntoIter: ExactSizeIterator,
    {
        let leaves = leaves.into_iter();
        if (self.len() + leaves.len()) as u64 > self.capacity() {
            return Err(TreeError::Full {
                capacity: self.capacity(),
            });
        }
        for leaf in leaves {
            self.insert(leaf)?;
        }
        Ok(())
    }

    /// Index of the first occurrence of `leaf`.
    pub fn index_of(&self, leaf: &Commitment) -> Option<usize> {
        self.positions.get(leaf).copied()
    }

    pub fn contains(&self, leaf: &Commitment) -> bool {
        self.positions.contains_key(leaf)
    }

    /// Inclusion proof for the leaf at `index` against the current root.
    pub fn proof(&self, index: usize) -> Result<MerkleProof, TreeError> {
        if index >= self.len() {
            return Err(TreeError::IndexOutOfRange {
                index,
                len: self.len(),
            });
        }
        let mut siblings = Vec::with_capacity(self.depth as usize);
        let mut path_indices = Vec::with_capacity(self.depth as usize);
        let mut idx = index;
        for level in 0..self.depth as usize {
            let sibling = self.layers[level]
                .get(idx ^ 1)
                .copied()
                .unwrap_or(self.zeros[level]);
            siblings.push(NodeHash::new(sibling));
            path_indices.push((idx & 1) as u8);
            idx /= 2;
        }
        Ok(MerkleProof {
            leaf: Commitment::new(self.layers[0][index]),
            leaf_index: index as u64,
            siblings,
            path_indices,
            root: self.root(),
        })
    }
}

impl fmt::Debug for IncrementalMerkleTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IncrementalMerkleTree")
            .field("depth", &self.depth)
            .field("len", &self.len())
            .field("root", &self.root())
            .finish()
    }
}

/// Inclusion proof of one leaf.
///
/// `path_indices[l]` is `0` when the running node is the left child at level
/// `l` and `1` when it is the right child.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    pub leaf: Commitment,
    pub leaf_index: u64,
    pub siblings: Vec<NodeHash>,
    pub path_indices: Vec<u8>,
    pub root: MerkleRoot,
}

impl MerkleProof {
    /// Recompute the root implied by the leaf and its authentication path.
    pub fn compute_root(&self) -> MerkleRoot {
        let mut node = self.leaf.into_bytes();
        for (sibling, bit) in self.siblings.iter().zip(&self.path_indices) {
            node = if *bit == 0 {
                hash_pair(&node, sibling.as_bytes())
            } else {
                hash_pair(sibling.as_bytes(), &node)
            };
        }
        MerkleRoot::new(node)
    }

    /// Whether the path is well-formed and leads to the embedded root.
    pub fn verify(&self) -> bool {
        self.siblings.len() == self.path_indices.len()
            && self.path_indices.iter().all(|b| *b <= 1)
            && self.compute_root() == self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(v: u8) -> Commitment {
        let mut bytes = [0u8; 32];
        bytes[31] = v;
        Commitment::new(bytes)
    }

    #[test]
    fn rejects_bad_depth() {
        assert_eq!(
            IncrementalMerkleTree::new(0).unwrap_err(),
            TreeError::InvalidDepth(0)
        );
        assert!(IncrementalMerkleTree::new(33).is_err());
        assert!(IncrementalMerkleTree::new(32).is_ok());
    }

    #[test]
    fn depth_one_root_matches_manual_hash() {
        let mut tree = IncrementalMerkleTree::new(1).unwrap();
        tree.insert(leaf(1)).unwrap();
        tree.insert(leaf(2)).unwrap();
        let expected = hash_pair(leaf(1).as_bytes(), leaf(2).as_bytes());
        assert_eq!(tree.root(), MerkleRoot::new(expected));
    }

    #[test]
    fn insertion_order_sets_index() {
        let mut tree = IncrementalMerkleTree::new(4).unwrap();
        assert_eq!(tree.insert(leaf(9)).unwrap(), 0);
        assert_eq!(tree.insert(leaf(7)).unwrap(), 1);
        assert_eq!(tree.index_of(&leaf(7)), Some(1));
        assert_eq!(tree.index_of(&leaf(3)), None);
    }

    #[test]
    fn root_changes_on_insert() {
        let mut tree = IncrementalMerkleTree::new(4).unwrap();
        let empty = tree.root();
        tree.insert(leaf(1)).unwrap();
        assert_ne!(tree.root(), empty);
    }

    #[test]
    fn seed_changes_empty_root() {
        let plain = IncrementalMerkleTree::new(8).unwrap();
        let a = IncrementalMerkleTree::with_seed(b"a", 8).unwrap();
        let b = IncrementalMerkleTree::with_seed(b"b", 8).unwrap();
        assert_ne!(plain.root(), a.root());
        assert_ne!(a.root(), b.root());
    }

    #[test]
    fn full_tree_rejects_insert() {
        let mut tree = IncrementalMerkleTree::new(2).unwrap();
        for v in 0..4 {
            tree.insert(leaf(v)).unwrap();
        }
        assert!(tree.is_full());
        assert_eq!(
            tree.insert(leaf(4)).unwrap_err(),
            TreeError::Full { capacity: 4 }
        );
    }

    #[test]
    fn insert_many_is_all_or_nothing() {
        let mut tree = IncrementalMerkleTree::new(2).unwrap();
        tree.insert(leaf(0)).unwrap();
        let before = tree.root();
        assert!(tree.insert_many((1..5).map(leaf).collect::<Vec<_>>()).is_err());
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.root(), before);
    }

    #[test]
    fn every_proof_verifies() {
        let mut tree = IncrementalMerkleTree::with_seed(b"group", 4).unwrap();
        tree.insert_many((0..11).map(leaf).collect::<Vec<_>>()).unwrap();
        for i in 0..tree.len() {
            let proof = tree.proof(i).unwrap();
            assert!(proof.verify(), "proof for leaf {i} failed");
            assert_eq!(proof.root, tree.root());
            assert_eq!(proof.siblings.len(), 4);
        }
    }

    #[test]
    fn tampered_proof_fails() {
        let mut tree = IncrementalMerkleTree::new(3).unwrap();
        tree.insert_many((0..5).map(leaf).collect::<Vec<_>>()).unwrap();
        let mut proof = tree.proof(2).unwrap();
        proof.leaf = leaf(99);
        assert!(!proof.verify());

        let mut proof = tree.proof(2).unwrap();
        proof.path_indices[0] = 2;
        assert!(!proof.verify());
    }

    #[test]
    fn proof_out_of_range() {
        let tree = IncrementalMerkleTree::new(3).unwrap();
        assert_eq!(
            tree.proof(0).unwrap_err(),
            TreeError::IndexOutOfRange { index: 0, len: 0 }
        );
    }

    #[test]
    fn proof_serializes_as_hex_words() {
        let mut tree = IncrementalMerkleTree::new(2).unwrap();
        tree.insert(leaf(5)).unwrap();
        let json = serde_json::to_value(tree.proof(0).unwrap()).unwrap();
        assert_eq!(json["leaf_index"], 0);
        assert!(json["root"].as_str().unwrap().starts_with("0x"));
        assert_eq!(json["siblings"].as_array().unwrap().len(), 2);
    }
}
