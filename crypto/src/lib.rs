//! Cryptographic primitives for cohort membership groups.
//!
//! - **Blake2b-256** for tree nodes and identifier derivation
//! - **Incremental Merkle trees** of fixed depth with inclusion proofs
//! - Deterministic ledger group identifiers derived from group names

pub mod hash;
pub mod merkle;

pub use hash::{blake2b_256, blake2b_256_multi, group_id, hash_pair};
pub use merkle::{IncrementalMerkleTree, MerkleProof, TreeError, MAX_TREE_DEPTH};
