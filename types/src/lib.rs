//! Fundamental types for cohort membership groups.
//!
//! This crate defines the values shared across every other crate in the workspace:
//! identity commitments (tree leaves), Merkle roots, ledger group identifiers and
//! timestamps.

mod word;

pub mod commitment;
pub mod error;
pub mod hash;
pub mod time;

pub use commitment::Commitment;
pub use error::TypesError;
pub use hash::{GroupId, MerkleRoot, NodeHash};
pub use time::Timestamp;

/// Width in bytes of every 256-bit value handled by the protocol.
pub const WORD_BYTES: usize = 32;
