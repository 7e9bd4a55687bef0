//! Merkle roots, tree node hashes and ledger group identifiers.

use crate::word::word_type;

word_type! {
    /// Root of a group's membership tree, the fingerprint published on-chain.
    MerkleRoot
}

word_type! {
    /// Hash of an interior or sibling node inside a membership tree.
    NodeHash
}

word_type! {
    /// Ledger-side identifier of a group, derived deterministically from the
    /// group name (see `cohort_crypto::group_id`).
    GroupId
}
