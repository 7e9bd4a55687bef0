//! Blake2b hashing for tree nodes and group identifiers.

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use cohort_types::GroupId;

type Blake2b256 = Blake2b<U32>;

/// Domain tag mixed into every group identifier.
const GROUP_ID_DOMAIN: &[u8] = b"cohort/group-id/v1";

/// Compute a 256-bit Blake2b hash of arbitrary data.
pub fn blake2b_256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// Hash multiple byte slices in sequence (avoids concatenation allocation).
pub fn blake2b_256_multi(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    for part in parts {
        hasher.update(part);
    }
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// Parent node of two children in a membership tree.
pub fn hash_pair(left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
    blake2b_256_multi(&[left, right])
}

/// Derive the ledger identifier of a group from its name.
///
/// The most significant byte is cleared so the value always fits inside a
/// 254-bit SNARK scalar field.
pub fn group_id(name: &str) -> GroupId {
    let mut digest = blake2b_256_multi(&[GROUP_ID_DOMAIN, name.as_bytes()]);
    digest[0] = 0;
    GroupId::new(digest)
}
