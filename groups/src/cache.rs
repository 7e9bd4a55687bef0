//! In-memory forest of group trees.
//!
//! The cache starts empty and unready. [`GroupCache::bootstrap`] builds one
//! tree per persisted group; until it has run every call fails with
//! [`GroupError::NotReady`]. After that the cache is only mutated by the
//! registry, which keeps it in step with the store.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use cohort_crypto::{group_id, IncrementalMerkleTree, MerkleProof, TreeError};
use cohort_store::GroupRecord;
use cohort_types::{Commitment, MerkleRoot};

use crate::error::GroupError;

type Forest = HashMap<String, IncrementalMerkleTree>;

#[derive(Debug, Default)]
pub struct GroupCache {
    /// `None` until bootstrapped.
    trees: RwLock<Option<Forest>>,
}

/// Build the tree for `name`, seeded with the group's ledger id.
fn seeded_tree(name: &str, depth: u8) -> Result<IncrementalMerkleTree, GroupError> {
    IncrementalMerkleTree::with_seed(group_id(name).as_bytes(), depth)
        .map_err(|e| tree_error(name, e))
}

fn tree_error(name: &str, e: TreeError) -> GroupError {
    match e {
        TreeError::InvalidDepth(depth) => GroupError::InvalidDepth(depth),
        TreeError::Full { .. } => GroupError::GroupFull(name.to_string()),
        TreeError::IndexOutOfRange { .. } => GroupError::Internal(e.to_string()),
    }
}

impl GroupCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Option<Forest>>, GroupError> {
        self.trees
            .read()
            .map_err(|_| GroupError::Internal("group cache lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Option<Forest>>, GroupError> {
        self.trees
            .write()
            .map_err(|_| GroupError::Internal("group cache lock poisoned".to_string()))
    }

    fn with_tree<T>(
        &self,
        name: &str,
        f: impl FnOnce(&IncrementalMerkleTree) -> Result<T, GroupError>,
    ) -> Result<T, GroupError> {
        let guard = self.read()?;
        let forest = guard.as_ref().ok_or(GroupError::NotReady)?;
        let tree = forest
            .get(name)
            .ok_or_else(|| GroupError::NotFound(name.to_string()))?;
        f(tree)
    }

    /// Replace the whole forest with trees rebuilt from `records`, inserting
    /// each group's members in stored order.
    ///
    /// Nothing changes if any record cannot be rebuilt. Running it again with
    /// the same records yields the same roots.
    pub fn bootstrap(&self, records: &[GroupRecord]) -> Result<(), GroupError> {
        let mut forest = Forest::with_capacity(records.len());
        for record in records {
            let mut tree = seeded_tree(&record.name, record.tree_depth)?;
            tree.insert_many(record.members.iter().copied())
                .map_err(|e| tree_error(&record.name, e))?;
            forest.insert(record.name.clone(), tree);
        }
        *self.write()? = Some(forest);
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.read().map(|guard| guard.is_some()).unwrap_or(false)
    }

    pub fn contains(&self, name: &str) -> Result<bool, GroupError> {
        let guard = self.read()?;
        let forest = guard.as_ref().ok_or(GroupError::NotReady)?;
        Ok(forest.contains_key(name))
    }

    /// Register an empty tree for a new group and return its root.
    pub fn create_tree(&self, name: &str, depth: u8) -> Result<MerkleRoot, GroupError> {
        let tree = seeded_tree(name, depth)?;
        let root = tree.root();
        let mut guard = self.write()?;
        let forest = guard.as_mut().ok_or(GroupError::NotReady)?;
        if forest.contains_key(name) {
            return Err(GroupError::Conflict(format!(
                "group '{name}' already has a tree"
            )));
        }
        forest.insert(name.to_string(), tree);
        Ok(root)
    }

    pub fn is_member(&self, name: &str, leaf: &Commitment) -> Result<bool, GroupError> {
        self.with_tree(name, |tree| Ok(tree.contains(leaf)))
    }

    /// Append `leaf` to the group's tree and return the new root.
    pub fn add_member(&self, name: &str, leaf: Commitment) -> Result<MerkleRoot, GroupError> {
        let mut guard = self.write()?;
        let forest = guard.as_mut().ok_or(GroupError::NotReady)?;
        let tree = forest
            .get_mut(name)
            .ok_or_else(|| GroupError::NotFound(name.to_string()))?;
        if tree.contains(&leaf) {
            return Err(GroupError::Conflict(format!(
                "{leaf} is already a member of group '{name}'"
            )));
        }
        tree.insert(leaf).map_err(|e| tree_error(name, e))?;
        Ok(tree.root())
    }

    /// Inclusion proof for `leaf` against the group's current root.
    pub fn proof_for(&self, name: &str, leaf: &Commitment) -> Result<MerkleProof, GroupError> {
        self.with_tree(name, |tree| {
            let index = tree.index_of(leaf).ok_or_else(|| GroupError::NotAMember {
                group: name.to_string(),
                member: *leaf,
            })?;
            tree.proof(index).map_err(|e| tree_error(name, e))
        })
    }

    pub fn root_of(&self, name: &str) -> Result<MerkleRoot, GroupError> {
        self.with_tree(name, |tree| Ok(tree.root()))
    }

    pub fn size_of(&self, name: &str) -> Result<usize, GroupError> {
        self.with_tree(name, |tree| Ok(tree.len()))
    }

    pub fn is_full(&self, name: &str) -> Result<bool, GroupError> {
        self.with_tree(name, |tree| Ok(tree.is_full()))
    }

    /// Depth the cached tree was built with.
    pub fn depth_of(&self, name: &str) -> Result<u8, GroupError> {
        self.with_tree(name, |tree| Ok(tree.depth()))
    }

    pub fn group_count(&self) -> Result<usize, GroupError> {
        let guard = self.read()?;
        Ok(guard.as_ref().ok_or(GroupError::NotReady)?.len())
    }
}
