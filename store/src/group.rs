//! Group record storage trait.

use crate::StoreError;
use cohort_types::{Commitment, Timestamp};
use serde::{Deserialize, Serialize};

/// Persisted metadata and ordered member list of one group.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRecord {
    /// Unique, immutable group name. Also the storage key.
    pub name: String,
    pub description: String,
    /// Tree depth; the group holds at most `2^tree_depth` members.
    pub tree_depth: u8,
    /// Opaque classification string.
    pub tag: String,
    /// The only principal allowed to change the group's metadata.
    pub admin: String,
    /// Identity commitments in insertion order. Append-only, no duplicates.
    pub members: Vec<Commitment>,
    pub created_at: Timestamp,
}

impl GroupRecord {
    /// A fresh record with no members.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        tree_depth: u8,
        tag: impl Into<String>,
        admin: impl Into<String>,
        created_at: Timestamp,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            tree_depth,
            tag: tag.into(),
            admin: admin.into(),
            members: Vec::new(),
            created_at,
        }
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }
}

/// Trait for group record storage.
///
/// Calls are synchronous; async callers run them on the blocking pool.
pub trait GroupStore: Send + Sync {
    /// All groups, ordered by name.
    fn find(&self) -> Result<Vec<GroupRecord>, StoreError>;

    fn find_by_name(&self, name: &str) -> Result<Option<GroupRecord>, StoreError>;

    /// Groups administered by `admin`, ordered by name.
    fn find_by_admin(&self, admin: &str) -> Result<Vec<GroupRecord>, StoreError> {
        Ok(self
            .find()?
            .into_iter()
            .filter(|g| g.admin == admin)
            .collect())
    }

    /// Insert a new record. Fails with [`StoreError::Duplicate`] if the name
    /// is already taken.
    fn create(&self, record: GroupRecord) -> Result<GroupRecord, StoreError>;

    /// Overwrite an existing record. Fails with [`StoreError::NotFound`] if
    /// no record with that name exists.
    fn save(&self, record: &GroupRecord) -> Result<GroupRecord, StoreError>;

    fn group_count(&self) -> Result<u64, StoreError> {
        self.find().map(|v| v.len() as u64)
    }
}
