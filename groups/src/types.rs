//! Values exchanged between the registry, the queue and the ledger.

use cohort_types::{GroupId, MerkleRoot};
use serde::{Deserialize, Serialize};

/// A root change waiting to be published.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingUpdate {
    pub group_id: GroupId,
    /// Root of the group's tree right after the change.
    pub root: MerkleRoot,
}

impl PendingUpdate {
    pub fn new(group_id: GroupId, root: MerkleRoot) -> Self {
        Self { group_id, root }
    }
}

/// Event emitted by the ledger contract for one applied update.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEvent {
    pub group_id: GroupId,
    pub root: MerkleRoot,
}

/// Outcome of one batch transaction.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerReceipt {
    /// Whether the transaction succeeded.
    pub status: bool,
    #[serde(default)]
    pub events: Vec<LedgerEvent>,
}

impl LedgerReceipt {
    pub fn success(events: Vec<LedgerEvent>) -> Self {
        Self {
            status: true,
            events,
        }
    }

    pub fn failure() -> Self {
        Self {
            status: false,
            events: Vec::new(),
        }
    }
}

/// Point-in-time copy of the publisher counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PublisherStatsSnapshot {
    pub batches_published: u64,
    pub batches_failed: u64,
    pub updates_published: u64,
    pub updates_dropped: u64,
    pub updates_requeued: u64,
}

/// Registry activity counters plus the current publisher state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    pub groups_created: u64,
    pub members_added: u64,
    pub group_count: u64,
    pub pending_updates: u64,
    pub publisher: PublisherStatsSnapshot,
}
