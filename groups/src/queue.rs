//! Ordered queue of root changes awaiting publication.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::types::PendingUpdate;

/// Root changes waiting for the next batch publication.
///
/// The queue is a list, not a set: two changes to the same group produce two
/// entries, and both are published in the same batch.
#[derive(Debug, Default)]
pub struct SyncQueue {
    entries: Mutex<VecDeque<PendingUpdate>>,
}

impl SyncQueue {
    pub fn new() -> Self {
        Self::default()
    }

    // Every mutation leaves the deque valid, so a poisoned lock is still safe
    // to use.
    fn entries(&self) -> MutexGuard<'_, VecDeque<PendingUpdate>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append an update unconditionally.
    pub fn enqueue(&self, update: PendingUpdate) {
        self.entries().push_back(update);
    }

    /// Take every queued update, leaving the queue empty.
    ///
    /// Updates enqueued after this call start a fresh batch.
    pub fn drain(&self) -> Vec<PendingUpdate> {
        std::mem::take(&mut *self.entries()).into()
    }

    /// Put a failed batch back at the front, ahead of anything queued since.
    pub fn requeue_front(&self, batch: Vec<PendingUpdate>) {
        let mut entries = self.entries();
        for update in batch.into_iter().rev() {
            entries.push_front(update);
        }
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Copy of the queued updates in publication order.
    pub fn snapshot(&self) -> Vec<PendingUpdate> {
        self.entries().iter().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cohort_types::{GroupId, MerkleRoot};

    fn update(group: u8, root: u8) -> PendingUpdate {
        PendingUpdate::new(GroupId::new([group; 32]), MerkleRoot::new([root; 32]))
    }

    #[test]
    fn same_group_entries_are_not_collapsed() {
        let queue = SyncQueue::new();
        queue.enqueue(update(1, 1));
        queue.enqueue(update(1, 2));
        queue.enqueue(update(2, 1));
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.snapshot()[1], update(1, 2));
    }

    #[test]
    fn drain_empties_and_preserves_order() {
        let queue = SyncQueue::new();
        queue.enqueue(update(1, 1));
        queue.enqueue(update(2, 2));
        let batch = queue.drain();
        assert_eq!(batch, vec![update(1, 1), update(2, 2)]);
        assert!(queue.is_empty());
        assert!(queue.drain().is_empty());
    }

    #[test]
    fn requeue_goes_ahead_of_newer_entries() {
        let queue = SyncQueue::new();
        queue.enqueue(update(1, 1));
        queue.enqueue(update(2, 2));
        let failed = queue.drain();
        queue.enqueue(update(3, 3));
        queue.requeue_front(failed);
        assert_eq!(queue.drain(), vec![update(1, 1), update(2, 2), update(3, 3)]);
    }
}
