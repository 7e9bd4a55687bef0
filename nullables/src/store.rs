//! Nullable store: thread-safe in-memory storage for testing.

use cohort_store::{check_redeemable, GroupRecord, GroupStore, InviteRecord, InviteStore, StoreError};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

/// An in-memory group store for testing.
/// Thread-safe for use with tokio's multi-threaded runtime.
///
/// Records are kept in a `BTreeMap` so `find` returns them ordered by name,
/// like the LMDB backend.
pub struct NullGroupStore {
    groups: Mutex<BTreeMap<String, GroupRecord>>,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
}

impl NullGroupStore {
    pub fn new() -> Self {
        Self {
            groups: Mutex::new(BTreeMap::new()),
            fail_writes: AtomicBool::new(false),
            writes: AtomicUsize::new(0),
        }
    }

    /// A store pre-populated with `records`.
    pub fn with_records(records: impl IntoIterator<Item = GroupRecord>) -> Self {
        let store = Self::new();
        {
            let mut groups = store.groups.lock().unwrap();
            for record in records {
                groups.insert(record.name.clone(), record);
            }
        }
        store
    }

    /// Make every subsequent `create`/`save` fail with a backend error.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful writes so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("writes disabled".to_string()));
        }
        Ok(())
    }
}

impl Default for NullGroupStore {
    fn default() -> Self {
        Self::new()
    }
}

impl GroupStore for NullGroupStore {
    fn find(&self) -> Result<Vec<GroupRecord>, StoreError> {
        Ok(self.groups.lock().unwrap().values().cloned().collect())
    }

    fn find_by_name(&self, name: &str) -> Result<Option<GroupRecord>, StoreError> {
        Ok(self.groups.lock().unwrap().get(name).cloned())
    }

    fn create(&self, record: GroupRecord) -> Result<GroupRecord, StoreError> {
        self.check_writable()?;
        let mut groups = self.groups.lock().unwrap();
        if groups.contains_key(&record.name) {
            return Err(StoreError::Duplicate(record.name));
        }
        groups.insert(record.name.clone(), record.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(record)
    }

    fn save(&self, record: &GroupRecord) -> Result<GroupRecord, StoreError> {
        self.check_writable()?;
        let mut groups = self.groups.lock().unwrap();
        let slot = groups
            .get_mut(&record.name)
            .ok_or_else(|| StoreError::NotFound(record.name.clone()))?;
        *slot = record.clone();
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(record.clone())
    }
}

/// An in-memory invite store for testing.
pub struct NullInviteStore {
    invites: Mutex<HashMap<String, InviteRecord>>,
}

impl NullInviteStore {
    pub fn new() -> Self {
        Self {
            invites: Mutex::new(HashMap::new()),
        }
    }

    /// Issue a fresh code for `group_name`.
    pub fn issue(&self, code: &str, group_name: &str) {
        self.invites
            .lock()
            .unwrap()
            .insert(code.to_string(), InviteRecord::new(code, group_name));
    }
}

impl Default for NullInviteStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InviteStore for NullInviteStore {
    fn put_invite(&self, invite: &InviteRecord) -> Result<(), StoreError> {
        self.invites
            .lock()
            .unwrap()
            .insert(invite.code.clone(), invite.clone());
        Ok(())
    }

    fn get_invite(&self, code: &str) -> Result<Option<InviteRecord>, StoreError> {
        Ok(self.invites.lock().unwrap().get(code).cloned())
    }

    fn redeem_invite(&self, code: &str, group_name: &str) -> Result<InviteRecord, StoreError> {
        let mut invites = self.invites.lock().unwrap();
        let invite = invites
            .get_mut(code)
            .ok_or_else(|| StoreError::NotFound(code.to_string()))?;
        check_redeemable(invite, group_name)?;
        invite.redeemed = true;
        Ok(invite.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cohort_types::Timestamp;

    fn record(name: &str) -> GroupRecord {
        GroupRecord::new(name, "", 4, "", "alice", Timestamp::EPOCH)
    }

    #[test]
    fn create_then_duplicate() {
        let store = NullGroupStore::new();
        store.create(record("a")).unwrap();
        assert!(matches!(
            store.create(record("a")),
            Err(StoreError::Duplicate(name)) if name == "a"
        ));
        assert_eq!(store.write_count(), 1);
    }

    #[test]
    fn save_unknown_is_not_found() {
        let store = NullGroupStore::new();
        assert!(matches!(store.save(&record("x")), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn find_is_ordered_by_name() {
        let store = NullGroupStore::with_records([record("b"), record("a"), record("c")]);
        let names: Vec<_> = store.find().unwrap().into_iter().map(|r| r.name).collect();
        assert_eq!(names, ["a", "b", "c"]);
    }

    #[test]
    fn failing_writes_leave_state_untouched() {
        let store = NullGroupStore::with_records([record("a")]);
        store.fail_writes(true);
        let mut changed = record("a");
        changed.description = "changed".into();
        assert!(matches!(store.save(&changed), Err(StoreError::Backend(_))));
        assert_eq!(store.find_by_name("a").unwrap().unwrap().description, "");
    }

    #[test]
    fn invite_redeems_once() {
        let invites = NullInviteStore::new();
        invites.issue("code", "voters");
        assert!(invites.redeem_invite("code", "voters").unwrap().redeemed);
        assert!(matches!(
            invites.redeem_invite("code", "voters"),
            Err(StoreError::Rejected(_))
        ));
        assert!(matches!(
            invites.redeem_invite("missing", "voters"),
            Err(StoreError::NotFound(_))
        ));
    }
}
