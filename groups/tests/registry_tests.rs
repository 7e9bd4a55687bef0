//! Registry behaviour against in-memory collaborators.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use cohort_crypto::{group_id, IncrementalMerkleTree};
use cohort_groups::{
    BatchPublisher, GroupError, GroupRegistry, GroupUpdate, NewGroup, PublisherConfig,
    RequeueFailed, RetryPolicy, StoreInviteRedeemer,
};
use cohort_nullables::{LedgerMode, NullGroupStore, NullInviteStore, NullInvites, NullLedger};
use cohort_store::GroupRecord;
use cohort_types::{Commitment, Timestamp};

const DELAY: Duration = Duration::from_secs(60);

struct Harness {
    store: Arc<NullGroupStore>,
    invites: Arc<NullInvites>,
    ledger: Arc<NullLedger>,
    registry: GroupRegistry,
}

impl Harness {
    async fn new() -> Self {
        Self::build(Arc::new(NullGroupStore::new()), None).await
    }

    async fn with_retry(retry: Arc<dyn RetryPolicy>) -> Self {
        Self::build(Arc::new(NullGroupStore::new()), Some(retry)).await
    }

    async fn build(store: Arc<NullGroupStore>, retry: Option<Arc<dyn RetryPolicy>>) -> Self {
        let invites = Arc::new(NullInvites::accepting());
        let ledger = Arc::new(NullLedger::new());
        let config = PublisherConfig { delay: DELAY };
        let publisher = match retry {
            Some(retry) => BatchPublisher::with_retry_policy(ledger.clone(), config, retry),
            None => BatchPublisher::new(ledger.clone(), config),
        };
        let registry = GroupRegistry::new(store.clone(), invites.clone(), publisher);
        registry.bootstrap().await.unwrap();
        Self {
            store,
            invites,
            ledger,
            registry,
        }
    }

    async fn create(&self, name: &str, depth: u8, admin: &str) -> GroupRecord {
        self.registry
            .create_group(new_group(name, depth, admin))
            .await
            .unwrap()
    }

    async fn add(&self, name: &str, leaf: Commitment) -> Result<GroupRecord, GroupError> {
        self.registry.add_member(name, leaf, "invite", None).await
    }
}

fn new_group(name: &str, depth: u8, admin: &str) -> NewGroup {
    NewGroup {
        name: name.to_string(),
        description: format!("{name} group"),
        tree_depth: depth,
        tag: "test".to_string(),
        admin: admin.to_string(),
    }
}

fn member(v: u8) -> Commitment {
    let mut bytes = [0u8; 32];
    bytes[0] = 0x10;
    bytes[31] = v;
    Commitment::new(bytes)
}

fn fresh_root(name: &str, depth: u8, members: &[Commitment]) -> cohort_types::MerkleRoot {
    let mut tree = IncrementalMerkleTree::with_seed(group_id(name).as_bytes(), depth).unwrap();
    for m in members {
        tree.insert(*m).unwrap();
    }
    tree.root()
}

#[tokio::test]
async fn voters_scenario() {
    let h = Harness::new().await;
    h.create("voters", 4, "alice").await;

    let leaf = Commitment::from_str(&format!("0xab{}1", "0".repeat(61))).unwrap();
    let record = h
        .registry
        .add_member("voters", leaf, "code-1", Some("alice"))
        .await
        .unwrap();
    assert_eq!(record.members, vec![leaf]);
    assert!(h.registry.is_member("voters", &leaf).unwrap());

    let admin_groups = h.registry.list_groups_by_admin("alice").await.unwrap();
    assert_eq!(admin_groups.len(), 1);
    assert_eq!(admin_groups[0].members, vec![leaf]);

    assert!(matches!(
        h.registry.add_member("voters", leaf, "code-2", None).await,
        Err(GroupError::Conflict(_))
    ));

    let update = GroupUpdate {
        description: Some("hijacked".into()),
        ..Default::default()
    };
    assert!(matches!(
        h.registry.update_group("voters", update, "bob").await,
        Err(GroupError::Unauthorized { caller, .. }) if caller == "bob"
    ));
    let stored = h.registry.get_group("voters").await.unwrap();
    assert_eq!(stored.description, "voters group");
}

#[tokio::test]
async fn added_member_has_verifying_proof() {
    let h = Harness::new().await;
    h.create("g", 5, "alice").await;
    for v in 1..=6 {
        h.add("g", member(v)).await.unwrap();
    }

    let proof = h.registry.generate_proof("g", &member(4)).unwrap();
    assert!(proof.verify());
    assert_eq!(proof.root, h.registry.root_of("g").unwrap());
    assert_eq!(proof.leaf_index, 3);

    assert!(matches!(
        h.registry.generate_proof("g", &member(99)),
        Err(GroupError::NotAMember { .. })
    ));
}

#[tokio::test]
async fn duplicate_member_leaves_count_and_invites_untouched() {
    let h = Harness::new().await;
    h.create("g", 4, "alice").await;
    h.add("g", member(1)).await.unwrap();

    assert!(matches!(
        h.add("g", member(1)).await,
        Err(GroupError::Conflict(_))
    ));
    assert_eq!(h.registry.get_group("g").await.unwrap().member_count(), 1);
    assert_eq!(h.invites.redeemed().len(), 1);
    assert_eq!(h.registry.pending_updates().len(), 1);
}

#[tokio::test]
async fn rejected_invite_changes_nothing() {
    let h = Harness::new().await;
    h.create("g", 4, "alice").await;
    h.add("g", member(1)).await.unwrap();
    h.registry.flush_now().await;

    let root = h.registry.root_of("g").unwrap();
    let writes = h.store.write_count();
    h.invites
        .reject_with(Some(cohort_groups::InviteError::Rejected("invite expired".into())));

    let err = h.add("g", member(2)).await.unwrap_err();
    assert!(matches!(err, GroupError::InviteRejected(ref reason) if reason == "invite expired"));

    assert_eq!(h.registry.root_of("g").unwrap(), root);
    assert_eq!(h.store.write_count(), writes);
    assert_eq!(h.registry.get_group("g").await.unwrap().members, vec![member(1)]);
    assert!(!h.registry.is_member("g", &member(2)).unwrap());
    assert!(h.registry.pending_updates().is_empty());
    assert!(!h.registry.publisher().is_pending());
}

#[tokio::test]
async fn invite_codes_are_scoped_and_single_use() {
    let store = Arc::new(NullGroupStore::new());
    let invite_store = Arc::new(NullInviteStore::new());
    invite_store.issue("voters-1", "voters");
    let publisher = BatchPublisher::new(Arc::new(NullLedger::new()), PublisherConfig::default());
    let registry = GroupRegistry::new(
        store,
        Arc::new(StoreInviteRedeemer::new(invite_store)),
        publisher,
    );
    registry.bootstrap().await.unwrap();
    registry
        .create_group(new_group("voters", 4, "alice"))
        .await
        .unwrap();
    registry
        .create_group(new_group("others", 4, "alice"))
        .await
        .unwrap();

    assert!(matches!(
        registry.add_member("others", member(1), "voters-1", None).await,
        Err(GroupError::InviteRejected(_))
    ));
    registry
        .add_member("voters", member(1), "voters-1", None)
        .await
        .unwrap();
    assert!(matches!(
        registry.add_member("voters", member(2), "voters-1", None).await,
        Err(GroupError::InviteRejected(reason)) if reason.contains("already been redeemed")
    ));
    assert!(matches!(
        registry.add_member("voters", member(3), "nope", None).await,
        Err(GroupError::InviteRejected(reason)) if reason.contains("does not exist")
    ));
}

#[tokio::test]
async fn full_group_is_rejected_before_invite_redemption() {
    let h = Harness::new().await;
    h.create("tiny", 1, "alice").await;
    h.add("tiny", member(1)).await.unwrap();
    h.add("tiny", member(2)).await.unwrap();

    assert!(matches!(
        h.add("tiny", member(3)).await,
        Err(GroupError::GroupFull(name)) if name == "tiny"
    ));
    assert_eq!(h.invites.redeemed().len(), 2);
}

#[tokio::test]
async fn failed_persist_leaves_cache_and_queue_untouched() {
    let h = Harness::new().await;
    h.create("g", 4, "alice").await;
    let root = h.registry.root_of("g").unwrap();

    h.store.fail_writes(true);
    assert!(matches!(
        h.add("g", member(1)).await,
        Err(GroupError::Store(_))
    ));
    assert_eq!(h.registry.root_of("g").unwrap(), root);
    assert!(!h.registry.is_member("g", &member(1)).unwrap());
    assert!(h.registry.pending_updates().is_empty());
}

#[tokio::test]
async fn create_group_validation() {
    let h = Harness::new().await;
    h.create("g", 4, "alice").await;

    assert!(matches!(
        h.registry.create_group(new_group("g", 4, "bob")).await,
        Err(GroupError::Conflict(_))
    ));
    assert!(matches!(
        h.registry.create_group(new_group("zero", 0, "bob")).await,
        Err(GroupError::InvalidDepth(0))
    ));
    assert!(matches!(
        h.registry.create_group(new_group("deep", 33, "bob")).await,
        Err(GroupError::InvalidDepth(33))
    ));
    assert!(matches!(
        h.registry.create_group(new_group("  ", 4, "bob")).await,
        Err(GroupError::InvalidName(_))
    ));
    assert_eq!(h.registry.list_groups().await.unwrap().len(), 1);
}

#[tokio::test]
async fn created_group_starts_empty_with_seeded_root() {
    let h = Harness::new().await;
    let record = h.create("g", 6, "alice").await;
    assert!(record.members.is_empty());
    assert_eq!(record.admin, "alice");
    assert_eq!(h.registry.root_of("g").unwrap(), fresh_root("g", 6, &[]));
    assert!(h.registry.pending_updates().is_empty());
}

#[tokio::test]
async fn admin_updates_metadata() {
    let h = Harness::new().await;
    h.create("g", 4, "alice").await;
    let update = GroupUpdate {
        description: Some("renamed".into()),
        tree_depth: None,
        tag: Some("gov".into()),
    };
    let record = h.registry.update_group("g", update, "alice").await.unwrap();
    assert_eq!(record.description, "renamed");
    assert_eq!(record.tag, "gov");
    assert_eq!(record.tree_depth, 4);

    assert!(matches!(
        h.registry
            .update_group("missing", GroupUpdate::default(), "alice")
            .await,
        Err(GroupError::NotFound(_))
    ));
}

#[tokio::test]
async fn depth_change_does_not_resize_cached_tree() {
    let h = Harness::new().await;
    h.create("g", 1, "alice").await;
    h.add("g", member(1)).await.unwrap();
    let root_before = h.registry.root_of("g").unwrap();

    let update = GroupUpdate {
        tree_depth: Some(4),
        ..Default::default()
    };
    let record = h.registry.update_group("g", update, "alice").await.unwrap();
    assert_eq!(record.tree_depth, 4);
    assert_eq!(h.registry.root_of("g").unwrap(), root_before);

    h.add("g", member(2)).await.unwrap();
    assert!(matches!(
        h.add("g", member(3)).await,
        Err(GroupError::GroupFull(_))
    ));

    // A rebuild picks up the stored depth.
    h.registry.bootstrap().await.unwrap();
    assert_eq!(
        h.registry.root_of("g").unwrap(),
        fresh_root("g", 4, &[member(1), member(2)])
    );
    h.add("g", member(3)).await.unwrap();
}

#[tokio::test]
async fn depth_smaller_than_member_count_is_rejected() {
    let h = Harness::new().await;
    h.create("g", 4, "alice").await;
    for v in 1..=3 {
        h.add("g", member(v)).await.unwrap();
    }
    let update = GroupUpdate {
        tree_depth: Some(1),
        ..Default::default()
    };
    assert!(matches!(
        h.registry.update_group("g", update, "alice").await,
        Err(GroupError::InvalidDepth(1))
    ));
    assert_eq!(h.registry.get_group("g").await.unwrap().tree_depth, 4);
}

#[tokio::test]
async fn shrunk_depth_caps_membership_and_survives_restart() {
    let h = Harness::new().await;
    h.create("g", 4, "alice").await;
    h.create("other", 2, "bob").await;
    h.add("other", member(20)).await.unwrap();
    for v in 1..=3 {
        h.add("g", member(v)).await.unwrap();
    }

    let update = GroupUpdate {
        tree_depth: Some(2),
        ..Default::default()
    };
    h.registry.update_group("g", update, "alice").await.unwrap();

    // The cached tree still has room for 16 leaves; the stored depth allows 4.
    h.add("g", member(4)).await.unwrap();
    assert!(matches!(
        h.add("g", member(5)).await,
        Err(GroupError::GroupFull(_))
    ));
    assert_eq!(h.invites.redeemed().len(), 5);
    assert_eq!(h.registry.get_group("g").await.unwrap().member_count(), 4);

    let restarted = Harness::build(h.store.clone(), None).await;
    assert_eq!(
        restarted.registry.root_of("g").unwrap(),
        fresh_root("g", 2, &[member(1), member(2), member(3), member(4)])
    );
    assert!(restarted.registry.is_member("other", &member(20)).unwrap());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn rebuild_during_adds_keeps_cache_in_step_with_store() {
    let h = Harness::new().await;
    h.create("g", 6, "alice").await;

    let mut handles = Vec::new();
    for v in 1..=24 {
        let registry = h.registry.clone();
        handles.push(tokio::spawn(async move {
            registry.add_member("g", member(v), "code", None).await
        }));
    }
    let rebuilder = {
        let registry = h.registry.clone();
        tokio::spawn(async move {
            for _ in 0..8 {
                registry.bootstrap().await.unwrap();
                tokio::task::yield_now().await;
            }
        })
    };
    for handle in handles {
        handle.await.unwrap().unwrap();
    }
    rebuilder.await.unwrap();

    let record = h.registry.get_group("g").await.unwrap();
    assert_eq!(record.member_count(), 24);
    for m in &record.members {
        assert!(h.registry.is_member("g", m).unwrap());
    }
    assert_eq!(
        h.registry.root_of("g").unwrap(),
        fresh_root("g", 6, &record.members)
    );
    assert!(matches!(
        h.add("g", member(1)).await,
        Err(GroupError::Conflict(_))
    ));
}

#[tokio::test]
async fn bootstrap_rebuilds_stored_groups() {
    let mut a = GroupRecord::new("a", "", 4, "", "alice", Timestamp::EPOCH);
    a.members = vec![member(3), member(1), member(2)];
    let mut b = GroupRecord::new("b", "", 10, "", "bob", Timestamp::EPOCH);
    b.members = vec![member(7)];
    let c = GroupRecord::new("c", "", 2, "", "bob", Timestamp::EPOCH);

    let store = Arc::new(NullGroupStore::with_records([a.clone(), b.clone(), c.clone()]));
    let h = Harness::build(store, None).await;

    for r in [&a, &b, &c] {
        assert_eq!(
            h.registry.root_of(&r.name).unwrap(),
            fresh_root(&r.name, r.tree_depth, &r.members)
        );
        for m in &r.members {
            assert!(h.registry.is_member(&r.name, m).unwrap());
        }
    }
    assert_eq!(h.registry.stats().group_count, 3);
    assert_eq!(h.registry.list_groups_by_admin("bob").await.unwrap().len(), 2);
}

#[tokio::test]
async fn restart_reproduces_roots() {
    let h = Harness::new().await;
    h.create("g", 8, "alice").await;
    for v in 1..=4 {
        h.add("g", member(v)).await.unwrap();
    }
    let root = h.registry.root_of("g").unwrap();

    let restarted = Harness::build(h.store.clone(), None).await;
    assert_eq!(restarted.registry.root_of("g").unwrap(), root);
    assert_eq!(
        restarted.registry.generate_proof("g", &member(2)).unwrap().root,
        root
    );
}

#[tokio::test]
async fn operations_before_bootstrap_are_not_ready() {
    let registry = GroupRegistry::new(
        Arc::new(NullGroupStore::new()),
        Arc::new(NullInvites::accepting()),
        BatchPublisher::new(Arc::new(NullLedger::new()), PublisherConfig::default()),
    );
    assert!(!registry.is_ready());
    assert!(matches!(
        registry.create_group(new_group("g", 4, "alice")).await,
        Err(GroupError::NotReady)
    ));
    assert!(matches!(
        registry.add_member("g", member(1), "code", None).await,
        Err(GroupError::NotReady)
    ));
    assert!(matches!(
        registry.get_group("g").await,
        Err(GroupError::NotReady)
    ));
    assert!(matches!(
        registry.is_member("g", &member(1)),
        Err(GroupError::NotReady)
    ));
    assert!(matches!(
        registry.generate_proof("g", &member(1)),
        Err(GroupError::NotReady)
    ));
}

#[tokio::test(start_paused = true)]
async fn changes_before_timer_fires_publish_as_one_batch() {
    let h = Harness::new().await;
    h.create("a", 4, "alice").await;
    h.create("b", 4, "alice").await;

    h.add("a", member(1)).await.unwrap();
    let root_a1 = h.registry.root_of("a").unwrap();
    h.add("b", member(1)).await.unwrap();
    h.add("a", member(2)).await.unwrap();
    let root_a2 = h.registry.root_of("a").unwrap();

    assert!(h.registry.publisher().is_pending());
    assert_eq!(h.registry.pending_updates().len(), 3);
    assert_eq!(h.ledger.call_count(), 0);

    tokio::time::sleep(DELAY + Duration::from_secs(1)).await;

    let batches = h.ledger.batches();
    assert_eq!(batches.len(), 1);
    let batch = &batches[0];
    assert_eq!(batch.len(), 3);
    // Both changes to "a" are published, in order.
    assert_eq!(batch[0].group_id, group_id("a"));
    assert_eq!(batch[0].root, root_a1);
    assert_eq!(batch[1].group_id, group_id("b"));
    assert_eq!(batch[2].root, root_a2);

    assert!(!h.registry.publisher().is_pending());
    assert!(h.registry.pending_updates().is_empty());
    let stats = h.registry.stats();
    assert_eq!(stats.members_added, 3);
    assert_eq!(stats.publisher.batches_published, 1);
    assert_eq!(stats.publisher.updates_published, 3);
}

#[tokio::test(start_paused = true)]
async fn consecutive_cycles_publish_separate_batches() {
    let h = Harness::new().await;
    h.create("g", 4, "alice").await;

    h.add("g", member(1)).await.unwrap();
    tokio::time::sleep(DELAY + Duration::from_secs(1)).await;
    h.add("g", member(2)).await.unwrap();
    assert!(h.registry.publisher().is_pending());
    tokio::time::sleep(DELAY + Duration::from_secs(1)).await;

    let batches = h.ledger.batches();
    assert_eq!(batches.len(), 2);
    assert_eq!(batches[0].len(), 1);
    assert_eq!(batches[1].len(), 1);
    assert_eq!(batches[1][0].root, h.registry.root_of("g").unwrap());
}

#[tokio::test(start_paused = true)]
async fn failed_batch_is_dropped_by_default() {
    let h = Harness::new().await;
    h.ledger.set_mode(LedgerMode::Reject);
    h.create("g", 4, "alice").await;
    h.add("g", member(1)).await.unwrap();

    tokio::time::sleep(DELAY + Duration::from_secs(1)).await;

    assert_eq!(h.ledger.call_count(), 1);
    assert!(h.registry.pending_updates().is_empty());
    assert!(!h.registry.publisher().is_pending());
    // The mutation itself is unaffected.
    assert!(h.registry.is_member("g", &member(1)).unwrap());
    let stats = h.registry.stats().publisher;
    assert_eq!(stats.batches_failed, 1);
    assert_eq!(stats.updates_dropped, 1);
}

#[tokio::test(start_paused = true)]
async fn requeue_policy_retries_on_next_cycle() {
    let h = Harness::with_retry(Arc::new(RequeueFailed)).await;
    h.ledger
        .set_mode(LedgerMode::Fail(cohort_groups::LedgerError::Unreachable("down".into())));
    h.create("g", 4, "alice").await;
    h.add("g", member(1)).await.unwrap();

    tokio::time::sleep(DELAY + Duration::from_secs(1)).await;
    assert_eq!(h.ledger.call_count(), 1);
    assert_eq!(h.registry.pending_updates().len(), 1);
    assert!(h.registry.publisher().is_pending());

    // Queued behind the failed entry.
    h.add("g", member(2)).await.unwrap();
    h.ledger.set_mode(LedgerMode::Succeed);
    tokio::time::sleep(DELAY).await;

    let batches = h.ledger.batches();
    assert_eq!(batches.len(), 2);
    assert_eq!(batches[1].len(), 2);
    assert_eq!(batches[1][0], batches[0][0]);
    assert!(h.registry.pending_updates().is_empty());
    let stats = h.registry.stats().publisher;
    assert_eq!(stats.updates_requeued, 1);
    assert_eq!(stats.updates_published, 2);
}

#[tokio::test(start_paused = true)]
async fn flush_now_publishes_without_waiting() {
    let h = Harness::new().await;
    h.create("g", 4, "alice").await;
    h.add("g", member(1)).await.unwrap();

    let outcome = h.registry.flush_now().await;
    assert_eq!(
        outcome,
        cohort_groups::FlushOutcome::Published {
            entries: 1,
            events: 1
        }
    );
    assert!(!h.registry.publisher().is_pending());

    tokio::time::sleep(DELAY * 2).await;
    assert_eq!(h.ledger.call_count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_adds_to_one_group_are_serialized() {
    let h = Harness::new().await;
    h.create("g", 6, "alice").await;

    let mut handles = Vec::new();
    for v in 1..=16 {
        let registry = h.registry.clone();
        handles.push(tokio::spawn(async move {
            registry.add_member("g", member(v), "code", None).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let record = h.registry.get_group("g").await.unwrap();
    assert_eq!(record.member_count(), 16);
    assert_eq!(
        h.registry.root_of("g").unwrap(),
        fresh_root("g", 6, &record.members)
    );
    let pending = h.registry.pending_updates();
    assert_eq!(pending.len(), 16);
    assert_eq!(pending[15].root, h.registry.root_of("g").unwrap());
}
