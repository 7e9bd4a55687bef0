//! End-to-end node tests: LMDB storage, bootstrap across restarts and the
//! shutdown flush.

use std::sync::Arc;

use cohort_groups::{FlushOutcome, NewGroup, StoreInviteRedeemer};
use cohort_node::{CohortNode, NodeConfig};
use cohort_nullables::{NullGroupStore, NullInvites, NullLedger};
use cohort_store::{InviteRecord, InviteStore};
use cohort_store_lmdb::LmdbEnvironment;
use cohort_types::Commitment;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn temp_env() -> (tempfile::TempDir, LmdbEnvironment) {
    let dir = tempfile::tempdir().expect("temp dir");
    let env = LmdbEnvironment::open(dir.path(), 4, 16 * 1024 * 1024).expect("open env");
    (dir, env)
}

fn offline_config() -> NodeConfig {
    NodeConfig {
        enable_rpc: false,
        ..Default::default()
    }
}

fn lmdb_node(env: &LmdbEnvironment, ledger: Arc<NullLedger>, config: NodeConfig) -> CohortNode {
    CohortNode::with_collaborators(
        config,
        Arc::new(env.group_store()),
        Arc::new(StoreInviteRedeemer::new(Arc::new(env.invite_store()))),
        ledger,
    )
}

fn voters() -> NewGroup {
    NewGroup {
        name: "voters".into(),
        description: "district voters".into(),
        tree_depth: 4,
        tag: "gov".into(),
        admin: "alice".into(),
    }
}

fn member(v: u8) -> Commitment {
    let mut bytes = [0u8; 32];
    bytes[31] = v;
    Commitment::new(bytes)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn lmdb_groups_survive_restart() {
    let (_dir, env) = temp_env();
    let invites = env.invite_store();
    for code in ["c1", "c2", "c3"] {
        invites.put_invite(&InviteRecord::new(code, "voters")).unwrap();
    }

    let ledger = Arc::new(NullLedger::new());
    let mut node = lmdb_node(&env, ledger.clone(), offline_config());
    node.start().await.unwrap();
    node.registry.create_group(voters()).await.unwrap();
    for (v, code) in [(1, "c1"), (2, "c2"), (3, "c3")] {
        node.registry
            .add_member("voters", member(v), code, Some("alice"))
            .await
            .unwrap();
    }
    let root = node.registry.root_of("voters").unwrap();
    node.stop().await.unwrap();

    let mut restarted = lmdb_node(&env, ledger, offline_config());
    restarted.start().await.unwrap();
    assert_eq!(restarted.registry.root_of("voters").unwrap(), root);
    let record = restarted.registry.get_group("voters").await.unwrap();
    assert_eq!(record.members, vec![member(1), member(2), member(3)]);
    let proof = restarted.registry.generate_proof("voters", &member(2)).unwrap();
    assert!(proof.verify());
    assert_eq!(proof.root, root);

    // Codes stay consumed across restarts.
    assert!(invites.get_invite("c1").unwrap().unwrap().redeemed);
    restarted.stop().await.unwrap();
}

#[tokio::test]
async fn stop_publishes_queued_updates() {
    let ledger = Arc::new(NullLedger::new());
    let mut node = CohortNode::with_collaborators(
        offline_config(),
        Arc::new(NullGroupStore::new()),
        Arc::new(NullInvites::accepting()),
        ledger.clone(),
    );
    node.start().await.unwrap();
    node.registry.create_group(voters()).await.unwrap();
    node.registry
        .add_member("voters", member(1), "code", None)
        .await
        .unwrap();
    assert!(node.registry.publisher().is_pending());

    let outcome = node.stop().await.unwrap();
    assert_eq!(
        outcome,
        Some(FlushOutcome::Published {
            entries: 1,
            events: 1
        })
    );
    assert_eq!(ledger.call_count(), 1);
    assert!(!node.registry.publisher().is_pending());
    assert_eq!(node.metrics.updates_published.get(), 1);
    assert_eq!(node.metrics.members_added.get(), 1);
}

#[tokio::test]
async fn stop_without_flush_leaves_ledger_untouched() {
    let ledger = Arc::new(NullLedger::new());
    let config = NodeConfig {
        flush_on_shutdown: false,
        ..offline_config()
    };
    let mut node = CohortNode::with_collaborators(
        config,
        Arc::new(NullGroupStore::new()),
        Arc::new(NullInvites::accepting()),
        ledger.clone(),
    );
    node.start().await.unwrap();
    node.registry.create_group(voters()).await.unwrap();
    node.registry
        .add_member("voters", member(1), "code", None)
        .await
        .unwrap();

    assert_eq!(node.stop().await.unwrap(), None);
    assert_eq!(ledger.call_count(), 0);
    assert!(!node.registry.publisher().is_pending());
}

#[tokio::test]
async fn new_opens_storage_in_data_dir() {
    let dir = tempfile::tempdir().expect("temp dir");
    let config = NodeConfig {
        data_dir: dir.path().join("db"),
        lmdb_map_size: 16 * 1024 * 1024,
        flush_on_shutdown: false,
        ..offline_config()
    };
    let mut node = CohortNode::new(config).unwrap();
    node.start().await.unwrap();
    assert!(node.registry.is_ready());
    assert!(node.registry.list_groups().await.unwrap().is_empty());
    node.stop().await.unwrap();
    assert!(dir.path().join("db").join("data.mdb").exists());
}
