//! Group lifecycle and membership operations.
//!
//! [`GroupRegistry`] is the only writer of both the group store and the
//! [`GroupCache`]. Every membership change follows the same sequence:
//! validate, redeem the invite, persist, update the cached tree, queue the
//! new root, schedule publication. Mutations of one group are serialized by
//! a per-group lock; different groups proceed concurrently. A rebuild of the
//! cache waits for in-flight mutations and holds new ones back until the
//! forest has been replaced.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use cohort_crypto::{group_id, MerkleProof, MAX_TREE_DEPTH};
use cohort_store::{GroupRecord, GroupStore, StoreError};
use cohort_types::{Commitment, MerkleRoot, Timestamp};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::cache::GroupCache;
use crate::error::{GroupError, InviteError};
use crate::invite::InviteRedeemer;
use crate::publisher::{BatchPublisher, FlushOutcome};
use crate::types::{PendingUpdate, RegistryStats};

/// Request to create a group.
#[derive(Clone, Debug, Deserialize)]
pub struct NewGroup {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub tree_depth: u8,
    #[serde(default)]
    pub tag: String,
    pub admin: String,
}

/// Metadata changes. `None` leaves a field as it is.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct GroupUpdate {
    pub description: Option<String>,
    pub tree_depth: Option<u8>,
    pub tag: Option<String>,
}

struct Inner {
    store: Arc<dyn GroupStore>,
    invites: Arc<dyn InviteRedeemer>,
    cache: GroupCache,
    publisher: BatchPublisher,
    /// One async lock per group name. Groups are never deleted, so entries
    /// are never removed.
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    /// Mutations hold this for read, [`GroupRegistry::bootstrap`] for write.
    rebuild: tokio::sync::RwLock<()>,
    groups_created: AtomicU64,
    members_added: AtomicU64,
}

/// Orchestrates the store, the cache and the publisher. Cheap to clone.
#[derive(Clone)]
pub struct GroupRegistry {
    inner: Arc<Inner>,
}

fn validate_depth(depth: u8) -> Result<(), GroupError> {
    if depth == 0 || depth > MAX_TREE_DEPTH {
        return Err(GroupError::InvalidDepth(depth));
    }
    Ok(())
}

/// Number of leaves a tree of `depth` can hold.
fn capacity(depth: u8) -> u64 {
    1u64 << depth
}

fn validate_name(name: &str) -> Result<(), GroupError> {
    if name.trim().is_empty() {
        return Err(GroupError::InvalidName("name must not be empty".to_string()));
    }
    if name.contains('/') {
        return Err(GroupError::InvalidName(format!(
            "'{name}' must not contain '/'"
        )));
    }
    Ok(())
}

impl GroupRegistry {
    pub fn new(
        store: Arc<dyn GroupStore>,
        invites: Arc<dyn InviteRedeemer>,
        publisher: BatchPublisher,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                invites,
                cache: GroupCache::new(),
                publisher,
                locks: Mutex::new(HashMap::new()),
                rebuild: tokio::sync::RwLock::new(()),
                groups_created: AtomicU64::new(0),
                members_added: AtomicU64::new(0),
            }),
        }
    }

    pub fn publisher(&self) -> &BatchPublisher {
        &self.inner.publisher
    }

    pub fn is_ready(&self) -> bool {
        self.inner.cache.is_ready()
    }

    fn ensure_ready(&self) -> Result<(), GroupError> {
        if self.inner.cache.is_ready() {
            Ok(())
        } else {
            Err(GroupError::NotReady)
        }
    }

    fn group_lock(&self, name: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .inner
            .locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(name.to_string()).or_default())
    }

    /// Run a synchronous store call on the blocking pool.
    async fn with_store<T, F>(&self, f: F) -> Result<T, GroupError>
    where
        F: FnOnce(&dyn GroupStore) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(&self.inner.store);
        tokio::task::spawn_blocking(move || f(store.as_ref()))
            .await
            .map_err(|e| GroupError::Internal(format!("store task failed: {e}")))?
            .map_err(GroupError::from)
    }

    async fn load(&self, name: &str) -> Result<GroupRecord, GroupError> {
        let key = name.to_string();
        self.with_store(move |store| store.find_by_name(&key))
            .await?
            .ok_or_else(|| GroupError::NotFound(name.to_string()))
    }

    /// Rebuild the cache from every persisted group.
    ///
    /// Returns the number of groups loaded. Safe to call again: the forest is
    /// replaced as a whole, and no mutation runs between reading the store
    /// and installing the rebuilt trees.
    pub async fn bootstrap(&self) -> Result<usize, GroupError> {
        let _rebuild = self.inner.rebuild.write().await;
        let records = self.with_store(|store| store.find()).await?;
        let members: usize = records.iter().map(GroupRecord::member_count).sum();
        self.inner.cache.bootstrap(&records)?;
        info!(groups = records.len(), members, "group cache bootstrapped");
        Ok(records.len())
    }

    /// Create a group with no members and register its empty tree.
    pub async fn create_group(&self, request: NewGroup) -> Result<GroupRecord, GroupError> {
        self.ensure_ready()?;
        validate_name(&request.name)?;
        validate_depth(request.tree_depth)?;

        // Detached so a dropped caller cannot leave the store ahead of the cache.
        let this = self.clone();
        tokio::spawn(async move { this.create_group_locked(request).await })
            .await
            .map_err(|e| GroupError::Internal(format!("create_group task failed: {e}")))?
    }

    async fn create_group_locked(&self, request: NewGroup) -> Result<GroupRecord, GroupError> {
        let _rebuild = self.inner.rebuild.read().await;
        let lock = self.group_lock(&request.name);
        let _guard = lock.lock().await;

        let record = GroupRecord::new(
            request.name,
            request.description,
            request.tree_depth,
            request.tag,
            request.admin,
            Timestamp::now(),
        );
        let record = self.with_store(move |store| store.create(record)).await?;
        let root = self
            .inner
            .cache
            .create_tree(&record.name, record.tree_depth)?;
        self.inner.groups_created.fetch_add(1, Ordering::Relaxed);

        info!(
            group = %record.name,
            admin = %record.admin,
            depth = record.tree_depth,
            %root,
            "group created"
        );
        Ok(record)
    }

    /// Change a group's metadata. Only the admin may do this.
    ///
    /// A new depth is recorded but the cached tree keeps the depth it was
    /// built with until the next bootstrap. Admission is capped by the
    /// smaller of the two capacities.
    pub async fn update_group(
        &self,
        name: &str,
        update: GroupUpdate,
        caller: &str,
    ) -> Result<GroupRecord, GroupError> {
        self.ensure_ready()?;
        if let Some(depth) = update.tree_depth {
            validate_depth(depth)?;
        }

        let _rebuild = self.inner.rebuild.read().await;
        let lock = self.group_lock(name);
        let _guard = lock.lock().await;

        let mut record = self.load(name).await?;
        if record.admin != caller {
            warn!(group = name, caller, "rejected group update from non-admin");
            return Err(GroupError::Unauthorized {
                group: name.to_string(),
                caller: caller.to_string(),
            });
        }
        if let Some(depth) = update.tree_depth {
            // A depth too small for the existing members could not be rebuilt
            // on the next bootstrap.
            if capacity(depth) < record.member_count() as u64 {
                return Err(GroupError::InvalidDepth(depth));
            }
            record.tree_depth = depth;
        }
        if let Some(description) = update.description {
            record.description = description;
        }
        if let Some(tag) = update.tag {
            record.tag = tag;
        }

        let record = self.with_store(move |store| store.save(&record)).await?;
        info!(group = name, depth = record.tree_depth, "group updated");
        Ok(record)
    }

    /// Admit `leaf` to the group by redeeming `invite_code`.
    ///
    /// Every check and the invite redemption happen before anything is
    /// written, so a failure leaves the group untouched. The new root is
    /// queued for publication; the call does not wait for the ledger.
    pub async fn add_member(
        &self,
        name: &str,
        leaf: Commitment,
        invite_code: &str,
        caller: Option<&str>,
    ) -> Result<GroupRecord, GroupError> {
        self.ensure_ready()?;

        let this = self.clone();
        let name = name.to_string();
        let invite_code = invite_code.to_string();
        let caller = caller.map(str::to_string);
        tokio::spawn(async move {
            this.add_member_locked(&name, leaf, &invite_code, caller.as_deref())
                .await
        })
        .await
        .map_err(|e| GroupError::Internal(format!("add_member task failed: {e}")))?
    }

    async fn add_member_locked(
        &self,
        name: &str,
        leaf: Commitment,
        invite_code: &str,
        caller: Option<&str>,
    ) -> Result<GroupRecord, GroupError> {
        let _rebuild = self.inner.rebuild.read().await;
        let lock = self.group_lock(name);
        let _guard = lock.lock().await;
        let cache = &self.inner.cache;

        if cache.is_member(name, &leaf)? {
            return Err(GroupError::Conflict(format!(
                "{leaf} is already a member of group '{name}'"
            )));
        }
        if cache.is_full(name)? {
            return Err(GroupError::GroupFull(name.to_string()));
        }
        let mut record = self.load(name).await?;
        // The stored depth may have shrunk below the cached tree's; the record
        // must stay rebuildable at its own depth.
        if record.member_count() as u64 >= capacity(record.tree_depth) {
            return Err(GroupError::GroupFull(name.to_string()));
        }

        self.inner
            .invites
            .redeem_invite(invite_code, name)
            .await
            .map_err(|e| match e {
                InviteError::Rejected(reason) => GroupError::InviteRejected(reason),
                InviteError::Unavailable(reason) => {
                    GroupError::Internal(format!("invite service unavailable: {reason}"))
                }
            })?;

        record.members.push(leaf);
        let record = self.with_store(move |store| store.save(&record)).await?;
        let root = cache.add_member(name, leaf)?;
        self.inner.members_added.fetch_add(1, Ordering::Relaxed);

        let publisher = &self.inner.publisher;
        publisher.enqueue(PendingUpdate::new(group_id(name), root));
        let scheduled = publisher.schedule_publication();

        info!(
            group = name,
            member = %leaf,
            caller = caller.unwrap_or("-"),
            members = record.member_count(),
            %root,
            "member added"
        );
        debug!(scheduled, pending = publisher.queue().len(), "queued root update");
        Ok(record)
    }

    pub async fn get_group(&self, name: &str) -> Result<GroupRecord, GroupError> {
        self.ensure_ready()?;
        self.load(name).await
    }

    pub async fn list_groups(&self) -> Result<Vec<GroupRecord>, GroupError> {
        self.ensure_ready()?;
        self.with_store(|store| store.find()).await
    }

    pub async fn list_groups_by_admin(&self, admin: &str) -> Result<Vec<GroupRecord>, GroupError> {
        self.ensure_ready()?;
        let admin = admin.to_string();
        self.with_store(move |store| store.find_by_admin(&admin)).await
    }

    pub fn is_member(&self, name: &str, leaf: &Commitment) -> Result<bool, GroupError> {
        self.inner.cache.is_member(name, leaf)
    }

    /// Inclusion proof for `leaf` against the group's current root.
    pub fn generate_proof(&self, name: &str, leaf: &Commitment) -> Result<MerkleProof, GroupError> {
        if !self.inner.cache.is_member(name, leaf)? {
            return Err(GroupError::NotAMember {
                group: name.to_string(),
                member: *leaf,
            });
        }
        let proof = self.inner.cache.proof_for(name, leaf)?;
        if !proof.verify() {
            return Err(GroupError::Internal(format!(
                "proof for {leaf} in group '{name}' does not verify"
            )));
        }
        Ok(proof)
    }

    pub fn root_of(&self, name: &str) -> Result<MerkleRoot, GroupError> {
        self.inner.cache.root_of(name)
    }

    /// Root changes queued for the next publication, oldest first.
    pub fn pending_updates(&self) -> Vec<PendingUpdate> {
        self.inner.publisher.queue().snapshot()
    }

    /// Cancel the scheduled publication and publish the queue immediately.
    pub async fn flush_now(&self) -> FlushOutcome {
        self.inner.publisher.cancel_pending();
        self.inner.publisher.flush().await
    }

    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            groups_created: self.inner.groups_created.load(Ordering::Relaxed),
            members_added: self.inner.members_added.load(Ordering::Relaxed),
            group_count: self.inner.cache.group_count().unwrap_or(0) as u64,
            pending_updates: self.inner.publisher.queue().len() as u64,
            publisher: self.inner.publisher.stats(),
        }
    }
}
