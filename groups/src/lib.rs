//! Group membership cache and batched on-chain root synchronization.
//!
//! Each group is a fixed-depth Merkle tree of identity commitments. The
//! [`GroupRegistry`] keeps an in-memory forest of those trees ([`GroupCache`])
//! in step with the durable [`GroupStore`](cohort_store::GroupStore), answers
//! membership and proof queries from memory, and queues every root change in
//! a [`SyncQueue`]. A debounced, single-flight [`BatchPublisher`] drains the
//! queue into one ledger transaction per cycle.
//!
//! Flow of a membership change:
//! - persist the new member list
//! - append the leaf to the cached tree
//! - enqueue `(group_id, new_root)`
//! - schedule a publication unless one is already pending

pub mod cache;
pub mod client;
pub mod error;
pub mod invite;
pub mod ledger;
pub mod publisher;
pub mod queue;
pub mod registry;
pub mod tasks;
pub mod types;

pub use cache::GroupCache;
pub use client::HttpLedgerClient;
pub use error::{GroupError, InviteError, LedgerError, PublishError};
pub use invite::{InviteRedeemer, StoreInviteRedeemer};
pub use ledger::LedgerClient;
pub use publisher::{
    BatchPublisher, DropFailed, FlushOutcome, PublisherConfig, PublisherStats, RequeueFailed,
    RetryDecision, RetryPolicy, PUBLISH_TASK,
};
pub use queue::SyncQueue;
pub use registry::{GroupRegistry, GroupUpdate, NewGroup};
pub use tasks::TaskRegistry;
pub use types::{LedgerEvent, LedgerReceipt, PendingUpdate, PublisherStatsSnapshot, RegistryStats};
