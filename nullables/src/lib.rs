//! Nullable infrastructure for deterministic testing.
//!
//! Every external collaborator of the group registry (group storage, invite
//! redemption, the ledger) has a test-friendly implementation here that:
//! - Keeps all state in memory
//! - Can be steered programmatically (fail writes, reject invites, reject batches)
//! - Records what it was asked to do for later assertions
//!
//! Usage: swap real implementations for nullables in tests.

pub mod invites;
pub mod ledger;
pub mod store;

pub use invites::NullInvites;
pub use ledger::{LedgerMode, NullLedger};
pub use store::{NullGroupStore, NullInviteStore};
