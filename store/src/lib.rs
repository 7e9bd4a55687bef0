//! Abstract storage traits for cohort membership groups.
//!
//! Every storage backend (LMDB, in-memory for testing) implements these
//! traits. The rest of the codebase depends only on the traits.

pub mod error;
pub mod group;
pub mod invite;

pub use error::StoreError;
pub use group::{GroupRecord, GroupStore};
pub use invite::{check_redeemable, InviteRecord, InviteStore};
