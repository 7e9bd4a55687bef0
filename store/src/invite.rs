//! Invite code storage trait.
//!
//! Codes are written by an external issuer; this workspace only consumes them.

use crate::StoreError;
use cohort_types::Timestamp;
use serde::{Deserialize, Serialize};

/// A one-time code that authorizes one addition to one group.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InviteRecord {
    pub code: String,
    pub group_name: String,
    pub redeemed: bool,
    pub created_at: Timestamp,
}

impl InviteRecord {
    pub fn new(code: impl Into<String>, group_name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            group_name: group_name.into(),
            redeemed: false,
            created_at: Timestamp::now(),
        }
    }
}

/// Trait for invite storage.
pub trait InviteStore: Send + Sync {
    fn put_invite(&self, invite: &InviteRecord) -> Result<(), StoreError>;

    fn get_invite(&self, code: &str) -> Result<Option<InviteRecord>, StoreError>;

    /// Atomically consume `code` for `group_name`.
    ///
    /// Unknown codes fail with [`StoreError::NotFound`]; codes scoped to a
    /// different group or already consumed fail with
    /// [`StoreError::Rejected`]. On success the stored invite is marked
    /// redeemed and returned.
    fn redeem_invite(&self, code: &str, group_name: &str) -> Result<InviteRecord, StoreError>;
}

/// Validation shared by every backend's `redeem_invite`.
pub fn check_redeemable(invite: &InviteRecord, group_name: &str) -> Result<(), StoreError> {
    if invite.group_name != group_name {
        return Err(StoreError::Rejected(format!(
            "invite code is not valid for group '{group_name}'"
        )));
    }
    if invite.redeemed {
        return Err(StoreError::Rejected(
            "invite code has already been redeemed".to_string(),
        ));
    }
    Ok(())
}
