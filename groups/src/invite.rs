//! Invite redemption seam.

use std::sync::Arc;

use async_trait::async_trait;
use cohort_store::{InviteStore, StoreError};

use crate::error::InviteError;

/// Consumes one-time invite codes.
#[async_trait]
pub trait InviteRedeemer: Send + Sync {
    /// Redeem `code` for `group_name`. A code can succeed at most once.
    async fn redeem_invite(&self, code: &str, group_name: &str) -> Result<(), InviteError>;
}

/// Redeems invites against a local [`InviteStore`], running the store call
/// on the blocking pool.
pub struct StoreInviteRedeemer<S> {
    store: Arc<S>,
}

impl<S> StoreInviteRedeemer<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<S> InviteRedeemer for StoreInviteRedeemer<S>
where
    S: InviteStore + 'static,
{
    async fn redeem_invite(&self, code: &str, group_name: &str) -> Result<(), InviteError> {
        let store = Arc::clone(&self.store);
        let code = code.to_string();
        let group_name = group_name.to_string();
        let result = tokio::task::spawn_blocking(move || store.redeem_invite(&code, &group_name))
            .await
            .map_err(|e| InviteError::Unavailable(format!("invite task failed: {e}")))?;

        match result {
            Ok(_) => Ok(()),
            Err(StoreError::NotFound(_)) => {
                Err(InviteError::Rejected("invite code does not exist".to_string()))
            }
            Err(StoreError::Rejected(reason)) => Err(InviteError::Rejected(reason)),
            Err(other) => Err(InviteError::Unavailable(other.to_string())),
        }
    }
}
