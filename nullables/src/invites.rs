//! Nullable invite subsystem.

use async_trait::async_trait;
use cohort_groups::{InviteError, InviteRedeemer};
use std::sync::Mutex;

/// An invite redeemer that accepts or rejects every code.
///
/// Records each `(code, group)` it was asked to redeem.
pub struct NullInvites {
    rejection: Mutex<Option<InviteError>>,
    redeemed: Mutex<Vec<(String, String)>>,
}

impl NullInvites {
    /// Accept every code.
    pub fn accepting() -> Self {
        Self {
            rejection: Mutex::new(None),
            redeemed: Mutex::new(Vec::new()),
        }
    }

    /// Reject every code with `reason`.
    pub fn rejecting(reason: &str) -> Self {
        let invites = Self::accepting();
        invites.reject_with(Some(InviteError::Rejected(reason.to_string())));
        invites
    }

    /// Change the answer for subsequent calls. `None` accepts.
    pub fn reject_with(&self, error: Option<InviteError>) {
        *self.rejection.lock().unwrap() = error;
    }

    /// Every successful redemption so far, in order.
    pub fn redeemed(&self) -> Vec<(String, String)> {
        self.redeemed.lock().unwrap().clone()
    }
}

impl Default for NullInvites {
    fn default() -> Self {
        Self::accepting()
    }
}

#[async_trait]
impl InviteRedeemer for NullInvites {
    async fn redeem_invite(&self, code: &str, group_name: &str) -> Result<(), InviteError> {
        if let Some(error) = self.rejection.lock().unwrap().clone() {
            return Err(error);
        }
        self.redeemed
            .lock()
            .unwrap()
            .push((code.to_string(), group_name.to_string()));
        Ok(())
    }
}
