use cohort_store::StoreError;
use cohort_types::Commitment;
use thiserror::Error;

/// Errors surfaced to callers of [`GroupRegistry`](crate::GroupRegistry)
/// operations.
#[derive(Debug, Error)]
pub enum GroupError {
    #[error("group '{0}' not found")]
    NotFound(String),

    #[error("'{caller}' is not the admin of group '{group}'")]
    Unauthorized { group: String, caller: String },

    /// Duplicate group name or duplicate member.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invite rejected: {0}")]
    InviteRejected(String),

    #[error("group cache is not ready")]
    NotReady,

    #[error("{member} is not a member of group '{group}'")]
    NotAMember { group: String, member: Commitment },

    #[error("group '{0}' is full")]
    GroupFull(String),

    #[error("invalid tree depth {0}")]
    InvalidDepth(u8),

    #[error("invalid group name: {0}")]
    InvalidName(String),

    #[error("store error: {0}")]
    Store(StoreError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for GroupError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Duplicate(name) => {
                GroupError::Conflict(format!("group '{name}' already exists"))
            }
            StoreError::NotFound(name) => GroupError::NotFound(name),
            other => GroupError::Store(other),
        }
    }
}

/// Failure reported by an invite subsystem.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InviteError {
    /// The code cannot be used; the reason is shown to the caller verbatim.
    #[error("{0}")]
    Rejected(String),

    #[error("invite service unavailable: {0}")]
    Unavailable(String),
}

/// Failure talking to the ledger.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("request to ledger failed: {0}")]
    RequestFailed(String),

    #[error("invalid response from ledger: {0}")]
    InvalidResponse(String),

    #[error("ledger unreachable: {0}")]
    Unreachable(String),
}

/// Why a batch publication failed. Only ever logged and counted.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PublishError {
    /// The transaction went through but reported a failure status.
    #[error("ledger rejected batch of {entries} updates")]
    LedgerRejected { entries: usize },

    #[error("ledger submission failed: {0}")]
    LedgerSubmissionFailed(#[from] LedgerError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_store_key_is_conflict() {
        let err = GroupError::from(StoreError::Duplicate("voters".into()));
        assert!(matches!(err, GroupError::Conflict(msg) if msg.contains("voters")));
    }

    #[test]
    fn backend_store_error_is_wrapped() {
        let err = GroupError::from(StoreError::Backend("disk".into()));
        assert!(matches!(err, GroupError::Store(StoreError::Backend(_))));
    }
}
