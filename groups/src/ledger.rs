//! Ledger client seam.

use async_trait::async_trait;

use crate::error::LedgerError;
use crate::types::{LedgerReceipt, PendingUpdate};

/// Submits root updates to the ledger contract.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Submit `batch` as a single transaction.
    ///
    /// `Ok` with `status == false` means the transaction was mined but
    /// failed; `Err` means it could not be submitted at all.
    async fn update_groups(&self, batch: &[PendingUpdate]) -> Result<LedgerReceipt, LedgerError>;
}
