//! Nullable ledger: record batches instead of submitting them.

use async_trait::async_trait;
use cohort_groups::{LedgerClient, LedgerError, LedgerEvent, LedgerReceipt, PendingUpdate};
use std::sync::Mutex;
use std::time::Duration;

/// How the next batches are answered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LedgerMode {
    /// Successful receipt with one event per entry.
    Succeed,
    /// Receipt with a failure status.
    Reject,
    /// The call itself fails.
    Fail(LedgerError),
}

/// A test ledger that records every submitted batch.
pub struct NullLedger {
    mode: Mutex<LedgerMode>,
    latency: Duration,
    batches: Mutex<Vec<Vec<PendingUpdate>>>,
}

impl NullLedger {
    pub fn new() -> Self {
        Self::with_mode(LedgerMode::Succeed)
    }

    pub fn with_mode(mode: LedgerMode) -> Self {
        Self {
            mode: Mutex::new(mode),
            latency: Duration::ZERO,
            batches: Mutex::new(Vec::new()),
        }
    }

    /// Each call sleeps for `latency` (on the Tokio clock) before answering.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn set_mode(&self, mode: LedgerMode) {
        *self.mode.lock().unwrap() = mode;
    }

    /// All batches received so far, in call order.
    pub fn batches(&self) -> Vec<Vec<PendingUpdate>> {
        self.batches.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.batches.lock().unwrap().len()
    }
}

impl Default for NullLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerClient for NullLedger {
    async fn update_groups(&self, batch: &[PendingUpdate]) -> Result<LedgerReceipt, LedgerError> {
        self.batches.lock().unwrap().push(batch.to_vec());
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let mode = self.mode.lock().unwrap().clone();
        match mode {
            LedgerMode::Succeed => Ok(LedgerReceipt::success(
                batch
                    .iter()
                    .map(|u| LedgerEvent {
                        group_id: u.group_id,
                        root: u.root,
                    })
                    .collect(),
            )),
            LedgerMode::Reject => Ok(LedgerReceipt::failure()),
            LedgerMode::Fail(error) => Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cohort_types::{GroupId, MerkleRoot};

    #[tokio::test]
    async fn records_batches_and_answers_by_mode() {
        let ledger = NullLedger::new();
        let batch = [PendingUpdate::new(GroupId::ZERO, MerkleRoot::ZERO)];

        let receipt = ledger.update_groups(&batch).await.unwrap();
        assert!(receipt.status);
        assert_eq!(receipt.events.len(), 1);

        ledger.set_mode(LedgerMode::Reject);
        assert!(!ledger.update_groups(&batch).await.unwrap().status);

        ledger.set_mode(LedgerMode::Fail(LedgerError::Unreachable("down".into())));
        assert!(ledger.update_groups(&batch).await.is_err());

        assert_eq!(ledger.call_count(), 3);
    }
}
