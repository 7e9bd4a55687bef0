//! Debounced, single-flight publication of queued root changes.
//!
//! The first root change after an idle period schedules one deferred flush
//! under the task name [`PUBLISH_TASK`]. Further changes made while that
//! flush is pending only join the queue. When the timer fires the queue is
//! drained and sent to the ledger as one batch; anything queued afterwards
//! waits for the next cycle. Cycles are independent: two consecutive cycles
//! publish two batches.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::error::PublishError;
use crate::ledger::LedgerClient;
use crate::queue::SyncQueue;
use crate::tasks::TaskRegistry;
use crate::types::{PendingUpdate, PublisherStatsSnapshot};

/// Name under which the pending flush is registered.
pub const PUBLISH_TASK: &str = "publish-group-roots";

/// Default delay between the first queued change and its publication.
pub const DEFAULT_PUBLISH_DELAY: Duration = Duration::from_secs(60);

#[derive(Clone, Debug)]
pub struct PublisherConfig {
    /// How long a scheduled flush waits before draining the queue.
    pub delay: Duration,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            delay: DEFAULT_PUBLISH_DELAY,
        }
    }
}

/// What to do with a batch the ledger did not accept.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryDecision {
    /// Discard the batch.
    Drop,
    /// Put the batch back at the front of the queue and schedule a new cycle.
    Requeue,
}

/// Policy applied to failed publications.
pub trait RetryPolicy: Send + Sync {
    fn on_failure(&self, batch: &[PendingUpdate], error: &PublishError) -> RetryDecision;
}

/// Failed batches are logged and discarded. The default.
#[derive(Clone, Copy, Debug, Default)]
pub struct DropFailed;

impl RetryPolicy for DropFailed {
    fn on_failure(&self, _batch: &[PendingUpdate], _error: &PublishError) -> RetryDecision {
        RetryDecision::Drop
    }
}

/// Failed batches are retried on the next cycle.
#[derive(Clone, Copy, Debug, Default)]
pub struct RequeueFailed;

impl RetryPolicy for RequeueFailed {
    fn on_failure(&self, _batch: &[PendingUpdate], _error: &PublishError) -> RetryDecision {
        RetryDecision::Requeue
    }
}

/// Result of one flush.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Nothing was queued.
    Empty,
    Published { entries: usize, events: usize },
    Failed {
        entries: usize,
        error: PublishError,
        decision: RetryDecision,
    },
}

/// Lock-free publication counters.
#[derive(Debug, Default)]
pub struct PublisherStats {
    batches_published: AtomicU64,
    batches_failed: AtomicU64,
    updates_published: AtomicU64,
    updates_dropped: AtomicU64,
    updates_requeued: AtomicU64,
}

impl PublisherStats {
    pub fn snapshot(&self) -> PublisherStatsSnapshot {
        PublisherStatsSnapshot {
            batches_published: self.batches_published.load(Ordering::Relaxed),
            batches_failed: self.batches_failed.load(Ordering::Relaxed),
            updates_published: self.updates_published.load(Ordering::Relaxed),
            updates_dropped: self.updates_dropped.load(Ordering::Relaxed),
            updates_requeued: self.updates_requeued.load(Ordering::Relaxed),
        }
    }
}

struct Inner {
    queue: SyncQueue,
    ledger: Arc<dyn LedgerClient>,
    retry: Arc<dyn RetryPolicy>,
    tasks: TaskRegistry,
    delay: Duration,
    /// Held for the whole of a flush so at most one runs at a time.
    flush_lock: Mutex<()>,
    stats: PublisherStats,
}

/// Owns the [`SyncQueue`] and drains it into the ledger. Cheap to clone.
#[derive(Clone)]
pub struct BatchPublisher {
    inner: Arc<Inner>,
}

impl BatchPublisher {
    /// A publisher that drops failed batches.
    pub fn new(ledger: Arc<dyn LedgerClient>, config: PublisherConfig) -> Self {
        Self::with_retry_policy(ledger, config, Arc::new(DropFailed))
    }

    pub fn with_retry_policy(
        ledger: Arc<dyn LedgerClient>,
        config: PublisherConfig,
        retry: Arc<dyn RetryPolicy>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                queue: SyncQueue::new(),
                ledger,
                retry,
                tasks: TaskRegistry::new(),
                delay: config.delay,
                flush_lock: Mutex::new(()),
                stats: PublisherStats::default(),
            }),
        }
    }

    pub fn queue(&self) -> &SyncQueue {
        &self.inner.queue
    }

    pub fn stats(&self) -> PublisherStatsSnapshot {
        self.inner.stats.snapshot()
    }

    pub fn delay(&self) -> Duration {
        self.inner.delay
    }

    /// Whether a flush is scheduled and has not fired yet.
    pub fn is_pending(&self) -> bool {
        self.inner.tasks.is_pending(PUBLISH_TASK)
    }

    /// Queue a root change. Does not schedule anything by itself.
    pub fn enqueue(&self, update: PendingUpdate) {
        self.inner.queue.enqueue(update);
    }

    /// Schedule one deferred flush unless one is already pending.
    ///
    /// Returns `true` if a new flush was scheduled. Must be called from
    /// within a Tokio runtime.
    pub fn schedule_publication(&self) -> bool {
        let scheduled = self.inner.tasks.register_if_absent(PUBLISH_TASK, || {
            let publisher = self.clone();
            tokio::spawn(async move {
                tokio::time::sleep(publisher.inner.delay).await;
                publisher.inner.tasks.remove(PUBLISH_TASK);
                publisher.flush().await;
            })
        });
        if scheduled {
            debug!(delay_secs = self.inner.delay.as_secs(), "scheduled group root publication");
        }
        scheduled
    }

    /// Abort the pending flush, if any. Queued updates stay queued.
    pub fn cancel_pending(&self) -> bool {
        self.inner.tasks.cancel(PUBLISH_TASK)
    }

    /// Drain the queue and submit it as one batch.
    pub async fn flush(&self) -> FlushOutcome {
        let _guard = self.inner.flush_lock.lock().await;

        let batch = self.inner.queue.drain();
        if batch.is_empty() {
            debug!("no pending group root updates to publish");
            return FlushOutcome::Empty;
        }
        let entries = batch.len();
        info!(entries, "publishing group root updates");

        let error = match self.inner.ledger.update_groups(&batch).await {
            Ok(receipt) if receipt.status => {
                let events = receipt.events.len();
                let stats = &self.inner.stats;
                stats.batches_published.fetch_add(1, Ordering::Relaxed);
                stats
                    .updates_published
                    .fetch_add(entries as u64, Ordering::Relaxed);
                info!(entries, events, "group roots published on-chain");
                return FlushOutcome::Published { entries, events };
            }
            Ok(_) => PublishError::LedgerRejected { entries },
            Err(e) => PublishError::from(e),
        };

        error!(entries, %error, "failed to publish group root updates");
        self.inner.stats.batches_failed.fetch_add(1, Ordering::Relaxed);

        let decision = self.inner.retry.on_failure(&batch, &error);
        match decision {
            RetryDecision::Drop => {
                self.inner
                    .stats
                    .updates_dropped
                    .fetch_add(entries as u64, Ordering::Relaxed);
                warn!(entries, "dropping failed group root updates");
            }
            RetryDecision::Requeue => {
                self.inner
                    .stats
                    .updates_requeued
                    .fetch_add(entries as u64, Ordering::Relaxed);
                self.inner.queue.requeue_front(batch);
                self.schedule_publication();
            }
        }
        FlushOutcome::Failed {
            entries,
            error,
            decision,
        }
    }
}
