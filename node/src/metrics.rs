//! Prometheus metrics for the cohort node.
//!
//! The registry and the publisher keep their own atomic counters; a
//! background task copies them into these metrics on an interval (see
//! [`NodeMetrics::observe`]). The [`NodeMetrics`] struct owns a dedicated
//! [`Registry`] that the RPC `/metrics` endpoint encodes into the Prometheus
//! text exposition format.

use cohort_groups::RegistryStats;
use prometheus::{
    register_int_counter_with_registry, register_int_gauge_with_registry, IntCounter, IntGauge,
    Opts, Registry,
};

/// Central collection of all node-level Prometheus metrics.
pub struct NodeMetrics {
    /// The Prometheus registry that owns every metric below.
    pub registry: Registry,

    // ── Counters ────────────────────────────────────────────────────────
    pub groups_created: IntCounter,
    pub members_added: IntCounter,
    /// Batches the ledger accepted.
    pub batches_published: IntCounter,
    /// Batches that failed or were rejected by the ledger.
    pub batches_failed: IntCounter,
    /// Root updates carried by accepted batches.
    pub updates_published: IntCounter,

    // ── Gauges ──────────────────────────────────────────────────────────
    /// Groups held in the membership cache.
    pub group_count: IntGauge,
    /// Root updates waiting for the next publication.
    pub pending_updates: IntGauge,
}

impl NodeMetrics {
    /// Create a fresh set of metrics, all registered under a new
    /// [`Registry`].
    pub fn new() -> Self {
        let registry = Registry::new();

        // Counters
        let groups_created = register_int_counter_with_registry!(
            Opts::new("cohort_groups_created_total", "Total groups created"),
            registry
        )
        .expect("failed to register groups_created counter");

        let members_added = register_int_counter_with_registry!(
            Opts::new("cohort_members_added_total", "Total members added to groups"),
            registry
        )
        .expect("failed to register members_added counter");

        let batches_published = register_int_counter_with_registry!(
            Opts::new(
                "cohort_batches_published_total",
                "Total root update batches accepted by the ledger"
            ),
            registry
        )
        .expect("failed to register batches_published counter");

        let batches_failed = register_int_counter_with_registry!(
            Opts::new(
                "cohort_batches_failed_total",
                "Total root update batches that failed or were rejected"
            ),
            registry
        )
        .expect("failed to register batches_failed counter");

        let updates_published = register_int_counter_with_registry!(
            Opts::new(
                "cohort_updates_published_total",
                "Total root updates published on-chain"
            ),
            registry
        )
        .expect("failed to register updates_published counter");

        // Gauges
        let group_count = register_int_gauge_with_registry!(
            Opts::new("cohort_group_count", "Groups in the membership cache"),
            registry
        )
        .expect("failed to register group_count gauge");

        let pending_updates = register_int_gauge_with_registry!(
            Opts::new(
                "cohort_pending_updates",
                "Root updates waiting to be published"
            ),
            registry
        )
        .expect("failed to register pending_updates gauge");

        Self {
            registry,
            groups_created,
            members_added,
            batches_published,
            batches_failed,
            updates_published,
            group_count,
            pending_updates,
        }
    }

    /// Bring every metric up to date with `stats`.
    ///
    /// Counters only move forward by the difference to their current value.
    pub fn observe(&self, stats: &RegistryStats) {
        advance(&self.groups_created, stats.groups_created);
        advance(&self.members_added, stats.members_added);
        advance(&self.batches_published, stats.publisher.batches_published);
        advance(&self.batches_failed, stats.publisher.batches_failed);
        advance(&self.updates_published, stats.publisher.updates_published);
        self.group_count.set(stats.group_count as i64);
        self.pending_updates.set(stats.pending_updates as i64);
    }
}

fn advance(counter: &IntCounter, total: u64) {
    let current = counter.get();
    if total > current {
        counter.inc_by(total - current);
    }
}

impl Default for NodeMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cohort_groups::PublisherStatsSnapshot;

    fn stats(members: u64, published: u64, pending: u64) -> RegistryStats {
        RegistryStats {
            groups_created: 2,
            members_added: members,
            group_count: 2,
            pending_updates: pending,
            publisher: PublisherStatsSnapshot {
                batches_published: published,
                updates_published: published * 3,
                ..Default::default()
            },
        }
    }

    #[test]
    fn observe_tracks_totals() {
        let metrics = NodeMetrics::new();
        metrics.observe(&stats(3, 1, 0));
        metrics.observe(&stats(5, 1, 2));
        assert_eq!(metrics.members_added.get(), 5);
        assert_eq!(metrics.batches_published.get(), 1);
        assert_eq!(metrics.updates_published.get(), 3);
        assert_eq!(metrics.pending_updates.get(), 2);
        assert_eq!(metrics.group_count.get(), 2);
    }

    #[test]
    fn registry_exposes_all_families() {
        let metrics = NodeMetrics::new();
        let names: Vec<_> = metrics
            .registry
            .gather()
            .iter()
            .map(|f| f.get_name().to_string())
            .collect();
        assert!(names.contains(&"cohort_members_added_total".to_string()));
        assert!(names.contains(&"cohort_pending_updates".to_string()));
        assert_eq!(names.len(), 7);
    }
}
