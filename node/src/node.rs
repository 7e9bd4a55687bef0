//! The running node: storage, registry, publication and the HTTP API.

use std::sync::Arc;
use std::time::Duration;

use cohort_groups::{
    BatchPublisher, DropFailed, FlushOutcome, GroupRegistry, HttpLedgerClient, InviteRedeemer,
    LedgerClient, RequeueFailed, RetryPolicy, StoreInviteRedeemer,
};
use cohort_rpc::{RpcServer, RpcState};
use cohort_store::GroupStore;
use cohort_store_lmdb::environment::MAX_DBS;
use cohort_store_lmdb::LmdbEnvironment;
use tokio::task::JoinHandle;

use crate::config::NodeConfig;
use crate::error::NodeError;
use crate::metrics::NodeMetrics;
use crate::shutdown::ShutdownController;

/// Timeout for waiting on background tasks during shutdown.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// How often registry and publisher counters are copied into the metrics.
const METRICS_REFRESH_INTERVAL: Duration = Duration::from_secs(5);

/// A running cohort node.
pub struct CohortNode {
    pub config: NodeConfig,
    pub registry: GroupRegistry,
    pub metrics: Arc<NodeMetrics>,
    pub shutdown: Arc<ShutdownController>,
    /// `None` when the node was built around injected collaborators.
    environment: Option<LmdbEnvironment>,
    /// Handles for spawned background tasks (joined during shutdown).
    task_handles: Vec<JoinHandle<()>>,
}

impl CohortNode {
    /// Create a node backed by LMDB at `config.data_dir` and the HTTP ledger
    /// relay at `config.ledger_endpoint`.
    ///
    /// Call [`start`](Self::start) to bootstrap the cache and begin serving.
    pub fn new(config: NodeConfig) -> Result<Self, NodeError> {
        let environment = LmdbEnvironment::open(&config.data_dir, MAX_DBS, config.lmdb_map_size)?;
        let store: Arc<dyn GroupStore> = Arc::new(environment.group_store());
        let invites: Arc<dyn InviteRedeemer> = Arc::new(StoreInviteRedeemer::new(Arc::new(
            environment.invite_store(),
        )));
        let ledger: Arc<dyn LedgerClient> = Arc::new(HttpLedgerClient::with_timeout(
            config.ledger_endpoint.clone(),
            config.ledger_timeout(),
        )?);

        let mut node = Self::with_collaborators(config, store, invites, ledger);
        node.environment = Some(environment);
        Ok(node)
    }

    /// Create a node around caller-supplied storage, invites and ledger.
    pub fn with_collaborators(
        config: NodeConfig,
        store: Arc<dyn GroupStore>,
        invites: Arc<dyn InviteRedeemer>,
        ledger: Arc<dyn LedgerClient>,
    ) -> Self {
        let retry: Arc<dyn RetryPolicy> = if config.retry_failed_publications {
            Arc::new(RequeueFailed)
        } else {
            Arc::new(DropFailed)
        };
        let publisher =
            BatchPublisher::with_retry_policy(ledger, config.publisher_config(), retry);
        let registry = GroupRegistry::new(store, invites, publisher);

        Self {
            config,
            registry,
            metrics: Arc::new(NodeMetrics::new()),
            shutdown: Arc::new(ShutdownController::new()),
            environment: None,
            task_handles: Vec::new(),
        }
    }

    /// Start the node.
    ///
    /// 1. Rebuilds the group cache from storage
    /// 2. Spawns the metrics refresh loop
    /// 3. Optionally starts the HTTP API
    pub async fn start(&mut self) -> Result<(), NodeError> {
        let groups = self.registry.bootstrap().await?;
        self.metrics.observe(&self.registry.stats());

        // ── Metrics refresh ──────────────────────────────────────────────
        let registry = self.registry.clone();
        let metrics = Arc::clone(&self.metrics);
        let mut shutdown_rx = self.shutdown.subscribe();
        let metrics_handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(METRICS_REFRESH_INTERVAL);
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        tracing::debug!("metrics refresh loop shutting down");
                        break;
                    }
                    _ = interval.tick() => {
                        metrics.observe(&registry.stats());
                    }
                }
            }
        });
        self.task_handles.push(metrics_handle);

        // ── HTTP API (optional) ──────────────────────────────────────────
        if self.config.enable_rpc {
            let metrics_registry = if self.config.enable_metrics {
                Some(self.metrics.registry.clone())
            } else {
                None
            };
            let rpc_server = RpcServer::new(
                self.config.rpc_port,
                RpcState::new(self.registry.clone(), metrics_registry),
            );
            let signal = self.shutdown.signal();
            let rpc_handle = tokio::spawn(async move {
                match rpc_server.start(signal).await {
                    Ok(()) => tracing::info!("RPC server exited"),
                    Err(e) => tracing::error!("RPC server error: {e}"),
                }
            });
            self.task_handles.push(rpc_handle);
        }

        tracing::info!(
            groups,
            rpc = self.config.enable_rpc,
            publish_delay_secs = self.config.publish_delay_secs,
            "cohort node started"
        );
        Ok(())
    }

    /// Start the node and wait for a shutdown signal.
    pub async fn run(&mut self) -> Result<(), NodeError> {
        self.start().await?;
        self.shutdown.wait_for_signal().await;
        Ok(())
    }

    /// Stop the node gracefully.
    ///
    /// 1. Sends the shutdown signal to all background tasks and waits for
    ///    them (with timeout), so no request is still mutating groups.
    /// 2. Cancels the scheduled publication.
    /// 3. Publishes the remaining queue if `flush_on_shutdown` is set.
    /// 4. Flushes LMDB to disk.
    pub async fn stop(&mut self) -> Result<Option<FlushOutcome>, NodeError> {
        tracing::info!("cohort node stopping");
        self.shutdown.shutdown();

        let handles: Vec<JoinHandle<()>> = self.task_handles.drain(..).collect();
        let wait_all = async {
            for handle in handles {
                let _ = handle.await;
            }
        };
        if tokio::time::timeout(SHUTDOWN_TIMEOUT, wait_all).await.is_err() {
            tracing::warn!(
                "background tasks did not finish within {:?}",
                SHUTDOWN_TIMEOUT
            );
        }

        let publisher = self.registry.publisher();
        if publisher.cancel_pending() {
            tracing::info!("cancelled scheduled group root publication");
        }

        let outcome = if self.config.flush_on_shutdown {
            let outcome = self.registry.flush_now().await;
            tracing::info!(?outcome, "final group root publication");
            Some(outcome)
        } else {
            let pending = publisher.queue().len();
            if pending > 0 {
                tracing::warn!(pending, "discarding unpublished group root updates");
            }
            None
        };
        self.metrics.observe(&self.registry.stats());

        if let Some(environment) = &self.environment {
            match environment.sync() {
                Ok(()) => tracing::info!("LMDB flushed to disk"),
                Err(e) => tracing::warn!("LMDB force_sync failed: {e}"),
            }
        }

        tracing::info!("cohort node stopped");
        Ok(outcome)
    }
}
