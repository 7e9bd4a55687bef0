//! Node configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use cohort_groups::PublisherConfig;

use crate::logging::LogFormat;
use crate::NodeError;

/// Configuration for a cohort node.
///
/// Can be loaded from a TOML file via [`NodeConfig::from_toml_file`] or
/// built programmatically (e.g. for tests).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Data directory for group and invite storage.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Maximum size of the LMDB memory map, in bytes.
    #[serde(default = "default_lmdb_map_size")]
    pub lmdb_map_size: usize,

    /// Whether to enable the HTTP API.
    #[serde(default = "default_true")]
    pub enable_rpc: bool,

    /// HTTP API port (if enabled).
    #[serde(default = "default_rpc_port")]
    pub rpc_port: u16,

    /// Base URL of the ledger relay that accepts batched root updates.
    #[serde(default = "default_ledger_endpoint")]
    pub ledger_endpoint: String,

    /// Timeout for one batch submission, in seconds.
    #[serde(default = "default_ledger_timeout_secs")]
    pub ledger_timeout_secs: u64,

    /// Delay between the first queued root change and its publication.
    #[serde(default = "default_publish_delay_secs")]
    pub publish_delay_secs: u64,

    /// Put failed batches back on the queue instead of dropping them.
    #[serde(default)]
    pub retry_failed_publications: bool,

    /// Publish whatever is still queued when the node stops.
    #[serde(default = "default_true")]
    pub flush_on_shutdown: bool,

    /// Whether to enable Prometheus metrics endpoint.
    #[serde(default)]
    pub enable_metrics: bool,

    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_data_dir() -> PathBuf {
    PathBuf::from("./cohort_data")
}

fn default_lmdb_map_size() -> usize {
    cohort_store_lmdb::environment::DEFAULT_MAP_SIZE
}

fn default_true() -> bool {
    true
}

fn default_rpc_port() -> u16 {
    7390
}

fn default_ledger_endpoint() -> String {
    "http://127.0.0.1:8545".to_string()
}

fn default_ledger_timeout_secs() -> u64 {
    120
}

fn default_publish_delay_secs() -> u64 {
    60
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

// ── Impl ───────────────────────────────────────────────────────────────

impl NodeConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &str) -> Result<Self, NodeError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| NodeError::Config(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, NodeError> {
        toml::from_str(s).map_err(|e| NodeError::Config(e.to_string()))
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, NodeError> {
        toml::to_string_pretty(self).map_err(|e| NodeError::Config(e.to_string()))
    }

    pub fn publisher_config(&self) -> PublisherConfig {
        PublisherConfig {
            delay: Duration::from_secs(self.publish_delay_secs),
        }
    }

    pub fn ledger_timeout(&self) -> Duration {
        Duration::from_secs(self.ledger_timeout_secs)
    }

    /// The configured log format. Unknown values fall back to human output.
    pub fn log_format(&self) -> LogFormat {
        self.log_format.parse().unwrap_or_default()
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            lmdb_map_size: default_lmdb_map_size(),
            enable_rpc: default_true(),
            rpc_port: default_rpc_port(),
            ledger_endpoint: default_ledger_endpoint(),
            ledger_timeout_secs: default_ledger_timeout_secs(),
            publish_delay_secs: default_publish_delay_secs(),
            retry_failed_publications: false,
            flush_on_shutdown: default_true(),
            enable_metrics: false,
            log_format: default_log_format(),
            log_level: default_log_level(),
        }
    }
}
