//! Cohort node: wires the membership engine to its surroundings.
//!
//! The node is the central coordinator that:
//! - Opens LMDB storage for groups and invites
//! - Rebuilds the in-memory group cache on startup
//! - Publishes batched root updates to the ledger relay
//! - Serves the HTTP API and Prometheus metrics
//! - Publishes any queued updates on shutdown

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod node;
pub mod shutdown;

pub use config::NodeConfig;
pub use error::NodeError;
pub use logging::{init_logging, LogFormat};
pub use metrics::NodeMetrics;
pub use node::CohortNode;
pub use shutdown::ShutdownController;
