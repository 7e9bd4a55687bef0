//! HTTP/JSON API for the cohort node.
//!
//! Provides endpoints for:
//! - Group creation, lookup and metadata updates
//! - Member admission with invite codes
//! - Membership checks and inclusion proofs
//! - Health and Prometheus metrics

pub mod error;
pub mod handlers;
pub mod server;

pub use error::RpcError;
pub use server::{build_router, RpcServer, RpcState};
