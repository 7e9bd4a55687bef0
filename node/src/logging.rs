//! Tracing subscriber setup for the node and the daemon.
//!
//! `RUST_LOG`, when set, replaces the configured filter entirely.

use std::str::FromStr;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::NodeError;

/// Log line encoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Coloured lines for a terminal.
    #[default]
    Human,
    /// One JSON object per event, with the enclosing span attached.
    Json,
}

impl FromStr for LogFormat {
    type Err = NodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "human" | "text" | "pretty" => Ok(LogFormat::Human),
            "json" => Ok(LogFormat::Json),
            other => Err(NodeError::Config(format!("unknown log format '{other}'"))),
        }
    }
}

/// Parse a filter such as `"info"` or `"warn,cohort_groups=debug"`.
pub fn parse_filter(directives: &str) -> Result<EnvFilter, NodeError> {
    EnvFilter::try_new(directives)
        .map_err(|e| NodeError::Config(format!("invalid log filter '{directives}': {e}")))
}

/// Install the global subscriber.
///
/// Fails if `level` does not parse or a subscriber is already installed.
pub fn init_logging(format: LogFormat, level: &str) -> Result<(), NodeError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => parse_filter(level)?,
    };

    let (human, json) = match format {
        LogFormat::Human => (
            Some(fmt::layer().with_target(true).with_thread_ids(true)),
            None,
        ),
        LogFormat::Json => (
            None,
            Some(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_target(true)
                    .with_thread_ids(true),
            ),
        ),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(human)
        .with(json)
        .try_init()
        .map_err(|e| NodeError::Config(format!("logging already initialised: {e}")))
}
