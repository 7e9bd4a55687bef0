//! Cohort daemon: entry point for running a cohort node.

use anyhow::Context;
use clap::Parser;
use cohort_node::{init_logging, CohortNode, NodeConfig};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "cohort-daemon", about = "Group membership node daemon")]
struct Cli {
    /// Data directory for group and invite storage.
    #[arg(long, env = "COHORT_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Enable or disable the HTTP API.
    #[arg(long, env = "COHORT_ENABLE_RPC")]
    rpc: Option<bool>,

    /// HTTP API port.
    #[arg(long, env = "COHORT_RPC_PORT")]
    rpc_port: Option<u16>,

    /// Base URL of the ledger relay.
    #[arg(long, env = "COHORT_LEDGER_ENDPOINT")]
    ledger_endpoint: Option<String>,

    /// Seconds between the first queued root change and its publication.
    #[arg(long, env = "COHORT_PUBLISH_DELAY_SECS")]
    publish_delay_secs: Option<u64>,

    /// Retry failed publications on the next cycle instead of dropping them.
    #[arg(long, env = "COHORT_RETRY_FAILED_PUBLICATIONS")]
    retry_failed_publications: bool,

    /// Do not publish queued updates on shutdown.
    #[arg(long, env = "COHORT_NO_FLUSH_ON_SHUTDOWN")]
    no_flush_on_shutdown: bool,

    /// Enable Prometheus metrics endpoint.
    #[arg(long, env = "COHORT_ENABLE_METRICS")]
    metrics: bool,

    /// Log format: "human" or "json".
    #[arg(long, env = "COHORT_LOG_FORMAT")]
    log_format: Option<String>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "COHORT_LOG_LEVEL")]
    log_level: Option<String>,

    /// Path to a TOML configuration file. If provided, file settings
    /// are used as the base; CLI flags and env vars override them.
    #[arg(long, env = "COHORT_CONFIG")]
    config: Option<PathBuf>,

    /// Subcommand.
    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Run the node until SIGINT/SIGTERM.
    Run,
    /// Print the effective configuration as TOML.
    Config,
}

impl Cli {
    /// Overlay command-line and environment settings on `base`.
    fn apply(&self, base: NodeConfig) -> NodeConfig {
        NodeConfig {
            data_dir: self.data_dir.clone().unwrap_or(base.data_dir),
            enable_rpc: self.rpc.unwrap_or(base.enable_rpc),
            rpc_port: self.rpc_port.unwrap_or(base.rpc_port),
            ledger_endpoint: self
                .ledger_endpoint
                .clone()
                .unwrap_or(base.ledger_endpoint),
            publish_delay_secs: self.publish_delay_secs.unwrap_or(base.publish_delay_secs),
            retry_failed_publications: self.retry_failed_publications
                || base.retry_failed_publications,
            flush_on_shutdown: !self.no_flush_on_shutdown && base.flush_on_shutdown,
            enable_metrics: self.metrics || base.enable_metrics,
            log_format: self.log_format.clone().unwrap_or(base.log_format),
            log_level: self.log_level.clone().unwrap_or(base.log_level),
            ..base
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let base = match &cli.config {
        Some(path) => {
            let path_str = path.to_string_lossy();
            NodeConfig::from_toml_file(&path_str)
                .with_context(|| format!("failed to load config file {}", path.display()))?
        }
        None => NodeConfig::default(),
    };
    let config = cli.apply(base);

    match cli.command {
        Command::Config => {
            print!("{}", config.to_toml_string()?);
        }
        Command::Run => {
            init_logging(config.log_format(), &config.log_level)
                .context("failed to initialise logging")?;
            if let Some(path) = &cli.config {
                tracing::info!("Loaded config from {}", path.display());
            }
            tracing::info!(
                "Starting cohort node (data: {}, RPC: {}, ledger: {}, publish delay: {}s)",
                config.data_dir.display(),
                if config.enable_rpc {
                    config.rpc_port.to_string()
                } else {
                    "off".into()
                },
                config.ledger_endpoint,
                config.publish_delay_secs,
            );

            let mut node = CohortNode::new(config).context("failed to initialise node")?;
            node.run().await?;

            tracing::info!("Shutdown signal received, stopping node");
            node.stop().await?;

            tracing::info!("cohort daemon exited cleanly");
        }
    }

    Ok(())
}
