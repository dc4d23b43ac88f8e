//! sanka daemon: entry point for running the points service.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use sanka_node::{init_logging, PointsService, ServiceConfig, ShutdownController};
use sanka_rpc::RpcServer;

/// How often idle per-member and per-request locks are reclaimed.
const LOCK_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Parser)]
#[command(name = "sanka-daemon", about = "Participation and points ledger service")]
struct Cli {
    /// Path to a TOML configuration file. If provided, file settings
    /// are used as the base; CLI flags and env vars override them.
    #[arg(long, env = "SANKA_CONFIG")]
    config: Option<PathBuf>,

    /// Data directory for the JSON store and evidence uploads.
    #[arg(long, env = "SANKA_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Address the HTTP API binds to.
    #[arg(long, env = "SANKA_RPC_HOST")]
    rpc_host: Option<String>,

    #[arg(long, env = "SANKA_RPC_PORT")]
    rpc_port: Option<u16>,

    /// Log format: "human" or "json".
    #[arg(long, env = "SANKA_LOG_FORMAT")]
    log_format: Option<String>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "SANKA_LOG_LEVEL")]
    log_level: Option<String>,

    /// Points granted at registration.
    #[arg(long, env = "SANKA_STARTING_BALANCE")]
    starting_balance: Option<u64>,

    /// Points credited for an approved attendance verification.
    #[arg(long, env = "SANKA_ATTENDANCE_AWARD")]
    attendance_award: Option<u64>,

    /// Reviewer webhook; when unset, requests are logged for manual review.
    #[arg(long, env = "SANKA_DECISION_WEBHOOK_URL")]
    decision_webhook_url: Option<String>,

    /// Maximum number of service operations in flight.
    #[arg(long, env = "SANKA_MAX_CONCURRENT")]
    max_concurrent: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Run the service and its HTTP API.
    Run,
    /// Open the store, audit every account, and exit non-zero on a mismatch.
    Check,
    /// Print the effective configuration as TOML.
    Config,
}

impl Cli {
    /// File settings (or defaults) with flags and env vars layered on top.
    fn service_config(&self) -> anyhow::Result<ServiceConfig> {
        let mut config = match &self.config {
            Some(path) => ServiceConfig::from_toml_file(path)
                .with_context(|| format!("loading config from {}", path.display()))?,
            None => ServiceConfig::default(),
        };

        if let Some(v) = &self.data_dir {
            config.data_dir = v.clone();
        }
        if let Some(v) = &self.rpc_host {
            config.rpc_host = v.clone();
        }
        if let Some(v) = self.rpc_port {
            config.rpc_port = v;
        }
        if let Some(v) = &self.log_format {
            config.log_format = v.clone();
        }
        if let Some(v) = &self.log_level {
            config.log_level = v.clone();
        }
        if let Some(v) = self.starting_balance {
            config.starting_balance = v;
        }
        if let Some(v) = self.attendance_award {
            config.attendance_award = v;
        }
        if let Some(v) = &self.decision_webhook_url {
            config.decision_webhook_url = Some(v.clone());
        }
        if let Some(v) = self.max_concurrent {
            config.max_concurrent = v;
        }

        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.service_config()?;
    init_logging(config.log_format()?, &config.log_level)?;

    match cli.command {
        Command::Run => run(config).await,
        Command::Check => check(&config).await,
        Command::Config => {
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
    }
}

async fn run(config: ServiceConfig) -> anyhow::Result<()> {
    tracing::info!(
        data_dir = %config.data_dir.display(),
        rpc = %config.rpc_addr(),
        "starting sanka service"
    );

    let service = Arc::new(PointsService::from_config(&config).context("opening service")?);
    tracing::info!(decision_service = service.decision_service(), "decision service ready");

    let shutdown = Arc::new(ShutdownController::new());

    let sweeper = {
        let service = service.clone();
        let mut stop = shutdown.subscribe();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(LOCK_SWEEP_INTERVAL);
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let reclaimed = service.reclaim_idle_locks().await;
                        if reclaimed > 0 {
                            tracing::debug!(reclaimed, "reclaimed idle locks");
                        }
                    }
                    _ = stop.recv() => break,
                }
            }
        })
    };

    let server = RpcServer::bind(&config.rpc_addr(), service.clone()).await?;
    let server = tokio::spawn(server.serve(shutdown.signalled()));

    shutdown.wait_for_signal().await;

    server.await.context("HTTP server task")??;
    sweeper.await.context("lock sweeper task")?;
    tracing::info!("sanka daemon exited cleanly");
    Ok(())
}

async fn check(config: &ServiceConfig) -> anyhow::Result<()> {
    let service = PointsService::from_config(config).context("opening service")?;
    let reports = service.audit().await?;
    let broken: Vec<_> = reports.iter().filter(|r| !r.is_consistent()).collect();
    for report in &broken {
        tracing::error!(
            member = %report.member,
            cached = %report.cached,
            derived = %report.derived,
            "balance does not match ledger"
        );
    }
    println!("{} accounts audited, {} inconsistent", reports.len(), broken.len());
    if broken.is_empty() {
        Ok(())
    } else {
        anyhow::bail!("{} inconsistent accounts", broken.len())
    }
}
