use anyhow::Context;
use artsync_engine::logging::init_logging;
use artsync_engine::{
    builtin_driver, EngineConfig, MultitenantReconciler, PassReport, TenantConfig, TenantReports,
};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

const DEFAULT_CONFIG: &str = "artsync.toml";

#[derive(Debug, Parser)]
#[command(name = "artsync", version, about = "Declarative artefact synchronization")]
struct Cli {
    /// Configuration file; `artsync.toml` in the working directory if present
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run one reconciliation pass for every tenant
    Once {
        /// Print the pass reports as JSON
        #[arg(long)]
        json: bool,
    },
    /// Reconcile periodically until interrupted, then stop every artefact
    Run {
        /// Override the configured interval
        #[arg(long)]
        interval_secs: Option<u64>,
    },
    /// Parse a registry root without applying anything
    Check {
        /// Registry root to check
        root: PathBuf,
        #[arg(long)]
        json: bool,
    },
}

fn load_config(path: Option<&Path>) -> anyhow::Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("loading configuration {}", path.display())),
        None if Path::new(DEFAULT_CONFIG).is_file() => {
            EngineConfig::load(DEFAULT_CONFIG).context("loading artsync.toml")
        }
        None => Ok(EngineConfig::default()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_deref())?;
    init_logging(&config.log_filter, config.log_format);

    match cli.command {
        Command::Once { json } => {
            let reconciler = MultitenantReconciler::from_config(&config);
            let reports = tokio::task::spawn_blocking(move || reconciler.reconcile_all())
                .await
                .context("reconciliation task panicked")?;
            print_reports(&reports, json)?;
            Ok(exit_code(&reports))
        }
        Command::Run { interval_secs } => {
            if let Some(secs) = interval_secs {
                config = config.with_interval_secs(secs);
                config.validate()?;
            }
            run(Arc::new(MultitenantReconciler::from_config(&config)), config.interval()).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Check { root, json } => {
            let driver = builtin_driver(&TenantConfig::new("check", root));
            let report = tokio::task::spawn_blocking(move || driver.check())
                .await
                .context("check task panicked")??;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{report}");
            }
            Ok(if report.is_clean() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
    }
}

async fn run(reconciler: Arc<MultitenantReconciler>, interval: Duration) -> anyhow::Result<()> {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    info!(interval_secs = interval.as_secs(), tenants = reconciler.len(), "scheduler started");

    loop {
        tokio::select! {
            biased;
            signal = &mut shutdown => {
                if let Err(err) = signal {
                    warn!(error = %err, "cannot listen for Ctrl-C, shutting down");
                }
                info!("shutdown requested");
                break;
            }
            _ = ticker.tick() => {
                let passes = Arc::clone(&reconciler);
                let reports = tokio::task::spawn_blocking(move || passes.reconcile_all())
                    .await
                    .context("reconciliation task panicked")?;
                print_reports(&reports, false)?;
            }
        }
    }

    let stopping = Arc::clone(&reconciler);
    let reports = tokio::task::spawn_blocking(move || stopping.stop_all())
        .await
        .context("stop task panicked")?;
    print_reports(&reports, false)?;
    Ok(())
}

fn print_reports(reports: &TenantReports, json: bool) -> anyhow::Result<()> {
    if json {
        let value: serde_json::Map<String, serde_json::Value> = reports
            .iter()
            .map(|(tenant, result)| -> Result<_, serde_json::Error> {
                let value = match result {
                    Ok(report) => serde_json::to_value(report)?,
                    Err(err) => serde_json::json!({ "error": err.to_string() }),
                };
                Ok((tenant.clone(), value))
            })
            .collect::<Result<_, _>>()?;
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        for (tenant, result) in reports {
            match result {
                Ok(report) => println!("{report}"),
                Err(err) => println!("tenant {tenant}: {err}"),
            }
        }
    }
    Ok(())
}

fn exit_code(reports: &TenantReports) -> ExitCode {
    let clean = reports
        .values()
        .all(|result| result.as_ref().is_ok_and(PassReport::is_clean));
    if clean {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
