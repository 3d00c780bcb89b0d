//! Crowdsale daemon: entry point for simulating and inspecting a sale ledger.

mod script;

use anyhow::Context;
use clap::Parser;
use crowdsale_nullables::NullClock;
use crowdsale_service::{init_logging, load_snapshot, LogFormat, SaleConfig, SaleService};
use crowdsale_types::AccountId;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "crowdsale-daemon", about = "Pioneer crowdsale ledger tool")]
struct Cli {
    /// Path to a TOML configuration file. If provided, file settings
    /// are used as the base; CLI flags and env vars override them.
    #[arg(long, env = "CROWDSALE_CONFIG")]
    config: Option<PathBuf>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "CROWDSALE_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format: "human" or "json".
    #[arg(long, env = "CROWDSALE_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    /// Where to persist the ledger snapshot.
    #[arg(long, env = "CROWDSALE_SNAPSHOT_PATH")]
    snapshot_path: Option<PathBuf>,

    /// Subcommand.
    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Replay a scripted sale against a fresh ledger and print a JSON report.
    Simulate {
        /// TOML script of `[[step]]` entries.
        #[arg(long)]
        script: PathBuf,
    },
    /// Print the effective configuration as TOML.
    ShowConfig,
    /// Print the contents of a ledger snapshot as JSON.
    Inspect {
        #[arg(long)]
        snapshot: PathBuf,
        /// Show a single account instead of the sale summary.
        #[arg(long)]
        account: Option<AccountId>,
    },
}

fn load_config(cli: &Cli) -> anyhow::Result<SaleConfig> {
    let mut config = match &cli.config {
        Some(path) => SaleConfig::from_toml_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => SaleConfig::default(),
    };
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    if let Some(format) = cli.log_format {
        config.log_format = format;
    }
    if let Some(path) = &cli.snapshot_path {
        config.snapshot_path = Some(path.clone());
    }
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    // Read-only commands stay quiet unless RUST_LOG asks otherwise.
    match &cli.command {
        Command::Simulate { .. } => {
            init_logging(config.log_format, &config.log_level);
        }
        Command::ShowConfig | Command::Inspect { .. } => crowdsale_utils::init_tracing(),
    }
    if let Some(path) = &cli.config {
        tracing::info!("Loaded config from {}", path.display());
    }

    match cli.command {
        Command::Simulate { script } => {
            let script = script::Script::from_file(&script)?;
            // Always a fresh ledger: only the output side of the snapshot path is used.
            let fresh = SaleConfig {
                snapshot_path: None,
                ..config.clone()
            };
            let clock = Arc::new(NullClock::new(config.opening_time.as_secs()));
            let service = SaleService::open(&fresh, Arc::clone(&clock)).await?;
            tracing::info!(steps = script.steps.len(), "starting simulation");

            let report = script::run(&service, &clock, &script).await;
            let failed = report.steps.iter().filter(|s| !s.ok).count();
            println!("{}", serde_json::to_string_pretty(&report)?);

            if let Some(path) = &config.snapshot_path {
                let snapshot = service.save_snapshot(path).await?;
                tracing::info!(path = %path.display(), hash = %snapshot.hash_hex(), "snapshot saved");
            }
            tracing::info!(
                failed,
                sale_secs = config.opening_time.elapsed_since(service.now()),
                raised = %crowdsale_utils::format_wei(report.summary.total_wei_raised),
                "simulation finished"
            );
        }
        Command::ShowConfig => {
            print!("{}", config.to_toml_string()?);
        }
        Command::Inspect { snapshot, account } => {
            let engine = load_snapshot(&snapshot)
                .await
                .with_context(|| format!("failed to load snapshot {}", snapshot.display()))?;
            let output = match account {
                Some(id) => serde_json::json!({
                    "account": id,
                    "entry": engine.account(&id),
                    "pioneer_bonus": engine.calc_pioneer_bonus(&id)?,
                }),
                None => serde_json::json!({
                    "summary": engine.summary(),
                    "params": engine.params(),
                    "schedule": engine.controls().schedule(),
                }),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}
