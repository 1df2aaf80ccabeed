use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use exactflow_core::config::{
    read_dates_file, ExactflowConfig, ReconcileConfig, SelectionStrategy,
};
use exactflow_core::dates::{normalize, CalendarDay};
use exactflow_core::hibob_client::{HibobClient, HibobConfig};
use exactflow_core::reconcile::{DaySelection, ReconciliationRun};

/// Fill in missing HiBob attendance entries.
#[derive(Parser, Debug)]
#[command(name = "exactflow", version, about)]
struct Cli {
    /// Day to write; repeatable. Switches the run to the explicit strategy.
    #[arg(long = "date", value_name = "DATE")]
    dates: Vec<String>,

    /// File with one date per line (blank lines and `#` comments ignored).
    #[arg(long, value_name = "PATH")]
    dates_file: Option<PathBuf>,

    /// Select days from the timesheet summary instead of a list.
    #[arg(long, conflicts_with_all = ["dates", "dates_file"])]
    missing_only: bool,

    /// Last day eligible for missing-only selection (defaults to today).
    #[arg(long, value_name = "DATE")]
    as_of: Option<String>,

    /// Resolve the session and list the selected days without writing.
    #[arg(long)]
    dry_run: bool,

    /// Maximum number of writes in flight.
    #[arg(long, value_name = "N")]
    concurrency: Option<usize>,

    #[arg(long, value_name = "PATH")]
    report_json: Option<PathBuf>,

    #[arg(long, value_name = "PATH")]
    report_csv: Option<PathBuf>,
}

/// Applies CLI flags on top of the environment settings.
fn reconcile_config(env_config: &mut ExactflowConfig, cli: &Cli) -> Result<ReconcileConfig> {
    let mut explicit = cli.dates.clone();
    if let Some(path) = &cli.dates_file {
        explicit.extend(read_dates_file(path)?);
    }
    if cli.concurrency.is_some() {
        env_config.concurrency_limit = cli.concurrency;
    }

    let config = if !explicit.is_empty() {
        env_config.strategy = SelectionStrategy::Explicit.to_string();
        env_config.to_reconcile_config_with(explicit)
    } else {
        if cli.missing_only {
            env_config.strategy = SelectionStrategy::MissingOnly.to_string();
        }
        env_config.to_reconcile_config()
    };
    config.context("Invalid configuration")
}

fn as_of_day(raw: Option<&str>) -> Result<CalendarDay> {
    match raw {
        Some(raw) => normalize(raw).with_context(|| format!("Invalid --as-of value {:?}", raw)),
        None => Ok(normalize(Local::now().date_naive())?),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let mut env_config = ExactflowConfig::from_env().context("Failed to load configuration")?;
    let config = reconcile_config(&mut env_config, &cli)?;
    let as_of = as_of_day(cli.as_of.as_deref())?;

    let client = HibobClient::new(HibobConfig::from(&env_config))
        .context("Failed to build HiBob client")?;

    let selection = DaySelection::from_config(&config);
    info!(
        "Starting {} run (as of {}, dry_run={})",
        selection.strategy(),
        as_of,
        cli.dry_run
    );
    let run = ReconciliationRun::new(config, Arc::new(client));

    if cli.dry_run {
        let plan = run.plan(&selection, as_of).await?;
        println!("{}", plan.summary_line());
        if let Some(path) = &cli.report_json {
            plan.write_json(path)?;
            info!("Wrote plan to {}", path.display());
        }
        return Ok(());
    }

    let report = run.execute(&selection, as_of).await?;
    for (day, reason) in report.result.failures() {
        warn!("{} failed: {}", day, reason);
    }
    println!("{}", report.summary_line());

    if let Some(path) = &cli.report_json {
        report.write_json(path)?;
        info!("Wrote JSON report to {}", path.display());
    }
    if let Some(path) = &cli.report_csv {
        report.write_csv_file(path)?;
        info!("Wrote CSV report to {}", path.display());
    }
    Ok(())
}
