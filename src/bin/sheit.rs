//! sheit CLI: run the assignment tracker against a workbook.

use clap::{Parser, Subcommand};
use sheit_rs::config::{Config, RuntimeSettings};
use sheit_rs::model::{Row, Status};
use sheit_rs::source::DataSource;
use sheit_rs::source::file::JsonFileSource;
use sheit_rs::telemetry::{TelemetryConfig, init_telemetry};
use sheit_rs::{Reconciled, Tracker};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "sheit", about = "Log who started, completed, or rejected each assigned task")]
struct Cli {
    /// TOML config file (falls back to SHEIT_* environment variables)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Workbook JSON file (defaults to `<sheetId>.json`)
    #[arg(long, global = true)]
    workbook: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Poll the workbook and print every event as a JSON line
    Watch,
    /// Mark an assignment as completed
    Complete {
        /// Assignee email
        email: String,
        /// Task description
        description: String,
    },
    /// Mark an assignment as rejected
    Reject {
        /// Assignee email
        email: String,
        /// Task description
        description: String,
    },
    /// Create an empty workbook with a primary sheet
    Init {
        /// Workbook title
        #[arg(long, default_value = "Assignments")]
        title: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    let workbook = cli
        .workbook
        .clone()
        .unwrap_or_else(|| PathBuf::from(format!("{}.json", config.sheet_id)));

    match cli.command {
        Command::Watch => cmd_watch(config, &workbook).await,
        Command::Complete { email, description } => {
            cmd_transition(config, &workbook, Status::Completed, &email, &description).await
        }
        Command::Reject { email, description } => {
            cmd_transition(config, &workbook, Status::Rejected, &email, &description).await
        }
        Command::Init { title } => cmd_init(&config, &workbook, &title).await,
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    Ok(match path {
        Some(path) => Config::load(path)?,
        None => Config::from_env()?,
    })
}

async fn open_tracker(config: Config, workbook: &Path) -> anyhow::Result<Tracker> {
    let source: Arc<dyn DataSource> = Arc::new(JsonFileSource::open(workbook).await?);
    Ok(Tracker::new(config, source))
}

async fn cmd_watch(config: Config, workbook: &Path) -> anyhow::Result<()> {
    let settings = RuntimeSettings::from_env();
    let _guard = init_telemetry(TelemetryConfig::for_sheet(&settings, &config.sheet_id))?;

    let tracker = open_tracker(config, workbook).await?;

    let mut events = tracker.subscribe();
    tokio::spawn(async move {
        use tokio::sync::broadcast::error::RecvError;
        loop {
            match events.recv().await {
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(line) => println!("{line}"),
                    Err(e) => eprintln!("could not encode event {}: {e}", event.seq),
                },
                Err(RecvError::Lagged(n)) => eprintln!("missed {n} events"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let ctrl = tracker.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        ctrl.shutdown();
    });

    tracker.run().await;
    Ok(())
}

async fn cmd_transition(
    config: Config,
    workbook: &Path,
    status: Status,
    email: &str,
    description: &str,
) -> anyhow::Result<()> {
    let tracker = open_tracker(config, workbook).await?;
    tracker.provision_log_sheet().await;

    let outcome = match status {
        Status::Completed => tracker.complete(email, description).await?,
        Status::Rejected => tracker.reject(email, description).await?,
        Status::Started => anyhow::bail!("`started` is set by the poller only"),
    };

    match outcome {
        Reconciled::Created(row) => println!("Created: {}", describe(&row)),
        Reconciled::Updated(row) | Reconciled::Unchanged(row) => {
            println!("Updated: {}", describe(&row))
        }
        Reconciled::Skipped => anyhow::bail!("log worksheet could not be read; nothing written"),
    }
    Ok(())
}

async fn cmd_init(config: &Config, workbook: &Path, title: &str) -> anyhow::Result<()> {
    if tokio::fs::try_exists(workbook).await? {
        anyhow::bail!("{} already exists", workbook.display());
    }
    let headers = vec![
        config.assigned_field.clone(),
        config.description_field.clone(),
    ];
    let source = JsonFileSource::create(workbook, title, headers).await?;
    println!("Created workbook {}", source.path().display());
    Ok(())
}

fn describe(row: &Row) -> String {
    row.iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("  ")
}
