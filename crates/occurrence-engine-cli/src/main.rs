use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use occurrence_engine::{EngineConfig, InMemoryStore, OccurrenceService, Rule};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "occurrences", version, about = "List calendar occurrences for a window")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Expand an owner's events, tasks and reminders into occurrences
    List(ListArgs),
    /// Validate a recurrence rule and print its canonical form
    Rule {
        /// Rule string, e.g. "FREQ=WEEKLY"
        raw: String,
    },
}

#[derive(clap::Args)]
struct ListArgs {
    /// JSON file of rows keyed by owner id ("-" for stdin)
    #[arg(long)]
    rows: PathBuf,

    /// Owner whose rows are listed
    #[arg(long)]
    owner: String,

    /// Window start (RFC 3339, inclusive)
    #[arg(long)]
    start: String,

    /// Window end (RFC 3339, exclusive)
    #[arg(long)]
    end: String,

    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Viewer timezone (IANA name); overrides the config file
    #[arg(long)]
    timezone: Option<String>,

    /// Show archived tasks
    #[arg(long)]
    include_archived: bool,

    /// Hide completed tasks
    #[arg(long)]
    exclude_completed: bool,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::List(args) => list(args),
        Command::Rule { raw } => {
            let rule: Rule = raw.parse().with_context(|| format!("invalid rule '{raw}'"))?;
            println!("{rule}");
            Ok(())
        }
    }
}

fn list(args: ListArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => EngineConfig::from_json_str(&read_input(path)?)
            .with_context(|| format!("failed to parse config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    if let Some(tz) = args.timezone {
        config.timezone = Some(tz);
    }
    if args.include_archived {
        config.include_archived_tasks = true;
    }
    if args.exclude_completed {
        config.include_completed_tasks = false;
    }

    let store: InMemoryStore = serde_json::from_str(&read_input(&args.rows)?)
        .with_context(|| format!("failed to parse rows {}", args.rows.display()))?;
    tracing::debug!(rows = %args.rows.display(), owner = %args.owner, "loaded rows");
    let service = OccurrenceService::new(store, config.resolve()?);
    let occurrences = service.list_occurrences(&args.owner, &args.start, &args.end)?;

    let json = if args.pretty {
        serde_json::to_string_pretty(&occurrences)?
    } else {
        serde_json::to_string(&occurrences)?
    };
    println!("{json}");
    Ok(())
}

fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read stdin")?;
        return Ok(buf);
    }
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}
