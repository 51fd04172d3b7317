mod logging;
mod settings;

use std::path::PathBuf;
use std::time::Instant;

use clap::{Args, Parser, Subcommand};
use docseed_core::{Error as CoreError, redact_uri};
use docseed_sync::{PullOptions, PushOptions, pull_to_stream, push_file};
use thiserror::Error;
use tracing::Instrument;
use uuid::Uuid;

use logging::init_logging;
use settings::{Settings, load_settings};

#[derive(Debug, Error)]
pub enum CliError {
    #[error("core error: {0}")]
    Core(#[from] CoreError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid settings file: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("logging error: {0}")]
    Logging(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

#[derive(Parser, Debug)]
#[command(name = "docseed", version, about = "Seed and export document stores")]
struct Cli {
    /// Settings file (defaults to ./docseed.toml when present).
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve a seed file and insert its collections.
    Push(PushArgs),
    /// Export collections as one JSON object.
    Pull(PullArgs),
    /// Resolve a seed file without touching a store.
    Resolve(ResolveArgs),
}

#[derive(Args, Debug)]
struct PushArgs {
    /// Seed file (YAML or JSON).
    file: PathBuf,
    /// Store connection URI.
    #[arg(long, env = "DOCSEED_URI")]
    uri: Option<String>,
    /// Drop the target database before inserting.
    #[arg(long, default_value_t = false)]
    drop_database: bool,
}

#[derive(Args, Debug)]
struct PullArgs {
    /// Store connection URI.
    #[arg(long, env = "DOCSEED_URI")]
    uri: Option<String>,
    /// Export only this collection.
    #[arg(long, value_name = "NAME")]
    collection: Option<String>,
    /// Filter document, as JSON.
    #[arg(long, value_name = "JSON")]
    query: Option<String>,
    /// Output path (stdout when absent).
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ResolveArgs {
    /// Seed file (YAML or JSON).
    file: PathBuf,
    /// Output path (stdout when absent).
    #[arg(long)]
    out: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();
    let settings = load_settings(cli.config.as_deref())?;
    init_logging(&settings.logging)?;

    let run_id = Uuid::new_v4().to_string();
    let span = tracing::info_span!("run", run_id = %run_id);
    let timer = Instant::now();

    let result = match cli.command {
        Command::Push(args) => run_push(args, &settings).instrument(span.clone()).await,
        Command::Pull(args) => run_pull(args, &settings).instrument(span.clone()).await,
        Command::Resolve(args) => span.in_scope(|| run_resolve(args)),
    };

    let duration_ms = timer.elapsed().as_millis() as u64;
    span.in_scope(|| match &result {
        Ok(()) => tracing::info!(event = "run_finished", status = "success", duration_ms),
        Err(err) => tracing::error!(event = "run_finished", status = "failed", duration_ms, error = %err),
    });
    result
}

async fn run_push(args: PushArgs, settings: &Settings) -> Result<(), CliError> {
    let uri = settings.store_uri(args.uri)?;
    let target = redact_uri(&uri);
    tracing::info!(event = "run_started", command = "push", file = %args.file.display(), uri = %target.redacted);

    let options = PushOptions {
        drop_database: args.drop_database,
    };
    let report = push_file(&uri, &args.file, &options).await?;

    if report.dropped {
        println!("dropped {}", target.redacted);
    }
    for collection in &report.collections {
        println!("{}: {} documents", collection.collection, collection.documents);
    }
    println!(
        "pushed {} documents into {}",
        report.documents_total(),
        target.redacted
    );
    Ok(())
}

async fn run_pull(args: PullArgs, settings: &Settings) -> Result<(), CliError> {
    let uri = settings.store_uri(args.uri)?;
    tracing::info!(event = "run_started", command = "pull", uri = %redact_uri(&uri).redacted);

    let query = match args.query.as_deref() {
        Some(text) => {
            let query: serde_json::Value = serde_json::from_str(text)?;
            if !query.is_object() {
                return Err(CliError::InvalidConfig(
                    "--query must be a JSON object".to_string(),
                ));
            }
            Some(query)
        }
        None => None,
    };
    let options = PullOptions {
        collection: args.collection,
        query,
    };

    let bytes = match &args.out {
        Some(path) => {
            let mut file = tokio::fs::File::create(path).await?;
            pull_to_stream(&uri, &mut file, &options).await?
        }
        None => {
            let mut stdout = tokio::io::stdout();
            pull_to_stream(&uri, &mut stdout, &options).await?
        }
    };

    if let Some(path) = &args.out {
        tracing::info!(event = "export_written", path = %path.display(), bytes);
    }
    Ok(())
}

fn run_resolve(args: ResolveArgs) -> Result<(), CliError> {
    tracing::info!(event = "run_started", command = "resolve", file = %args.file.display());

    let table = docseed_resolve::prepare_file(&args.file)?;
    let encoded = serde_json::to_string_pretty(&table)?;
    match &args.out {
        Some(path) => {
            std::fs::write(path, format!("{encoded}\n"))?;
            tracing::info!(event = "resolution_written", path = %path.display(), collections = table.len());
        }
        None => println!("{encoded}"),
    }
    Ok(())
}
