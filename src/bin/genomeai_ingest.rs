use std::fs;
use std::process::ExitCode;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use genomeai_ingest::app::App;
use genomeai_ingest::config::ConfigLoader;
use genomeai_ingest::domain::{ProcessingStatus, UserId};
use genomeai_ingest::error::IngestError;
use genomeai_ingest::notify::NopNotifier;
use genomeai_ingest::output;

#[derive(Parser)]
#[command(name = "genomeai-ingest")]
#[command(about = "Validating ingestion pipeline for genomic data files")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Validate and store one or more files")]
    Ingest(IngestArgs),
    #[command(about = "Show the processing record for an upload")]
    Status(StatusArgs),
    #[command(about = "List a user's uploads, newest first")]
    History(HistoryArgs),
    #[command(about = "List supported formats and their extensions")]
    Formats,
    #[command(about = "Advance an upload's processing status")]
    Transition(TransitionArgs),
}

#[derive(Args)]
struct IngestArgs {
    /// Files to ingest, processed concurrently up to the worker limit.
    #[arg(required = true)]
    files: Vec<String>,

    #[arg(long)]
    user: String,

    /// Declared MIME type, advisory only.
    #[arg(long, default_value = "application/octet-stream")]
    mime: String,
}

#[derive(Args)]
struct StatusArgs {
    upload_id: String,
}

#[derive(Args)]
struct HistoryArgs {
    #[arg(long)]
    user: String,
}

#[derive(Args)]
struct TransitionArgs {
    upload_id: String,

    #[arg(value_enum)]
    status: ProcessingStatus,

    #[arg(long)]
    note: Option<String>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<IngestError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &IngestError) -> u8 {
    if !error.caller_recoverable() {
        return 1;
    }
    match error.error_code() {
        "STORAGE_ERROR" => 3,
        _ => 2,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = ConfigLoader::resolve(cli.config.as_deref())?;
    let app = App::new(config, NopNotifier);

    match cli.command {
        Commands::Ingest(args) => run_ingest(args, &app),
        Commands::Status(args) => {
            let record = app.get_status(&args.upload_id).map_err(emit_failure)?;
            output::emit(&output::success_record(&record));
            Ok(())
        }
        Commands::History(args) => {
            let user: UserId = args.user.parse().into_diagnostic()?;
            let records = app.list_history(&user).map_err(emit_failure)?;
            output::emit(&output::success_with("uploads", &records));
            Ok(())
        }
        Commands::Formats => {
            output::emit(&output::success_with("formats", &app.supported_formats()));
            Ok(())
        }
        Commands::Transition(args) => {
            let record = app
                .transition(&args.upload_id, args.status, args.note)
                .map_err(emit_failure)?;
            output::emit(&output::success_record(&record));
            Ok(())
        }
    }
}

fn emit_failure(err: IngestError) -> miette::Report {
    output::emit(&output::failure(&err));
    err.into()
}

/// Ingest the batch with up to `worker_limit` threads, emitting one envelope
/// per input file in input order.
fn run_ingest(args: IngestArgs, app: &App<NopNotifier>) -> miette::Result<()> {
    let user: UserId = args.user.parse().into_diagnostic()?;
    let workers = app.config().worker_limit.min(args.files.len()).max(1);

    let next = AtomicUsize::new(0);
    let results: Mutex<Vec<(usize, Result<serde_json::Value, IngestError>)>> =
        Mutex::new(Vec::with_capacity(args.files.len()));

    std::thread::scope(|scope| {
        for _ in 0..workers {
            scope.spawn(|| loop {
                let index = next.fetch_add(1, Ordering::Relaxed);
                let Some(path) = args.files.get(index) else {
                    break;
                };
                let result = ingest_one(app, &user, path, &args.mime);
                let mut results = results.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                results.push((index, result));
            });
        }
    });

    let mut results = results.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner());
    results.sort_by_key(|(index, _)| *index);

    let mut first_error = None;
    for (_, result) in results {
        match result {
            Ok(envelope) => output::emit(&envelope),
            Err(err) => {
                output::emit(&output::failure(&err));
                if first_error.is_none() {
                    first_error = Some(err);
                }
            }
        }
    }
    match first_error {
        Some(err) => Err(err.into()),
        None => Ok(()),
    }
}

fn ingest_one(
    app: &App<NopNotifier>,
    user: &UserId,
    path: &str,
    mime: &str,
) -> Result<serde_json::Value, IngestError> {
    let metadata = fs::metadata(path).map_err(|_| IngestError::MissingFile)?;
    if !metadata.is_file() {
        return Err(IngestError::MissingFile);
    }
    let mut file =
        fs::File::open(path).map_err(|err| IngestError::Filesystem(err.to_string()))?;
    let record = app.ingest(user, basename(path)?, mime, metadata.len(), &mut file)?;
    Ok(output::success_record(&record))
}

/// The declared filename is the final path component, never the full path the
/// operator typed.
fn basename(path: &str) -> Result<&str, IngestError> {
    std::path::Path::new(path)
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or(IngestError::EmptyFilename)
}
