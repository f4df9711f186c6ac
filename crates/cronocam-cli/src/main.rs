//! cronocam: back up local photos and videos to the remote photo library.
//!
//! Settings come from PHOTOS_* environment variables (see `Config`). Uploads
//! need PHOTOS_ACCESS_TOKEN or a token file at PHOTOS_TOKEN_PATH.

use std::path::PathBuf;

use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand};
use cronocam_cli::discover::{collect_files, read_file_list};
use cronocam_cli::{display_name, format_relative_time, BackupRun, RunError, RunOptions};
use cronocam_core::Config;
use cronocam_db::UploadLedger;
use cronocam_infra::{init_telemetry, RateLimiter};
use cronocam_uploader::{authorized_client, load_access_token, Uploader};
use tokio_util::sync::CancellationToken;

const PENDING_PREVIEW: usize = 5;
const RECENT_FAILURES: u32 = 10;

#[derive(Parser)]
#[command(name = "cronocam", about = "Back up photos and videos without duplicates")]
struct Cli {
    /// Debug-level logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,
    /// Log as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload new files from a directory or a file list
    Upload {
        /// Directory to scan (required unless --file-list is given)
        directory: Option<PathBuf>,
        /// Text file with one path per line
        #[arg(short = 'l', long)]
        file_list: Option<PathBuf>,
        /// Upload even if the content was uploaded before
        #[arg(short, long)]
        force: bool,
        /// Stop after this many uploads (0 for unlimited)
        #[arg(short, long, default_value_t = 0)]
        max_files: usize,
        /// Descend into subdirectories
        #[arg(short, long, default_value_t = true, action = ArgAction::Set)]
        recursive: bool,
    },
    /// Record existing files as already uploaded, without network calls
    Import {
        /// Directory to scan
        directory: PathBuf,
        /// Descend into subdirectories
        #[arg(short, long, default_value_t = true, action = ArgAction::Set)]
        recursive: bool,
    },
    /// Show ledger statistics, pending files and recent failures
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_telemetry(cli.verbose, cli.json_logs)?;

    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate()?;
    config.ensure_directories()?;

    let cancel = CancellationToken::new();
    spawn_interrupt_handler(cancel.clone());

    let ledger = UploadLedger::open(&config.database_path)
        .await
        .with_context(|| format!("Failed to open ledger {}", config.database_path.display()))?;

    let result = match cli.command {
        Commands::Upload {
            directory,
            file_list,
            force,
            max_files,
            recursive,
        } => {
            let paths = match (file_list, directory) {
                (Some(list), _) => read_file_list(&list)?,
                (None, Some(dir)) => collect_files(&dir, recursive)?,
                (None, None) => {
                    anyhow::bail!("A directory is required when --file-list is not given")
                }
            };
            upload(&config, ledger.clone(), paths, RunOptions { force, max_files }, &cancel).await
        }
        Commands::Import {
            directory,
            recursive,
        } => {
            let paths = collect_files(&directory, recursive)?;
            let run = BackupRun::new(ledger.clone(), config.format_policy(), RunOptions::default());
            report(run.import_files(&paths, &cancel).await)
        }
        Commands::Status => status(&config, &ledger).await,
    };

    ledger.close().await;
    result
}

fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::warn!("Interrupt received, stopping after the current step");
                cancel.cancel();
            }
            Err(e) => tracing::error!(error = %e, "Failed to listen for interrupt"),
        }
    });
}

async fn upload(
    config: &Config,
    ledger: UploadLedger,
    paths: Vec<PathBuf>,
    options: RunOptions,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    let token = load_access_token(config)?;
    let client = authorized_client(&token, config.uploader.request_timeout)?;
    let limiter = RateLimiter::new(
        config.uploader.requests_per_second,
        config.uploader.max_burst,
    )?;
    let uploader = Uploader::new(
        client,
        &config.uploader,
        limiter.clone(),
        config.format_policy(),
    );

    tracing::info!(
        candidates = paths.len(),
        force = options.force,
        max_files = options.max_files,
        "Starting upload run"
    );

    let run = BackupRun::new(ledger, config.format_policy(), options);
    let outcome = run.upload_files(&uploader, &paths, cancel).await;
    limiter.shutdown();

    report(outcome)
}

fn report(outcome: Result<cronocam_cli::RunSummary, RunError>) -> anyhow::Result<()> {
    match outcome {
        Ok(summary) => {
            println!("Done: {}", summary);
            Ok(())
        }
        Err(e) => {
            println!("Stopped: {}", e.summary());
            Err(e.into())
        }
    }
}

async fn status(config: &Config, ledger: &UploadLedger) -> anyhow::Result<()> {
    let stats = ledger.stats().await?;
    let pending = ledger.list_unsynced().await?;
    let failures = ledger.recent_failures(RECENT_FAILURES).await?;

    println!("Ledger: {}", config.database_path.display());
    println!();
    println!("Upload Status:");
    println!("-------------");
    println!("Total files recorded: {}", stats.total_records);
    match stats.last_record_time {
        Some(last) => println!(
            "Last upload: {}",
            format_relative_time(last, chrono::Utc::now())
        ),
        None => println!("Last upload: Never"),
    }

    println!();
    println!("Pending files: {}", pending.len());
    if !pending.is_empty() {
        println!("First {} pending files:", PENDING_PREVIEW.min(pending.len()));
        for path in pending.iter().take(PENDING_PREVIEW) {
            println!("- {}", display_name(path));
        }
    }

    if !failures.is_empty() {
        println!();
        println!("Recent errors:");
        for failure in &failures {
            println!(
                "- {} ({}): {}",
                display_name(&failure.file_path),
                format_relative_time(failure.occurred_at, chrono::Utc::now()),
                failure.message
            );
        }
    }

    Ok(())
}
