//! filedex - index every file on your local drives and search them by path.
//!
//! Usage:
//!   filedex volumes              List the volumes that would be indexed
//!   filedex index                Rebuild the index (asks before replacing)
//!   filedex search QUERY         Show the first page of matches
//!   filedex status               Show index statistics
//!   filedex --help               Show help

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{bail, Context, Result};
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use filedex_core::{FileRecord, IndexConfig};
use filedex_index::{IndexError, Indexer, RebuildOutcome};
use filedex_scan::VolumeScanner;

#[derive(Parser)]
#[command(
    name = "filedex",
    version,
    about = "Index local drives and search files by path",
    long_about = "filedex walks every accessible volume, stores each file it finds \
                  in a local index, and answers substring searches over file paths.\n\n\
                  Build the index with `filedex index`, then query it with \
                  `filedex search TERM`."
)]
struct Cli {
    /// Configuration file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Index database location
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List accessible volumes
    Volumes,

    /// Rebuild the index from a fresh scan
    Index {
        /// Index only these roots instead of every volume
        #[arg(short, long = "root")]
        roots: Vec<PathBuf>,

        /// Replace an existing index without asking
        #[arg(short, long)]
        yes: bool,
    },

    /// Search indexed paths
    Search {
        /// Search term; every whitespace separated word must appear in the path
        query: String,

        /// Page to show (starting at 1)
        #[arg(short, long, default_value = "1")]
        page: usize,

        /// Stream every page instead of one
        #[arg(short, long)]
        all: bool,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Show index statistics
    Status,
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(db) = cli.db {
        config.database_path = db;
    }
    info!("Using index at {}", config.database_path.display());

    match cli.command {
        Command::Volumes => run_volumes(config),
        Command::Index { roots, yes } => {
            if !roots.is_empty() {
                config.roots = roots;
            }
            run_index(config, yes).await
        }
        Command::Search {
            query,
            page,
            all,
            format,
        } => run_search(config, &query, page, all, format).await,
        Command::Status => run_status(config),
    }
}

fn init_logging(verbose: u8) {
    let default_filter = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_env("FILEDEX_LOG").unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr).with_target(false))
        .with(filter)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<IndexConfig> {
    match path {
        Some(path) => IndexConfig::load(path).wrap_err("Failed to load configuration"),
        None => IndexConfig::load_or_default(&IndexConfig::default_config_path())
            .wrap_err("Failed to load configuration"),
    }
}

/// Print the roots a rebuild would scan.
fn run_volumes(config: IndexConfig) -> Result<()> {
    let roots = VolumeScanner::new(config).resolve_roots();
    if roots.is_empty() {
        println!("No accessible volumes found.");
        return Ok(());
    }
    for root in roots {
        println!("{}", root.display());
    }
    Ok(())
}

/// Rebuild the index, asking first when it already holds records.
async fn run_index(config: IndexConfig, yes: bool) -> Result<()> {
    let indexer = Arc::new(Indexer::open(config).context("Failed to open index")?);

    if !yes && !indexer.is_index_empty()? && !confirm("Reindexing will erase the existing index. Continue?")? {
        println!("Aborted.");
        return Ok(());
    }

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\nCancelling...");
                cancel.cancel();
            }
        });
    }

    let mut progress_rx = indexer.subscribe();
    let progress = tokio::spawn(async move {
        loop {
            match progress_rx.recv().await {
                Ok(progress) => eprint!(
                    "\rScanned {} files in {} directories ({:.0} files/s)   ",
                    progress.files_found,
                    progress.dirs_scanned,
                    progress.files_per_second()
                ),
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    });

    eprintln!("Scanning...");
    let worker = Arc::clone(&indexer);
    let token = cancel.clone();
    let result = tokio::task::spawn_blocking(move || worker.rebuild_index_from_scan(&token))
        .await
        .context("Rebuild task failed")?;
    progress.abort();
    eprintln!();

    let report = match result {
        Ok(report) => report,
        Err(IndexError::Cancelled) => {
            println!("Indexing cancelled; the previous index is unchanged.");
            return Ok(());
        }
        Err(e) => return Err(e).context("Rebuild failed"),
    };

    match report.outcome {
        RebuildOutcome::NothingToScan => {
            println!("No accessible volumes found; the index was not changed.");
        }
        RebuildOutcome::Rebuilt { records, generation } => {
            println!("{}", "─".repeat(60));
            println!(" Indexed {} files from {} root(s)", records, report.roots.len());
            println!(" {} directories, {} skipped", report.dirs_scanned, report.warnings.len());
            println!(
                " Scan {:.2}s, total {:.2}s (generation {})",
                report.scan_duration.as_secs_f64(),
                report.duration.as_secs_f64(),
                generation
            );
            println!("{}", "─".repeat(60));
        }
    }

    Ok(())
}

/// Search and print one page, or stream all pages.
async fn run_search(config: IndexConfig, query: &str, page: usize, all: bool, format: OutputFormat) -> Result<()> {
    let indexer = Indexer::open(config).context("Failed to open index")?;

    if indexer.is_index_empty()? {
        eprintln!("The index is empty. Run `filedex index` first.");
        return Ok(());
    }

    if all {
        let mut rx = indexer.search_pages(query)?;
        let mut total = 0;
        while let Some(batch) = rx.recv().await {
            total += batch.len();
            print_records(&batch, format)?;
        }
        if let OutputFormat::Text = format {
            eprintln!("{total} result(s)");
        }
        return Ok(());
    }

    if page == 0 {
        bail!("Pages start at 1");
    }

    let pager = indexer.search(query)?;
    let records = pager.page(page - 1);
    print_records(records, format)?;

    if let OutputFormat::Text = format {
        if pager.is_empty() {
            eprintln!("No results.");
        } else {
            eprintln!(
                "Page {} of {} ({} result(s))",
                page,
                pager.page_count(),
                pager.total()
            );
        }
    }
    Ok(())
}

/// Print index statistics.
fn run_status(config: IndexConfig) -> Result<()> {
    let indexer = Indexer::open(config).context("Failed to open index")?;
    let store = indexer.store();

    println!("Database:   {}", indexer.config().database_path.display());
    println!("Records:    {}", store.len()?);
    println!("Generation: {}", store.generation()?);
    Ok(())
}

fn print_records(records: &[FileRecord], format: OutputFormat) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for record in records {
        match format {
            OutputFormat::Text => writeln!(
                out,
                "{:>10}  {}  {}",
                format_size(record.size),
                record
                    .modified_at
                    .with_timezone(&chrono::Local)
                    .format("%Y-%m-%d %H:%M"),
                record.path.display()
            )?,
            OutputFormat::Json => writeln!(out, "{}", serde_json::to_string(record)?)?,
        }
    }
    Ok(())
}

fn confirm(prompt: &str) -> Result<bool> {
    eprint!("{prompt} [y/N] ");
    io::stderr().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes" | "Yes"))
}

/// Format a size in human-readable form.
fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}
