// BAA SCANNER - extract colour-coded BAA forms and check them against the reference store
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use baa_scanner::config::ScanConfig;
use baa_scanner::logging;
use baa_scanner::pdf_extraction::{PageProcessor, PopplerDocument, PopplerLoader};
use baa_scanner::storage::{ReferenceStore, SqliteBackend};
use baa_scanner::Scanner;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Config file (TOML). Falls back to $BAA_SCANNER_CONFIG, then the user config dir.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// More log output (-v debug, -vv trace). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate documents against the reference store and annotate it
    Scan {
        /// SQLite database holding the reference table
        #[arg(short, long)]
        store: PathBuf,

        /// Documents processed at once
        #[arg(short, long)]
        jobs: Option<usize>,

        #[arg(required = true)]
        pdfs: Vec<PathBuf>,
    },
    /// Print the extracted tables and attestation text of one document
    Extract { pdf: PathBuf },
    /// Print the header and data regions found on page 1
    Detect { pdf: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(args.verbose);

    let config = ScanConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    match args.command {
        Command::Scan { store, jobs, pdfs } => run_scan(&config, &store, jobs, pdfs).await,
        Command::Extract { pdf } => {
            let processed = PageProcessor::new(&config)
                .process(&open_document(&config, &pdf)?)
                .with_context(|| format!("Failed to extract {}", pdf.display()))?;
            print_json(&processed)
        }
        Command::Detect { pdf } => {
            let regions = PageProcessor::new(&config)
                .detect(&open_document(&config, &pdf)?)
                .with_context(|| format!("Failed to detect regions in {}", pdf.display()))?;
            print_json(&regions)
        }
    }
}

async fn run_scan(
    config: &ScanConfig,
    store_path: &Path,
    jobs: Option<usize>,
    pdfs: Vec<PathBuf>,
) -> Result<()> {
    let backend = SqliteBackend::new(Some(store_path), &config.reference.table)
        .with_context(|| format!("Failed to open reference store {}", store_path.display()))?;
    let store = ReferenceStore::open(Box::new(backend)).context("Failed to load reference table")?;

    let loader = Arc::new(PopplerLoader::new(config.poppler.clone()));
    let mut scanner = Scanner::new(config, store, loader);
    if let Some(jobs) = jobs {
        scanner = scanner.with_jobs(jobs);
    }

    let cancel = scanner.cancel_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, finishing in-flight annotations");
            cancel.cancel();
        }
    });

    let outcomes = scanner.scan(pdfs).await;
    print_json(&outcomes)
}

fn open_document(config: &ScanConfig, pdf: &Path) -> Result<PopplerDocument> {
    PopplerDocument::open(pdf, &config.poppler)
        .with_context(|| format!("Failed to open {}", pdf.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", json);
    Ok(())
}
