mod launcher;

use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use carspec_client::ChromiumSessionFactory;
use carspec_core::batch::read_batch_file;
use carspec_core::orchestrator::{OrchestratorConfig, WorkerOrchestrator};
use carspec_core::{
    BatchSummary, BatchWorker, BrowserOptions, ScrapeService, ScrapeTarget, ScrapeTimings,
    SiteConfig, TracingWorkerReporter, WorkerConfig,
};
use carspec_store::{FileMerger, FileStore};

use crate::launcher::ProcessLauncher;

#[derive(Parser)]
#[command(name = "carspec", version, about = "Vehicle specification scraper")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct BrowserArgs {
    /// Show the browser window instead of running headless
    #[arg(long, default_value_t = false)]
    headed: bool,

    /// Chrome/Chromium binary to launch
    #[arg(long, env = "CHROME_BIN")]
    chrome_bin: Option<String>,

    /// Also scrape consumer and expert reviews
    #[arg(long, default_value_t = false)]
    with_reviews: bool,

    /// Do not save page sources of blocked or empty pages
    #[arg(long, default_value_t = false)]
    no_debug_html: bool,
}

impl BrowserArgs {
    fn options(&self) -> BrowserOptions {
        BrowserOptions::default()
            .with_headless(!self.headed)
            .with_chrome_bin(self.chrome_bin.clone())
    }

    fn worker_config(&self, worker_id: &str) -> WorkerConfig {
        WorkerConfig::default()
            .with_worker_id(worker_id)
            .with_reviews(self.with_reviews)
            .with_debug_html(!self.no_debug_html)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape a single make/model/year
    Scrape {
        #[arg(long)]
        make: String,

        #[arg(long)]
        model: String,

        #[arg(long)]
        year: u16,

        /// Output root (raw/, csv/, processed/)
        #[arg(short, long, env = "CARSPEC_DATA_DIR", default_value = "data")]
        output_dir: PathBuf,

        #[command(flatten)]
        browser: BrowserArgs,
    },

    /// Scrape every target of a batch file sequentially with one browser
    Batch {
        /// JSON array of {make, model, year}
        #[arg(short, long)]
        batch_file: PathBuf,

        #[arg(short, long, env = "CARSPEC_DATA_DIR", default_value = "data")]
        output_dir: PathBuf,

        #[arg(long, default_value = "worker-0")]
        worker_id: String,

        #[command(flatten)]
        browser: BrowserArgs,
    },

    /// Split a batch file over several worker processes, then merge their output
    Parallel {
        #[arg(short, long)]
        batch_file: PathBuf,

        #[arg(short, long, default_value_t = 4)]
        workers: usize,

        #[arg(short, long, env = "CARSPEC_DATA_DIR", default_value = "data")]
        data_dir: PathBuf,

        /// Seconds between worker launches
        #[arg(long, default_value_t = 5)]
        stagger: u64,

        #[command(flatten)]
        browser: BrowserArgs,
    },

    /// Merge existing worker outputs without scraping
    Merge {
        #[arg(short, long, env = "CARSPEC_DATA_DIR", default_value = "data")]
        data_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("carspec=info".parse()?))
        .with_target(false)
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let ok = match cli.command {
        Commands::Scrape {
            make,
            model,
            year,
            output_dir,
            browser,
        } => {
            let target = ScrapeTarget::new(make, model, year);
            let summary = run_batch(&[target], &output_dir, "worker-0", &browser).await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            summary.failed_count() == 0
        }
        Commands::Batch {
            batch_file,
            output_dir,
            worker_id,
            browser,
        } => {
            let targets = read_batch_file(&batch_file)
                .with_context(|| format!("Failed to read batch file: {}", batch_file.display()))?;
            let summary = run_batch(&targets, &output_dir, &worker_id, &browser).await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            // Target failures are listed in the summary; only an aborted batch fails the process.
            true
        }
        Commands::Parallel {
            batch_file,
            workers,
            data_dir,
            stagger,
            browser,
        } => cmd_parallel(&batch_file, workers, &data_dir, stagger, &browser).await?,
        Commands::Merge { data_dir } => {
            let orchestrator = WorkerOrchestrator::new(
                ProcessLauncher::current()?,
                FileMerger::new(),
                OrchestratorConfig::default().with_data_dir(&data_dir),
            );
            let report = orchestrator.merge_existing()?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            true
        }
    };

    if !ok {
        std::process::exit(1);
    }
    Ok(())
}

/// One worker: one browser session over `targets`, results under `output_dir`.
async fn run_batch(
    targets: &[ScrapeTarget],
    output_dir: &Path,
    worker_id: &str,
    browser: &BrowserArgs,
) -> Result<BatchSummary> {
    let site = SiteConfig::from_env()?;
    let store = FileStore::open(output_dir)
        .with_context(|| format!("Failed to prepare output directory: {}", output_dir.display()))?;
    let service = ScrapeService::new(
        site,
        ScrapeTimings::default(),
        store,
        browser.worker_config(worker_id),
    );
    let worker = BatchWorker::new(ChromiumSessionFactory::new(browser.options()), service);

    let summary = worker
        .run(targets, &TracingWorkerReporter)
        .await
        .context("Worker aborted")?;
    Ok(summary)
}

async fn cmd_parallel(
    batch_file: &Path,
    workers: usize,
    data_dir: &Path,
    stagger: u64,
    browser: &BrowserArgs,
) -> Result<bool> {
    let targets = read_batch_file(batch_file)
        .with_context(|| format!("Failed to read batch file: {}", batch_file.display()))?;
    tracing::info!(targets = targets.len(), workers, "Starting parallel run");

    let launcher = ProcessLauncher::current()?
        .with_reviews(browser.with_reviews)
        .with_headed(browser.headed)
        .with_debug_html(!browser.no_debug_html)
        .with_chrome_bin(browser.chrome_bin.clone());
    let config = OrchestratorConfig::default()
        .with_data_dir(data_dir)
        .with_workers(workers)
        .with_stagger(Duration::from_secs(stagger));

    let report = WorkerOrchestrator::new(launcher, FileMerger::new(), config)
        .run(&targets)
        .await?;

    let failed = report.failed_workers();
    if failed.is_empty() {
        tracing::info!(workers = report.exits.len(), "All workers succeeded");
    } else {
        tracing::error!(?failed, "Some workers failed, see their logs under batches/");
    }
    println!("{}", serde_json::to_string_pretty(&report.merge)?);
    Ok(report.all_succeeded())
}
