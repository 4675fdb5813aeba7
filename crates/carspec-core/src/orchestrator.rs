//! Fan a target list out over isolated workers and merge what they produce.
//!
//! Every worker gets its own batch file and output root, so the exporter's
//! read-keys-then-append cycle never sees a concurrent writer. Launches are
//! staggered so the first worker can populate shared driver caches alone.

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::future::join_all;

use crate::batch::{split_batches, write_batch_file};
use crate::error::AppError;
use crate::models::{MergeReport, ScrapeTarget};
use crate::traits::{OutputMerger, WorkerLauncher};

const WORKER_PREFIX: &str = "worker_";

/// Everything one worker process needs to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSpec {
    pub id: usize,
    pub batch_file: PathBuf,
    pub output_root: PathBuf,
    pub log_file: PathBuf,
}

/// How a worker ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerExit {
    pub id: usize,
    pub success: bool,
    /// Process exit code, `None` if the worker never ran or was killed.
    pub code: Option<i32>,
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub data_dir: PathBuf,
    pub workers: usize,
    pub stagger: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            workers: 4,
            stagger: Duration::from_secs(5),
        }
    }
}

impl OrchestratorConfig {
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_stagger(mut self, stagger: Duration) -> Self {
        self.stagger = stagger;
        self
    }

    pub fn batches_dir(&self) -> PathBuf {
        self.data_dir.join("batches")
    }

    pub fn workers_dir(&self) -> PathBuf {
        self.data_dir.join("workers")
    }
}

#[derive(Debug, Clone)]
pub struct OrchestratorReport {
    pub exits: Vec<WorkerExit>,
    pub merge: MergeReport,
}

impl OrchestratorReport {
    pub fn failed_workers(&self) -> Vec<usize> {
        self.exits.iter().filter(|e| !e.success).map(|e| e.id).collect()
    }

    pub fn all_succeeded(&self) -> bool {
        self.exits.iter().all(|e| e.success)
    }
}

/// Existing `worker_<n>` roots under `workers_dir`, in numeric order.
pub fn discover_worker_roots(workers_dir: &Path) -> Result<Vec<PathBuf>, AppError> {
    if !workers_dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut roots: Vec<(usize, PathBuf)> = Vec::new();
    for entry in std::fs::read_dir(workers_dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let name = entry.file_name();
        let index = name
            .to_str()
            .and_then(|n| n.strip_prefix(WORKER_PREFIX))
            .and_then(|n| n.parse::<usize>().ok());
        if let Some(index) = index {
            roots.push((index, path));
        }
    }
    roots.sort_by_key(|(index, _)| *index);
    Ok(roots.into_iter().map(|(_, path)| path).collect())
}

pub struct WorkerOrchestrator<L, M>
where
    L: WorkerLauncher,
    M: OutputMerger,
{
    launcher: L,
    merger: M,
    config: OrchestratorConfig,
}

impl<L, M> WorkerOrchestrator<L, M>
where
    L: WorkerLauncher,
    M: OutputMerger,
{
    pub fn new(launcher: L, merger: M, config: OrchestratorConfig) -> Self {
        Self {
            launcher,
            merger,
            config,
        }
    }

    /// Write one batch file per worker and reset each worker's output root.
    /// Batch files left over from a previous run are removed first.
    pub fn plan(&self, targets: &[ScrapeTarget]) -> Result<Vec<WorkerSpec>, AppError> {
        let batches_dir = self.config.batches_dir();
        let workers_dir = self.config.workers_dir();
        std::fs::create_dir_all(&batches_dir)?;
        std::fs::create_dir_all(&workers_dir)?;
        remove_stale_batches(&batches_dir)?;

        let batches = split_batches(targets, self.config.workers);
        let mut specs = Vec::with_capacity(batches.len());
        for (id, batch) in batches.iter().enumerate() {
            let batch_file = batches_dir.join(format!("batch_{id}.json"));
            write_batch_file(&batch_file, batch)?;

            let output_root = workers_dir.join(format!("{WORKER_PREFIX}{id}"));
            if output_root.exists() {
                std::fs::remove_dir_all(&output_root)?;
            }
            std::fs::create_dir_all(&output_root)?;

            tracing::info!(worker = id, targets = batch.len(), "Batch planned");
            specs.push(WorkerSpec {
                id,
                batch_file,
                output_root,
                log_file: batches_dir.join(format!("{WORKER_PREFIX}{id}.log")),
            });
        }
        Ok(specs)
    }

    /// Launch every worker with a staggered start, wait for all of them, then
    /// merge their outputs into the data directory whatever their exit status.
    pub async fn run(&self, targets: &[ScrapeTarget]) -> Result<OrchestratorReport, AppError> {
        let specs = self.plan(targets)?;
        tracing::info!(
            workers = specs.len(),
            targets = targets.len(),
            stagger_secs = self.config.stagger.as_secs(),
            "Launching workers"
        );

        let launches = specs.iter().enumerate().map(|(i, spec)| {
            let delay = self.config.stagger * i as u32;
            async move {
                tokio::time::sleep(delay).await;
                tracing::info!(worker = spec.id, log = %spec.log_file.display(), "Worker launched");
                match self.launcher.launch(spec).await {
                    Ok(exit) => exit,
                    Err(e) => {
                        tracing::error!(worker = spec.id, error = %e, "Worker could not be run");
                        WorkerExit {
                            id: spec.id,
                            success: false,
                            code: None,
                        }
                    }
                }
            }
        });
        let exits = join_all(launches).await;

        for exit in &exits {
            if exit.success {
                tracing::info!(worker = exit.id, "Worker finished");
            } else {
                tracing::warn!(worker = exit.id, code = ?exit.code, "Worker failed");
            }
        }

        let roots: Vec<PathBuf> = specs.into_iter().map(|s| s.output_root).collect();
        let merge = self.merger.merge(&roots, &self.config.data_dir)?;
        Ok(OrchestratorReport { exits, merge })
    }

    /// Merge previously produced worker roots without scraping.
    pub fn merge_existing(&self) -> Result<MergeReport, AppError> {
        let roots = discover_worker_roots(&self.config.workers_dir())?;
        if roots.is_empty() {
            tracing::warn!(
                dir = %self.config.workers_dir().display(),
                "No worker outputs to merge"
            );
        }
        self.merger.merge(&roots, &self.config.data_dir)
    }
}

fn remove_stale_batches(batches_dir: &Path) -> Result<(), AppError> {
    for entry in std::fs::read_dir(batches_dir)? {
        let path = entry?.path();
        let stale = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with("batch_") && n.ends_with(".json"));
        if stale {
            std::fs::remove_file(&path)?;
        }
    }
    Ok(())
}
