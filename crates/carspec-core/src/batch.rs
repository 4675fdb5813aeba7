//! Batch files, worker settings and the end-of-batch summary.

use std::path::Path;

use serde::Serialize;

use crate::error::AppError;
use crate::models::ScrapeTarget;

/// Failed target identifiers listed individually in a summary.
const MAX_LISTED_FAILURES: usize = 10;

/// Per-worker behaviour switches.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub worker_id: String,
    pub with_reviews: bool,
    /// Save page sources of blocked pages and empty extractions.
    pub debug_html: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker_id: "worker-0".to_string(),
            with_reviews: false,
            debug_html: true,
        }
    }
}

impl WorkerConfig {
    pub fn with_worker_id(mut self, id: impl Into<String>) -> Self {
        self.worker_id = id.into();
        self
    }

    pub fn with_reviews(mut self, enabled: bool) -> Self {
        self.with_reviews = enabled;
        self
    }

    pub fn with_debug_html(mut self, enabled: bool) -> Self {
        self.debug_html = enabled;
        self
    }
}

/// Outcome counts for one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub successful: usize,
    /// Display identifiers of failed targets, in processing order.
    pub failed: Vec<String>,
}

impl BatchSummary {
    pub fn record_success(&mut self) {
        self.total += 1;
        self.successful += 1;
    }

    pub fn record_failure(&mut self, target: &ScrapeTarget) {
        self.total += 1;
        self.failed.push(target.to_string());
    }

    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }

    /// The bounded failure listing: at most ten identifiers, then a count of
    /// the rest.
    pub fn failure_lines(&self) -> Vec<String> {
        let mut lines: Vec<String> = self
            .failed
            .iter()
            .take(MAX_LISTED_FAILURES)
            .cloned()
            .collect();
        if self.failed.len() > MAX_LISTED_FAILURES {
            lines.push(format!(
                "... and {} more",
                self.failed.len() - MAX_LISTED_FAILURES
            ));
        }
        lines
    }

    pub fn log(&self, worker_id: &str) {
        tracing::info!(
            %worker_id,
            total = self.total,
            successful = self.successful,
            failed = self.failed_count(),
            "Batch complete"
        );
        for line in self.failure_lines() {
            tracing::warn!(%worker_id, "  failed: {}", line);
        }
    }
}

/// Read a JSON array of targets. Any malformed entry rejects the whole file.
pub fn read_batch_file(path: &Path) -> Result<Vec<ScrapeTarget>, AppError> {
    let raw = std::fs::read_to_string(path)?;
    parse_batch(&raw).map_err(|e| AppError::InvalidBatch(format!("{}: {e}", path.display())))
}

pub fn parse_batch(raw: &str) -> Result<Vec<ScrapeTarget>, AppError> {
    serde_json::from_str(raw).map_err(|e| AppError::InvalidBatch(e.to_string()))
}

pub fn write_batch_file(path: &Path, targets: &[ScrapeTarget]) -> Result<(), AppError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(targets)?)?;
    Ok(())
}

/// Contiguous chunks of `ceil(len / workers)` targets. Never returns an
/// empty chunk; fewer chunks than `workers` when there are few targets.
pub fn split_batches(targets: &[ScrapeTarget], workers: usize) -> Vec<Vec<ScrapeTarget>> {
    if targets.is_empty() {
        return Vec::new();
    }
    let workers = workers.max(1);
    let chunk = targets.len().div_ceil(workers);
    targets.chunks(chunk).map(<[ScrapeTarget]>::to_vec).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn targets(n: u16) -> Vec<ScrapeTarget> {
        (0..n)
            .map(|i| ScrapeTarget::new("Toyota", "Camry", 2000 + i))
            .collect()
    }

    #[test]
    fn test_split_batches_ceil_chunks() {
        let batches = split_batches(&targets(10), 3);
        let sizes: Vec<usize> = batches.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![4, 4, 2]);
        assert_eq!(batches[1][0].year, 2004);

        let batches = split_batches(&targets(2), 4);
        assert_eq!(batches.len(), 2);
        assert!(split_batches(&[], 4).is_empty());
        assert_eq!(split_batches(&targets(3), 0).len(), 1);
    }

    #[test]
    fn test_parse_batch_year_forms() {
        let parsed = parse_batch(
            r#"[{"make":"Honda","model":"Civic","year":2019},
                {"make":"Honda","model":"Fit","year":"2015"}]"#,
        )
        .unwrap();
        assert_eq!(parsed[1], ScrapeTarget::new("Honda", "Fit", 2015));
    }

    #[test]
    fn test_parse_batch_rejects_malformed() {
        for raw in [
            r#"{"make":"Honda"}"#,
            r#"[{"make":"Honda","model":"Fit"}]"#,
            r#"[{"make":"Honda","model":"Fit","year":"later"}]"#,
            "not json",
        ] {
            let err = parse_batch(raw).unwrap_err();
            assert!(matches!(err, AppError::InvalidBatch(_)), "{raw}");
        }
    }

    #[test]
    fn test_batch_file_roundtrip_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("batches/batch_0.json");
        write_batch_file(&path, &targets(3)).unwrap();
        assert_eq!(read_batch_file(&path).unwrap(), targets(3));
    }

    #[test]
    fn test_summary_failure_lines_bounded() {
        let mut summary = BatchSummary::default();
        summary.record_success();
        for t in targets(13) {
            summary.record_failure(&t);
        }
        assert_eq!(summary.total, 14);
        assert_eq!(summary.successful, 1);
        let lines = summary.failure_lines();
        assert_eq!(lines.len(), 11);
        assert_eq!(lines[0], "2000 Toyota Camry");
        assert_eq!(lines[10], "... and 3 more");
    }
}
