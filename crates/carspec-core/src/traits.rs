use std::future::Future;
use std::path::{Path, PathBuf};

use crate::dataset::Dataset;
use crate::error::AppError;
use crate::models::{MergeReport, RawScrape, SaveReport, ScrapeTarget};
use crate::orchestrator::{WorkerExit, WorkerSpec};
use crate::reviews::ReviewData;

/// How to find elements on the rendered page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    Css(String),
    XPath(String),
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Locator::Css(selector.into())
    }

    pub fn xpath(expr: impl Into<String>) -> Self {
        Locator::XPath(expr.into())
    }
}

/// A read-only view of one element at the time it was queried.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ElementSnapshot {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub attributes: std::collections::HashMap<String, String>,
    #[serde(default)]
    pub displayed: bool,
    #[serde(default)]
    pub enabled: bool,
}

impl ElementSnapshot {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

/// A live, script-executing browser page.
///
/// One session drives one tab and is not safe for concurrent use: callers
/// process targets strictly sequentially.
pub trait AutomationSession: Send + Sync {
    fn goto(&self, url: &str) -> impl Future<Output = Result<(), AppError>> + Send;

    fn title(&self) -> impl Future<Output = Result<String, AppError>> + Send;

    fn page_source(&self) -> impl Future<Output = Result<String, AppError>> + Send;

    fn current_url(&self) -> impl Future<Output = Result<String, AppError>> + Send;

    /// Number of elements currently matching the locator.
    fn count(&self, locator: &Locator) -> impl Future<Output = Result<usize, AppError>> + Send;

    fn elements(
        &self,
        locator: &Locator,
    ) -> impl Future<Output = Result<Vec<ElementSnapshot>, AppError>> + Send;

    /// Script-click the `index`-th match. Returns false if it no longer exists.
    fn click(
        &self,
        locator: &Locator,
        index: usize,
    ) -> impl Future<Output = Result<bool, AppError>> + Send;

    /// Outer HTML of every match, in document order.
    fn outer_html(
        &self,
        locator: &Locator,
    ) -> impl Future<Output = Result<Vec<String>, AppError>> + Send;

    /// Trivial round-trip used as a liveness probe.
    fn ping(&self) -> impl Future<Output = Result<(), AppError>> + Send;

    fn close(self) -> impl Future<Output = ()> + Send
    where
        Self: Sized;
}

/// Builds fresh sessions, both at worker start and after a crash.
pub trait SessionFactory: Send + Sync {
    type Session: AutomationSession;

    fn create(&self) -> impl Future<Output = Result<Self::Session, AppError>> + Send;
}

/// Persists scrape results for one worker's output root.
pub trait ResultSink: Send + Sync + Clone {
    /// Save the raw document and the normalized tables for one target.
    fn save_scrape(
        &self,
        scrape: &RawScrape,
        dataset: &Dataset,
    ) -> impl Future<Output = Result<SaveReport, AppError>> + Send;

    fn save_reviews(
        &self,
        target: &ScrapeTarget,
        reviews: &ReviewData,
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Keep a page source for post-mortem inspection. `kind` is a short tag
    /// such as `blocked` or `failed`.
    fn save_debug_html(
        &self,
        kind: &str,
        html: &str,
    ) -> impl Future<Output = Result<Option<PathBuf>, AppError>> + Send;
}

/// A no-op ResultSink for use when persistence is not needed.
#[derive(Debug, Clone)]
pub struct NullSink;

impl ResultSink for NullSink {
    async fn save_scrape(
        &self,
        _scrape: &RawScrape,
        dataset: &Dataset,
    ) -> Result<SaveReport, AppError> {
        Ok(SaveReport {
            rows_written: dataset.vehicles.len(),
            rows_skipped: 0,
        })
    }

    async fn save_reviews(
        &self,
        _target: &ScrapeTarget,
        _reviews: &ReviewData,
    ) -> Result<(), AppError> {
        Ok(())
    }

    async fn save_debug_html(&self, _kind: &str, _html: &str) -> Result<Option<PathBuf>, AppError> {
        Ok(None)
    }
}

/// Runs one worker over its batch file and reports how it ended.
pub trait WorkerLauncher: Send + Sync {
    fn launch(
        &self,
        spec: &WorkerSpec,
    ) -> impl Future<Output = Result<WorkerExit, AppError>> + Send;
}

/// Reconciles isolated worker output roots into one destination root.
pub trait OutputMerger: Send + Sync {
    fn merge(&self, worker_roots: &[PathBuf], dest: &Path) -> Result<MergeReport, AppError>;
}
