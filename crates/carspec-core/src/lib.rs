pub mod batch;
pub mod bodytype;
pub mod config;
pub mod dataset;
pub mod error;
pub mod labels;
pub mod models;
pub mod navigator;
pub mod orchestrator;
pub mod overview;
pub mod reviews;
pub mod scrape;
pub mod table;
pub mod tabs;
pub mod traits;
pub mod transform;
pub mod util;
pub mod value_parser;
pub mod worker;

#[cfg(test)]
pub mod testutil;

pub use batch::{BatchSummary, WorkerConfig};
pub use config::{BrowserOptions, ScrapeTimings, SiteConfig};
pub use dataset::Dataset;
pub use error::AppError;
pub use models::{
    BodyCategory, MergeReport, PageState, RawScrape, SaveReport, ScrapeTarget, TrimRecord,
    compute_hash, vehicle_id,
};
pub use reviews::ReviewData;
pub use scrape::ScrapeService;
pub use traits::{
    AutomationSession, ElementSnapshot, Locator, OutputMerger, ResultSink, SessionFactory,
    WorkerLauncher,
};
pub use worker::{BatchWorker, TracingWorkerReporter};
