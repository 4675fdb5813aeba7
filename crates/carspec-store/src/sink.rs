use std::path::{Path, PathBuf};

use carspec_core::dataset::Dataset;
use carspec_core::error::AppError;
use carspec_core::models::{RawScrape, SaveReport, ScrapeTarget};
use carspec_core::reviews::ReviewData;
use carspec_core::traits::ResultSink;

use crate::columns::{
    REVIEW_COLUMNS, REVIEW_KEY_COLUMNS, SPEC_COLUMNS, SPEC_KEY_COLUMNS, flatten_review,
    flatten_scrape,
};
use crate::csv_export::AppendOnlyCsv;
use crate::json_export::FourTableExporter;
use crate::layout::OutputLayout;
use crate::raw::{write_debug_html, write_raw};
use crate::review_export::upsert_review;
use crate::warnings::LabelWarnings;

/// File-backed [`ResultSink`] for one output root.
///
/// The root must not be shared with another writer while a run is in
/// progress: the CSV exporters read their key sets before appending.
#[derive(Debug, Clone)]
pub struct FileStore {
    layout: OutputLayout,
    specs: AppendOnlyCsv,
    reviews: AppendOnlyCsv,
    four_table: FourTableExporter,
    warnings: LabelWarnings,
}

impl FileStore {
    /// Open (and create) the directory layout under `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, AppError> {
        let layout = OutputLayout::new(root);
        layout.ensure()?;
        Ok(Self {
            specs: AppendOnlyCsv::new(layout.specs_csv(), SPEC_COLUMNS, SPEC_KEY_COLUMNS),
            reviews: AppendOnlyCsv::new(layout.reviews_csv(), REVIEW_COLUMNS, REVIEW_KEY_COLUMNS),
            four_table: FourTableExporter::new(layout.four_table_dir()),
            warnings: LabelWarnings::new(),
            layout,
        })
    }

    /// Share an unknown-label collector with other stores of the same process.
    pub fn with_warnings(mut self, warnings: LabelWarnings) -> Self {
        self.warnings = warnings;
        self
    }

    pub fn root(&self) -> &Path {
        self.layout.root()
    }

    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }
}

impl ResultSink for FileStore {
    async fn save_scrape(
        &self,
        scrape: &RawScrape,
        dataset: &Dataset,
    ) -> Result<SaveReport, AppError> {
        write_raw(&self.layout.raw_file(&scrape.target), scrape)?;
        let rows = flatten_scrape(scrape, &self.warnings);
        let report = self.specs.append(&rows)?;
        self.four_table.export(&scrape.target, dataset)?;
        Ok(report)
    }

    async fn save_reviews(
        &self,
        target: &ScrapeTarget,
        reviews: &ReviewData,
    ) -> Result<(), AppError> {
        upsert_review(&self.layout.reviews_file(&target.make, &target.model), reviews)?;
        let report = self.reviews.append(&[flatten_review(reviews)])?;
        tracing::info!(
            make = %target.make,
            model = %target.model,
            year = target.year,
            written = report.rows_written,
            "Reviews saved"
        );
        Ok(())
    }

    async fn save_debug_html(&self, kind: &str, html: &str) -> Result<Option<PathBuf>, AppError> {
        write_debug_html(&self.layout.debug_dir(), kind, html).map(Some)
    }
}
