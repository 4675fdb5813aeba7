use chrono::Utc;

use crate::batch::WorkerConfig;
use crate::bodytype::BodyTypeDetector;
use crate::config::{ScrapeTimings, SiteConfig};
use crate::error::AppError;
use crate::models::{PageState, RawScrape, SaveReport, ScrapeTarget, TrimRecord};
use crate::navigator::{PageNavigator, spec_table_snapshot};
use crate::overview::StyleFallback;
use crate::reviews::ReviewScraper;
use crate::table::extract_comparison_table;
use crate::tabs::{TabLabel, TabSwitcher};
use crate::traits::{AutomationSession, ResultSink};
use crate::transform::SchemaTransformer;

/// What one successful target produced.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrapeOutcome {
    pub page_state: PageState,
    /// Body types that yielded a table.
    pub bodytypes: usize,
    /// Normalized vehicles built from those tables.
    pub vehicles: usize,
    pub save: SaveReport,
    pub reviews_saved: bool,
}

/// Scrapes one target end to end: navigate → tabs → tables → transform → persist.
///
/// Generic over the result sink so tests run without touching the filesystem.
pub struct ScrapeService<K>
where
    K: ResultSink,
{
    navigator: PageNavigator,
    tabs: TabSwitcher,
    fallback: StyleFallback,
    reviews: ReviewScraper,
    detector: BodyTypeDetector,
    transformer: SchemaTransformer,
    timings: ScrapeTimings,
    sink: K,
    config: WorkerConfig,
}

impl<K> ScrapeService<K>
where
    K: ResultSink,
{
    pub fn new(site: SiteConfig, timings: ScrapeTimings, sink: K, config: WorkerConfig) -> Self {
        Self {
            navigator: PageNavigator::new(site.clone(), timings.clone()),
            tabs: TabSwitcher::new(timings.clone()),
            fallback: StyleFallback::new(site.clone(), timings.clone()),
            reviews: ReviewScraper::new(site, timings.clone()),
            detector: BodyTypeDetector::default(),
            transformer: SchemaTransformer::new(),
            timings,
            sink,
            config,
        }
    }

    /// Replace the default body-type rules, e.g. to add brand overrides.
    pub fn with_detector(mut self, detector: BodyTypeDetector) -> Self {
        self.detector = detector;
        self
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn timings(&self) -> &ScrapeTimings {
        &self.timings
    }

    /// Run the pipeline for one target in an already open session.
    ///
    /// Not-found, blocked and empty pages come back as target failures.
    /// Anything else that goes wrong in the session propagates unchanged so
    /// the caller can decide whether the session is still usable.
    pub async fn scrape<S: AutomationSession>(
        &self,
        session: &S,
        target: &ScrapeTarget,
    ) -> Result<ScrapeOutcome, AppError> {
        tracing::info!(
            make = %target.make,
            model = %target.model,
            year = target.year,
            "Scraping target"
        );

        let page_state = self.navigator.navigate(session, target).await?;
        let (labels, records) = match page_state {
            PageState::Blocked => {
                self.capture_debug(session, "blocked").await;
                return Err(AppError::Blocked(target.to_string()));
            }
            PageState::NotFound => return Err(AppError::NotFound(target.to_string())),
            PageState::Overview => {
                tracing::info!("Specs page unavailable, falling back to style pages");
                let records: Vec<TrimRecord> =
                    self.fallback.scrape(session).await?.into_iter().collect();
                (vec![TabLabel::implicit()], records)
            }
            PageState::Specs => self.scrape_tabs(session).await?,
        };

        let dataset = self.transformer.transform(target, &records);
        if dataset.is_empty() {
            tracing::warn!(
                make = %target.make,
                model = %target.model,
                year = target.year,
                "No trims or specifications extracted"
            );
            self.capture_debug(session, "failed").await;
            return Err(AppError::ExtractionEmpty(target.to_string()));
        }

        let tabs: Vec<_> = labels
            .iter()
            .map(|l| self.detector.tab(&l.name, &l.raw))
            .collect();
        let scrape = RawScrape {
            target: target.clone(),
            page_state,
            scraped_at: Utc::now(),
            tab_groups: self.detector.categorize_tabs(&tabs),
            tabs,
            records,
        };

        let save = self.sink.save_scrape(&scrape, &dataset).await?;
        tracing::info!(
            bodytypes = scrape.records.len(),
            vehicles = dataset.len(),
            written = save.rows_written,
            skipped = save.rows_skipped,
            "Target saved"
        );

        let reviews_saved = if self.config.with_reviews {
            self.scrape_reviews(session, target).await
        } else {
            false
        };

        Ok(ScrapeOutcome {
            page_state,
            bodytypes: scrape.records.len(),
            vehicles: dataset.len(),
            save,
            reviews_saved,
        })
    }

    /// Read every body-type tab. The first tab is already rendered; later
    /// tabs are clicked first and skipped if they cannot be activated.
    async fn scrape_tabs<S: AutomationSession>(
        &self,
        session: &S,
    ) -> Result<(Vec<TabLabel>, Vec<TrimRecord>), AppError> {
        let labels = self.tabs.enumerate(session).await?;
        let mut records = Vec::new();

        for (idx, name) in labels.iter().map(|l| l.name.as_str()).enumerate() {
            if idx > 0 && !self.tabs.select(session, name).await? {
                tracing::warn!(bodytype = %name, "Tab could not be activated, skipping");
                continue;
            }
            match self.read_table(session, name).await? {
                Some(record) => {
                    tracing::info!(
                        bodytype = %name,
                        trims = record.trims.len(),
                        rows = record.rows.len(),
                        "Body type extracted"
                    );
                    records.push(record);
                }
                None => tracing::warn!(bodytype = %name, "No table data for body type"),
            }
        }

        Ok((labels, records))
    }

    async fn read_table<S: AutomationSession>(
        &self,
        session: &S,
        bodytype: &str,
    ) -> Result<Option<TrimRecord>, AppError> {
        tokio::time::sleep(self.timings.table_settle).await;
        let Some(html) = spec_table_snapshot(session).await? else {
            return Ok(None);
        };
        let table = extract_comparison_table(&html);
        if table.trims.is_empty() || table.rows.is_empty() {
            return Ok(None);
        }
        Ok(Some(TrimRecord::new(bodytype, table.trims, table.rows)))
    }

    /// Reviews never fail the target; problems are logged and dropped.
    async fn scrape_reviews<S: AutomationSession>(
        &self,
        session: &S,
        target: &ScrapeTarget,
    ) -> bool {
        let data = match self.reviews.scrape(session, target).await {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!(error = %e, "Review scrape failed");
                return false;
            }
        };
        if data.is_empty() {
            tracing::info!("No review data found");
            return false;
        }
        match self.sink.save_reviews(target, &data).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "Could not save reviews");
                false
            }
        }
    }

    async fn capture_debug<S: AutomationSession>(&self, session: &S, kind: &str) {
        if !self.config.debug_html {
            return;
        }
        let html = match session.page_source().await {
            Ok(html) => html,
            Err(e) => {
                tracing::debug!(error = %e, "Page source unavailable for debug capture");
                return;
            }
        };
        match self.sink.save_debug_html(kind, &html).await {
            Ok(Some(path)) => tracing::info!(path = %path.display(), "Saved debug HTML"),
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "Could not save debug HTML"),
        }
    }
}
