//! Load a target's specs page and decide what kind of page came back.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::{ScrapeTimings, SiteConfig};
use crate::error::AppError;
use crate::models::{PageState, ScrapeTarget};
use crate::table::largest_table;
use crate::traits::{AutomationSession, Locator};

/// Lowercase phrases of bot-detection and rate-limit interstitials.
const BLOCK_INDICATORS: &[&str] = &[
    "access denied",
    "please verify you are a human",
    "are you a robot",
    "captcha",
    "unusual traffic",
    "too many requests",
    "rate limit",
    "blocked",
    "security check",
    "pardon our interruption",
    "just a moment",
    "checking your browser",
    "enable javascript and cookies",
];

/// Only the head of the page source is scanned for block phrases.
const BLOCK_SCAN_CHARS: usize = 5000;

pub const SPECS_TABLE_ID: &str = "compare-trim-tables";

pub fn is_blocked(title: &str, source: &str) -> bool {
    let head: String = source.chars().take(BLOCK_SCAN_CHARS).collect();
    let combined = format!("{title} {head}").to_lowercase();
    BLOCK_INDICATORS.iter().any(|p| combined.contains(p))
}

pub fn is_not_found(title: &str, source: &str) -> bool {
    title.contains("404") || source.contains("Page Not Found")
}

pub fn is_specs_url(url: &str) -> bool {
    url.trim_end_matches('/').ends_with("/specs")
}

/// Poll until at least one element matches, or the timeout elapses.
pub(crate) async fn wait_for<S: AutomationSession>(
    session: &S,
    locator: &Locator,
    timeout: Duration,
    poll: Duration,
) -> Result<bool, AppError> {
    let deadline = Instant::now() + timeout;
    loop {
        if session.count(locator).await? > 0 {
            return Ok(true);
        }
        if Instant::now() >= deadline {
            return Ok(false);
        }
        tokio::time::sleep(poll).await;
    }
}

/// Outer HTML of the trim comparison table, else of the largest table on the
/// page.
pub async fn spec_table_snapshot<S: AutomationSession>(
    session: &S,
) -> Result<Option<String>, AppError> {
    let by_id = session
        .outer_html(&Locator::css(format!("#{SPECS_TABLE_ID}")))
        .await?;
    if let Some(html) = by_id.into_iter().next() {
        return Ok(Some(html));
    }
    let tables = session.outer_html(&Locator::css("table")).await?;
    Ok(largest_table(&tables).map(str::to_string))
}

/// Drives the initial navigation for one target.
#[derive(Debug, Clone)]
pub struct PageNavigator {
    site: SiteConfig,
    timings: ScrapeTimings,
}

impl PageNavigator {
    pub fn new(site: SiteConfig, timings: ScrapeTimings) -> Self {
        Self { site, timings }
    }

    /// Load the specs page and classify it. Errors from the session itself
    /// propagate so the caller can probe liveness.
    pub async fn navigate<S: AutomationSession>(
        &self,
        session: &S,
        target: &ScrapeTarget,
    ) -> Result<PageState, AppError> {
        let url = self.site.specs_url(target);
        info!(url = %url, "Navigating");
        session.goto(&url).await?;
        tokio::time::sleep(self.timings.initial_settle).await;
        self.classify(session).await
    }

    /// Classify the page currently loaded in the session.
    pub async fn classify<S: AutomationSession>(&self, session: &S) -> Result<PageState, AppError> {
        let title = session.title().await?;
        let source = session.page_source().await?;

        if is_blocked(&title, &source) {
            warn!(title = %title, "Block or CAPTCHA page detected");
            return Ok(PageState::Blocked);
        }
        if is_not_found(&title, &source) {
            info!("Page not found");
            return Ok(PageState::NotFound);
        }

        let has_root = wait_for(
            session,
            &Locator::css("body"),
            self.timings.root_wait,
            self.timings.element_poll,
        )
        .await?;
        if !has_root {
            info!("Document root never rendered");
            return Ok(PageState::NotFound);
        }

        let current = session.current_url().await?;
        if !is_specs_url(&current) {
            info!(url = %current, "Redirected away from specs page");
            return Ok(PageState::Overview);
        }

        let has_table = wait_for(
            session,
            &Locator::css(format!("#{SPECS_TABLE_ID}")),
            self.timings.specs_table_wait,
            self.timings.element_poll,
        )
        .await?;
        if has_table {
            debug!("Specs table loaded");
            return Ok(PageState::Specs);
        }

        let tables = session.count(&Locator::css("table")).await?;
        if tables == 0 {
            warn!("No tables on page");
            Ok(PageState::NotFound)
        } else {
            warn!(tables, "Comparison table missing, continuing with generic tables");
            Ok(PageState::Specs)
        }
    }
}
