//! Fallback for targets whose specs page redirects to the model overview.
//!
//! The overview lists one link per style. The first style page with a
//! readable table supplies the specifications, which are then replicated
//! across every listed style.

use std::collections::HashSet;
use std::sync::LazyLock;

use scraper::{Html, Selector};
use tracing::{info, warn};

use crate::bodytype::DEFAULT_TAB;
use crate::config::{ScrapeTimings, SiteConfig};
use crate::error::AppError;
use crate::models::{RawSpecRow, TrimRecord};
use crate::navigator::{spec_table_snapshot, wait_for};
use crate::table::extract_style_specs;
use crate::traits::{AutomationSession, Locator};

static LINK: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());

const MIN_STYLE_NAME: usize = 3;

/// A style entry on the overview page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleLink {
    pub name: String,
    pub url: String,
}

/// Collect style links from overview HTML, deduplicated by absolute URL.
pub fn extract_style_links(html: &str, site: &SiteConfig) -> Vec<StyleLink> {
    let doc = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut styles = Vec::new();

    for a in doc.select(&LINK) {
        let Some(href) = a.value().attr("href") else {
            continue;
        };
        if !href.contains("/styles/") {
            continue;
        }
        let name: String = a.text().map(str::trim).collect();
        if name.chars().count() < MIN_STYLE_NAME {
            continue;
        }
        let url = site.absolute_url(href);
        if seen.insert(url.clone()) {
            styles.push(StyleLink { name, url });
        }
    }
    styles
}

/// Scrapes the style pages linked from an overview page.
#[derive(Debug, Clone)]
pub struct StyleFallback {
    site: SiteConfig,
    timings: ScrapeTimings,
}

impl StyleFallback {
    pub fn new(site: SiteConfig, timings: ScrapeTimings) -> Self {
        Self { site, timings }
    }

    /// Build a single [`DEFAULT_TAB`] record from the overview currently
    /// loaded in the session. `None` when no style yields specifications.
    pub async fn scrape<S: AutomationSession>(
        &self,
        session: &S,
    ) -> Result<Option<TrimRecord>, AppError> {
        let source = session.page_source().await?;
        let styles = extract_style_links(&source, &self.site);
        if styles.is_empty() {
            warn!("No style links on overview page");
            return Ok(None);
        }
        info!(count = styles.len(), "Style links found on overview page");

        let mut specs = Vec::new();
        for style in &styles {
            tokio::time::sleep(self.timings.style_delay).await;
            specs = self.style_specs(session, &style.url).await?;
            if !specs.is_empty() {
                info!(style = %style.name, rows = specs.len(), "Specs taken from style page");
                break;
            }
            warn!(style = %style.name, "No specs on style page, trying next");
        }

        if specs.is_empty() {
            warn!("No style page yielded specifications");
            return Ok(None);
        }

        let names: Vec<String> = styles.into_iter().map(|s| s.name).collect();
        let n = names.len();
        let rows = specs
            .into_iter()
            .map(|(label, value)| RawSpecRow::new(label, vec![value; n], n))
            .collect();
        Ok(Some(TrimRecord::new(DEFAULT_TAB, names, rows)))
    }

    async fn style_specs<S: AutomationSession>(
        &self,
        session: &S,
        url: &str,
    ) -> Result<Vec<(String, String)>, AppError> {
        session.goto(url).await?;
        tokio::time::sleep(self.timings.initial_settle).await;
        let ready = wait_for(
            session,
            &Locator::css("body"),
            self.timings.root_wait,
            self.timings.element_poll,
        )
        .await?;
        if !ready {
            return Ok(Vec::new());
        }
        Ok(spec_table_snapshot(session)
            .await?
            .map(|html| extract_style_specs(&html))
            .unwrap_or_default())
    }
}
