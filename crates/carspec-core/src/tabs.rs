//! Body-type tab discovery and switching.

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::bodytype::{COMMON_BODY_WORDS, DEFAULT_TAB, WHITESPACE_RE, clean_tab_name};
use crate::config::ScrapeTimings;
use crate::error::AppError;
use crate::navigator::wait_for;
use crate::traits::{AutomationSession, ElementSnapshot, Locator};

const TAB_CONTAINER: &str = "//div[contains(@class, 'argo-flexbox-content')]";

/// Ordered enumeration strategies. The first one that yields names wins.
const TAB_STRATEGIES: &[&str] = &[
    "//div[contains(@class, 'css-17dykbp')]",
    "//button[contains(@class, 'body-type')]",
    "//div[contains(@class, 'bodyType')]",
    "//button[@role='tab']",
    "//div[@role='tab']",
];

const CLICKABLE_FALLBACK: &str = "//div[@role='button'] | //button | //div[@tabindex]";

/// Clickable text longer than this is not a tab label.
const MAX_FALLBACK_LABEL: usize = 20;

/// Attribute sources tried after the accessible label and visible text.
const NAME_ATTRIBUTES: &[&str] = &["title", "data-testid", "data-value", "class"];

const UPPER: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const LOWER: &str = "abcdefghijklmnopqrstuvwxyz";

/// One enumerated tab: the cleaned display name and the label it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabLabel {
    pub name: String,
    pub raw: String,
}

impl TabLabel {
    pub fn new(name: impl Into<String>, raw: &str) -> Self {
        Self {
            name: name.into(),
            raw: WHITESPACE_RE.replace_all(raw, " ").trim().to_string(),
        }
    }

    /// The single tab of a page without a body-type selector.
    pub fn implicit() -> Self {
        Self::new(DEFAULT_TAB, DEFAULT_TAB)
    }
}

/// First label source that cleans to a non-empty name.
fn element_label(el: &ElementSnapshot) -> Option<TabLabel> {
    let sources = el
        .attr("aria-label")
        .into_iter()
        .chain(std::iter::once(el.text.as_str()))
        .chain(NAME_ATTRIBUTES.iter().filter_map(|a| el.attr(a)));
    sources
        .map(|raw| TabLabel::new(clean_tab_name(raw), raw))
        .find(|label| !label.name.is_empty())
}

/// Quote a string as an XPath 1.0 literal, splitting on mixed quotes.
pub(crate) fn xpath_literal(s: &str) -> String {
    if !s.contains('\'') {
        return format!("'{s}'");
    }
    if !s.contains('"') {
        return format!("\"{s}\"");
    }
    let parts: Vec<String> = s.split('\'').map(|p| format!("'{p}'")).collect();
    format!("concat({})", parts.join(", \"'\", "))
}

fn select_strategies(name: &str) -> Vec<String> {
    let lower = xpath_literal(&name.to_lowercase());
    let exact = xpath_literal(name);
    let fold = |expr: &str| format!("translate({expr}, '{UPPER}', '{LOWER}')");
    vec![
        format!("//*[@role='tab' and contains({}, {lower})]", fold(".")),
        format!("//*[@role='tablist']//*[contains({}, {lower})]", fold(".")),
        format!("//button[contains({}, {lower})]", fold(".")),
        format!("//*[contains(@aria-label, {exact}) or contains(@aria-label, {lower})]"),
        format!("//div[contains({}, {lower})]", fold("text()")),
    ]
}

/// Finds and activates body-type tabs on a loaded specs page.
#[derive(Debug, Clone)]
pub struct TabSwitcher {
    timings: ScrapeTimings,
}

impl TabSwitcher {
    pub fn new(timings: ScrapeTimings) -> Self {
        Self { timings }
    }

    /// Every body-type tab, in page order and unique by display name. A page
    /// without a selector yields the single implicit [`DEFAULT_TAB`].
    pub async fn enumerate<S: AutomationSession>(
        &self,
        session: &S,
    ) -> Result<Vec<TabLabel>, AppError> {
        let has_container = wait_for(
            session,
            &Locator::xpath(TAB_CONTAINER),
            self.timings.tab_container_wait,
            self.timings.element_poll,
        )
        .await?;

        let mut labels = Vec::new();
        if has_container {
            labels = self.from_strategies(session).await?;
            if labels.is_empty() {
                debug!("No tab strategy matched, scanning clickable elements");
                labels = self.from_clickables(session).await?;
            }
        } else {
            info!("Body-type container not found, assuming a single body type");
        }

        if labels.is_empty() {
            labels.push(TabLabel::implicit());
        }
        let names: Vec<&str> = labels.iter().map(|l| l.name.as_str()).collect();
        info!(count = labels.len(), tabs = ?names, "Body types found");
        Ok(labels)
    }

    async fn from_strategies<S: AutomationSession>(
        &self,
        session: &S,
    ) -> Result<Vec<TabLabel>, AppError> {
        for xpath in TAB_STRATEGIES {
            let elements = session.elements(&Locator::xpath(*xpath)).await?;
            if elements.is_empty() {
                continue;
            }
            let mut labels: Vec<TabLabel> = Vec::new();
            for label in elements.iter().filter_map(element_label) {
                if !labels.iter().any(|l| l.name == label.name) {
                    labels.push(label);
                }
            }
            if !labels.is_empty() {
                debug!(xpath, count = labels.len(), "Tab strategy matched");
                return Ok(labels);
            }
        }
        Ok(Vec::new())
    }

    async fn from_clickables<S: AutomationSession>(
        &self,
        session: &S,
    ) -> Result<Vec<TabLabel>, AppError> {
        let elements = session.elements(&Locator::xpath(CLICKABLE_FALLBACK)).await?;
        let mut labels: Vec<TabLabel> = Vec::new();
        for el in elements {
            let text = el.text.trim();
            if text.is_empty() || text.chars().count() >= MAX_FALLBACK_LABEL {
                continue;
            }
            let lower = text.to_lowercase();
            let known = COMMON_BODY_WORDS.iter().any(|w| lower.contains(w));
            if known && !labels.iter().any(|l| l.name == text) {
                labels.push(TabLabel::new(text, text));
            }
        }
        Ok(labels)
    }

    /// Short fingerprint of the rendered content: first meaningful heading,
    /// else first table cell. Errors read as an empty signature.
    pub async fn content_signature<S: AutomationSession>(&self, session: &S) -> String {
        if let Ok(headings) = session.elements(&Locator::css("h3")).await {
            let hit = headings
                .iter()
                .take(5)
                .map(|h| h.text.trim())
                .find(|t| t.chars().count() > 5);
            if let Some(text) = hit {
                return text.to_string();
            }
        }
        match session.elements(&Locator::css("table td")).await {
            Ok(cells) => cells
                .first()
                .map(|c| c.text.trim().to_string())
                .unwrap_or_default(),
            Err(_) => String::new(),
        }
    }

    /// Click the named tab and wait for the content to change.
    ///
    /// Returns false only when no clickable element was found. If the
    /// content never changes within the bounded wait the switch is still
    /// reported as successful.
    pub async fn select<S: AutomationSession>(
        &self,
        session: &S,
        name: &str,
    ) -> Result<bool, AppError> {
        let before = self.content_signature(session).await;

        let mut clicked = false;
        'strategies: for xpath in select_strategies(name) {
            let locator = Locator::xpath(xpath);
            let elements = session.elements(&locator).await?;
            for (idx, el) in elements.iter().enumerate() {
                if el.attr("aria-selected") == Some("true") {
                    debug!(tab = name, "Tab already selected");
                    return Ok(true);
                }
                if el.displayed && el.enabled && session.click(&locator, idx).await? {
                    info!(tab = name, "Clicked body type");
                    clicked = true;
                    break 'strategies;
                }
            }
        }

        if !clicked {
            warn!(tab = name, "Could not find or click body type");
            return Ok(false);
        }

        let started = Instant::now();
        while started.elapsed() < self.timings.tab_max_wait {
            tokio::time::sleep(self.timings.tab_poll_interval).await;
            let after = self.content_signature(session).await;
            if !after.is_empty() && after != before {
                debug!(
                    tab = name,
                    waited_ms = started.elapsed().as_millis() as u64,
                    "Content changed"
                );
                tokio::time::sleep(self.timings.tab_settle).await;
                return Ok(true);
            }
        }

        warn!(
            tab = name,
            waited_ms = self.timings.tab_max_wait.as_millis() as u64,
            "Content did not change after click, continuing"
        );
        Ok(true)
    }
}
