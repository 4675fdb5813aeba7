//! Consumer and expert review data for one (make, model, year).

use std::collections::BTreeMap;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::config::{ScrapeTimings, SiteConfig};
use crate::error::AppError;
use crate::models::ScrapeTarget;
use crate::navigator::{is_not_found, wait_for};
use crate::traits::{AutomationSession, Locator};

static JSON_LD: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"script[type="application/ld+json"]"#).unwrap());
static ARIA_LABELLED: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("[aria-label]").unwrap());

static RECOMMEND_LABEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Recommend\s+this\s+vehicle").unwrap());
static RECOMMEND_INLINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+)\s*%\s*Recommend").unwrap());
static PERCENT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)\s*%").unwrap());
static STAR_LINE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[1-5]$").unwrap());
static RATING_LINE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d+\.?\d*)$").unwrap());
static RANKING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(#\d+\s+in\s+[^."'\n]+)"#).unwrap());

pub const REVIEW_CATEGORIES: [&str; 6] = [
    "value",
    "performance",
    "quality",
    "comfort",
    "reliability",
    "styling",
];

/// A label's value is searched for within this many following lines.
const LOOKAHEAD_LINES: usize = 4;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConsumerReview {
    pub overall_rating: Option<f64>,
    pub review_count: Option<u32>,
    pub recommend_percentage: Option<u32>,
    /// Star (1-5) → percentage of reviews.
    #[serde(default)]
    pub star_distribution: BTreeMap<u8, u32>,
    #[serde(default)]
    pub category_ratings: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpertReview {
    pub expert_rating: Option<f64>,
    /// e.g. `#2 in Best Midsize Cars of 2020`
    pub ranking: Option<String>,
    #[serde(default)]
    pub pros: Vec<String>,
    #[serde(default)]
    pub cons: Vec<String>,
}

impl ExpertReview {
    pub fn is_empty(&self) -> bool {
        self.expert_rating.is_none()
            && self.ranking.is_none()
            && self.pros.is_empty()
            && self.cons.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewData {
    pub make: String,
    pub model: String,
    pub year: u16,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub consumer_review: Option<ConsumerReview>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub expert_review: Option<ExpertReview>,
    pub scraped_at: DateTime<Utc>,
}

impl ReviewData {
    pub fn new(target: &ScrapeTarget) -> Self {
        Self {
            make: target.make.clone(),
            model: target.model.clone(),
            year: target.year,
            consumer_review: None,
            expert_review: None,
            scraped_at: Utc::now(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.consumer_review.is_none() && self.expert_review.is_none()
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Every JSON-LD object on the page; top-level arrays are flattened.
fn json_ld(doc: &Html) -> Vec<Value> {
    let mut out = Vec::new();
    for script in doc.select(&JSON_LD) {
        let raw: String = script.text().collect();
        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Array(items)) => out.extend(items),
            Ok(v @ Value::Object(_)) => out.push(v),
            _ => {}
        }
    }
    out
}

/// The object itself followed by the members of its `@graph`.
fn with_graph(item: &Value) -> Vec<&Value> {
    let mut nodes = vec![item];
    if let Some(graph) = item.get("@graph").and_then(Value::as_array) {
        nodes.extend(graph.iter());
    }
    nodes
}

fn is_type(node: &Value, ty: &str) -> bool {
    node.get("@type").and_then(Value::as_str) == Some(ty)
}

/// Number or numeric string.
fn lenient_f64(v: Option<&Value>) -> Option<f64> {
    match v? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn lenient_u32(v: Option<&Value>) -> Option<u32> {
    match v? {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn aggregate_rating(items: &[Value]) -> Option<&Value> {
    items.iter().find_map(|item| {
        with_graph(item)
            .into_iter()
            .find_map(|node| node.get("aggregateRating"))
    })
}

fn expert_review_node(items: &[Value]) -> Option<&Value> {
    for item in items {
        if is_type(item, "Review") {
            return Some(item);
        }
        if let Some(review) = item.get("review") {
            return match review {
                Value::Array(list) => list.first(),
                other => Some(other),
            };
        }
        if let Some(graph) = item.get("@graph").and_then(Value::as_array) {
            if let Some(node) = graph.iter().find(|n| is_type(n, "Review")) {
                return Some(node);
            }
        }
    }
    None
}

fn list_texts(node: &Value) -> Vec<String> {
    node.get("itemListElement")
        .and_then(Value::as_array)
        .map(|elements| {
            elements
                .iter()
                .filter_map(|el| {
                    el.get("name")
                        .and_then(Value::as_str)
                        .filter(|s| !s.is_empty())
                        .or_else(|| el.get("item")?.get("name")?.as_str())
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                })
                .collect()
        })
        .unwrap_or_default()
}

fn pros_cons(items: &[Value]) -> (Vec<String>, Vec<String>) {
    let mut pros = Vec::new();
    let mut cons = Vec::new();
    for item in items {
        for node in with_graph(item) {
            if !is_type(node, "ItemList") {
                continue;
            }
            let name = node
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_lowercase();
            if name.contains("positive") || name.contains("pro") {
                pros = list_texts(node);
            } else if name.contains("negative") || name.contains("con") {
                cons = list_texts(node);
            }
        }
    }
    (pros, cons)
}

/// Non-empty trimmed text nodes in document order.
fn text_lines(doc: &Html) -> Vec<String> {
    doc.root_element()
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn full_text(doc: &Html) -> String {
    doc.root_element().text().collect()
}

fn recommend_percentage(doc: &Html) -> Option<u32> {
    for node in doc.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        if !RECOMMEND_LABEL_RE.is_match(text) {
            continue;
        }
        let Some(parent) = node.parent() else {
            continue;
        };
        let container = parent.parent().unwrap_or(parent);
        if let Some(el) = ElementRef::wrap(container) {
            let around: String = el.text().collect();
            if let Some(pct) = capture_u32(&PERCENT_RE, &around) {
                return Some(pct);
            }
        }
    }
    capture_u32(&RECOMMEND_INLINE_RE, &full_text(doc))
}

fn capture_u32(re: &Regex, text: &str) -> Option<u32> {
    re.captures(text)?.get(1)?.as_str().parse().ok()
}

fn star_distribution(doc: &Html, lines: &[String]) -> BTreeMap<u8, u32> {
    let mut dist = BTreeMap::new();
    for (i, line) in lines.iter().enumerate() {
        if !STAR_LINE_RE.is_match(line) {
            continue;
        }
        let Ok(star) = line.parse::<u8>() else {
            continue;
        };
        if let Some(pct) = lines
            .iter()
            .skip(i + 1)
            .take(LOOKAHEAD_LINES)
            .find_map(|l| capture_u32(&PERCENT_RE, l))
        {
            dist.insert(star, pct);
        }
    }

    if dist.is_empty() {
        for star in 1u8..=5 {
            let Ok(label_re) = Regex::new(&format!(r"(?i){star}\s*star")) else {
                continue;
            };
            for el in doc.select(&ARIA_LABELLED) {
                let label = el.value().attr("aria-label").unwrap_or_default();
                if !label_re.is_match(label) {
                    continue;
                }
                let text: String = el.text().collect();
                if let Some(pct) = capture_u32(&PERCENT_RE, &text) {
                    dist.insert(star, pct);
                }
            }
        }
    }
    dist
}

fn category_ratings(lines: &[String]) -> BTreeMap<String, f64> {
    let mut ratings = BTreeMap::new();
    for (i, line) in lines.iter().enumerate() {
        let lower = line.to_lowercase();
        let Some(cat) = REVIEW_CATEGORIES.iter().find(|c| **c == lower) else {
            continue;
        };
        let value = lines
            .iter()
            .skip(i + 1)
            .take(LOOKAHEAD_LINES)
            .filter_map(|l| RATING_LINE_RE.captures(l))
            .filter_map(|c| c.get(1)?.as_str().parse::<f64>().ok())
            .find(|v| *v > 0.0 && *v <= 5.0);
        if let Some(v) = value {
            ratings.insert((*cat).to_string(), v);
        }
    }
    ratings
}

fn ranking(doc: &Html, items: &[Value]) -> Option<String> {
    let from_review = items
        .iter()
        .flat_map(with_graph)
        .filter(|node| is_type(node, "Review"))
        .filter_map(|node| node.get("description").and_then(Value::as_str))
        .find_map(|desc| RANKING_RE.captures(desc))
        .and_then(|c| c.get(1).map(|m| m.as_str().trim().to_string()));
    from_review.or_else(|| {
        let text = full_text(doc);
        RANKING_RE
            .captures(&text)
            .and_then(|c| c.get(1).map(|m| m.as_str().trim().to_string()))
    })
}

/// Parse a consumer-reviews page. Without an overall rating there is no
/// usable review and `None` is returned.
pub fn parse_consumer_reviews(html: &str) -> Option<ConsumerReview> {
    let doc = Html::parse_document(html);
    let items = json_ld(&doc);
    let agg = aggregate_rating(&items);
    let overall_rating = agg.and_then(|a| lenient_f64(a.get("ratingValue")))?;
    let lines = text_lines(&doc);

    Some(ConsumerReview {
        overall_rating: Some(overall_rating),
        review_count: agg.and_then(|a| lenient_u32(a.get("reviewCount"))),
        recommend_percentage: recommend_percentage(&doc),
        star_distribution: star_distribution(&doc, &lines),
        category_ratings: category_ratings(&lines),
    })
}

/// Parse the model overview page for the expert verdict.
pub fn parse_expert_review(html: &str) -> Option<ExpertReview> {
    let doc = Html::parse_document(html);
    let items = json_ld(&doc);
    let expert_rating = expert_review_node(&items)
        .and_then(|r| r.get("reviewRating"))
        .and_then(|r| lenient_f64(r.get("ratingValue")));
    let (pros, cons) = pros_cons(&items);
    let review = ExpertReview {
        expert_rating,
        ranking: ranking(&doc, &items),
        pros,
        cons,
    };
    (!review.is_empty()).then_some(review)
}

// ---------------------------------------------------------------------------
// Scraping
// ---------------------------------------------------------------------------

/// Loads the review pages for a target in an existing session.
#[derive(Debug, Clone)]
pub struct ReviewScraper {
    site: SiteConfig,
    timings: ScrapeTimings,
}

impl ReviewScraper {
    pub fn new(site: SiteConfig, timings: ScrapeTimings) -> Self {
        Self { site, timings }
    }

    pub async fn scrape<S: AutomationSession>(
        &self,
        session: &S,
        target: &ScrapeTarget,
    ) -> Result<ReviewData, AppError> {
        let mut data = ReviewData::new(target);

        let consumer_url = self.site.consumer_reviews_url(target);
        if let Some(html) = self.load(session, &consumer_url).await? {
            data.consumer_review = parse_consumer_reviews(&html);
        }
        match &data.consumer_review {
            Some(c) => info!(
                rating = ?c.overall_rating,
                reviews = ?c.review_count,
                recommend = ?c.recommend_percentage,
                "Consumer reviews parsed"
            ),
            None => warn!(url = %consumer_url, "No consumer rating found"),
        }

        let expert_url = self.site.expert_review_url(target);
        if let Some(html) = self.load(session, &expert_url).await? {
            data.expert_review = parse_expert_review(&html);
        }
        if data.expert_review.is_none() {
            warn!(url = %expert_url, "No expert review found");
        }

        Ok(data)
    }

    /// Page source after the page settled, or `None` for missing pages.
    async fn load<S: AutomationSession>(
        &self,
        session: &S,
        url: &str,
    ) -> Result<Option<String>, AppError> {
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
            return Ok(None);
        }
        let title = session.title().await?;
        let source = session.page_source().await?;
        if is_not_found(&title, &source) {
            return Ok(None);
        }
        tokio::time::sleep(self.timings.review_settle).await;
        Ok(Some(session.page_source().await?))
    }
}
