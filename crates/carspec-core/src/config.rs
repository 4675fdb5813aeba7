use std::time::Duration;

use url::Url;

use crate::error::AppError;
use crate::models::ScrapeTarget;

pub const DEFAULT_BASE_URL: &str = "https://www.kbb.com";

/// Where the vehicle-information site lives.
#[derive(Debug, Clone)]
pub struct SiteConfig {
    pub base_url: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

impl SiteConfig {
    /// Validate and normalize a base URL (trailing slash removed).
    pub fn new(base_url: &str) -> Result<Self, AppError> {
        let parsed = Url::parse(base_url)
            .map_err(|e| AppError::ConfigError(format!("Invalid base URL '{base_url}': {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(AppError::ConfigError(format!(
                "Base URL must be http(s), got '{base_url}'"
            )));
        }
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Read configuration from environment variables.
    ///
    /// - `CARSPEC_BASE_URL` (optional, defaults to the public site)
    pub fn from_env() -> Result<Self, AppError> {
        match std::env::var("CARSPEC_BASE_URL") {
            Ok(raw) if !raw.trim().is_empty() => Self::new(raw.trim()),
            _ => Ok(Self::default()),
        }
    }

    fn model_path(&self, target: &ScrapeTarget) -> String {
        format!(
            "{}/{}/{}/{}",
            self.base_url,
            target.make.to_lowercase(),
            target.model.to_lowercase(),
            target.year
        )
    }

    pub fn specs_url(&self, target: &ScrapeTarget) -> String {
        format!("{}/specs/", self.model_path(target))
    }

    pub fn consumer_reviews_url(&self, target: &ScrapeTarget) -> String {
        format!("{}/consumer-reviews/", self.model_path(target))
    }

    pub fn expert_review_url(&self, target: &ScrapeTarget) -> String {
        format!("{}/", self.model_path(target))
    }

    /// Resolve a possibly relative link against the site.
    pub fn absolute_url(&self, href: &str) -> String {
        if href.starts_with('/') {
            format!("{}{}", self.base_url, href)
        } else {
            href.to_string()
        }
    }
}

/// Fixed per-phase ceilings and settle delays. Set once per worker.
#[derive(Debug, Clone)]
pub struct ScrapeTimings {
    /// Settle after the initial page load.
    pub initial_settle: Duration,
    /// Wait for the document root element.
    pub root_wait: Duration,
    /// Wait for the trim comparison table.
    pub specs_table_wait: Duration,
    /// Wait for the body-type tab container.
    pub tab_container_wait: Duration,
    /// Presence-wait poll interval.
    pub element_poll: Duration,
    /// Content-signature poll interval after a tab click.
    pub tab_poll_interval: Duration,
    /// Maximum wait for the signature to change.
    pub tab_max_wait: Duration,
    /// Settle after the signature changed.
    pub tab_settle: Duration,
    /// Settle before reading the table of the active tab.
    pub table_settle: Duration,
    /// Delay between style-page visits in the overview fallback.
    pub style_delay: Duration,
    /// Settle after loading a review page.
    pub review_settle: Duration,
    /// Ceiling on a liveness probe round-trip.
    pub ping_timeout: Duration,
}

impl Default for ScrapeTimings {
    fn default() -> Self {
        Self {
            initial_settle: Duration::from_secs(3),
            root_wait: Duration::from_secs(10),
            specs_table_wait: Duration::from_secs(15),
            tab_container_wait: Duration::from_secs(10),
            element_poll: Duration::from_millis(250),
            tab_poll_interval: Duration::from_millis(500),
            tab_max_wait: Duration::from_secs(10),
            tab_settle: Duration::from_millis(500),
            table_settle: Duration::from_secs(1),
            style_delay: Duration::from_secs(2),
            review_settle: Duration::from_secs(2),
            ping_timeout: Duration::from_secs(5),
        }
    }
}

impl ScrapeTimings {
    /// Millisecond-scale timings, for tests against scripted sessions.
    pub fn instant() -> Self {
        Self {
            initial_settle: Duration::ZERO,
            root_wait: Duration::from_millis(20),
            specs_table_wait: Duration::from_millis(20),
            tab_container_wait: Duration::from_millis(20),
            element_poll: Duration::from_millis(5),
            tab_poll_interval: Duration::from_millis(5),
            tab_max_wait: Duration::from_millis(30),
            tab_settle: Duration::ZERO,
            table_settle: Duration::ZERO,
            style_delay: Duration::ZERO,
            review_settle: Duration::ZERO,
            ping_timeout: Duration::from_millis(50),
        }
    }
}

/// Launch options for the automation session.
#[derive(Debug, Clone)]
pub struct BrowserOptions {
    pub headless: bool,
    /// Explicit browser binary; falls back to well-known install paths.
    pub chrome_bin: Option<String>,
    pub window_size: (u32, u32),
    pub user_agent: String,
    /// Hide the `navigator.webdriver` automation flag.
    pub mask_automation: bool,
    pub disable_images: bool,
    /// Ceiling on a single page load.
    pub page_load_timeout: Duration,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            headless: true,
            chrome_bin: None,
            window_size: (1920, 1080),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                .to_string(),
            mask_automation: true,
            disable_images: true,
            page_load_timeout: Duration::from_secs(30),
        }
    }
}

impl BrowserOptions {
    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    pub fn with_chrome_bin(mut self, bin: Option<String>) -> Self {
        self.chrome_bin = bin;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_specs_url_lowercases() {
        let site = SiteConfig::default();
        let t = ScrapeTarget::new("Toyota", "Camry", 2020);
        assert_eq!(site.specs_url(&t), "https://www.kbb.com/toyota/camry/2020/specs/");
        assert_eq!(
            site.consumer_reviews_url(&t),
            "https://www.kbb.com/toyota/camry/2020/consumer-reviews/"
        );
        assert_eq!(site.expert_review_url(&t), "https://www.kbb.com/toyota/camry/2020/");
    }

    #[test]
    fn test_site_config_validation() {
        assert!(SiteConfig::new("not a url").is_err());
        assert!(SiteConfig::new("ftp://example.com").is_err());
        let ok = SiteConfig::new("http://localhost:8080/").unwrap();
        assert_eq!(ok.base_url, "http://localhost:8080");
    }

    #[test]
    fn test_absolute_url() {
        let site = SiteConfig::default();
        assert_eq!(
            site.absolute_url("/honda/fit/2015/styles/?x=1"),
            "https://www.kbb.com/honda/fit/2015/styles/?x=1"
        );
        assert_eq!(site.absolute_url("https://a.b/c"), "https://a.b/c");
    }
}
