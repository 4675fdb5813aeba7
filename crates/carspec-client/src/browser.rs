use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use carspec_core::config::BrowserOptions;
use carspec_core::error::AppError;
use carspec_core::traits::{AutomationSession, ElementSnapshot, Locator, SessionFactory};
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use serde_json::Value;
use tokio::task::JoinHandle;

/// Hides the most common automation fingerprints before any page script runs.
const MASK_SCRIPT: &str = r#"
Object.defineProperty(navigator, 'webdriver', { get: () => undefined });
Object.defineProperty(navigator, 'languages', { get: () => ['en-US', 'en'] });
window.chrome = window.chrome || { runtime: {} };
"#;

/// Ceiling on a single script evaluation.
const SCRIPT_TIMEOUT: Duration = Duration::from_secs(15);

/// Ceiling on each teardown step (page close, browser close, process exit).
const CLOSE_TIMEOUT: Duration = Duration::from_secs(10);

/// Script expression yielding an array of the nodes matching `locator`.
fn nodes_expr(locator: &Locator) -> String {
    match locator {
        Locator::Css(selector) => format!(
            "Array.from(document.querySelectorAll({}))",
            js_string(selector)
        ),
        Locator::XPath(expr) => format!(
            "(() => {{ const r = document.evaluate({}, document, null, \
             XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null); const out = []; \
             for (let i = 0; i < r.snapshotLength; i++) out.push(r.snapshotItem(i)); \
             return out; }})()",
            js_string(expr)
        ),
    }
}

fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

/// Wrap `body` in a function with `nodes` bound to the locator's matches.
fn script(locator: &Locator, body: &str) -> String {
    format!(
        "(() => {{ const nodes = {}; {} }})()",
        nodes_expr(locator),
        body
    )
}

const COUNT_BODY: &str = "return nodes.length;";

const SNAPSHOT_BODY: &str = "return nodes.map(n => ({ \
    text: (n.innerText || n.textContent || '').trim(), \
    attributes: Object.fromEntries(Array.from(n.attributes || []).map(a => [a.name, a.value])), \
    displayed: !!(n.offsetWidth || n.offsetHeight || (n.getClientRects && n.getClientRects().length)), \
    enabled: !n.disabled }));";

const OUTER_HTML_BODY: &str = "return nodes.map(n => n.outerHTML);";

fn click_body(index: usize) -> String {
    format!(
        "const n = nodes[{index}]; if (!n) return false; \
         n.scrollIntoView({{ block: 'center' }}); n.click(); return true;"
    )
}

/// Tries to locate a Chrome/Chromium binary.
///
/// An explicit path wins, then `CHROME_BIN`, then well-known install
/// locations (the snap wrapper rejects headless flags, so the real binary
/// inside the snap comes first). `None` lets chromiumoxide do its own lookup.
fn find_chrome_binary(explicit: Option<&str>) -> Option<PathBuf> {
    let candidates: &[&str] = &[
        "/snap/chromium/current/usr/lib/chromium-browser/chrome",
        "/var/lib/flatpak/exports/bin/org.chromium.Chromium",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/google-chrome",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
    ];

    let env = std::env::var("CHROME_BIN").ok();
    explicit
        .map(str::to_string)
        .into_iter()
        .chain(env)
        .map(PathBuf::from)
        .chain(candidates.iter().map(PathBuf::from))
        .find(|p| p.exists())
}

fn launch_args(options: &BrowserOptions) -> Vec<String> {
    let mut args = vec![
        "--disable-gpu".to_string(),
        "--disable-dev-shm-usage".to_string(),
        "--disable-extensions".to_string(),
        "--disable-popup-blocking".to_string(),
        "--disable-translate".to_string(),
        "--no-first-run".to_string(),
        format!("--user-agent={}", options.user_agent),
    ];
    if options.headless {
        args.push("--headless=new".to_string());
    }
    if options.mask_automation {
        args.push("--disable-blink-features=AutomationControlled".to_string());
    }
    if options.disable_images {
        args.push("--blink-settings=imagesEnabled=false".to_string());
    }
    args
}

async fn bounded<T, F>(limit: Duration, fut: F) -> Result<T, AppError>
where
    F: Future<Output = Result<T, AppError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(inner) => inner,
        Err(_) => Err(AppError::Timeout(limit.as_millis() as u64)),
    }
}

/// The process-level steps of tearing a browser down.
trait BrowserProcess {
    async fn request_close(&mut self) -> Result<(), AppError>;
    async fn wait_exit(&mut self) -> Result<(), AppError>;
    async fn kill(&mut self);
}

impl BrowserProcess for Browser {
    async fn request_close(&mut self) -> Result<(), AppError> {
        Browser::close(self)
            .await
            .map(|_| ())
            .map_err(|e| AppError::BrowserError(format!("Browser close failed: {e}")))
    }

    async fn wait_exit(&mut self) -> Result<(), AppError> {
        Browser::wait(self).await?;
        Ok(())
    }

    async fn kill(&mut self) {
        if let Some(Err(e)) = Browser::kill(self).await {
            tracing::debug!("Browser kill failed: {e}");
        }
    }
}

/// Ask the browser to close and wait for it to exit. A browser that refuses,
/// errors or hangs in either step is killed. Never blocks past a few `limit`s.
async fn shutdown<P: BrowserProcess>(process: &mut P, limit: Duration) {
    let graceful = match bounded(limit, process.request_close()).await {
        Ok(()) => bounded(limit, process.wait_exit()).await,
        Err(e) => Err(e),
    };
    if let Err(e) = graceful {
        tracing::debug!(error = %e, "Browser did not shut down cleanly, killing it");
        let killed = bounded(limit, async {
            process.kill().await;
            Ok(())
        })
        .await;
        if killed.is_err() {
            tracing::warn!("Browser process did not die within {limit:?}");
        }
    }
}

/// One Chromium process driving a single tab.
///
/// The browser is owned by the session so a crashed session can be torn
/// down completely and replaced by the factory.
pub struct ChromiumSession {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
    page_load_timeout: Duration,
}

impl ChromiumSession {
    async fn eval<T: serde::de::DeserializeOwned>(&self, js: String) -> Result<T, AppError> {
        bounded(SCRIPT_TIMEOUT, async {
            let result = self
                .page
                .evaluate(js)
                .await
                .map_err(|e| AppError::BrowserError(format!("Script failed: {e}")))?;
            result
                .into_value::<T>()
                .map_err(|e| AppError::BrowserError(format!("Unexpected script result: {e}")))
        })
        .await
    }
}

impl AutomationSession for ChromiumSession {
    async fn goto(&self, url: &str) -> Result<(), AppError> {
        bounded(self.page_load_timeout, async {
            self.page
                .goto(url)
                .await
                .map_err(|e| AppError::BrowserError(format!("Failed to navigate to {url}: {e}")))?;
            Ok(())
        })
        .await
    }

    async fn title(&self) -> Result<String, AppError> {
        let title = self
            .page
            .get_title()
            .await
            .map_err(|e| AppError::BrowserError(format!("Failed to read title: {e}")))?;
        Ok(title.unwrap_or_default())
    }

    async fn page_source(&self) -> Result<String, AppError> {
        bounded(SCRIPT_TIMEOUT, async {
            self.page
                .content()
                .await
                .map_err(|e| AppError::BrowserError(format!("Failed to read page content: {e}")))
        })
        .await
    }

    async fn current_url(&self) -> Result<String, AppError> {
        let url = self
            .page
            .url()
            .await
            .map_err(|e| AppError::BrowserError(format!("Failed to read URL: {e}")))?;
        Ok(url.unwrap_or_default())
    }

    async fn count(&self, locator: &Locator) -> Result<usize, AppError> {
        self.eval(script(locator, COUNT_BODY)).await
    }

    async fn elements(&self, locator: &Locator) -> Result<Vec<ElementSnapshot>, AppError> {
        self.eval(script(locator, SNAPSHOT_BODY)).await
    }

    async fn click(&self, locator: &Locator, index: usize) -> Result<bool, AppError> {
        self.eval(script(locator, &click_body(index))).await
    }

    async fn outer_html(&self, locator: &Locator) -> Result<Vec<String>, AppError> {
        self.eval(script(locator, OUTER_HTML_BODY)).await
    }

    async fn ping(&self) -> Result<(), AppError> {
        let _: Value = self.eval("1".to_string()).await?;
        Ok(())
    }

    async fn close(self) {
        let Self {
            mut browser,
            page,
            handler,
            ..
        } = self;
        let page_closed = bounded(CLOSE_TIMEOUT, async {
            page.close()
                .await
                .map_err(|e| AppError::BrowserError(e.to_string()))
        })
        .await;
        if let Err(e) = page_closed {
            tracing::debug!(error = %e, "Page close failed");
        }
        shutdown(&mut browser, CLOSE_TIMEOUT).await;
        handler.abort();
    }
}

/// Launches a fresh Chromium process per session.
#[derive(Debug, Clone, Default)]
pub struct ChromiumSessionFactory {
    options: BrowserOptions,
}

impl ChromiumSessionFactory {
    pub fn new(options: BrowserOptions) -> Self {
        Self { options }
    }

    fn config(&self) -> Result<BrowserConfig, AppError> {
        let (width, height) = self.options.window_size;
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .disable_default_args()
            .window_size(width, height)
            .user_data_dir(
                std::env::temp_dir().join(format!("carspec-chrome-{}", std::process::id())),
            );

        if let Some(bin) = find_chrome_binary(self.options.chrome_bin.as_deref()) {
            tracing::info!("Using Chrome binary: {}", bin.display());
            builder = builder.chrome_executable(bin);
        }
        if !self.options.headless {
            builder = builder.with_head();
        }
        for arg in launch_args(&self.options) {
            builder = builder.arg(arg);
        }

        builder
            .build()
            .map_err(|e| AppError::ConfigError(format!("Browser config error: {e}")))
    }
}

impl SessionFactory for ChromiumSessionFactory {
    type Session = ChromiumSession;

    async fn create(&self) -> Result<ChromiumSession, AppError> {
        let (mut browser, mut handler) = Browser::launch(self.config()?)
            .await
            .map_err(|e| AppError::BrowserError(format!("Failed to launch browser: {e}")))?;

        // The CDP handler must be polled continuously for the connection to work.
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    tracing::warn!("Browser CDP handler error: {event:?}");
                    break;
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                let _ = browser.close().await;
                handler.abort();
                return Err(AppError::BrowserError(format!("Failed to open tab: {e}")));
            }
        };

        if self.options.mask_automation {
            if let Err(e) = page
                .execute(AddScriptToEvaluateOnNewDocumentParams::new(MASK_SCRIPT))
                .await
            {
                tracing::warn!("Could not install automation mask: {e}");
            }
        }

        tracing::info!(headless = self.options.headless, "Browser session ready");
        Ok(ChromiumSession {
            browser,
            page,
            handler,
            page_load_timeout: self.options.page_load_timeout,
        })
    }
}
