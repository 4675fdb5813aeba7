//! Test utilities: scripted mock implementations of the core traits.
//!
//! All mocks use `Arc<Mutex<_>>` so clones share state and tests can assert
//! on recorded calls after the code under test has consumed its copy.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::dataset::Dataset;
use crate::error::AppError;
use crate::models::{MergeReport, RawScrape, SaveReport, ScrapeTarget};
use crate::orchestrator::{WorkerExit, WorkerSpec};
use crate::reviews::ReviewData;
use crate::traits::{
    AutomationSession, ElementSnapshot, Locator, OutputMerger, ResultSink, SessionFactory,
    WorkerLauncher,
};

fn locator_key(locator: &Locator) -> &str {
    match locator {
        Locator::Css(s) | Locator::XPath(s) => s,
    }
}

/// A visible, enabled element with the given text.
pub fn element(text: &str) -> ElementSnapshot {
    ElementSnapshot {
        text: text.to_string(),
        attributes: HashMap::new(),
        displayed: true,
        enabled: true,
    }
}

/// Same as [`element`] with extra attributes.
pub fn element_with(text: &str, attrs: &[(&str, &str)]) -> ElementSnapshot {
    let mut el = element(text);
    for (k, v) in attrs {
        el.attributes.insert((*k).to_string(), (*v).to_string());
    }
    el
}

// ---------------------------------------------------------------------------
// MockPage
// ---------------------------------------------------------------------------

/// How a scripted entry matches a locator expression.
#[derive(Debug, Clone)]
enum KeyMatch {
    Exact(String),
    Contains(String),
}

impl KeyMatch {
    fn matches(&self, expr: &str) -> bool {
        match self {
            KeyMatch::Exact(k) => k == expr,
            KeyMatch::Contains(k) => expr.contains(k.as_str()),
        }
    }
}

fn lookup<'a, T>(entries: &'a [(KeyMatch, T)], expr: &str) -> Option<&'a T> {
    entries.iter().find(|(k, _)| k.matches(expr)).map(|(_, v)| v)
}

/// Mutable slot for exactly `key`, created empty when missing.
fn slot<T: Default>(entries: &mut Vec<(KeyMatch, T)>, key: KeyMatch) -> &mut T {
    let same = |k: &KeyMatch| match (k, &key) {
        (KeyMatch::Exact(a), KeyMatch::Exact(b)) => a == b,
        (KeyMatch::Contains(a), KeyMatch::Contains(b)) => a == b,
        _ => false,
    };
    let idx = match entries.iter().position(|(k, _)| same(k)) {
        Some(i) => i,
        None => {
            entries.push((key, T::default()));
            entries.len() - 1
        }
    };
    &mut entries[idx].1
}

/// One rendered page: title, source, URL and what each locator finds.
#[derive(Debug, Clone, Default)]
pub struct MockPage {
    title: String,
    source: String,
    url: String,
    counts: Vec<(KeyMatch, usize)>,
    elements: Vec<(KeyMatch, Vec<ElementSnapshot>)>,
    html: Vec<(KeyMatch, Vec<String>)>,
}

impl MockPage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.title = title.to_string();
        self
    }

    pub fn with_source(mut self, source: &str) -> Self {
        self.source = source.to_string();
        self
    }

    pub fn with_url(mut self, url: &str) -> Self {
        self.url = url.to_string();
        self
    }

    /// Fixed match count for an exact locator expression.
    pub fn with_count(mut self, expr: &str, n: usize) -> Self {
        *slot(&mut self.counts, KeyMatch::Exact(expr.to_string())) = n;
        self
    }

    /// Append an element for an exact locator expression.
    pub fn with_element(mut self, expr: &str, el: ElementSnapshot) -> Self {
        slot(&mut self.elements, KeyMatch::Exact(expr.to_string())).push(el);
        self
    }

    /// Elements returned for every locator whose expression contains `fragment`.
    pub fn with_elements_containing(mut self, fragment: &str, els: Vec<ElementSnapshot>) -> Self {
        *slot(&mut self.elements, KeyMatch::Contains(fragment.to_string())) = els;
        self
    }

    /// Append an outer-HTML snapshot for an exact locator expression.
    pub fn with_html(mut self, expr: &str, html: &str) -> Self {
        slot(&mut self.html, KeyMatch::Exact(expr.to_string())).push(html.to_string());
        self
    }

    fn count(&self, expr: &str) -> usize {
        if let Some(n) = lookup(&self.counts, expr) {
            return *n;
        }
        if let Some(els) = lookup(&self.elements, expr) {
            return els.len();
        }
        lookup(&self.html, expr).map_or(0, Vec::len)
    }
}

// ---------------------------------------------------------------------------
// MockSession
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct SessionState {
    page: MockPage,
    /// Page loaded by `goto` for a given URL.
    routes: HashMap<String, MockPage>,
    /// Page swapped in when an element whose expression contains the key is clicked.
    click_effects: Vec<(String, MockPage)>,
    goto_errors: HashMap<String, AppError>,
    crash_on: Vec<String>,
    visited: Vec<String>,
    clicks: Vec<(String, usize)>,
    dead: bool,
    closed: bool,
}

/// Scripted automation session. Clones share one state.
#[derive(Debug, Clone, Default)]
pub struct MockSession {
    state: Arc<Mutex<SessionState>>,
}

impl MockSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_page(page: MockPage) -> Self {
        let s = Self::default();
        s.state.lock().unwrap().page = page;
        s
    }

    fn edit_page(self, f: impl FnOnce(MockPage) -> MockPage) -> Self {
        {
            let mut st = self.state.lock().unwrap();
            let page = std::mem::take(&mut st.page);
            st.page = f(page);
        }
        self
    }

    pub fn with_title(self, title: &str) -> Self {
        self.edit_page(|p| p.with_title(title))
    }

    pub fn with_source(self, source: &str) -> Self {
        self.edit_page(|p| p.with_source(source))
    }

    pub fn with_url(self, url: &str) -> Self {
        self.edit_page(|p| p.with_url(url))
    }

    pub fn with_count(self, expr: &str, n: usize) -> Self {
        self.edit_page(|p| p.with_count(expr, n))
    }

    pub fn with_element(self, expr: &str, el: ElementSnapshot) -> Self {
        self.edit_page(|p| p.with_element(expr, el))
    }

    pub fn with_elements_containing(self, fragment: &str, els: Vec<ElementSnapshot>) -> Self {
        self.edit_page(|p| p.with_elements_containing(fragment, els))
    }

    pub fn with_html(self, expr: &str, html: &str) -> Self {
        self.edit_page(|p| p.with_html(expr, html))
    }

    /// Page rendered after `goto(url)`. The page's own URL defaults to `url`.
    pub fn with_route(self, url: &str, mut page: MockPage) -> Self {
        if page.url.is_empty() {
            page.url = url.to_string();
        }
        self.state.lock().unwrap().routes.insert(url.to_string(), page);
        self
    }

    pub fn with_click_effect(self, fragment: &str, page: MockPage) -> Self {
        self.state
            .lock()
            .unwrap()
            .click_effects
            .push((fragment.to_string(), page));
        self
    }

    /// `goto(url)` fails with `error` while the session stays alive.
    pub fn with_goto_error(self, url: &str, error: AppError) -> Self {
        self.state.lock().unwrap().goto_errors.insert(url.to_string(), error);
        self
    }

    /// `goto(url)` kills the session.
    pub fn with_crash_on(self, url: &str) -> Self {
        self.state.lock().unwrap().crash_on.push(url.to_string());
        self
    }

    pub fn dead(self) -> Self {
        self.state.lock().unwrap().dead = true;
        self
    }

    pub fn visited(&self) -> Vec<String> {
        self.state.lock().unwrap().visited.clone()
    }

    pub fn clicks(&self) -> Vec<(String, usize)> {
        self.state.lock().unwrap().clicks.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().unwrap().closed
    }

    fn check_alive(&self) -> Result<(), AppError> {
        if self.state.lock().unwrap().dead {
            Err(AppError::BrowserError("session is gone".into()))
        } else {
            Ok(())
        }
    }

    fn read<T>(&self, f: impl FnOnce(&MockPage) -> T) -> Result<T, AppError> {
        self.check_alive()?;
        Ok(f(&self.state.lock().unwrap().page))
    }
}

impl AutomationSession for MockSession {
    async fn goto(&self, url: &str) -> Result<(), AppError> {
        self.check_alive()?;
        let mut st = self.state.lock().unwrap();
        st.visited.push(url.to_string());
        if st.crash_on.iter().any(|u| u == url) {
            st.dead = true;
            return Err(AppError::BrowserError(format!("crashed loading {url}")));
        }
        if let Some(err) = st.goto_errors.remove(url) {
            return Err(err);
        }
        let page = match st.routes.get(url) {
            Some(page) => page.clone(),
            None => MockPage::new().with_url(url),
        };
        st.page = page;
        Ok(())
    }

    async fn title(&self) -> Result<String, AppError> {
        self.read(|p| p.title.clone())
    }

    async fn page_source(&self) -> Result<String, AppError> {
        self.read(|p| p.source.clone())
    }

    async fn current_url(&self) -> Result<String, AppError> {
        self.read(|p| p.url.clone())
    }

    async fn count(&self, locator: &Locator) -> Result<usize, AppError> {
        self.read(|p| p.count(locator_key(locator)))
    }

    async fn elements(&self, locator: &Locator) -> Result<Vec<ElementSnapshot>, AppError> {
        self.read(|p| lookup(&p.elements, locator_key(locator)).cloned().unwrap_or_default())
    }

    async fn click(&self, locator: &Locator, index: usize) -> Result<bool, AppError> {
        self.check_alive()?;
        let expr = locator_key(locator);
        let mut st = self.state.lock().unwrap();
        let exists = lookup(&st.page.elements, expr).is_some_and(|els| index < els.len());
        if !exists {
            return Ok(false);
        }
        st.clicks.push((expr.to_string(), index));
        let effect = st
            .click_effects
            .iter()
            .find(|(fragment, _)| expr.contains(fragment.as_str()))
            .map(|(_, page)| page.clone());
        if let Some(page) = effect {
            st.page = page;
        }
        Ok(true)
    }

    async fn outer_html(&self, locator: &Locator) -> Result<Vec<String>, AppError> {
        self.read(|p| lookup(&p.html, locator_key(locator)).cloned().unwrap_or_default())
    }

    async fn ping(&self) -> Result<(), AppError> {
        self.check_alive()
    }

    async fn close(self) {
        self.state.lock().unwrap().closed = true;
    }
}

// ---------------------------------------------------------------------------
// MockSessionFactory
// ---------------------------------------------------------------------------

/// Hands out queued sessions; fails once the queue is empty.
#[derive(Debug, Clone, Default)]
pub struct MockSessionFactory {
    sessions: Arc<Mutex<VecDeque<MockSession>>>,
    created: Arc<Mutex<usize>>,
}

impl MockSessionFactory {
    pub fn new(sessions: Vec<MockSession>) -> Self {
        Self {
            sessions: Arc::new(Mutex::new(sessions.into())),
            created: Arc::new(Mutex::new(0)),
        }
    }

    pub fn created(&self) -> usize {
        *self.created.lock().unwrap()
    }
}

impl SessionFactory for MockSessionFactory {
    type Session = MockSession;

    async fn create(&self) -> Result<MockSession, AppError> {
        let next = self.sessions.lock().unwrap().pop_front();
        match next {
            Some(s) => {
                *self.created.lock().unwrap() += 1;
                Ok(s)
            }
            None => Err(AppError::BrowserError("no browser available".into())),
        }
    }
}

// ---------------------------------------------------------------------------
// MockSink
// ---------------------------------------------------------------------------

/// Records everything it is asked to persist.
#[derive(Debug, Clone, Default)]
pub struct MockSink {
    pub scrapes: Arc<Mutex<Vec<(RawScrape, Dataset)>>>,
    pub reviews: Arc<Mutex<Vec<(ScrapeTarget, ReviewData)>>>,
    pub debug_html: Arc<Mutex<Vec<(String, String)>>>,
    error: Arc<Mutex<Option<AppError>>>,
}

impl MockSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `save_scrape` fails with `error`.
    pub fn with_error(error: AppError) -> Self {
        let sink = Self::default();
        *sink.error.lock().unwrap() = Some(error);
        sink
    }

    pub fn scrape_count(&self) -> usize {
        self.scrapes.lock().unwrap().len()
    }

    pub fn debug_kinds(&self) -> Vec<String> {
        self.debug_html
            .lock()
            .unwrap()
            .iter()
            .map(|(k, _)| k.clone())
            .collect()
    }
}

impl ResultSink for MockSink {
    async fn save_scrape(
        &self,
        scrape: &RawScrape,
        dataset: &Dataset,
    ) -> Result<SaveReport, AppError> {
        if let Some(e) = self.error.lock().unwrap().take() {
            return Err(e);
        }
        self.scrapes
            .lock()
            .unwrap()
            .push((scrape.clone(), dataset.clone()));
        Ok(SaveReport {
            rows_written: dataset.len(),
            rows_skipped: 0,
        })
    }

    async fn save_reviews(
        &self,
        target: &ScrapeTarget,
        reviews: &ReviewData,
    ) -> Result<(), AppError> {
        self.reviews
            .lock()
            .unwrap()
            .push((target.clone(), reviews.clone()));
        Ok(())
    }

    async fn save_debug_html(&self, kind: &str, html: &str) -> Result<Option<PathBuf>, AppError> {
        self.debug_html
            .lock()
            .unwrap()
            .push((kind.to_string(), html.to_string()));
        Ok(Some(PathBuf::from(format!("raw/debug/{kind}.html"))))
    }
}

// ---------------------------------------------------------------------------
// MockLauncher / MockMerger
// ---------------------------------------------------------------------------

/// Records launches; workers whose id is listed in `failing` exit non-zero.
#[derive(Debug, Clone, Default)]
pub struct MockLauncher {
    pub launched: Arc<Mutex<Vec<WorkerSpec>>>,
    failing: Vec<usize>,
}

impl MockLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(ids: &[usize]) -> Self {
        Self {
            launched: Arc::default(),
            failing: ids.to_vec(),
        }
    }
}

impl WorkerLauncher for MockLauncher {
    async fn launch(&self, spec: &WorkerSpec) -> Result<WorkerExit, AppError> {
        self.launched.lock().unwrap().push(spec.clone());
        let success = !self.failing.contains(&spec.id);
        Ok(WorkerExit {
            id: spec.id,
            success,
            code: Some(if success { 0 } else { 1 }),
        })
    }
}

/// Records merge calls and returns an empty report.
#[derive(Debug, Clone, Default)]
pub struct MockMerger {
    pub calls: Arc<Mutex<Vec<(Vec<PathBuf>, PathBuf)>>>,
}

impl OutputMerger for MockMerger {
    fn merge(&self, worker_roots: &[PathBuf], dest: &Path) -> Result<MergeReport, AppError> {
        self.calls
            .lock()
            .unwrap()
            .push((worker_roots.to_vec(), dest.to_path_buf()));
        Ok(MergeReport::default())
    }
}
