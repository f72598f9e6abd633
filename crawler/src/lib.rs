//! Polite breadth-first crawler over an allowlisted set of domains.
//!
//! One [`Crawler::crawl`] call owns all of its state. Requests (robots.txt
//! included) pass through a single global throttle, so the loop is sequential.

pub mod classify;
pub mod extract;
pub mod fetch;
pub mod robots;
pub mod session;

use classify::{mime_essence, ContentClassifier, ContentKind, MimeClassifier};
use fetch::{FetchError, FetchedPage, Fetcher, HttpFetcher};
use robots::RobotsRules;
use url::Url;
use scholar_core::catalog::DomainCatalog;
use scholar_core::dump::CrawlState;
use scholar_core::{Document, UrlEdge};
use serde::Serialize;
use session::{canonicalize, CrawlSession, FrontierEntry};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

pub const DEFAULT_USER_AGENT: &str = "AcademicSearchBot/2.0 (+https://example.com/academic-search-bot-info)";
const PROGRESS_EVERY: usize = 25;

#[derive(Debug, Clone)]
pub struct CrawlConfig {
    pub user_agent: String,
    pub request_timeout: Duration,
    /// Larger bodies are discarded.
    pub max_content_bytes: usize,
    /// Pages with less extracted text are discarded as thin.
    pub min_text_chars: usize,
    /// Upper bound on a robots.txt `Crawl-delay`.
    pub max_crawl_delay: Duration,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            request_timeout: Duration::from_secs(10),
            max_content_bytes: 2_500_000,
            min_text_chars: 512,
            max_crawl_delay: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CrawlLimits {
    pub max_pages: usize,
    pub max_depth: u32,
    /// Minimum spacing between any two requests.
    pub delay: Duration,
    /// Stop fetching once this much time has passed.
    pub time_budget: Option<Duration>,
}

impl Default for CrawlLimits {
    fn default() -> Self {
        Self { max_pages: 150, max_depth: 2, delay: Duration::from_secs(1), time_budget: None }
    }
}

impl CrawlLimits {
    /// Negative or non-finite delays are treated as zero.
    pub fn new(max_pages: usize, max_depth: u32, delay_secs: f64) -> Self {
        let delay = Duration::try_from_secs_f64(delay_secs.max(0.0)).unwrap_or(Duration::ZERO);
        Self { max_pages, max_depth, delay, time_budget: None }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    NotHttp,
    NotAllowlisted,
    DepthExceeded,
    QuotaExhausted,
    AlreadySeen,
    RobotsDisallowed,
    UnsupportedContent(String),
    ThinContent(usize),
    TooLarge(usize),
    HttpStatus(u16),
    FetchFailed(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CrawlStats {
    pub fetched: usize,
    pub not_http: usize,
    pub not_allowlisted: usize,
    pub depth_exceeded: usize,
    pub quota_exhausted: usize,
    pub already_seen: usize,
    pub robots_disallowed: usize,
    pub unsupported_content: usize,
    pub thin_content: usize,
    pub too_large: usize,
    pub http_status: usize,
    pub fetch_failed: usize,
    pub robots_fetched: usize,
    pub stopped_early: bool,
}

impl CrawlStats {
    pub fn record(&mut self, reason: &SkipReason) {
        let slot = match reason {
            SkipReason::NotHttp => &mut self.not_http,
            SkipReason::NotAllowlisted => &mut self.not_allowlisted,
            SkipReason::DepthExceeded => &mut self.depth_exceeded,
            SkipReason::QuotaExhausted => &mut self.quota_exhausted,
            SkipReason::AlreadySeen => &mut self.already_seen,
            SkipReason::RobotsDisallowed => &mut self.robots_disallowed,
            SkipReason::UnsupportedContent(_) => &mut self.unsupported_content,
            SkipReason::ThinContent(_) => &mut self.thin_content,
            SkipReason::TooLarge(_) => &mut self.too_large,
            SkipReason::HttpStatus(_) => &mut self.http_status,
            SkipReason::FetchFailed(_) => &mut self.fetch_failed,
        };
        *slot += 1;
    }
}

#[derive(Debug, Clone, Default)]
pub struct CrawlOutput {
    pub documents: Vec<Document>,
    pub edges: Vec<UrlEdge>,
    pub stats: CrawlStats,
    /// Resume point for [`Crawler::crawl_from`].
    pub state: CrawlState,
}

pub struct Crawler<F, C = MimeClassifier> {
    catalog: DomainCatalog,
    fetcher: F,
    classifier: C,
    config: CrawlConfig,
}

impl Crawler<HttpFetcher> {
    /// reqwest-backed crawler whose redirects stop at the allowlist boundary.
    pub fn http(catalog: DomainCatalog, config: CrawlConfig) -> Result<Self, FetchError> {
        let fetcher = HttpFetcher::new(&config, catalog.clone())?;
        Ok(Self::new(catalog, fetcher, MimeClassifier::default(), config))
    }
}

impl<F: Fetcher, C: ContentClassifier> Crawler<F, C> {
    pub fn new(catalog: DomainCatalog, fetcher: F, classifier: C, config: CrawlConfig) -> Self {
        Self { catalog, fetcher, classifier, config }
    }

    pub fn fetcher(&self) -> &F { &self.fetcher }

    /// Breadth-first crawl from `seeds`. Per-URL failures are skips; the
    /// result is whatever was collected when the frontier ran dry, a limit was
    /// hit or the time budget ran out.
    pub async fn crawl(&self, seeds: &[String], limits: &CrawlLimits) -> CrawlOutput {
        self.crawl_from(seeds, limits, CrawlState::default()).await
    }

    /// Like [`crawl`](Self::crawl), continuing from a previous run's state:
    /// its leftover frontier goes first and nothing it visited is fetched
    /// again. Per-domain quotas count the documents it already kept.
    pub async fn crawl_from(&self, seeds: &[String], limits: &CrawlLimits, state: CrawlState) -> CrawlOutput {
        let started = Instant::now();
        let deadline = limits.time_budget.map(|b| started + b);
        let resumed = !state.is_empty();
        let mut session = CrawlSession::resume(deadline, state);

        for seed in seeds {
            match Url::parse(seed.trim()) {
                Ok(url) => {
                    if let Err(reason) = session.enqueue(&url, 0, None, limits.max_depth, &self.catalog) {
                        debug!(url = %url, ?reason, "seed skipped");
                        session.skip(&reason);
                    }
                }
                Err(e) => {
                    debug!(seed = %seed, error = %e, "invalid seed");
                    session.skip(&SkipReason::NotHttp);
                }
            }
        }
        info!(
            seeds = seeds.len(),
            resumed,
            queued = session.frontier_len(),
            max_pages = limits.max_pages,
            max_depth = limits.max_depth,
            delay_ms = limits.delay.as_millis() as u64,
            "crawl started"
        );

        while let Some(entry) = session.pop() {
            if session.documents.len() >= limits.max_pages {
                debug!("page limit reached");
                session.requeue_front(entry);
                break;
            }
            if session.out_of_time() {
                session.stats.stopped_early = true;
                session.requeue_front(entry);
                break;
            }
            let outcome = self.visit(&mut session, &entry, limits).await;
            match outcome {
                Visit::Indexed => {
                    let n = session.documents.len();
                    if n % PROGRESS_EVERY == 0 {
                        info!(
                            fetched = n,
                            visited = session.visited_len(),
                            frontier = session.frontier_len(),
                            "crawl progress"
                        );
                    }
                }
                Visit::Skipped(reason) => {
                    debug!(url = %entry.url, depth = entry.depth, ?reason, "skipped");
                    session.skip(&reason);
                }
                Visit::OutOfTime => {
                    session.stats.stopped_early = true;
                    session.requeue_front(entry);
                    break;
                }
            }
        }

        info!(
            documents = session.documents.len(),
            edges = session.edges.len(),
            stopped_early = session.stats.stopped_early,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "crawl finished"
        );
        let state = session.state();
        let CrawlSession { documents, edges, stats, .. } = session;
        CrawlOutput { documents, edges, stats, state }
    }

    async fn visit(&self, session: &mut CrawlSession, entry: &FrontierEntry, limits: &CrawlLimits) -> Visit {
        if entry.depth > limits.max_depth {
            return Visit::Skipped(SkipReason::DepthExceeded);
        }
        if let Err(reason) = self.admit(session, &entry.url) {
            return Visit::Skipped(reason);
        }
        let rules = match self.robots(session, &entry.url, limits).await {
            Some(rules) => rules,
            None => return Visit::OutOfTime,
        };
        if !rules.is_allowed(entry.url.path()) {
            return Visit::Skipped(SkipReason::RobotsDisallowed);
        }

        let delay = match rules.crawl_delay() {
            Some(d) => limits.delay.max(d.min(self.config.max_crawl_delay)),
            None => limits.delay,
        };
        if !session.throttle(delay).await {
            return Visit::OutOfTime;
        }

        let page = match self.fetch_page(&entry.url).await {
            Ok(page) => page,
            Err(reason) => return Visit::Skipped(reason),
        };

        // a redirect lands on a new URL that must pass the same gates
        let landed = canonicalize(&page.url).unwrap_or_else(|| entry.url.clone());
        let domain = if landed == entry.url {
            self.catalog.match_domain(landed.host_str().unwrap_or_default())
        } else {
            debug!(from = %entry.url, to = %landed, "redirected");
            let domain = match self.admit(session, &landed) {
                Ok(d) => d,
                Err(reason) => return Visit::Skipped(reason),
            };
            let rules = match self.robots(session, &landed, limits).await {
                Some(rules) => rules,
                None => return Visit::OutOfTime,
            };
            if !rules.is_allowed(landed.path()) {
                return Visit::Skipped(SkipReason::RobotsDisallowed);
            }
            if !session.mark_visited(&landed) {
                return Visit::Skipped(SkipReason::AlreadySeen);
            }
            Some(domain)
        };
        let Some(domain) = domain else {
            return Visit::Skipped(SkipReason::NotAllowlisted);
        };

        let (doc, links) = match self.extract_document(entry, &landed, domain, &page) {
            Ok(found) => found,
            Err(reason) => return Visit::Skipped(reason),
        };
        let source = doc.url.clone();
        for link in &links {
            session.edges.push(UrlEdge::new(source.clone(), link.as_str()));
            if let Err(reason) = session.enqueue(link, entry.depth + 1, Some(source.as_str()), limits.max_depth, &self.catalog) {
                if reason != SkipReason::AlreadySeen {
                    debug!(url = %link, ?reason, "link not queued");
                }
                session.skip(&reason);
            }
        }
        session.record_document(doc);
        Visit::Indexed
    }

    /// Allowlist and quota gate. Returns the catalog domain of `url`.
    fn admit(&self, session: &CrawlSession, url: &Url) -> Result<&str, SkipReason> {
        let host = url.host_str().unwrap_or_default();
        let domain = self.catalog.match_domain(host).ok_or(SkipReason::NotAllowlisted)?;
        if session.fetched_for(domain) >= self.catalog.quota_for(domain) {
            return Err(SkipReason::QuotaExhausted);
        }
        Ok(domain)
    }

    /// Cached robots rules for the origin of `url`, fetched through the
    /// throttle on first use. `None` when the time budget ran out.
    async fn robots(&self, session: &mut CrawlSession, url: &Url, limits: &CrawlLimits) -> Option<RobotsRules> {
        let origin = url.origin().ascii_serialization();
        if session.robots_for(&origin).is_none() {
            if !session.throttle(limits.delay).await {
                return None;
            }
            let rules = self.fetch_robots(url).await;
            session.stats.robots_fetched += 1;
            session.cache_robots(origin.clone(), rules);
        }
        Some(session.robots_for(&origin).cloned().unwrap_or_default())
    }

    async fn fetch_robots(&self, url: &Url) -> RobotsRules {
        let Ok(robots_url) = url.join("/robots.txt") else { return RobotsRules::allow_all() };
        match self.fetcher.fetch(&robots_url).await {
            Ok(page) if page.is_success() => RobotsRules::parse(&page.body, &self.config.user_agent),
            Ok(page) => {
                debug!(url = %robots_url, status = page.status, "no robots.txt, allowing all");
                RobotsRules::allow_all()
            }
            Err(e) => {
                warn!(url = %robots_url, error = %e, "robots.txt fetch failed, allowing all");
                RobotsRules::allow_all()
            }
        }
    }

    async fn fetch_page(&self, url: &Url) -> Result<FetchedPage, SkipReason> {
        let page = self.fetcher.fetch(url).await.map_err(|e| {
            warn!(url = %url, error = %e, "fetch failed");
            match e {
                FetchError::TooLarge(n) => SkipReason::TooLarge(n),
                other => SkipReason::FetchFailed(other.to_string()),
            }
        })?;
        if !page.is_success() {
            warn!(url = %url, status = page.status, "non-success status");
            return Err(SkipReason::HttpStatus(page.status));
        }
        if page.body.len() > self.config.max_content_bytes {
            return Err(SkipReason::TooLarge(page.body.len()));
        }
        Ok(page)
    }

    /// The document keeps the URL it was queued under; links resolve against
    /// `landed`, where the response actually came from.
    fn extract_document(
        &self,
        entry: &FrontierEntry,
        landed: &Url,
        domain: &str,
        page: &FetchedPage,
    ) -> Result<(Document, Vec<Url>), SkipReason> {
        let extracted = match self.classifier.classify(page) {
            ContentKind::Html => extract::extract_html(&page.body, landed),
            ContentKind::PlainText => extract::extract_plain(&page.body),
            ContentKind::Unsupported => {
                let mime = page.content_type.as_deref().map(mime_essence).unwrap_or_default();
                return Err(SkipReason::UnsupportedContent(mime));
            }
        };

        let chars = extracted.text.chars().count();
        if chars < self.config.min_text_chars {
            return Err(SkipReason::ThinContent(chars));
        }
        let doc = Document {
            url: entry.url.as_str().to_string(),
            title: extracted.title,
            text: extracted.text,
            depth: entry.depth,
            domain: domain.to_string(),
        };
        Ok((doc, extracted.links))
    }
}

enum Visit {
    Indexed,
    Skipped(SkipReason),
    OutOfTime,
}
