//! Mutable state of one crawl: frontier, visited set, per-domain counts,
//! robots cache and the request throttle.

use crate::robots::RobotsRules;
use crate::{CrawlStats, SkipReason};
use url::Url;
use scholar_core::catalog::DomainCatalog;
use scholar_core::dump::{CrawlState, PendingUrl};
use scholar_core::{Document, UrlEdge};
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;
use tokio::time::{sleep_until, Instant};

/// Fragment and query removed, host lowercased, empty path as `/`.
/// Only http(s) URLs with a host have a canonical form.
pub fn canonicalize(url: &Url) -> Option<Url> {
    if !matches!(url.scheme(), "http" | "https") { return None; }
    url.host_str().filter(|h| !h.is_empty())?;
    let mut u = url.clone();
    u.set_fragment(None);
    u.set_query(None);
    if u.path().is_empty() { u.set_path("/"); }
    Some(u)
}

#[derive(Debug, Clone, PartialEq)]
pub struct FrontierEntry {
    pub url: Url,
    pub depth: u32,
    pub referrer: Option<String>,
}

pub(crate) struct CrawlSession {
    frontier: VecDeque<FrontierEntry>,
    visited: HashSet<String>,
    per_domain: HashMap<String, usize>,
    robots: HashMap<String, RobotsRules>,
    last_request: Option<Instant>,
    deadline: Option<Instant>,
    pub stats: CrawlStats,
    pub documents: Vec<Document>,
    pub edges: Vec<UrlEdge>,
}

impl CrawlSession {
    pub fn new(deadline: Option<Instant>) -> Self {
        Self {
            frontier: VecDeque::new(),
            visited: HashSet::new(),
            per_domain: HashMap::new(),
            robots: HashMap::new(),
            last_request: None,
            deadline,
            stats: CrawlStats::default(),
            documents: Vec::new(),
            edges: Vec::new(),
        }
    }

    /// Pick up where a previous run stopped. Its visited URLs are never
    /// queued again and its leftover frontier is crawled first, in order.
    pub fn resume(deadline: Option<Instant>, state: CrawlState) -> Self {
        let mut session = Self::new(deadline);
        session.visited.extend(state.visited);
        session.per_domain.extend(state.per_domain);
        for pending in state.frontier {
            let Some(url) = Url::parse(&pending.url).ok().as_ref().and_then(canonicalize) else { continue };
            session.visited.insert(url.as_str().to_string());
            session.frontier.push_back(FrontierEntry { url, depth: pending.depth, referrer: None });
        }
        session
    }

    /// Queue `url` unless it is too deep, outside the catalog or already seen.
    /// A queued URL is marked visited immediately, so it is fetched at most once.
    pub fn enqueue(
        &mut self,
        url: &Url,
        depth: u32,
        referrer: Option<&str>,
        max_depth: u32,
        catalog: &DomainCatalog,
    ) -> Result<(), SkipReason> {
        let url = canonicalize(url).ok_or(SkipReason::NotHttp)?;
        if depth > max_depth { return Err(SkipReason::DepthExceeded); }
        let host = url.host_str().unwrap_or_default();
        if catalog.match_domain(host).is_none() { return Err(SkipReason::NotAllowlisted); }
        if !self.visited.insert(url.as_str().to_string()) { return Err(SkipReason::AlreadySeen); }
        self.frontier.push_back(FrontierEntry { url, depth, referrer: referrer.map(|s| s.to_string()) });
        Ok(())
    }

    pub fn pop(&mut self) -> Option<FrontierEntry> { self.frontier.pop_front() }

    /// Put back an entry that was popped but never fetched.
    pub fn requeue_front(&mut self, entry: FrontierEntry) { self.frontier.push_front(entry); }

    /// Mark a URL reached some other way (a redirect target). `false` if it
    /// was already known.
    pub fn mark_visited(&mut self, url: &Url) -> bool {
        self.visited.insert(url.as_str().to_string())
    }

    pub fn frontier_len(&self) -> usize { self.frontier.len() }

    pub fn visited_len(&self) -> usize { self.visited.len() }

    pub fn fetched_for(&self, domain: &str) -> usize {
        self.per_domain.get(domain).copied().unwrap_or(0)
    }

    pub fn record_document(&mut self, doc: Document) {
        *self.per_domain.entry(doc.domain.clone()).or_insert(0) += 1;
        self.stats.fetched += 1;
        self.documents.push(doc);
    }

    pub fn skip(&mut self, reason: &SkipReason) { self.stats.record(reason); }

    pub fn robots_for(&self, origin: &str) -> Option<&RobotsRules> { self.robots.get(origin) }

    pub fn cache_robots(&mut self, origin: String, rules: RobotsRules) {
        self.robots.insert(origin, rules);
    }

    /// Leftover frontier, visited set and per-domain counts. Sorted so the
    /// saved file is stable between runs.
    pub fn state(&self) -> CrawlState {
        let mut visited: Vec<String> = self.visited.iter().cloned().collect();
        visited.sort();
        CrawlState {
            visited,
            frontier: self
                .frontier
                .iter()
                .map(|e| PendingUrl { url: e.url.as_str().to_string(), depth: e.depth })
                .collect(),
            per_domain: self.per_domain.iter().map(|(d, n)| (d.clone(), *n)).collect(),
        }
    }

    pub fn out_of_time(&self) -> bool {
        self.deadline.map_or(false, |d| Instant::now() >= d)
    }

    /// Wait until `delay` has passed since the previous request, then claim
    /// the slot. Returns `false` without waiting when the slot would fall past
    /// the deadline.
    pub async fn throttle(&mut self, delay: Duration) -> bool {
        let ready = match self.last_request {
            Some(last) => last + delay,
            None => Instant::now(),
        };
        if self.deadline.map_or(false, |d| ready >= d) {
            return false;
        }
        sleep_until(ready).await;
        self.last_request = Some(Instant::now());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scholar_core::catalog::CatalogEntry;

    fn catalog() -> DomainCatalog {
        DomainCatalog::new(vec![CatalogEntry {
            domain: "a.edu".into(),
            category: "test".into(),
            max_pages: 5,
            seeds: vec![],
        }])
        .unwrap()
    }

    fn url(s: &str) -> Url { Url::parse(s).unwrap() }

    #[test]
    fn canonical_form_drops_fragment_and_query() {
        assert_eq!(canonicalize(&url("HTTPS://A.EDU/p?x=1#frag")).unwrap().as_str(), "https://a.edu/p");
        assert_eq!(canonicalize(&url("http://a.edu")).unwrap().as_str(), "http://a.edu/");
        assert!(canonicalize(&url("ftp://a.edu/file")).is_none());
        assert!(canonicalize(&url("mailto:me@a.edu")).is_none());
    }

    #[test]
    fn enqueue_filters_and_dedupes() {
        let cat = catalog();
        let mut s = CrawlSession::new(None);
        assert!(s.enqueue(&url("https://a.edu/p1"), 0, None, 2, &cat).is_ok());
        assert!(s.enqueue(&url("https://www.a.edu/p"), 0, None, 2, &cat).is_ok());
        assert_eq!(s.enqueue(&url("https://a.edu/p1#x"), 1, None, 2, &cat), Err(SkipReason::AlreadySeen));
        assert_eq!(s.enqueue(&url("https://c.org/"), 0, None, 2, &cat), Err(SkipReason::NotAllowlisted));
        assert_eq!(s.enqueue(&url("https://a.edu/deep"), 3, None, 2, &cat), Err(SkipReason::DepthExceeded));
        assert_eq!(s.frontier_len(), 2);
        assert_eq!(s.pop().unwrap().url.as_str(), "https://a.edu/p1");
    }

    #[test]
    fn resumed_session_keeps_frontier_order_and_visited() {
        let cat = catalog();
        let mut s = CrawlSession::new(None);
        s.enqueue(&url("https://a.edu/p1"), 0, None, 2, &cat).unwrap();
        s.enqueue(&url("https://a.edu/p2"), 1, None, 2, &cat).unwrap();
        let first = s.pop().unwrap();
        s.requeue_front(first);
        let state = s.state();
        assert_eq!(state.frontier.len(), 2);
        assert_eq!(state.frontier[0].url, "https://a.edu/p1");

        let mut r = CrawlSession::resume(None, state);
        assert_eq!(r.frontier_len(), 2);
        assert_eq!(r.enqueue(&url("https://a.edu/p2"), 1, None, 2, &cat), Err(SkipReason::AlreadySeen));
        assert!(!r.mark_visited(&url("https://a.edu/p1")));
        assert!(r.mark_visited(&url("https://a.edu/p3")));
        let e = r.pop().unwrap();
        assert_eq!((e.url.as_str(), e.depth), ("https://a.edu/p1", 0));
    }

    #[tokio::test]
    async fn throttle_spaces_requests() {
        let mut s = CrawlSession::new(None);
        let start = Instant::now();
        assert!(s.throttle(Duration::from_millis(30)).await);
        assert!(s.throttle(Duration::from_millis(30)).await);
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[tokio::test]
    async fn throttle_refuses_past_deadline() {
        let mut s = CrawlSession::new(Some(Instant::now() + Duration::from_millis(10)));
        assert!(s.throttle(Duration::from_secs(5)).await);
        assert!(!s.throttle(Duration::from_secs(5)).await);
    }
}
