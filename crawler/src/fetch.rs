//! HTTP fetching behind a trait so the crawl loop can run against any source.

use crate::CrawlConfig;
use reqwest::redirect::Policy;
use reqwest::{header, Client};
use scholar_core::catalog::DomainCatalog;
use url::Url;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("timeout after {0:?}")]
    Timeout(Duration),
    #[error("content too large: {0} bytes")]
    TooLarge(usize),
}

/// Any HTTP response, successful or not. Transport failures are `FetchError`s.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// URL after redirects.
    pub url: Url,
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

impl FetchedPage {
    pub fn is_success(&self) -> bool { (200..300).contains(&self.status) }
}

#[allow(async_fn_in_trait)]
pub trait Fetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchedPage, FetchError>;
}

pub struct HttpFetcher {
    client: Client,
    timeout: Duration,
    max_bytes: usize,
}

const MAX_REDIRECTS: usize = 5;

impl HttpFetcher {
    /// Follows up to five redirects, and only while they stay inside
    /// `catalog`. A hop to any other host is not taken; the 3xx response
    /// itself is returned.
    pub fn new(config: &CrawlConfig, catalog: DomainCatalog) -> Result<Self, FetchError> {
        let policy = Policy::custom(move |attempt| {
            if attempt.previous().len() >= MAX_REDIRECTS {
                attempt.error("too many redirects")
            } else if redirect_allowed(&catalog, attempt.url()) {
                attempt.follow()
            } else {
                attempt.stop()
            }
        });
        Self::build(config, policy)
    }

    fn build(config: &CrawlConfig, policy: Policy) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .redirect(policy)
            .timeout(config.request_timeout)
            .gzip(true)
            .brotli(true)
            .build()?;
        Ok(Self { client, timeout: config.request_timeout, max_bytes: config.max_content_bytes })
    }

    fn classify_error(&self, e: reqwest::Error) -> FetchError {
        if e.is_timeout() { FetchError::Timeout(self.timeout) } else { FetchError::Http(e) }
    }
}

fn redirect_allowed(catalog: &DomainCatalog, target: &Url) -> bool {
    matches!(target.scheme(), "http" | "https")
        && target.host_str().map_or(false, |h| catalog.match_domain(h).is_some())
}

impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchedPage, FetchError> {
        let resp = self.client.get(url.clone()).send().await.map_err(|e| self.classify_error(e))?;
        if let Some(len) = resp.content_length() {
            if len as usize > self.max_bytes { return Err(FetchError::TooLarge(len as usize)); }
        }
        let status = resp.status().as_u16();
        let final_url = resp.url().clone();
        let content_type = resp
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let bytes = resp.bytes().await.map_err(|e| self.classify_error(e))?;
        if bytes.len() > self.max_bytes { return Err(FetchError::TooLarge(bytes.len())); }
        let body = String::from_utf8_lossy(&bytes).to_string();
        Ok(FetchedPage { url: final_url, status, content_type, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scholar_core::catalog::CatalogEntry;

    #[test]
    fn redirects_stay_inside_the_catalog() {
        let catalog = DomainCatalog::new(vec![CatalogEntry {
            domain: "a.edu".into(),
            category: "test".into(),
            max_pages: 5,
            seeds: vec![],
        }])
        .unwrap();
        let url = |s: &str| Url::parse(s).unwrap();
        assert!(redirect_allowed(&catalog, &url("https://a.edu/new")));
        assert!(redirect_allowed(&catalog, &url("http://lib.a.edu/x")));
        assert!(!redirect_allowed(&catalog, &url("https://evil.com/landing")));
        assert!(!redirect_allowed(&catalog, &url("ftp://a.edu/file")));
        assert!(HttpFetcher::new(&CrawlConfig::default(), catalog).is_ok());
    }
}
