use serde::{Deserialize, Serialize};

pub mod catalog;
pub mod dump;
pub mod error;
pub mod graph;
pub mod index;
pub mod pagerank;
pub mod persist;
pub mod ranker;
pub mod tokenizer;

pub use error::{Error, Result};

pub type TermId = u32;
pub type DocId = u32;

/// A crawled page. Identity is the canonical URL; the `DocId` used by the
/// index is the document's position in the crawl order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub url: String,
    pub title: String,
    pub text: String,
    pub depth: u32,
    /// Catalog domain the page was admitted under, e.g. `nasa.gov`.
    pub domain: String,
}

/// A hyperlink observed while crawling, keyed by canonical URLs.
/// The target may never have been fetched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UrlEdge {
    pub source: String,
    pub target: String,
}

impl UrlEdge {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self { source: source.into(), target: target.into() }
    }
}
