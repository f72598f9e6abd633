//! Title, readable text and outbound links from a fetched page.

use crate::session::canonicalize;
use lazy_static::lazy_static;
use url::Url;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;

/// Elements whose text never counts as page content.
const EXCLUDED: &[&str] = &["script", "style", "noscript", "template", "header", "footer", "nav", "aside"];

lazy_static! {
    static ref TITLE: Selector = Selector::parse("title").unwrap();
    static ref HEADING: Selector = Selector::parse("h1, h2").unwrap();
    static ref BODY: Selector = Selector::parse("body").unwrap();
    static ref ANCHOR: Selector = Selector::parse("a[href]").unwrap();
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedPage {
    pub title: String,
    pub text: String,
    /// Canonical, deduplicated, in document order.
    pub links: Vec<Url>,
}

fn collapse(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn element_text(el: ElementRef<'_>) -> String {
    collapse(&el.text().collect::<Vec<_>>().join(" "))
}

/// Links are resolved against `base`, which should be the post-redirect URL.
pub fn extract_html(html: &str, base: &Url) -> ExtractedPage {
    let doc = Html::parse_document(html);

    let mut title = doc.select(&TITLE).next().map(element_text).unwrap_or_default();
    if title.is_empty() {
        title = doc.select(&HEADING).map(element_text).find(|t| !t.is_empty()).unwrap_or_default();
    }

    let root = doc.select(&BODY).next().unwrap_or_else(|| doc.root_element());
    let mut parts: Vec<&str> = Vec::new();
    for node in root.descendants() {
        let Some(text) = node.value().as_text() else { continue };
        let excluded = node.ancestors().any(|a| {
            a.value().as_element().map_or(false, |e| EXCLUDED.contains(&e.name()))
        });
        if !excluded {
            parts.push(&**text);
        }
    }
    let text = collapse(&parts.join(" "));

    let mut seen = HashSet::new();
    let mut links = Vec::new();
    for a in doc.select(&ANCHOR) {
        let Some(href) = a.value().attr("href") else { continue };
        let Ok(resolved) = base.join(href.trim()) else { continue };
        let Some(canon) = canonicalize(&resolved) else { continue };
        if seen.insert(canon.as_str().to_string()) {
            links.push(canon);
        }
    }

    ExtractedPage { title, text, links }
}

/// Plain-text bodies have no markup: no title and no links.
pub fn extract_plain(body: &str) -> ExtractedPage {
    ExtractedPage { title: String::new(), text: collapse(body), links: Vec::new() }
}
