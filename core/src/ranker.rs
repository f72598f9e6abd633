//! Hybrid ranking: TF-IDF cosine fused with PageRank.
//!
//! `score = alpha * cosine + (1 - alpha) * pagerank`. Only documents with a
//! non-zero cosine are candidates, so authority alone never surfaces a page.

use crate::persist::Snapshot;
use crate::tokenizer::tokenize;
use crate::{DocId, Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RankerConfig {
    /// Relevance weight in [0, 1].
    pub alpha: f64,
    /// Maximum excerpt length in chars.
    pub excerpt_chars: usize,
    /// Width of the sliding window used to locate the densest match region.
    pub excerpt_window_words: usize,
}

impl Default for RankerConfig {
    fn default() -> Self {
        Self { alpha: 0.85, excerpt_chars: 300, excerpt_window_words: 40 }
    }
}

impl RankerConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.alpha) {
            return Err(Error::InvalidConfig(format!("alpha must be in [0, 1], got {}", self.alpha)));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// 1-based position in the result list.
    pub rank: usize,
    pub doc_id: DocId,
    pub url: String,
    pub title: String,
    pub excerpt: String,
    pub score: f64,
    pub cosine: f64,
    pub pagerank: f64,
}

/// Raw text handed to downstream summarization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextPassage {
    pub url: String,
    pub title: String,
    pub text: String,
}

pub struct Ranker<'a> {
    snapshot: &'a Snapshot,
    config: RankerConfig,
}

impl<'a> Ranker<'a> {
    pub fn new(snapshot: &'a Snapshot, config: RankerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { snapshot, config })
    }

    pub fn config(&self) -> &RankerConfig { &self.config }

    /// At most `top_k` hits, best first; equal scores fall back to doc id order.
    pub fn search(&self, query: &str, top_k: usize) -> Vec<SearchHit> {
        if top_k == 0 { return Vec::new(); }
        let candidates = self.snapshot.index.cosine_scores(query);
        if candidates.is_empty() { return Vec::new(); }

        let alpha = self.config.alpha;
        let mut scored: Vec<(DocId, f64, f64, f64)> = candidates
            .into_iter()
            .map(|(doc_id, cosine)| {
                let pr = self.snapshot.pagerank.get(doc_id as usize).copied().unwrap_or(0.0);
                (doc_id, alpha * cosine + (1.0 - alpha) * pr, cosine, pr)
            })
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        scored.truncate(top_k);

        let query_terms: HashSet<String> = tokenize(query).into_iter().collect();
        scored
            .into_iter()
            .enumerate()
            .filter_map(|(i, (doc_id, score, cosine, pagerank))| {
                let doc = self.snapshot.document(doc_id)?;
                Some(SearchHit {
                    rank: i + 1,
                    doc_id,
                    url: doc.url.clone(),
                    title: doc.title.clone(),
                    excerpt: excerpt(&doc.text, &query_terms, self.config.excerpt_window_words, self.config.excerpt_chars),
                    score,
                    cosine,
                    pagerank,
                })
            })
            .collect()
    }

    /// Split a `max_chars` budget of raw document text across `hits`.
    pub fn gather_context(&self, hits: &[SearchHit], max_chars: usize) -> Vec<ContextPassage> {
        let budget = per_hit_budget(max_chars, hits.len());
        let mut out = Vec::new();
        let mut consumed = 0usize;
        for hit in hits {
            let Some(doc) = self.snapshot.document(hit.doc_id) else { continue };
            let text: String = doc.text.chars().take(budget).collect();
            consumed += text.chars().count();
            out.push(ContextPassage { url: doc.url.clone(), title: doc.title.clone(), text });
            if consumed >= max_chars { break; }
        }
        out
    }
}

/// Per-item share of `max_chars`; with nothing to share, the whole budget.
pub fn per_hit_budget(max_chars: usize, items: usize) -> usize {
    if items == 0 { max_chars } else { max_chars / items }
}

/// A window of `window_words` words around the region with the most query
/// matches, cut to `max_chars`. Without matches the text's opening is used.
pub fn excerpt(text: &str, query_terms: &HashSet<String>, window_words: usize, max_chars: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() || max_chars == 0 { return String::new(); }
    let window = window_words.clamp(1, words.len());

    let hits: Vec<u32> = words
        .iter()
        .map(|w| u32::from(tokenize(w).iter().any(|t| query_terms.contains(t))))
        .collect();

    let mut count: u32 = hits[..window].iter().sum();
    let (mut best, mut best_start) = (count, 0usize);
    for start in 1..=(words.len() - window) {
        count = count + hits[start + window - 1] - hits[start - 1];
        if count > best {
            best = count;
            best_start = start;
        }
    }

    let joined = words[best_start..best_start + window].join(" ");
    if joined.chars().count() <= max_chars {
        return joined;
    }
    let cut: String = joined.chars().take(max_chars).collect();
    // avoid ending mid-word when a boundary exists
    match cut.rfind(' ') {
        Some(i) if i > 0 => cut[..i].to_string(),
        _ => cut,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::IndexConfig;
    use crate::pagerank::PageRankParams;
    use crate::{Document, UrlEdge};

    fn doc(url: &str, title: &str, text: &str) -> Document {
        Document { url: url.into(), title: title.into(), text: text.into(), depth: 0, domain: "a.edu".into() }
    }

    fn snapshot() -> Snapshot {
        let docs = vec![
            doc("https://a.edu/0", "Glaciers", "glacier ice melt and glacier retreat in polar regions"),
            doc("https://a.edu/1", "Volcanoes", "magma chambers feed volcanic eruptions"),
            doc("https://a.edu/2", "", "sea ice and glacier calving"),
            doc("https://a.edu/3", "", "polar bears hunt on sea ice"),
        ];
        let edges = vec![
            UrlEdge::new("https://a.edu/1", "https://a.edu/2"),
            UrlEdge::new("https://a.edu/3", "https://a.edu/2"),
            UrlEdge::new("https://a.edu/0", "https://a.edu/2"),
        ];
        Snapshot::build(docs, &edges, &IndexConfig::default(), &PageRankParams::default()).unwrap()
    }

    fn terms(q: &str) -> HashSet<String> { tokenize(q).into_iter().collect() }

    #[test]
    fn only_overlapping_documents_are_returned() {
        let snap = snapshot();
        let ranker = Ranker::new(&snap, RankerConfig::default()).unwrap();
        let hits = ranker.search("glacier", 10);
        let ids: HashSet<DocId> = hits.iter().map(|h| h.doc_id).collect();
        assert_eq!(ids, HashSet::from([0, 2]));
        // doc 2 has the highest PageRank but no overlap with this query
        assert!(ranker.search("magma", 10).iter().all(|h| h.doc_id == 1));
    }

    #[test]
    fn scores_fuse_cosine_and_pagerank() {
        let snap = snapshot();
        let config = RankerConfig { alpha: 0.6, ..RankerConfig::default() };
        let ranker = Ranker::new(&snap, config).unwrap();
        for h in ranker.search("ice", 10) {
            let expected = 0.6 * h.cosine + 0.4 * snap.pagerank[h.doc_id as usize];
            assert!((h.score - expected).abs() < 1e-12);
            assert!(h.cosine > 0.0);
        }
    }

    #[test]
    fn respects_top_k_and_ordering() {
        let snap = snapshot();
        let ranker = Ranker::new(&snap, RankerConfig::default()).unwrap();
        let hits = ranker.search("ice glacier polar sea", 2);
        assert_eq!(hits.len(), 2);
        assert!(hits[0].score >= hits[1].score);
        assert_eq!(hits[0].rank, 1);
        assert!(ranker.search("ice", 0).is_empty());
        assert_eq!(ranker.search("ice glacier", 5), ranker.search("ice glacier", 5));
    }

    #[test]
    fn ties_break_by_doc_id() {
        let docs = vec![doc("u0", "", "nebula"), doc("u1", "", "nebula"), doc("u2", "", "quasar")];
        let snap = Snapshot::build(docs, &[], &IndexConfig::default(), &PageRankParams::default()).unwrap();
        let ranker = Ranker::new(&snap, RankerConfig::default()).unwrap();
        let hits = ranker.search("nebula", 10);
        assert_eq!(hits.iter().map(|h| h.doc_id).collect::<Vec<_>>(), vec![0, 1]);
    }

    #[test]
    fn degenerate_queries_return_nothing() {
        let snap = snapshot();
        let ranker = Ranker::new(&snap, RankerConfig::default()).unwrap();
        assert!(ranker.search("", 10).is_empty());
        assert!(ranker.search("the of and", 10).is_empty());
        assert!(ranker.search("   ", 10).is_empty());
    }

    #[test]
    fn rejects_alpha_out_of_range() {
        let snap = snapshot();
        assert!(Ranker::new(&snap, RankerConfig { alpha: 1.2, ..RankerConfig::default() }).is_err());
    }

    #[test]
    fn excerpt_centers_on_densest_region() {
        let filler = "lorem ".repeat(60);
        let text = format!("{filler} the coral reef supports reef fish {filler}");
        let ex = excerpt(&text, &terms("reef"), 8, 300);
        assert!(ex.contains("coral reef supports reef"));
        assert!(ex.split_whitespace().count() <= 8);
    }

    #[test]
    fn excerpt_without_match_uses_opening() {
        let ex = excerpt("alpha beta gamma delta", &terms("zeta"), 2, 300);
        assert_eq!(ex, "alpha beta");
        assert_eq!(excerpt("", &terms("zeta"), 2, 300), "");
    }

    #[test]
    fn excerpt_is_bounded_and_char_safe() {
        let text = "ééééé ".repeat(100);
        let ex = excerpt(&text, &terms("zeta"), 100, 17);
        assert!(ex.chars().count() <= 17);
    }

    #[test]
    fn context_budget_never_divides_by_zero() {
        assert_eq!(per_hit_budget(6000, 0), 6000);
        assert_eq!(per_hit_budget(6000, 4), 1500);
        let snap = snapshot();
        let ranker = Ranker::new(&snap, RankerConfig::default()).unwrap();
        assert!(ranker.gather_context(&[], 6000).is_empty());
        let hits = ranker.search("ice", 10);
        let ctx = ranker.gather_context(&hits, 20);
        assert!(!ctx.is_empty());
        let budget = per_hit_budget(20, hits.len());
        assert!(ctx.iter().all(|c| c.text.chars().count() <= budget));
    }
}
