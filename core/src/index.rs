//! TF-IDF inverted index and cosine scoring.
//!
//! Weights are `tf * idf * boost` with sublinear tf (`1 + ln(count)`) and a
//! multiplicative boost for terms that occur in the document's own title.
//! Postings keep the unnormalized weight; per-document L2 norms are stored so
//! query-time cosine is exact.

use crate::tokenizer::tokenize;
use crate::{DocId, Document, Error, Result, TermId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

pub const DEFAULT_TITLE_BOOST: f32 = 2.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum IdfMode {
    /// `ln(N / df)`. A term present in every document weighs zero.
    Standard,
    /// `ln(1 + N / df)`.
    #[default]
    Smoothed,
}

impl IdfMode {
    pub fn idf(self, num_docs: u32, df: u32) -> f32 {
        let n = num_docs.max(1) as f32;
        let df = df.max(1) as f32;
        match self {
            IdfMode::Standard => (n / df).ln(),
            IdfMode::Smoothed => (1.0 + n / df).ln(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndexConfig {
    pub title_boost: f32,
    pub idf: IdfMode,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self { title_boost: DEFAULT_TITLE_BOOST, idf: IdfMode::default() }
    }
}

impl IndexConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.title_boost.is_finite() || self.title_boost <= 0.0 {
            return Err(Error::InvalidConfig(format!("title boost must be positive, got {}", self.title_boost)));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Posting {
    pub doc_id: DocId,
    /// Raw occurrence count in the body (1 for title-only terms).
    pub tf: u32,
    /// Title-boosted tf-idf weight, not length-normalized.
    pub weight: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvertedIndex {
    pub dictionary: HashMap<String, TermId>,
    pub df: Vec<u32>,
    pub idf: Vec<f32>,
    pub postings: Vec<Vec<Posting>>, // indexed by term id, sorted by doc_id
    pub doc_norms: Vec<f32>,
    pub num_docs: u32,
    pub config: IndexConfig,
}

/// Build the index over `documents`; `DocId` is the position in the slice.
pub fn build_index(documents: &[Document], config: &IndexConfig) -> Result<InvertedIndex> {
    config.validate()?;
    let num_docs = documents.len() as u32;

    let mut dictionary: HashMap<String, TermId> = HashMap::new();
    let mut df: Vec<u32> = Vec::new();
    // (doc_id, count, boosted sublinear tf) per term; idf is applied once df is known
    let mut raw: Vec<Vec<(DocId, u32, f32)>> = Vec::new();

    for (doc_id, doc) in documents.iter().enumerate() {
        let doc_id = doc_id as DocId;
        let title_terms: HashSet<String> = tokenize(&doc.title).into_iter().collect();

        let mut counts: BTreeMap<TermId, u32> = BTreeMap::new();
        let mut boosted: HashSet<TermId> = HashSet::new();
        let mut intern = |term: String| -> TermId {
            *dictionary.entry(term).or_insert_with(|| {
                df.push(0);
                raw.push(Vec::new());
                (df.len() - 1) as TermId
            })
        };

        for term in tokenize(&doc.text) {
            let in_title = title_terms.contains(&term);
            let tid = intern(term);
            *counts.entry(tid).or_insert(0) += 1;
            if in_title { boosted.insert(tid); }
        }
        // title-only terms still retrieve the document
        let mut title_only: Vec<&String> = title_terms.iter().collect();
        title_only.sort();
        for term in title_only {
            let tid = intern(term.clone());
            counts.entry(tid).or_insert(1);
            boosted.insert(tid);
        }

        for (tid, count) in counts {
            let mut tf = 1.0 + (count as f32).ln();
            if boosted.contains(&tid) { tf *= config.title_boost; }
            df[tid as usize] += 1;
            raw[tid as usize].push((doc_id, count, tf));
        }
    }

    let idf: Vec<f32> = df.iter().map(|&d| config.idf.idf(num_docs, d)).collect();
    let mut doc_norms: Vec<f32> = vec![0.0; num_docs as usize];
    let mut postings: Vec<Vec<Posting>> = Vec::with_capacity(raw.len());
    for (tid, plist) in raw.into_iter().enumerate() {
        let term_idf = idf[tid];
        let mut out: Vec<Posting> = Vec::with_capacity(plist.len());
        for (doc_id, count, tf) in plist {
            let weight = tf * term_idf;
            doc_norms[doc_id as usize] += weight * weight;
            out.push(Posting { doc_id, tf: count, weight });
        }
        postings.push(out);
    }
    for n in doc_norms.iter_mut() { *n = n.sqrt(); }

    tracing::info!(num_docs, num_terms = dictionary.len(), "built inverted index");
    Ok(InvertedIndex { dictionary, df, idf, postings, doc_norms, num_docs, config: *config })
}

impl InvertedIndex {
    pub fn num_terms(&self) -> usize { self.dictionary.len() }

    pub fn term_id(&self, term: &str) -> Option<TermId> { self.dictionary.get(term).copied() }

    pub fn postings_for(&self, term: &str) -> &[Posting] {
        self.term_id(term)
            .and_then(|t| self.postings.get(t as usize))
            .map(|p| p.as_slice())
            .unwrap_or(&[])
    }

    /// Cosine similarity of `query` against every document sharing at least one
    /// weighted term. Zero-overlap documents are absent. Sorted by doc id.
    pub fn cosine_scores(&self, query: &str) -> Vec<(DocId, f64)> {
        let mut q_counts: BTreeMap<TermId, u32> = BTreeMap::new();
        for term in tokenize(query) {
            if let Some(tid) = self.term_id(&term) {
                *q_counts.entry(tid).or_insert(0) += 1;
            }
        }
        if q_counts.is_empty() { return Vec::new(); }

        let mut q_weights: Vec<(TermId, f64)> = Vec::with_capacity(q_counts.len());
        let mut q_norm = 0.0f64;
        for (tid, count) in q_counts {
            let w = (1.0 + (count as f64).ln()) * self.idf[tid as usize] as f64;
            q_norm += w * w;
            q_weights.push((tid, w));
        }
        let q_norm = q_norm.sqrt();
        if q_norm == 0.0 { return Vec::new(); }

        let mut dots: BTreeMap<DocId, f64> = BTreeMap::new();
        for (tid, q_w) in q_weights {
            if q_w == 0.0 { continue; }
            for p in &self.postings[tid as usize] {
                *dots.entry(p.doc_id).or_insert(0.0) += q_w * p.weight as f64;
            }
        }

        dots.into_iter()
            .filter_map(|(doc_id, dot)| {
                let d_norm = self.doc_norms.get(doc_id as usize).copied().unwrap_or(0.0) as f64;
                if dot <= 0.0 || d_norm == 0.0 { return None; }
                Some((doc_id, dot / (q_norm * d_norm)))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(url: &str, title: &str, text: &str) -> Document {
        Document { url: url.into(), title: title.into(), text: text.into(), depth: 0, domain: "a.edu".into() }
    }

    fn reef_corpus() -> Vec<Document> {
        vec![
            doc("https://a.edu/coral", "Coral Reefs", "A reef."),
            doc("https://a.edu/untitled", "", "reef reef reef reef reef"),
        ]
    }

    #[test]
    fn title_boost_only_applies_to_own_title() {
        let idx = build_index(&reef_corpus(), &IndexConfig::default()).unwrap();
        let reef = idx.postings_for("reef");
        assert_eq!(reef.len(), 2);
        let idf = idx.idf[idx.term_id("reef").unwrap() as usize];
        assert!((reef[0].weight / idf - DEFAULT_TITLE_BOOST).abs() < 1e-5);
        assert_eq!(reef[1].tf, 5);
        assert!((reef[1].weight / idf - (1.0 + 5f32.ln())).abs() < 1e-5);
    }

    #[test]
    fn untitled_heavy_doc_ranks_first_for_reef() {
        let idx = build_index(&reef_corpus(), &IndexConfig::default()).unwrap();
        let mut scores = idx.cosine_scores("reef");
        scores.sort_by(|a, b| b.1.total_cmp(&a.1));
        assert_eq!(scores.len(), 2);
        assert_eq!(scores[0].0, 1);
        assert!(scores[0].1 > scores[1].1);
    }

    #[test]
    fn zero_overlap_is_excluded() {
        let docs = vec![doc("u0", "", "volcano magma eruption"), doc("u1", "", "galaxy nebula star")];
        let idx = build_index(&docs, &IndexConfig::default()).unwrap();
        let scores = idx.cosine_scores("nebula");
        assert_eq!(scores.len(), 1);
        assert_eq!(scores[0].0, 1);
        assert!(idx.cosine_scores("glacier").is_empty());
    }

    #[test]
    fn degenerate_queries_are_empty() {
        let idx = build_index(&reef_corpus(), &IndexConfig::default()).unwrap();
        assert!(idx.cosine_scores("").is_empty());
        assert!(idx.cosine_scores("the and of").is_empty());
        let empty = build_index(&[], &IndexConfig::default()).unwrap();
        assert!(empty.cosine_scores("reef").is_empty());
    }

    #[test]
    fn standard_idf_zeroes_universal_terms() {
        let config = IndexConfig { idf: IdfMode::Standard, ..IndexConfig::default() };
        let docs = vec![
            doc("u0", "", "reef ocean"),
            doc("u1", "", "reef desert"),
            doc("u2", "", "reef tundra"),
        ];
        let idx = build_index(&docs, &config).unwrap();
        assert_eq!(idx.idf[idx.term_id("reef").unwrap() as usize], 0.0);
        assert!(idx.cosine_scores("reef").is_empty());
        let hits = idx.cosine_scores("reef desert");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0, 1);
    }

    #[test]
    fn postings_are_sorted_and_df_positive() {
        let docs = vec![
            doc("u0", "Ocean", "ocean currents ocean"),
            doc("u1", "", "currents"),
            doc("u2", "Currents", "tides"),
        ];
        let idx = build_index(&docs, &IndexConfig::default()).unwrap();
        for (tid, plist) in idx.postings.iter().enumerate() {
            assert!(idx.df[tid] >= 1);
            assert_eq!(idx.df[tid] as usize, plist.len());
            assert!(plist.windows(2).all(|w| w[0].doc_id < w[1].doc_id));
        }
        // title-only term is indexed
        assert_eq!(idx.postings_for("current").iter().map(|p| p.doc_id).collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn rejects_non_positive_boost() {
        let config = IndexConfig { title_boost: 0.0, ..IndexConfig::default() };
        assert!(matches!(build_index(&[], &config), Err(Error::InvalidConfig(_))));
    }
}
