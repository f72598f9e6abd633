//! Directed link graph over the crawled document set.

use crate::{DocId, Document, UrlEdge};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LinkTarget {
    Internal(DocId),
    /// A link to a page that was never crawled. It takes a share of its
    /// source's rank but has no outbound edges of its own.
    External(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LinkEdge {
    pub source: DocId,
    pub target: LinkTarget,
}

/// Adjacency list plus dangling-node list. Duplicate (source, target) pairs
/// collapse to one edge; self-loops are kept.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkGraph {
    num_docs: u32,
    edges: Vec<LinkEdge>,
    outlinks: Vec<Vec<DocId>>,
    out_degree: Vec<u32>,
    dangling: Vec<DocId>,
}

impl LinkGraph {
    /// Resolve URL edges against the crawled documents. Edges whose source was
    /// not crawled are ignored.
    pub fn from_edges(documents: &[Document], edges: &[UrlEdge]) -> Self {
        let mut ids: HashMap<&str, DocId> = HashMap::with_capacity(documents.len());
        for (i, d) in documents.iter().enumerate() {
            ids.entry(d.url.as_str()).or_insert(i as DocId);
        }
        let link_edges = edges.iter().filter_map(|e| {
            let source = *ids.get(e.source.as_str())?;
            let target = match ids.get(e.target.as_str()) {
                Some(&t) => LinkTarget::Internal(t),
                None => LinkTarget::External(e.target.clone()),
            };
            Some(LinkEdge { source, target })
        });
        Self::from_link_edges(documents.len() as u32, link_edges)
    }

    pub fn from_link_edges(num_docs: u32, edges: impl IntoIterator<Item = LinkEdge>) -> Self {
        let n = num_docs as usize;
        let mut seen: HashSet<LinkEdge> = HashSet::new();
        let mut kept: Vec<LinkEdge> = Vec::new();
        let mut outlinks: Vec<Vec<DocId>> = vec![Vec::new(); n];
        let mut out_degree: Vec<u32> = vec![0; n];

        for edge in edges {
            if edge.source as usize >= n { continue; }
            if let LinkTarget::Internal(t) = edge.target {
                if t as usize >= n { continue; }
            }
            if !seen.insert(edge.clone()) { continue; }
            out_degree[edge.source as usize] += 1;
            if let LinkTarget::Internal(t) = edge.target {
                outlinks[edge.source as usize].push(t);
            }
            kept.push(edge);
        }

        let dangling = (0..num_docs).filter(|&d| out_degree[d as usize] == 0).collect();
        Self { num_docs, edges: kept, outlinks, out_degree, dangling }
    }

    pub fn num_docs(&self) -> u32 { self.num_docs }

    pub fn edges(&self) -> &[LinkEdge] { &self.edges }

    /// Crawled targets linked from `source`, in first-seen order.
    pub fn outlinks(&self, source: DocId) -> &[DocId] { &self.outlinks[source as usize] }

    /// Distinct targets of `source`, crawled or not.
    pub fn out_degree(&self, source: DocId) -> u32 { self.out_degree[source as usize] }

    pub fn external_degree(&self, source: DocId) -> u32 {
        self.out_degree(source) - self.outlinks(source).len() as u32
    }

    /// Documents with no outbound links at all.
    pub fn dangling(&self) -> &[DocId] { &self.dangling }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(url: &str) -> Document {
        Document { url: url.into(), title: String::new(), text: String::new(), depth: 0, domain: "a.edu".into() }
    }

    #[test]
    fn resolves_internal_and_external_targets() {
        let docs = vec![doc("https://a.edu/p1"), doc("https://a.edu/p2")];
        let edges = vec![
            UrlEdge::new("https://a.edu/p1", "https://a.edu/p2"),
            UrlEdge::new("https://a.edu/p1", "https://b.gov/x"),
            UrlEdge::new("https://a.edu/p1", "https://a.edu/p2"),
            UrlEdge::new("https://c.org/unknown", "https://a.edu/p1"),
        ];
        let g = LinkGraph::from_edges(&docs, &edges);
        assert_eq!(g.edges().len(), 2);
        assert_eq!(g.outlinks(0), &[1]);
        assert_eq!(g.out_degree(0), 2);
        assert_eq!(g.external_degree(0), 1);
        assert_eq!(g.dangling(), &[1]);
        assert!(g.outlinks(1).is_empty());
    }

    #[test]
    fn keeps_self_loops() {
        let g = LinkGraph::from_link_edges(1, vec![LinkEdge { source: 0, target: LinkTarget::Internal(0) }]);
        assert_eq!(g.outlinks(0), &[0]);
        assert!(g.dangling().is_empty());
    }
}
