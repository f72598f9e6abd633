//! Damped PageRank over a [`LinkGraph`].
//!
//! Rank held by dangling documents, and the share of rank sent along edges to
//! uncrawled targets, is pooled each round and spread uniformly over all
//! documents so the vector keeps summing to 1.

use crate::graph::LinkGraph;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageRankParams {
    pub damping: f64,
    pub max_iterations: usize,
    /// Stop once the L1 change between rounds drops below this.
    pub tolerance: f64,
}

impl Default for PageRankParams {
    fn default() -> Self {
        Self { damping: 0.85, max_iterations: 100, tolerance: 1e-9 }
    }
}

impl PageRankParams {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.damping) {
            return Err(Error::InvalidConfig(format!("damping must be in [0, 1], got {}", self.damping)));
        }
        if self.max_iterations == 0 {
            return Err(Error::InvalidConfig("max_iterations must be at least 1".into()));
        }
        if !(self.tolerance >= 0.0) {
            return Err(Error::InvalidConfig(format!("tolerance must be non-negative, got {}", self.tolerance)));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRank {
    /// Indexed by `DocId`.
    pub scores: Vec<f64>,
    pub iterations: usize,
    pub converged: bool,
}

pub fn compute_pagerank(graph: &LinkGraph, params: &PageRankParams) -> Result<PageRank> {
    params.validate()?;
    let n = graph.num_docs() as usize;
    if n == 0 {
        return Ok(PageRank { scores: Vec::new(), iterations: 0, converged: true });
    }

    let d = params.damping;
    let inv_n = 1.0 / n as f64;
    let mut rank = vec![inv_n; n];
    let mut next = vec![0.0f64; n];
    let mut iterations = 0;
    let mut converged = false;

    while iterations < params.max_iterations {
        iterations += 1;
        next.iter_mut().for_each(|v| *v = 0.0);

        let mut pooled = 0.0f64;
        for s in 0..n {
            let degree = graph.out_degree(s as u32);
            if degree == 0 {
                pooled += rank[s];
                continue;
            }
            let share = rank[s] / degree as f64;
            for &t in graph.outlinks(s as u32) {
                next[t as usize] += share;
            }
            pooled += share * graph.external_degree(s as u32) as f64;
        }

        let base = (1.0 - d) * inv_n + d * pooled * inv_n;
        let mut delta = 0.0f64;
        for (v, old) in next.iter_mut().zip(rank.iter()) {
            *v = base + d * *v;
            delta += (*v - old).abs();
        }
        std::mem::swap(&mut rank, &mut next);

        if delta < params.tolerance {
            converged = true;
            break;
        }
    }

    // fold accumulated rounding back into the distribution
    let total: f64 = rank.iter().sum();
    if total > 0.0 {
        rank.iter_mut().for_each(|v| *v /= total);
    }

    tracing::debug!(docs = n, iterations, converged, "pagerank finished");
    Ok(PageRank { scores: rank, iterations, converged })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{LinkEdge, LinkTarget};
    use crate::DocId;
    use proptest::prelude::*;

    fn internal(source: DocId, target: DocId) -> LinkEdge {
        LinkEdge { source, target: LinkTarget::Internal(target) }
    }

    fn sum(v: &[f64]) -> f64 { v.iter().sum() }

    #[test]
    fn empty_graph_is_empty() {
        let pr = compute_pagerank(&LinkGraph::default(), &PageRankParams::default()).unwrap();
        assert!(pr.scores.is_empty());
    }

    #[test]
    fn cycle_with_tail_orders_as_expected() {
        // A -> B, A -> C, B -> C, C -> A
        let g = LinkGraph::from_link_edges(3, vec![internal(0, 1), internal(0, 2), internal(1, 2), internal(2, 0)]);
        let pr = compute_pagerank(&g, &PageRankParams::default()).unwrap();
        assert!(pr.converged);
        assert!((sum(&pr.scores) - 1.0).abs() < 1e-9);
        assert!(pr.scores[2] > pr.scores[1]);
    }

    #[test]
    fn external_mass_is_redistributed() {
        let g = LinkGraph::from_link_edges(
            2,
            vec![internal(0, 1), LinkEdge { source: 0, target: LinkTarget::External("https://x.org/".into()) }],
        );
        let pr = compute_pagerank(&g, &PageRankParams::default()).unwrap();
        assert!((sum(&pr.scores) - 1.0).abs() < 1e-9);
        assert!(pr.scores[1] > pr.scores[0]);
    }

    #[test]
    fn isolated_documents_keep_the_floor() {
        let params = PageRankParams::default();
        let g = LinkGraph::from_link_edges(4, vec![internal(0, 1), internal(1, 0)]);
        let pr = compute_pagerank(&g, &params).unwrap();
        let floor = (1.0 - params.damping) / 4.0;
        assert!(pr.scores.iter().all(|&s| s >= floor));
        assert!((pr.scores[2] - pr.scores[3]).abs() < 1e-12);
    }

    #[test]
    fn stops_at_max_iterations() {
        let params = PageRankParams { max_iterations: 2, tolerance: 0.0, ..PageRankParams::default() };
        let g = LinkGraph::from_link_edges(3, vec![internal(0, 1), internal(1, 2)]);
        let pr = compute_pagerank(&g, &params).unwrap();
        assert_eq!(pr.iterations, 2);
        assert!(!pr.converged);
        assert!((sum(&pr.scores) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn is_deterministic() {
        let g = LinkGraph::from_link_edges(5, vec![internal(0, 1), internal(1, 2), internal(2, 0), internal(3, 2), internal(4, 4)]);
        let a = compute_pagerank(&g, &PageRankParams::default()).unwrap();
        let b = compute_pagerank(&g, &PageRankParams::default()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_bad_params() {
        let g = LinkGraph::default();
        let bad = PageRankParams { damping: 1.5, ..PageRankParams::default() };
        assert!(matches!(compute_pagerank(&g, &bad), Err(Error::InvalidConfig(_))));
        let bad = PageRankParams { max_iterations: 0, ..PageRankParams::default() };
        assert!(compute_pagerank(&g, &bad).is_err());
    }

    fn graph_strategy() -> impl Strategy<Value = (u32, Vec<(u32, u32)>, Vec<u32>)> {
        (1u32..12).prop_flat_map(|n| {
            (
                Just(n),
                proptest::collection::vec((0..n, 0..n), 0..40),
                proptest::collection::vec(0..n, 0..6),
            )
        })
    }

    proptest! {
        #[test]
        fn mass_is_conserved((n, pairs, external) in graph_strategy()) {
            let mut edges: Vec<LinkEdge> = pairs.iter().map(|&(s, t)| internal(s, t)).collect();
            edges.extend(external.iter().map(|&s| LinkEdge { source: s, target: LinkTarget::External(format!("https://ext.org/{s}")) }));
            let g = LinkGraph::from_link_edges(n, edges);
            let params = PageRankParams::default();
            let pr = compute_pagerank(&g, &params).unwrap();
            prop_assert!((sum(&pr.scores) - 1.0).abs() < 1e-9);
            let floor = (1.0 - params.damping) / n as f64;
            for &s in &pr.scores {
                prop_assert!(s >= floor - 1e-12 && s <= 1.0);
            }
        }

        #[test]
        fn invariant_under_relabeling(
            (perm, pairs) in (1u32..10).prop_flat_map(|n| (
                Just((0..n).collect::<Vec<u32>>()).prop_shuffle(),
                proptest::collection::vec((0..n, 0..n), 0..30),
            ))
        ) {
            let n = perm.len() as u32;
            let g = LinkGraph::from_link_edges(n, pairs.iter().map(|&(s, t)| internal(s, t)));
            let relabeled = LinkGraph::from_link_edges(
                n,
                pairs.iter().map(|&(s, t)| internal(perm[s as usize], perm[t as usize])),
            );
            let params = PageRankParams::default();
            let a = compute_pagerank(&g, &params).unwrap();
            let b = compute_pagerank(&relabeled, &params).unwrap();
            for i in 0..n as usize {
                prop_assert!((a.scores[i] - b.scores[perm[i] as usize]).abs() < 1e-7);
            }
        }
    }
}
