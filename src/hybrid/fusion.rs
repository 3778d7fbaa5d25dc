//! Score fusion for combining vector similarity with graph co-occurrence
//!
//! Each vector candidate gets a `graph_boost` from the edges linking it to the
//! other candidates in the same window; the two signals are blended with
//! normalised weights and re-ranked deterministically.

use std::cmp::Ordering;
use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    types::{GraphEdge, HybridResult, SearchCandidate},
};

/// Upper bound of a single candidate's graph boost
pub const MAX_GRAPH_BOOST: f32 = 1.0;

/// Blend weights, always summing to 1
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Weights {
    pub vector: f32,
    pub graph: f32,
}

impl Weights {
    /// Normalise a weight pair so it sums to 1. Negative or non-finite weights
    /// and an all-zero pair are rejected.
    pub fn normalize(vector: f32, graph: f32) -> Result<Self> {
        if !vector.is_finite() || !graph.is_finite() || vector < 0.0 || graph < 0.0 {
            return Err(Error::Validation(format!(
                "weights must be finite and non-negative, got vector={} graph={}",
                vector, graph
            )));
        }
        let sum = vector + graph;
        if sum <= 0.0 {
            return Err(Error::Validation("vector_weight + graph_weight must be positive".into()));
        }
        Ok(Self {
            vector: vector / sum,
            graph: graph / sum,
        })
    }

    /// Weights that ignore the graph signal
    pub fn vector_only() -> Self {
        Self { vector: 1.0, graph: 0.0 }
    }
}

impl Default for Weights {
    fn default() -> Self {
        Self { vector: 0.7, graph: 0.3 }
    }
}

/// Sum of the weights of `edges` whose other endpoint is another candidate, capped at 1
pub fn co_occurrence_boost(node_id: &str, edges: &[GraphEdge], candidates: &HashSet<&str>) -> f32 {
    let total: f32 = edges
        .iter()
        .filter_map(|edge| edge.other_end(node_id).map(|other| (other, edge.weight)))
        .filter(|(other, _)| *other != node_id && candidates.contains(other))
        .map(|(_, weight)| weight)
        .sum();
    total.min(MAX_GRAPH_BOOST)
}

/// Blend, sort and truncate. `boosts[i]` belongs to `candidates[i]`, and the
/// candidates must arrive in vector-rank order.
pub fn fuse(
    candidates: Vec<SearchCandidate>,
    boosts: &[f32],
    weights: Weights,
    top_k: usize,
) -> Vec<HybridResult> {
    let mut scored: Vec<(usize, SearchCandidate, f32, f32)> = candidates
        .into_iter()
        .enumerate()
        .map(|(vector_rank, candidate)| {
            let boost = boosts.get(vector_rank).copied().unwrap_or(0.0);
            let score = hybrid_score(candidate.similarity, boost, weights);
            (vector_rank, candidate, boost, score)
        })
        .collect();

    scored.sort_by(|a, b| match b.3.total_cmp(&a.3) {
        Ordering::Equal => a.0.cmp(&b.0),
        other => other,
    });

    scored
        .into_iter()
        .take(top_k)
        .enumerate()
        .map(|(i, (_, candidate, boost, score))| HybridResult {
            rank: i + 1,
            doc_id: candidate.doc_id,
            text: candidate.text,
            similarity: candidate.similarity,
            graph_boost: boost,
            hybrid_score: score,
            metadata: candidate.metadata,
        })
        .collect()
}

/// `vector × similarity + graph × boost`, clamped to [0, 1]
pub fn hybrid_score(similarity: f32, boost: f32, weights: Weights) -> f32 {
    let score = weights.vector * similarity + weights.graph * boost;
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Metadata;
    use pretty_assertions::assert_eq;

    fn candidate(id: &str, similarity: f32) -> SearchCandidate {
        SearchCandidate {
            doc_id: id.to_string(),
            text: id.to_string(),
            distance: 1.0 - similarity,
            similarity,
            metadata: Metadata::new(),
        }
    }

    #[test]
    fn test_weights_normalize_to_one() {
        for (v, g) in [(0.7, 0.3), (7.0, 3.0), (1.0, 0.0), (0.0, 2.0), (0.2, 0.2)] {
            let w = Weights::normalize(v, g).unwrap();
            assert!((w.vector + w.graph - 1.0).abs() < 1e-6, "{} {}", v, g);
        }
        let w = Weights::normalize(7.0, 3.0).unwrap();
        assert!((w.vector - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_invalid_weights_are_rejected() {
        assert!(Weights::normalize(0.0, 0.0).is_err());
        assert!(Weights::normalize(-0.1, 1.0).is_err());
        assert!(Weights::normalize(f32::NAN, 1.0).is_err());
        assert!(Weights::normalize(1.0, f32::INFINITY).is_err());
    }

    #[test]
    fn test_boost_only_counts_other_candidates() {
        let edges = vec![
            GraphEdge::new("a", "b", "USES", 0.6),
            GraphEdge::new("c", "a", "RELATED", 0.7),
            GraphEdge::new("a", "outside", "USES", 0.9),
            GraphEdge::new("a", "a", "SELF", 0.9),
        ];
        let candidates: HashSet<&str> = ["a", "b", "c"].into_iter().collect();
        assert_eq!(co_occurrence_boost("a", &edges, &candidates), 1.0);

        let only_b: HashSet<&str> = ["a", "b"].into_iter().collect();
        assert!((co_occurrence_boost("a", &edges, &only_b) - 0.6).abs() < 1e-6);
        assert_eq!(co_occurrence_boost("a", &[], &only_b), 0.0);
    }

    #[test]
    fn test_fuse_ranks_densely_with_stable_ties() {
        let candidates = vec![
            candidate("first", 0.5),
            candidate("second", 0.5),
            candidate("boosted", 0.5),
            candidate("low", 0.1),
        ];
        let boosts = [0.0, 0.0, 0.9, 0.0];
        let results = fuse(candidates, &boosts, Weights::default(), 3);

        let ids: Vec<_> = results.iter().map(|r| r.doc_id.as_str()).collect();
        assert_eq!(ids, vec!["boosted", "first", "second"]);
        let ranks: Vec<_> = results.iter().map(|r| r.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3]);
        assert!(results.iter().all(|r| (0.0..=1.0).contains(&r.hybrid_score)));
    }

    #[test]
    fn test_hybrid_score_is_clamped() {
        let w = Weights::default();
        assert_eq!(hybrid_score(-0.5, 0.0, w), 0.0);
        assert_eq!(hybrid_score(1.5, 1.0, w), 1.0);
        assert!((hybrid_score(0.5, 1.0, w) - 0.65).abs() < 1e-6);
    }
}
