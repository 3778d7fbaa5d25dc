//! Request and response types of the hybrid scorer

use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    hybrid::fusion::Weights,
    types::{GraphNode, HybridResult},
};

/// Which signals a search combines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    #[default]
    Hybrid,
    Vector,
}

/// Represents a text search against the vector store, optionally re-ranked by the graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HybridQuery {
    pub text: String,
    pub mode: SearchMode,
    /// Raw weights; normalised before scoring
    pub vector_weight: f32,
    pub graph_weight: f32,
    pub top_k: usize,
}

impl HybridQuery {
    pub fn new(text: impl Into<String>) -> Self {
        let weights = Weights::default();
        Self {
            text: text.into(),
            mode: SearchMode::Hybrid,
            vector_weight: weights.vector,
            graph_weight: weights.graph,
            top_k: 5,
        }
    }

    pub fn vector_only(text: impl Into<String>) -> Self {
        Self {
            mode: SearchMode::Vector,
            ..Self::new(text)
        }
    }

    pub fn with_weights(mut self, vector_weight: f32, graph_weight: f32) -> Self {
        self.vector_weight = vector_weight;
        self.graph_weight = graph_weight;
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Validate the query and return its normalised weights
    pub fn validate(&self) -> Result<Weights> {
        if self.text.trim().is_empty() {
            return Err(Error::Validation("query must not be empty".into()));
        }
        if self.top_k == 0 {
            return Err(Error::Validation("top_k must be at least 1".into()));
        }
        match self.mode {
            SearchMode::Hybrid => Weights::normalize(self.vector_weight, self.graph_weight),
            SearchMode::Vector => Ok(Weights::vector_only()),
        }
    }
}

/// Ranked results of a hybrid or vector search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HybridResponse {
    pub mode: SearchMode,
    pub query: String,
    /// Normalised weights actually applied
    pub weights: Weights,
    pub results: Vec<HybridResult>,
    /// Returned results with similarity > 0
    pub vector_hits: usize,
    /// Returned results with graph_boost > 0
    pub graph_boosts: usize,
    pub latency_ms: u64,
}

/// Nodes reachable from a start node, unranked
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSearchResponse {
    pub start_id: String,
    /// Depth actually used after the engine-wide cap
    pub depth: usize,
    pub nodes: Vec<GraphNode>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_validation() {
        assert!(HybridQuery::new("  ").validate().is_err());
        assert!(HybridQuery::new("q").with_top_k(0).validate().is_err());
        assert!(HybridQuery::new("q").with_weights(0.0, 0.0).validate().is_err());

        // vector mode ignores the supplied weights
        let weights = HybridQuery::vector_only("q").with_weights(0.0, 0.0).validate().unwrap();
        assert_eq!(weights, Weights::vector_only());
    }

    #[test]
    fn test_mode_serializes_lowercase() {
        assert_eq!(serde_json::to_value(SearchMode::Hybrid).unwrap(), "hybrid");
        let mode: SearchMode = serde_json::from_value(serde_json::json!("vector")).unwrap();
        assert_eq!(mode, SearchMode::Vector);
    }
}
