use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use futures::future::try_join_all;
use metrics::{counter, histogram};
use tracing::{debug, info};

use crate::{
    embedding::Embedder,
    error::{Error, Result},
    graph::GraphStore,
    hybrid::{
        fusion::{co_occurrence_boost, fuse, Weights},
        query::{GraphSearchResponse, HybridQuery, HybridResponse, SearchMode},
    },
    types::SearchCandidate,
    vector::VectorStore,
};

/// Ranks vector candidates, re-weighted by graph co-occurrence
pub struct HybridScorer {
    vector: Arc<dyn VectorStore>,
    graph: Arc<dyn GraphStore>,
    embedder: Arc<dyn Embedder>,
    oversample_factor: usize,
    max_hops: usize,
}

impl HybridScorer {
    pub fn new(
        vector: Arc<dyn VectorStore>,
        graph: Arc<dyn GraphStore>,
        embedder: Arc<dyn Embedder>,
        oversample_factor: usize,
        max_hops: usize,
    ) -> Self {
        Self {
            vector,
            graph,
            embedder,
            oversample_factor: oversample_factor.max(1),
            max_hops: max_hops.max(1),
        }
    }

    /// Run a hybrid or vector-only search
    pub async fn search(&self, query: &HybridQuery) -> Result<HybridResponse> {
        let weights = query.validate()?;
        let started = Instant::now();

        let embedding = self
            .embedder
            .embed(&query.text)
            .await
            .map_err(|e| Error::upstream("embedding", e))?;

        let window = match query.mode {
            SearchMode::Hybrid => query.top_k.saturating_mul(self.oversample_factor),
            SearchMode::Vector => query.top_k,
        };
        let candidates = self
            .vector
            .search(&embedding, window)
            .await
            .map_err(|e| Error::upstream("vector search", e))?;

        let boosts = match query.mode {
            SearchMode::Hybrid => self.graph_boosts(&candidates).await?,
            SearchMode::Vector => vec![0.0; candidates.len()],
        };

        let results = fuse(candidates, &boosts, weights, query.top_k);
        let vector_hits = results.iter().filter(|r| r.similarity > 0.0).count();
        let graph_boosts = results.iter().filter(|r| r.graph_boost > 0.0).count();
        let latency_ms = started.elapsed().as_millis() as u64;

        let mode = match query.mode {
            SearchMode::Hybrid => "hybrid",
            SearchMode::Vector => "vector",
        };
        counter!("hybrid_search_total", 1, "mode" => mode);
        histogram!("hybrid_search_latency_ms", latency_ms as f64, "mode" => mode);
        info!(
            mode,
            top_k = query.top_k,
            results = results.len(),
            vector_hits,
            graph_boosts,
            latency_ms,
            "Search completed"
        );

        Ok(HybridResponse {
            mode: query.mode,
            query: query.text.clone(),
            weights,
            results,
            vector_hits,
            graph_boosts,
            latency_ms,
        })
    }

    /// Vector-only ranking: graph boost is 0 and the score is the similarity
    pub async fn vector_search(&self, text: &str, top_k: usize) -> Result<HybridResponse> {
        self.search(&HybridQuery::vector_only(text).with_top_k(top_k)).await
    }

    /// Plain reachable-node output from a bounded expansion
    pub async fn graph_search(&self, start_id: &str, depth: usize) -> Result<GraphSearchResponse> {
        if start_id.trim().is_empty() {
            return Err(Error::Validation("start_id is required".into()));
        }
        if depth == 0 {
            return Err(Error::Validation("depth must be at least 1".into()));
        }
        let depth = depth.min(self.max_hops);

        if self
            .graph
            .get_node(start_id)
            .await
            .map_err(|e| Error::upstream("graph lookup", e))?
            .is_none()
        {
            return Err(Error::NotFound(format!("node {}", start_id)));
        }

        let nodes = self
            .graph
            .neighbors(start_id, None, depth)
            .await
            .map_err(|e| Error::upstream("graph expansion", e))?;
        counter!("graph_search_total", 1);
        info!(start_id, depth, nodes = nodes.len(), "Graph search completed");

        Ok(GraphSearchResponse {
            start_id: start_id.to_string(),
            depth,
            nodes,
        })
    }

    /// Per-candidate edge lookups run concurrently; any failure aborts the search
    async fn graph_boosts(&self, candidates: &[SearchCandidate]) -> Result<Vec<f32>> {
        let ids: HashSet<&str> = candidates.iter().map(|c| c.doc_id.as_str()).collect();
        let lookups = candidates.iter().map(|c| self.graph.edges_of(&c.doc_id));
        let edges = try_join_all(lookups)
            .await
            .map_err(|e| Error::upstream("graph lookup", e))?;

        Ok(candidates
            .iter()
            .zip(&edges)
            .map(|(candidate, edges)| {
                let boost = co_occurrence_boost(&candidate.doc_id, edges, &ids);
                debug!(doc_id = %candidate.doc_id, similarity = candidate.similarity, boost, "Scored candidate");
                boost
            })
            .collect())
    }
}
