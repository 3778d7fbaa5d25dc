use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    graph::GraphStore,
    types::{GraphStats, VectorStats},
    vector::VectorStore,
};

/// Combined counters of both stores
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineStats {
    pub vector: VectorStats,
    pub graph: GraphStats,
    pub total_nodes: usize,
    pub total_documents: usize,
    pub total_edges: usize,
    /// Edges per node, 0 for an empty graph
    pub graph_density: f64,
}

/// Read-only composition of the two stores' stats; recomputed on every call
pub struct StatsAggregator {
    vector: Arc<dyn VectorStore>,
    graph: Arc<dyn GraphStore>,
}

impl StatsAggregator {
    pub fn new(vector: Arc<dyn VectorStore>, graph: Arc<dyn GraphStore>) -> Self {
        Self { vector, graph }
    }

    pub async fn stats(&self) -> Result<EngineStats> {
        let (vector, graph) = tokio::try_join!(self.vector.stats(), self.graph.stats())
            .map_err(|e| Error::upstream("stats", e))?;

        Ok(EngineStats {
            total_nodes: graph.total_nodes,
            total_documents: vector.total_documents,
            total_edges: graph.total_edges,
            graph_density: density(graph.total_nodes, graph.total_edges),
            vector,
            graph,
        })
    }
}

pub fn density(nodes: usize, edges: usize) -> f64 {
    if nodes == 0 {
        0.0
    } else {
        edges as f64 / nodes as f64
    }
}
