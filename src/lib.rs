//! Hybrid RAG
//!
//! Retrieval engine that combines an embedding index with a typed, weighted
//! knowledge graph. Text is routed to either store (or both) depending on
//! whether entities were extracted; search blends vector similarity with a
//! graph co-occurrence boost, and multi-hop traversal follows typed edges.

pub mod api;
pub mod config;
pub mod context;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod graph;
pub mod hybrid;
pub mod ingest;
pub mod rag;
pub mod reasoning;
pub mod stats;
pub mod types;
pub mod vector;

pub use crate::{
    config::Config,
    context::Context,
    engine::HybridEngine,
    error::{Error, Result},
};

pub use types::{Document, GraphEdge, GraphNode, HybridResult, Metadata, Path, PathStep};
pub use graph::{GraphStore, InMemoryGraphStore};
pub use vector::{InMemoryVectorStore, VectorStore};
pub use hybrid::{HybridQuery, HybridResponse, SearchMode};
pub use reasoning::MultiHopResult;

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
