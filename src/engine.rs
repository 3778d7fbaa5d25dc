//! `HybridEngine` wires the stores, the embedder and the extractor into the
//! ingestion, search, reasoning and stats components, and applies one
//! deadline to every request.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use metrics::counter;
use tracing::{info, warn};

use crate::{
    config::{Config, ExtractorKind},
    context::Context,
    embedding::{Embedder, HashingEmbedder, HttpEmbedder},
    error::{Error, Result},
    graph::{GraphStore, InMemoryGraphStore},
    hybrid::{GraphSearchResponse, HybridQuery, HybridResponse, HybridScorer},
    ingest::{IngestReport, IngestionRouter},
    rag::{EntityExtractor, NoopExtractor, PatternExtractor},
    reasoning::{MultiHopReasoner, MultiHopResult},
    stats::{EngineStats, StatsAggregator},
    types::{Document, GraphEdge, GraphNode, Metadata},
    vector::{InMemoryVectorStore, VectorStore},
};

/// Default page size of `list_documents`
pub const DEFAULT_LIST_LIMIT: usize = 1000;

pub struct HybridEngine {
    context: Context,
    vector: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    ingestion: IngestionRouter,
    scorer: HybridScorer,
    reasoner: MultiHopReasoner,
    stats: StatsAggregator,
    timeout: Duration,
}

impl HybridEngine {
    /// Build an engine around explicit store, embedder and extractor instances
    pub fn new(
        context: Context,
        vector: Arc<dyn VectorStore>,
        graph: Arc<dyn GraphStore>,
        embedder: Arc<dyn Embedder>,
        extractor: Arc<dyn EntityExtractor>,
    ) -> Self {
        let config = context.config.clone();
        Self {
            ingestion: IngestionRouter::new(
                vector.clone(),
                graph.clone(),
                embedder.clone(),
                extractor,
                config.dual_write,
            ),
            scorer: HybridScorer::new(
                vector.clone(),
                graph.clone(),
                embedder.clone(),
                config.oversample_factor,
                config.max_hops,
            ),
            reasoner: MultiHopReasoner::new(graph.clone(), config.max_hops, config.max_visited_nodes),
            stats: StatsAggregator::new(vector.clone(), graph),
            timeout: config.request_timeout(),
            context,
            vector,
            embedder,
        }
    }

    /// In-memory stores plus the embedder and extractor selected by `config`
    pub fn from_config(config: Config) -> Result<Self> {
        config.validate()?;

        let vector: Arc<dyn VectorStore> =
            Arc::new(InMemoryVectorStore::new(config.embedding_dim, config.id_policy));
        let graph: Arc<dyn GraphStore> = Arc::new(InMemoryGraphStore::with_visit_limit(
            config.id_policy,
            config.max_visited_nodes,
        ));
        let embedder: Arc<dyn Embedder> = match &config.embedding_url {
            Some(url) => Arc::new(HttpEmbedder::new(
                url.clone(),
                config.embedding_model.clone(),
                config.embedding_dim,
            )),
            None => Arc::new(HashingEmbedder::new(config.embedding_dim)),
        };
        let extractor: Arc<dyn EntityExtractor> = match config.extractor {
            ExtractorKind::Pattern => Arc::new(PatternExtractor::with_defaults()?),
            ExtractorKind::None => Arc::new(NoopExtractor),
        };

        info!(
            dimension = config.embedding_dim,
            embedder = %embedder.model_name(),
            extractor = ?config.extractor,
            id_policy = ?config.id_policy,
            "Hybrid engine initialized"
        );
        Ok(Self::new(Context::new(config), vector, graph, embedder, extractor))
    }

    /// Override the per-request deadline
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn config(&self) -> &Config {
        &self.context.config
    }

    async fn deadline<T, F>(&self, operation: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                counter!("request_timeouts_total", 1, "operation" => operation);
                warn!(operation, timeout_ms = self.timeout.as_millis() as u64, "Deadline exceeded");
                Err(Error::Timeout(format!(
                    "{} exceeded {}ms",
                    operation,
                    self.timeout.as_millis()
                )))
            }
        }
    }

    pub async fn ingest(&self, text: &str, metadata: Metadata) -> Result<IngestReport> {
        self.deadline("ingest", self.ingestion.ingest(text, metadata)).await
    }

    pub async fn add_node(&self, id: &str, text: &str, metadata: Metadata) -> Result<GraphNode> {
        self.deadline("add_node", self.ingestion.add_node_with_text(id, text, metadata))
            .await
    }

    pub async fn add_edge(&self, edge: GraphEdge) -> Result<GraphEdge> {
        self.deadline("add_edge", self.ingestion.add_edge(edge)).await
    }

    pub async fn hybrid_search(&self, query: &HybridQuery) -> Result<HybridResponse> {
        self.deadline("hybrid_search", self.scorer.search(query)).await
    }

    pub async fn vector_search(&self, text: &str, top_k: usize) -> Result<HybridResponse> {
        self.deadline("vector_search", self.scorer.vector_search(text, top_k))
            .await
    }

    pub async fn graph_search(&self, start_id: &str, depth: usize) -> Result<GraphSearchResponse> {
        self.deadline("graph_search", self.scorer.graph_search(start_id, depth))
            .await
    }

    pub async fn multi_hop(
        &self,
        start_id: &str,
        hops: usize,
        relationship_types: Option<&[String]>,
    ) -> Result<MultiHopResult> {
        self.deadline(
            "multi_hop",
            self.reasoner.traverse(start_id, hops, relationship_types),
        )
        .await
    }

    pub async fn stats(&self) -> Result<EngineStats> {
        self.deadline("stats", self.stats.stats()).await
    }

    pub async fn get_document(&self, id: &str) -> Result<Document> {
        self.deadline("get_document", async {
            self.vector
                .get(id)
                .await?
                .ok_or_else(|| Error::NotFound(format!("document {}", id)))
        })
        .await
    }

    pub async fn list_documents(&self, limit: Option<usize>) -> Result<Vec<Document>> {
        let limit = limit.unwrap_or(DEFAULT_LIST_LIMIT);
        self.deadline("list_documents", self.vector.list(limit)).await
    }

    /// Replace a document's text and/or metadata. The old document is deleted
    /// and a new one with the same id is inserted; the embedding is computed
    /// before anything is removed.
    ///
    /// The deadline covers the lookup and the embedding only. Once the delete
    /// starts, the swap runs to completion on its own task, so neither a
    /// timeout nor a dropped request can leave the id without a document.
    pub async fn update_document(
        &self,
        id: &str,
        text: Option<String>,
        metadata: Option<Metadata>,
    ) -> Result<Document> {
        let (existing, replacement) = self
            .deadline("update_document", self.prepare_replacement(id, text, metadata))
            .await?;

        tokio::spawn(swap_document(self.vector.clone(), existing, replacement))
            .await
            .map_err(|e| Error::Upstream(format!("document swap for {} failed: {}", id, e)))?
    }

    /// Hard delete; `NotFound` when the id is unknown
    pub async fn delete_document(&self, id: &str) -> Result<()> {
        self.deadline("delete_document", async {
            if !self.vector.delete(id).await? {
                return Err(Error::NotFound(format!("document {}", id)));
            }
            info!(id, "Deleted document");
            Ok(())
        })
        .await
    }

    async fn prepare_replacement(
        &self,
        id: &str,
        text: Option<String>,
        metadata: Option<Metadata>,
    ) -> Result<(Document, Document)> {
        if let Some(text) = &text {
            if text.trim().is_empty() {
                return Err(Error::Validation("text must not be empty".into()));
            }
        }
        let existing = self
            .vector
            .get(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("document {}", id)))?;

        let embedding = match &text {
            Some(new_text) if *new_text != existing.text => self
                .embedder
                .embed(new_text)
                .await
                .map_err(|e| Error::upstream("embedding", e))?,
            _ => existing.embedding.clone(),
        };

        let mut replacement = Document::new(
            id,
            text.unwrap_or_else(|| existing.text.clone()),
            embedding,
            metadata.unwrap_or_else(|| existing.metadata.clone()),
        );
        replacement.created_at = existing.created_at;
        replacement.updated_at = Utc::now();
        replacement.metadata.validate()?;

        Ok((existing, replacement))
    }
}

/// Delete `existing` and insert `replacement` under the same id, restoring
/// `existing` when the insert fails
async fn swap_document(
    vector: Arc<dyn VectorStore>,
    existing: Document,
    replacement: Document,
) -> Result<Document> {
    let id = existing.id.clone();
    vector.delete(&id).await?;
    if let Err(err) = vector.add(replacement.clone()).await {
        warn!(%id, error = %err, "Reinsert failed, restoring previous document");
        vector.add(existing).await?;
        return Err(err);
    }

    info!(%id, "Updated document");
    Ok(replacement)
}
