//! In-memory vector index with brute-force nearest-neighbour search.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use crate::{
    error::{Error, Result},
    types::{Document, IdPolicy, SearchCandidate, VectorStats},
    vector::{distance::compute_distance, DistanceMetric, VectorStore},
};

#[derive(Debug, Default)]
struct IndexState {
    /// Documents keyed by insertion sequence
    documents: BTreeMap<u64, Document>,
    /// Document id to insertion sequence
    ids: HashMap<String, u64>,
    next_seq: u64,
    last_updated: Option<DateTime<Utc>>,
}

impl IndexState {
    fn insert(&mut self, doc: Document) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.ids.insert(doc.id.clone(), seq);
        self.documents.insert(seq, doc);
        self.last_updated = Some(Utc::now());
    }

    fn remove(&mut self, id: &str) -> Option<Document> {
        let seq = self.ids.remove(id)?;
        self.last_updated = Some(Utc::now());
        self.documents.remove(&seq)
    }
}

/// Vector store held entirely in memory.
///
/// Thread-safe via an async RwLock; searches are O(n) over all documents.
#[derive(Debug)]
pub struct InMemoryVectorStore {
    dimension: usize,
    metric: DistanceMetric,
    policy: IdPolicy,
    state: RwLock<IndexState>,
}

impl InMemoryVectorStore {
    pub fn new(dimension: usize, policy: IdPolicy) -> Self {
        Self::with_metric(dimension, policy, DistanceMetric::default())
    }

    pub fn with_metric(dimension: usize, policy: IdPolicy, metric: DistanceMetric) -> Self {
        Self {
            dimension,
            metric,
            policy,
            state: RwLock::new(IndexState::default()),
        }
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(Error::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn add(&self, doc: Document) -> Result<()> {
        if doc.id.trim().is_empty() {
            return Err(Error::Validation("document id must not be empty".into()));
        }
        self.check_dimension(&doc.embedding)?;
        if doc.embedding.iter().any(|x| !x.is_finite()) {
            return Err(Error::Validation(format!("document {} has a non-finite embedding", doc.id)));
        }
        doc.metadata.validate()?;

        let mut state = self.state.write().await;
        if state.ids.contains_key(&doc.id) {
            match self.policy {
                IdPolicy::Reject => return Err(Error::Conflict(format!("document {}", doc.id))),
                IdPolicy::Upsert => {
                    // Replacement keeps the original creation time but moves to the end.
                    if let Some(previous) = state.remove(&doc.id) {
                        let mut doc = doc;
                        doc.created_at = previous.created_at;
                        debug!(id = %doc.id, "Replacing document");
                        state.insert(doc);
                        return Ok(());
                    }
                }
            }
        }
        debug!(id = %doc.id, "Adding document");
        state.insert(doc);
        Ok(())
    }

    async fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<SearchCandidate>> {
        if top_k == 0 {
            return Err(Error::Validation("top_k must be at least 1".into()));
        }
        self.check_dimension(query)?;

        let state = self.state.read().await;
        let mut scored: Vec<(f32, u64, &Document)> = state
            .documents
            .iter()
            .map(|(seq, doc)| (compute_distance(query, &doc.embedding, self.metric), *seq, doc))
            .collect();

        scored.sort_by(|(da, sa, _), (db, sb, _)| da.total_cmp(db).then(sa.cmp(sb)));

        Ok(scored
            .into_iter()
            .take(top_k)
            .map(|(distance, _, doc)| SearchCandidate {
                doc_id: doc.id.clone(),
                text: doc.text.clone(),
                distance,
                similarity: 1.0 - distance,
                metadata: doc.metadata.clone(),
            })
            .collect())
    }

    async fn get(&self, id: &str) -> Result<Option<Document>> {
        let state = self.state.read().await;
        Ok(state
            .ids
            .get(id)
            .and_then(|seq| state.documents.get(seq))
            .cloned())
    }

    async fn list(&self, limit: usize) -> Result<Vec<Document>> {
        let state = self.state.read().await;
        Ok(state.documents.values().take(limit).cloned().collect())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let mut state = self.state.write().await;
        Ok(state.remove(id).is_some())
    }

    async fn stats(&self) -> Result<VectorStats> {
        let state = self.state.read().await;
        Ok(VectorStats {
            total_documents: state.documents.len(),
            embedding_dimension: self.dimension,
            last_updated: state.last_updated,
        })
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
