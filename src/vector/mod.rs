//! Vector store adapter
//!
//! The engine only depends on the [`VectorStore`] trait. [`InMemoryVectorStore`]
//! is the default backend and the reference for the adapter contract:
//! dimension checks on every read and write, ascending-distance ordering with
//! insertion-order tie breaks, and `top_k` clamped to the store size.

use async_trait::async_trait;

use crate::{
    error::Result,
    types::{Document, SearchCandidate, VectorStats},
};

pub mod distance;
pub mod index;

pub use distance::DistanceMetric;
pub use index::InMemoryVectorStore;

/// Core trait defining vector store operations
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Add a document. Fails with `DimensionMismatch` when the embedding length is wrong,
    /// and with `Conflict` when the id exists under the reject policy.
    async fn add(&self, doc: Document) -> Result<()>;

    /// Nearest neighbours of `query`, ordered by ascending distance
    async fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<SearchCandidate>>;

    /// Get a document by id
    async fn get(&self, id: &str) -> Result<Option<Document>>;

    /// Documents in insertion order
    async fn list(&self, limit: usize) -> Result<Vec<Document>>;

    /// Remove a document; returns whether it existed
    async fn delete(&self, id: &str) -> Result<bool>;

    /// Document count and embedding dimension
    async fn stats(&self) -> Result<VectorStats>;

    /// Embedding dimension this store accepts
    fn dimension(&self) -> usize;
}
