//! Text embedders.
//!
//! The engine treats embedding as a replaceable I/O edge behind [`Embedder`].
//! [`HashingEmbedder`] is deterministic and dependency-free, which makes it the
//! default for local runs and tests; [`HttpEmbedder`] calls a remote model.

use std::time::Duration;

use async_trait::async_trait;
use backoff::{future::retry, ExponentialBackoff};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Turns text into a fixed-length vector
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Length of every vector this embedder produces
    fn dimension(&self) -> usize;

    fn model_name(&self) -> String;
}

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// 64-bit FNV-1a
pub(crate) fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET, |hash, b| (hash ^ u64::from(*b)).wrapping_mul(FNV_PRIME))
}

/// Feature-hashing embedder: each lowercase token is hashed into a signed bucket
/// and the result is L2-normalised. Identical texts always embed identically.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        if self.dimension == 0 {
            return vector;
        }

        let tokens = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase);
        for token in tokens {
            let hash = fnv1a(token.as_bytes());
            let bucket = (hash % self.dimension as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }
        vector
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_sync(text))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> String {
        format!("hashing-{}", self.dimension)
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// Accepts both `{"embedding": [...]}` and `{"data": [{"embedding": [...]}]}`
#[derive(Deserialize)]
#[serde(untagged)]
enum EmbeddingResponse {
    Single { embedding: Vec<f32> },
    Batch { data: Vec<EmbeddingData> },
}

impl EmbeddingResponse {
    fn into_vector(self) -> Option<Vec<f32>> {
        match self {
            EmbeddingResponse::Single { embedding } => Some(embedding),
            EmbeddingResponse::Batch { data } => data.into_iter().next().map(|d| d.embedding),
        }
    }
}

/// Embedder backed by a remote HTTP endpoint.
///
/// Connection failures and 5xx/429 responses are retried with exponential
/// backoff; other client errors fail immediately.
#[derive(Debug, Clone)]
pub struct HttpEmbedder {
    client: reqwest::Client,
    url: String,
    model: String,
    dimension: usize,
    backoff: ExponentialBackoff,
}

impl HttpEmbedder {
    pub fn new(url: impl Into<String>, model: impl Into<String>, dimension: usize) -> Self {
        let backoff = ExponentialBackoff {
            max_elapsed_time: Some(Duration::from_secs(10)),
            ..ExponentialBackoff::default()
        };
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            model: model.into(),
            dimension,
            backoff,
        }
    }

    pub fn with_backoff(mut self, backoff: ExponentialBackoff) -> Self {
        self.backoff = backoff;
        self
    }

    async fn request(&self, text: &str) -> std::result::Result<Vec<f32>, backoff::Error<Error>> {
        let body = EmbeddingRequest { model: &self.model, input: text };
        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| backoff::Error::transient(Error::from(e)))?;

        let status = response.status();
        if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            warn!(%status, url = %self.url, "Embedding request failed, retrying");
            return Err(backoff::Error::transient(Error::Upstream(format!(
                "embedding service returned {}",
                status
            ))));
        }
        if !status.is_success() {
            return Err(backoff::Error::permanent(Error::Upstream(format!(
                "embedding service returned {}",
                status
            ))));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| backoff::Error::permanent(Error::Upstream(format!("invalid embedding response: {}", e))))?;
        parsed
            .into_vector()
            .ok_or_else(|| backoff::Error::permanent(Error::Upstream("embedding response had no data".into())))
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let vector = retry(self.backoff.clone(), || self.request(text)).await?;
        if vector.len() != self.dimension {
            return Err(Error::Upstream(format!(
                "embedding service returned {} dimensions, expected {}",
                vector.len(),
                self.dimension
            )));
        }
        debug!(model = %self.model, dimension = vector.len(), "Embedded text");
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> String {
        self.model.clone()
    }
}
