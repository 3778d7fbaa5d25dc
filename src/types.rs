use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// Longest metadata key accepted by the stores
pub const MAX_METADATA_KEY_LEN: usize = 256;

/// Open string-keyed metadata attached to documents and nodes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(pub BTreeMap<String, Value>);

impl Metadata {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Build metadata from a JSON value; anything other than an object is rejected
    pub fn from_json(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self(map.into_iter().collect())),
            Value::Null => Ok(Self::new()),
            other => Err(Error::Validation(format!(
                "metadata must be a JSON object, got {}",
                other
            ))),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Checked by the store adapters on every write
    pub fn validate(&self) -> Result<()> {
        for key in self.0.keys() {
            if key.trim().is_empty() {
                return Err(Error::Validation("metadata keys must not be empty".into()));
            }
            if key.len() > MAX_METADATA_KEY_LEN {
                return Err(Error::Validation(format!(
                    "metadata key exceeds {} bytes: {}...",
                    MAX_METADATA_KEY_LEN,
                    &key[..key.char_indices().nth(32).map(|(i, _)| i).unwrap_or(key.len())]
                )));
            }
        }
        Ok(())
    }
}

/// Text plus its embedding, owned by the vector store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub text: String,
    pub embedding: Vec<f32>,
    #[serde(default)]
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    pub fn new(id: impl Into<String>, text: impl Into<String>, embedding: Vec<f32>, metadata: Metadata) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            text: text.into(),
            embedding,
            metadata,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Labeled node, owned by the graph store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub metadata: Metadata,
}

impl GraphNode {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            metadata: Metadata::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Directed, typed, weighted edge. The triple (source, target, type) identifies it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub relationship_type: String,
    pub weight: f32,
}

impl GraphEdge {
    pub fn new(
        source: impl Into<String>,
        target: impl Into<String>,
        relationship_type: impl Into<String>,
        weight: f32,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            relationship_type: relationship_type.into(),
            weight,
        }
    }

    /// The endpoint on the other side of `node_id`, if the edge touches it
    pub fn other_end(&self, node_id: &str) -> Option<&str> {
        if self.source == node_id {
            Some(&self.target)
        } else if self.target == node_id {
            Some(&self.source)
        } else {
            None
        }
    }

    pub fn same_identity(&self, other: &GraphEdge) -> bool {
        self.source == other.source
            && self.target == other.target
            && self.relationship_type == other.relationship_type
    }
}

/// Clamp an edge weight into [0, 1]; non-finite weights are rejected
pub fn clamp_weight(weight: f32) -> Result<f32> {
    if !weight.is_finite() {
        return Err(Error::Validation(format!("edge weight must be finite, got {}", weight)));
    }
    Ok(weight.clamp(0.0, 1.0))
}

/// One nearest-neighbour hit from the vector store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchCandidate {
    #[serde(rename = "docId")]
    pub doc_id: String,
    pub text: String,
    pub distance: f32,
    pub similarity: f32,
    pub metadata: Metadata,
}

/// A fused, ranked result of a hybrid or vector search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HybridResult {
    pub rank: usize,
    #[serde(rename = "docId")]
    pub doc_id: String,
    pub text: String,
    pub similarity: f32,
    pub graph_boost: f32,
    pub hybrid_score: f32,
    pub metadata: Metadata,
}

/// One traversed edge on a multi-hop path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathStep {
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub relationship_type: String,
    pub weight: f32,
}

impl From<&GraphEdge> for PathStep {
    fn from(edge: &GraphEdge) -> Self {
        Self {
            source: edge.source.clone(),
            target: edge.target.clone(),
            relationship_type: edge.relationship_type.clone(),
            weight: edge.weight,
        }
    }
}

/// Route from the start node to one reachable node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Path {
    pub start: GraphNode,
    pub related: GraphNode,
    pub relationships: Vec<PathStep>,
    pub hop_count: usize,
}

/// Where an ingestion payload is written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageTarget {
    Vector,
    Graph,
    Hybrid,
}

impl StorageTarget {
    /// Entities go to the graph; a document is written when there are none or when dual-write is on
    pub fn decide(has_entities: bool, dual_write: bool) -> Self {
        match (has_entities, dual_write) {
            (false, _) => StorageTarget::Vector,
            (true, false) => StorageTarget::Graph,
            (true, true) => StorageTarget::Hybrid,
        }
    }

    pub fn writes_vector(&self) -> bool {
        matches!(self, StorageTarget::Vector | StorageTarget::Hybrid)
    }

    pub fn writes_graph(&self) -> bool {
        matches!(self, StorageTarget::Graph | StorageTarget::Hybrid)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StorageTarget::Vector => "vector",
            StorageTarget::Graph => "graph",
            StorageTarget::Hybrid => "hybrid",
        }
    }
}

impl fmt::Display for StorageTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a store reacts to an add whose id is already present
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdPolicy {
    #[default]
    Reject,
    Upsert,
}

impl FromStr for IdPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "reject" => Ok(IdPolicy::Reject),
            "upsert" => Ok(IdPolicy::Upsert),
            other => Err(Error::Configuration(format!("unknown id policy: {}", other))),
        }
    }
}

/// Counters reported by the vector store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorStats {
    pub total_documents: usize,
    pub embedding_dimension: usize,
    pub last_updated: Option<DateTime<Utc>>,
}

/// Counters reported by the graph store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphStats {
    pub total_nodes: usize,
    pub total_edges: usize,
}
