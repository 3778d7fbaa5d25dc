use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::{IntoParams, ToSchema};

use crate::{
    hybrid::HybridResponse,
    ingest::IngestReport,
    reasoning::MultiHopResult,
    stats::EngineStats,
    types::{Document, GraphEdge, GraphNode, HybridResult, Metadata, Path, PathStep},
};

/// Payload of an ingestion request
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct IngestData {
    /// Raw text to route into the stores
    pub text: Option<String>,
    /// Optional metadata attached to the stored document
    #[schema(value_type = Option<Object>)]
    pub metadata: Option<Value>,
}

/// Request to ingest unstructured text
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct IngestRequest {
    pub data: Option<IngestData>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DataStoredResponse {
    pub documents: usize,
    pub nodes: usize,
    pub edges: usize,
}

/// Where ingested text ended up
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct IngestResponse {
    /// `vector`, `graph` or `hybrid`
    pub routed_to: String,
    pub cleaned_text_length: usize,
    pub data_stored: DataStoredResponse,
    pub document_id: Option<String>,
    pub node_ids: Vec<String>,
    pub warnings: Vec<String>,
}

impl From<IngestReport> for IngestResponse {
    fn from(report: IngestReport) -> Self {
        Self {
            routed_to: report.routed_to.to_string(),
            cleaned_text_length: report.cleaned_text_length,
            data_stored: DataStoredResponse {
                documents: report.data_stored.documents,
                nodes: report.data_stored.nodes,
                edges: report.data_stored.edges,
            },
            document_id: report.document_id,
            node_ids: report.node_ids,
            warnings: report.warnings,
        }
    }
}

/// Request to create a node that also carries searchable text
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateNodeRequest {
    pub id: Option<String>,
    pub text: Option<String>,
    /// `type` or `label` sets the node label
    #[schema(value_type = Option<Object>)]
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct NodeResponse {
    pub id: String,
    pub label: String,
    #[schema(value_type = Object)]
    pub metadata: Metadata,
}

impl From<GraphNode> for NodeResponse {
    fn from(node: GraphNode) -> Self {
        Self {
            id: node.id,
            label: node.label,
            metadata: node.metadata,
        }
    }
}

/// Request to create a typed, weighted edge
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateEdgeRequest {
    pub source: Option<String>,
    pub target: Option<String>,
    #[serde(rename = "type")]
    pub relationship_type: Option<String>,
    /// Clamped to [0, 1]; defaults to 1
    pub weight: Option<f32>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EdgeResponse {
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub relationship_type: String,
    pub weight: f32,
}

impl From<GraphEdge> for EdgeResponse {
    fn from(edge: GraphEdge) -> Self {
        Self {
            source: edge.source,
            target: edge.target,
            relationship_type: edge.relationship_type,
            weight: edge.weight,
        }
    }
}

/// Hybrid search request; weights are normalised to sum to 1
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct HybridSearchRequest {
    pub query: Option<String>,
    pub vector_weight: Option<f32>,
    pub graph_weight: Option<f32>,
    pub top_k: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct VectorSearchRequest {
    pub query: Option<String>,
    pub top_k: Option<usize>,
}

/// Combined search endpoint dispatching on `type`
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SearchRequest {
    pub query: Option<String>,
    /// `hybrid` (default) or `vector`
    #[serde(rename = "type")]
    pub search_type: Option<String>,
    pub vector_weight: Option<f32>,
    pub graph_weight: Option<f32>,
    pub top_k: Option<usize>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct HybridResultResponse {
    pub rank: usize,
    #[serde(rename = "docId")]
    pub doc_id: String,
    pub text: String,
    pub similarity: f32,
    pub graph_boost: f32,
    pub hybrid_score: f32,
    #[schema(value_type = Object)]
    pub metadata: Metadata,
}

impl From<HybridResult> for HybridResultResponse {
    fn from(r: HybridResult) -> Self {
        Self {
            rank: r.rank,
            doc_id: r.doc_id,
            text: r.text,
            similarity: r.similarity,
            graph_boost: r.graph_boost,
            hybrid_score: r.hybrid_score,
            metadata: r.metadata,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct HybridSearchResponse {
    #[serde(rename = "type")]
    pub search_type: String,
    pub query: String,
    pub vector_weight: f32,
    pub graph_weight: f32,
    pub results: Vec<HybridResultResponse>,
    pub vector_hits: usize,
    pub graph_boosts: usize,
    pub latency_ms: u64,
}

impl From<HybridResponse> for HybridSearchResponse {
    fn from(response: HybridResponse) -> Self {
        Self {
            search_type: "hybrid".to_string(),
            query: response.query,
            vector_weight: response.weights.vector,
            graph_weight: response.weights.graph,
            results: response.results.into_iter().map(Into::into).collect(),
            vector_hits: response.vector_hits,
            graph_boosts: response.graph_boosts,
            latency_ms: response.latency_ms,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct VectorResultResponse {
    pub rank: usize,
    #[serde(rename = "docId")]
    pub doc_id: String,
    pub text: String,
    pub similarity: f32,
    #[schema(value_type = Object)]
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct VectorSearchResponse {
    #[serde(rename = "type")]
    pub search_type: String,
    pub query: String,
    pub results: Vec<VectorResultResponse>,
    pub vector_hits: usize,
    pub latency_ms: u64,
}

impl From<HybridResponse> for VectorSearchResponse {
    fn from(response: HybridResponse) -> Self {
        Self {
            search_type: "vector".to_string(),
            query: response.query,
            results: response
                .results
                .into_iter()
                .map(|r| VectorResultResponse {
                    rank: r.rank,
                    doc_id: r.doc_id,
                    text: r.text,
                    similarity: r.similarity,
                    metadata: r.metadata,
                })
                .collect(),
            vector_hits: response.vector_hits,
            latency_ms: response.latency_ms,
        }
    }
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct GraphSearchParams {
    pub start_id: Option<String>,
    /// Expansion depth, capped by the engine; defaults to 2
    pub depth: Option<usize>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GraphSearchResponse {
    pub start_id: String,
    pub depth: usize,
    pub nodes: Vec<NodeResponse>,
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct MultiHopParams {
    pub start_id: Option<String>,
    /// Hop limit, capped by the engine; defaults to 2
    pub hops: Option<usize>,
    /// Comma separated relationship types, e.g. `USES,PART_OF`
    pub relationship_types: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RelationshipResponse {
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub relationship_type: String,
    pub weight: f32,
}

impl From<PathStep> for RelationshipResponse {
    fn from(step: PathStep) -> Self {
        Self {
            source: step.source,
            target: step.target,
            relationship_type: step.relationship_type,
            weight: step.weight,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PathResponse {
    pub start: NodeResponse,
    pub related: NodeResponse,
    pub relationships: Vec<RelationshipResponse>,
    pub hop_count: usize,
}

impl From<Path> for PathResponse {
    fn from(path: Path) -> Self {
        Self {
            start: path.start.into(),
            related: path.related.into(),
            relationships: path.relationships.into_iter().map(Into::into).collect(),
            hop_count: path.hop_count,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MultiHopResponse {
    pub start_id: String,
    pub hops: usize,
    pub relationship_types: Option<Vec<String>>,
    pub total_paths: usize,
    pub paths: Vec<PathResponse>,
    pub truncated: bool,
}

impl From<MultiHopResult> for MultiHopResponse {
    fn from(result: MultiHopResult) -> Self {
        Self {
            start_id: result.start_id,
            hops: result.hops,
            relationship_types: result.relationship_types,
            total_paths: result.total_paths,
            paths: result.paths.into_iter().map(Into::into).collect(),
            truncated: result.truncated,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VectorStatsResponse {
    pub total_documents: usize,
    pub embedding_dimension: usize,
    pub last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GraphStatsResponse {
    pub total_nodes: usize,
    pub total_edges: usize,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StatsResponse {
    pub vector: VectorStatsResponse,
    pub graph: GraphStatsResponse,
    pub total_nodes: usize,
    pub total_documents: usize,
    pub total_edges: usize,
    pub graph_density: f64,
}

impl From<EngineStats> for StatsResponse {
    fn from(stats: EngineStats) -> Self {
        Self {
            vector: VectorStatsResponse {
                total_documents: stats.vector.total_documents,
                embedding_dimension: stats.vector.embedding_dimension,
                last_updated: stats.vector.last_updated,
            },
            graph: GraphStatsResponse {
                total_nodes: stats.graph.total_nodes,
                total_edges: stats.graph.total_edges,
            },
            total_nodes: stats.total_nodes,
            total_documents: stats.total_documents,
            total_edges: stats.total_edges,
            graph_density: stats.graph_density,
        }
    }
}

/// Stored document without its embedding
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DocumentResponse {
    pub id: String,
    pub text: String,
    #[schema(value_type = Object)]
    pub metadata: Metadata,
    pub embedding_dimension: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Document> for DocumentResponse {
    fn from(doc: Document) -> Self {
        Self {
            id: doc.id,
            text: doc.text,
            metadata: doc.metadata,
            embedding_dimension: doc.embedding.len(),
            created_at: doc.created_at,
            updated_at: doc.updated_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListDocumentsParams {
    /// Defaults to 1000
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DocumentListResponse {
    pub documents: Vec<DocumentResponse>,
    pub total: usize,
}

/// Replace a document's text and/or metadata
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateDocumentRequest {
    pub text: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DeleteResponse {
    pub id: String,
    pub deleted: bool,
}

/// Health check response
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
    pub uptime_secs: u64,
}

/// Error body returned by every endpoint
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    /// Stable machine-readable tag, e.g. `not_found`
    pub kind: String,
    pub code: u16,
    /// Stores that accepted a partially failed ingestion
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stored: Option<Vec<String>>,
    /// Stores that failed, with their error messages
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Vec<Object>>)]
    pub failed: Option<Vec<Value>>,
}
