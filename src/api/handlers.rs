use std::sync::Arc;

use axum::{
    extract::{FromRequest, FromRequestParts, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde_json::Value;
use utoipa::OpenApi;

use crate::{
    api::{models::*, ApiDoc, ApiError, ApiResult, ApiState},
    error::Error as CoreError,
    hybrid::HybridQuery,
    types::{GraphEdge, Metadata},
};

/// Hop and depth limit used when a request omits it
pub const DEFAULT_DEPTH: usize = 2;
/// Weight of an edge created without one
pub const DEFAULT_EDGE_WEIGHT: f32 = 1.0;

/// JSON body extractor whose rejections use the API error format
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Query string extractor whose rejections use the API error format
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

fn required(value: Option<String>, field: &str) -> Result<String, CoreError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(CoreError::Validation(format!("{} is required", field))),
    }
}

fn metadata(value: Option<Value>) -> Result<Metadata, CoreError> {
    Metadata::from_json(value.unwrap_or(Value::Null))
}

/// Check health status of the API
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "API health status", body = HealthResponse)
    )
)]
pub async fn health_check(State(state): State<Arc<ApiState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        timestamp: Utc::now(),
        version: crate::VERSION.to_string(),
        uptime_secs: state.uptime().as_secs(),
    })
}

/// Serve the OpenAPI document
pub async fn openapi() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Ingest unstructured text
///
/// Entities are written to the graph; the text itself is embedded and stored
/// when no entities were found or dual-write is enabled.
#[utoipa::path(
    post,
    path = "/hybrid/ingest",
    tag = "ingest",
    request_body = IngestRequest,
    responses(
        (status = 200, description = "Text ingested", body = IngestResponse),
        (status = 400, description = "Missing or empty text", body = ErrorResponse),
        (status = 500, description = "Only one of the two stores accepted the data", body = ErrorResponse),
        (status = 502, description = "Extractor, embedder or store failure", body = ErrorResponse)
    )
)]
#[axum::debug_handler]
pub async fn ingest(
    State(state): State<Arc<ApiState>>,
    ApiJson(request): ApiJson<IngestRequest>,
) -> ApiResult<Json<IngestResponse>> {
    let data = request
        .data
        .ok_or_else(|| CoreError::Validation("data is required".into()))?;
    let text = required(data.text, "data.text")?;
    let metadata = metadata(data.metadata)?;

    let report = state.engine.ingest(&text, metadata).await?;
    Ok(Json(report.into()))
}

/// Create a node together with a searchable document of the same id
#[utoipa::path(
    post,
    path = "/hybrid/nodes",
    tag = "graph",
    request_body = CreateNodeRequest,
    responses(
        (status = 201, description = "Node created", body = NodeResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 409, description = "Id already exists", body = ErrorResponse)
    )
)]
#[axum::debug_handler]
pub async fn create_node(
    State(state): State<Arc<ApiState>>,
    ApiJson(request): ApiJson<CreateNodeRequest>,
) -> ApiResult<impl IntoResponse> {
    let id = required(request.id, "id")?;
    let text = required(request.text, "text")?;
    let metadata = metadata(request.metadata)?;

    let node = state.engine.add_node(&id, &text, metadata).await?;
    Ok((StatusCode::CREATED, Json(NodeResponse::from(node))))
}

/// Create a typed, weighted edge between two existing nodes
#[utoipa::path(
    post,
    path = "/hybrid/edges",
    tag = "graph",
    request_body = CreateEdgeRequest,
    responses(
        (status = 201, description = "Edge created", body = EdgeResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 404, description = "Unknown endpoint node", body = ErrorResponse)
    )
)]
#[axum::debug_handler]
pub async fn create_edge(
    State(state): State<Arc<ApiState>>,
    ApiJson(request): ApiJson<CreateEdgeRequest>,
) -> ApiResult<impl IntoResponse> {
    let edge = GraphEdge::new(
        required(request.source, "source")?,
        required(request.target, "target")?,
        required(request.relationship_type, "type")?,
        request.weight.unwrap_or(DEFAULT_EDGE_WEIGHT),
    );

    let stored = state.engine.add_edge(edge).await?;
    Ok((StatusCode::CREATED, Json(EdgeResponse::from(stored))))
}

/// Search with either the hybrid or the vector-only ranking
#[utoipa::path(
    post,
    path = "/hybrid/search",
    tag = "search",
    request_body = SearchRequest,
    responses(
        (status = 200, description = "Ranked results; shape follows `type`", body = HybridSearchResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse)
    )
)]
pub async fn search(
    State(state): State<Arc<ApiState>>,
    ApiJson(request): ApiJson<SearchRequest>,
) -> ApiResult<Response> {
    match request.search_type.as_deref().unwrap_or("hybrid") {
        "hybrid" => {
            let request = HybridSearchRequest {
                query: request.query,
                vector_weight: request.vector_weight,
                graph_weight: request.graph_weight,
                top_k: request.top_k,
            };
            Ok(run_hybrid(&state, request).await?.into_response())
        }
        "vector" => {
            let request = VectorSearchRequest {
                query: request.query,
                top_k: request.top_k,
            };
            Ok(run_vector(&state, request).await?.into_response())
        }
        other => Err(CoreError::Validation(format!(
            "type must be \"hybrid\" or \"vector\", got \"{}\"",
            other
        ))
        .into()),
    }
}

/// Hybrid vector + graph search
#[utoipa::path(
    post,
    path = "/hybrid/search/hybrid",
    tag = "search",
    request_body = HybridSearchRequest,
    responses(
        (status = 200, description = "Ranked results", body = HybridSearchResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 502, description = "Store or embedder failure", body = ErrorResponse),
        (status = 504, description = "Deadline exceeded", body = ErrorResponse)
    )
)]
pub async fn hybrid_search(
    State(state): State<Arc<ApiState>>,
    ApiJson(request): ApiJson<HybridSearchRequest>,
) -> ApiResult<Json<HybridSearchResponse>> {
    run_hybrid(&state, request).await
}

async fn run_hybrid(state: &ApiState, request: HybridSearchRequest) -> ApiResult<Json<HybridSearchResponse>> {
    let query = required(request.query, "query")?;
    let defaults = crate::hybrid::Weights::default();
    let query = HybridQuery::new(query)
        .with_weights(
            request.vector_weight.unwrap_or(defaults.vector),
            request.graph_weight.unwrap_or(defaults.graph),
        )
        .with_top_k(request.top_k.unwrap_or_else(|| state.default_top_k()));

    let response = state.engine.hybrid_search(&query).await?;
    Ok(Json(response.into()))
}

/// Vector similarity search
#[utoipa::path(
    post,
    path = "/hybrid/search/vector",
    tag = "search",
    request_body = VectorSearchRequest,
    responses(
        (status = 200, description = "Results ordered by similarity", body = VectorSearchResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse)
    )
)]
pub async fn vector_search(
    State(state): State<Arc<ApiState>>,
    ApiJson(request): ApiJson<VectorSearchRequest>,
) -> ApiResult<Json<VectorSearchResponse>> {
    run_vector(&state, request).await
}

async fn run_vector(state: &ApiState, request: VectorSearchRequest) -> ApiResult<Json<VectorSearchResponse>> {
    let query = required(request.query, "query")?;
    let top_k = request.top_k.unwrap_or_else(|| state.default_top_k());

    let response = state.engine.vector_search(&query, top_k).await?;
    Ok(Json(response.into()))
}

/// Nodes reachable from a start node
#[utoipa::path(
    get,
    path = "/hybrid/search/graph",
    tag = "search",
    params(GraphSearchParams),
    responses(
        (status = 200, description = "Reachable nodes", body = GraphSearchResponse),
        (status = 400, description = "Missing start_id", body = ErrorResponse),
        (status = 404, description = "Unknown start node", body = ErrorResponse)
    )
)]
pub async fn graph_search(
    State(state): State<Arc<ApiState>>,
    ApiQuery(params): ApiQuery<GraphSearchParams>,
) -> ApiResult<Json<GraphSearchResponse>> {
    let start_id = required(params.start_id, "start_id")?;
    let depth = params.depth.unwrap_or(DEFAULT_DEPTH);

    let response = state.engine.graph_search(&start_id, depth).await?;
    Ok(Json(GraphSearchResponse {
        start_id: response.start_id,
        depth: response.depth,
        nodes: response.nodes.into_iter().map(Into::into).collect(),
    }))
}

/// Multi-hop traversal over typed relationships
#[utoipa::path(
    get,
    path = "/hybrid/search/multi-hop",
    tag = "search",
    params(MultiHopParams),
    responses(
        (status = 200, description = "One path per reachable node", body = MultiHopResponse),
        (status = 400, description = "Missing start_id or invalid hops", body = ErrorResponse),
        (status = 404, description = "Unknown start node", body = ErrorResponse)
    )
)]
pub async fn multi_hop(
    State(state): State<Arc<ApiState>>,
    ApiQuery(params): ApiQuery<MultiHopParams>,
) -> ApiResult<Json<MultiHopResponse>> {
    let start_id = required(params.start_id, "start_id")?;
    let hops = params.hops.unwrap_or(DEFAULT_DEPTH);
    let types: Option<Vec<String>> = params.relationship_types.map(|list| {
        list.split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    });

    let result = state.engine.multi_hop(&start_id, hops, types.as_deref()).await?;
    Ok(Json(result.into()))
}

/// Counters of both stores
#[utoipa::path(
    get,
    path = "/hybrid/stats",
    tag = "stats",
    responses(
        (status = 200, description = "Store statistics", body = StatsResponse)
    )
)]
pub async fn stats(State(state): State<Arc<ApiState>>) -> ApiResult<Json<StatsResponse>> {
    let stats = state.engine.stats().await?;
    Ok(Json(stats.into()))
}

/// List stored documents in insertion order
#[utoipa::path(
    get,
    path = "/hybrid/documents",
    tag = "documents",
    params(ListDocumentsParams),
    responses(
        (status = 200, description = "Documents", body = DocumentListResponse)
    )
)]
pub async fn list_documents(
    State(state): State<Arc<ApiState>>,
    ApiQuery(params): ApiQuery<ListDocumentsParams>,
) -> ApiResult<Json<DocumentListResponse>> {
    let documents: Vec<DocumentResponse> = state
        .engine
        .list_documents(params.limit)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();
    Ok(Json(DocumentListResponse {
        total: documents.len(),
        documents,
    }))
}

/// Get a document by id
#[utoipa::path(
    get,
    path = "/hybrid/documents/{id}",
    tag = "documents",
    params(("id" = String, Path, description = "Document id")),
    responses(
        (status = 200, description = "Document", body = DocumentResponse),
        (status = 404, description = "Unknown document", body = ErrorResponse)
    )
)]
pub async fn get_document(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<DocumentResponse>> {
    let document = state.engine.get_document(&id).await?;
    Ok(Json(document.into()))
}

/// Replace a document's text and/or metadata
#[utoipa::path(
    put,
    path = "/hybrid/documents/{id}",
    tag = "documents",
    params(("id" = String, Path, description = "Document id")),
    request_body = UpdateDocumentRequest,
    responses(
        (status = 200, description = "Updated document", body = DocumentResponse),
        (status = 404, description = "Unknown document", body = ErrorResponse)
    )
)]
pub async fn update_document(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<UpdateDocumentRequest>,
) -> ApiResult<Json<DocumentResponse>> {
    let metadata = request.metadata.map(Metadata::from_json).transpose()?;
    let document = state.engine.update_document(&id, request.text, metadata).await?;
    Ok(Json(document.into()))
}

/// Delete a document
#[utoipa::path(
    delete,
    path = "/hybrid/documents/{id}",
    tag = "documents",
    params(("id" = String, Path, description = "Document id")),
    responses(
        (status = 200, description = "Document deleted", body = DeleteResponse),
        (status = 404, description = "Unknown document", body = ErrorResponse)
    )
)]
pub async fn delete_document(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<DeleteResponse>> {
    state.engine.delete_document(&id).await?;
    Ok(Json(DeleteResponse { id, deleted: true }))
}
