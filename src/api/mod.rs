//! HTTP surface of the engine
//!
//! Everything except `/health` and the OpenAPI document lives under `/hybrid`.

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod state;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use utoipa::OpenApi;

pub use error::{ApiError, ApiResult};
pub use state::ApiState;

use models::*;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health_check,
        handlers::ingest,
        handlers::create_node,
        handlers::create_edge,
        handlers::search,
        handlers::hybrid_search,
        handlers::vector_search,
        handlers::graph_search,
        handlers::multi_hop,
        handlers::stats,
        handlers::list_documents,
        handlers::get_document,
        handlers::update_document,
        handlers::delete_document,
    ),
    components(schemas(
        IngestData,
        IngestRequest,
        DataStoredResponse,
        IngestResponse,
        CreateNodeRequest,
        NodeResponse,
        CreateEdgeRequest,
        EdgeResponse,
        SearchRequest,
        HybridSearchRequest,
        VectorSearchRequest,
        HybridResultResponse,
        HybridSearchResponse,
        VectorResultResponse,
        VectorSearchResponse,
        GraphSearchResponse,
        RelationshipResponse,
        PathResponse,
        MultiHopResponse,
        VectorStatsResponse,
        GraphStatsResponse,
        StatsResponse,
        DocumentResponse,
        DocumentListResponse,
        UpdateDocumentRequest,
        DeleteResponse,
        HealthResponse,
        ErrorResponse,
    )),
    tags(
        (name = "health", description = "Service health"),
        (name = "ingest", description = "Text ingestion"),
        (name = "graph", description = "Direct graph writes"),
        (name = "search", description = "Vector, hybrid, graph and multi-hop retrieval"),
        (name = "documents", description = "Stored document lifecycle"),
        (name = "stats", description = "Store statistics"),
    ),
    info(
        title = "Hybrid RAG API",
        description = "Hybrid vector + knowledge graph retrieval"
    )
)]
pub struct ApiDoc;

/// Create the API router
pub fn create_router(state: Arc<ApiState>) -> Router {
    let body_limit = state.max_body_bytes();

    let hybrid = Router::new()
        .route("/ingest", post(handlers::ingest))
        .route("/nodes", post(handlers::create_node))
        .route("/edges", post(handlers::create_edge))
        .route("/search", post(handlers::search))
        .route("/search/hybrid", post(handlers::hybrid_search))
        .route("/search/vector", post(handlers::vector_search))
        .route("/search/graph", get(handlers::graph_search))
        .route("/search/multi-hop", get(handlers::multi_hop))
        .route("/stats", get(handlers::stats))
        .route("/documents", get(handlers::list_documents))
        .route(
            "/documents/:id",
            get(handlers::get_document)
                .put(handlers::update_document)
                .delete(handlers::delete_document),
        );

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/api-docs/openapi.json", get(handlers::openapi))
        .nest("/hybrid", hybrid)
        .layer(from_fn(middleware::request_logger))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_hybrid_routes() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();
        for expected in [
            "/health",
            "/hybrid/ingest",
            "/hybrid/search/hybrid",
            "/hybrid/search/multi-hop",
            "/hybrid/documents/{id}",
        ] {
            assert!(
                paths.iter().any(|p| p.as_str() == expected),
                "missing {} in {:?}",
                expected,
                paths
            );
        }
    }
}
