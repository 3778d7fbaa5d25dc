use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use hybrid_rag::{
    api::{create_router, ApiState},
    config::{Config, ExtractorKind},
    HybridEngine,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tower::ServiceExt;

fn app_with(config: Config) -> Router {
    let engine = HybridEngine::from_config(config).unwrap();
    create_router(Arc::new(ApiState::new(engine)))
}

fn app() -> Router {
    app_with(Config::for_testing())
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn seed_graph(app: &Router) {
    let (status, _) = send(
        app,
        "POST",
        "/hybrid/nodes",
        Some(json!({
            "id": "ai_healthcare",
            "text": "AI in healthcare improves diagnostics",
            "metadata": { "type": "Concept" }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = send(
        app,
        "POST",
        "/hybrid/nodes",
        Some(json!({
            "id": "cancer_ml",
            "text": "Machine learning detects cancer early",
            "metadata": { "type": "Concept" }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, edge) = send(
        app,
        "POST",
        "/hybrid/edges",
        Some(json!({
            "source": "ai_healthcare",
            "target": "cancer_ml",
            "type": "USES",
            "weight": 0.9
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(edge["type"], "USES");
}

#[tokio::test]
async fn test_health() {
    let (status, body) = send(&app(), "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(body["version"].is_string());
    assert!(body["uptime_secs"].is_number());
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let (status, body) = send(&app(), "GET", "/api-docs/openapi.json", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"]["/hybrid/search/hybrid"].is_object());
}

#[tokio::test]
async fn test_ingest_validation_errors() {
    let app = app();

    let (status, body) = send(&app, "POST", "/hybrid/ingest", Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "validation_error");
    assert_eq!(body["code"], 400);

    let (status, body) =
        send(&app, "POST", "/hybrid/ingest", Some(json!({ "data": { "text": "   " } }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "validation_error");

    let request = Request::builder()
        .method("POST")
        .uri("/hybrid/ingest")
        .header("Content-Type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_ingest_without_entities_routes_to_vector() {
    let mut config = Config::for_testing();
    config.extractor = ExtractorKind::None;
    let app = app_with(config);

    let (status, body) = send(
        &app,
        "POST",
        "/hybrid/ingest",
        Some(json!({ "data": { "text": "plain words only", "metadata": { "source": "test" } } })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["routed_to"], "vector");
    assert_eq!(body["data_stored"]["documents"], 1);
    assert_eq!(body["data_stored"]["nodes"], 0);

    let doc_id = body["document_id"].as_str().unwrap().to_string();
    let (status, doc) = send(&app, "GET", &format!("/hybrid/documents/{}", doc_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(doc["metadata"]["source"], "test");
}

#[tokio::test]
async fn test_ingest_with_entities_writes_both_stores() {
    let app = app();
    let (status, body) = send(
        &app,
        "POST",
        "/hybrid/ingest",
        Some(json!({ "data": { "text": "Mayo Clinic uses Machine Learning for diagnostics." } })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["routed_to"], "hybrid");
    assert!(body["data_stored"]["nodes"].as_u64().unwrap() >= 2);

    let (_, stats) = send(&app, "GET", "/hybrid/stats", None).await;
    assert_eq!(stats["total_documents"], 1);
    assert!(stats["total_edges"].as_u64().unwrap() >= 1);
}

#[tokio::test]
async fn test_graph_endpoints() {
    let app = app();
    seed_graph(&app).await;

    let (status, body) = send(&app, "POST", "/hybrid/nodes", Some(json!({ "id": "ai_healthcare", "text": "again" }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "conflict");

    let (status, body) = send(
        &app,
        "POST",
        "/hybrid/edges",
        Some(json!({ "source": "ai_healthcare", "target": "ghost", "type": "USES" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "not_found");

    let (status, body) = send(&app, "GET", "/hybrid/search/graph?start_id=ai_healthcare&depth=2", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["nodes"].as_array().unwrap().len(), 1);
    assert_eq!(body["nodes"][0]["id"], "cancer_ml");

    let (status, body) = send(&app, "GET", "/hybrid/search/graph?depth=2", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "validation_error");

    let (status, _) = send(&app, "GET", "/hybrid/search/graph?start_id=nobody", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_multi_hop() {
    let app = app();
    seed_graph(&app).await;

    let (status, body) = send(
        &app,
        "GET",
        "/hybrid/search/multi-hop?start_id=ai_healthcare&hops=2&relationship_types=USES",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_paths"], 1);
    assert_eq!(body["relationship_types"], json!(["USES"]));
    assert_eq!(body["paths"][0]["related"]["id"], "cancer_ml");
    assert_eq!(body["paths"][0]["hop_count"], 1);
    assert_eq!(body["paths"][0]["relationships"][0]["type"], "USES");

    let (_, body) = send(
        &app,
        "GET",
        "/hybrid/search/multi-hop?start_id=ai_healthcare&relationship_types=PART_OF",
        None,
    )
    .await;
    assert_eq!(body["total_paths"], 0);

    let (status, _) = send(&app, "GET", "/hybrid/search/multi-hop?start_id=ai_healthcare&hops=0", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_search_endpoints() {
    let app = app();
    seed_graph(&app).await;

    let (status, body) = send(
        &app,
        "POST",
        "/hybrid/search/hybrid",
        Some(json!({ "query": "AI healthcare cancer diagnostics", "top_k": 5 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["type"], "hybrid");
    assert_eq!(body["vector_weight"], 0.7);
    assert_eq!(body["results"].as_array().unwrap().len(), 2);
    assert_eq!(body["results"][0]["rank"], 1);
    assert_eq!(body["graph_boosts"], 2);

    let (status, body) = send(
        &app,
        "POST",
        "/hybrid/search/vector",
        Some(json!({ "query": "cancer", "top_k": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["type"], "vector");
    assert_eq!(body["results"].as_array().unwrap().len(), 1);

    let (status, body) = send(
        &app,
        "POST",
        "/hybrid/search",
        Some(json!({ "query": "cancer", "type": "vector" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["type"], "vector");

    let (status, body) = send(
        &app,
        "POST",
        "/hybrid/search",
        Some(json!({ "query": "cancer", "type": "fuzzy" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "validation_error");

    let (status, _) = send(
        &app,
        "POST",
        "/hybrid/search/hybrid",
        Some(json!({ "query": "cancer", "vector_weight": 0.0, "graph_weight": 0.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_stats() {
    let app = app();
    let (status, body) = send(&app, "GET", "/hybrid/stats", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_nodes"], 0);
    assert_eq!(body["graph_density"], 0.0);

    seed_graph(&app).await;
    let (_, body) = send(&app, "GET", "/hybrid/stats", None).await;
    assert_eq!(body["total_nodes"], 2);
    assert_eq!(body["total_documents"], 2);
    assert_eq!(body["total_edges"], 1);
    assert_eq!(body["graph_density"], 0.5);
    assert_eq!(body["vector"]["embeddingDimension"], 64);
}

#[tokio::test]
async fn test_document_lifecycle() {
    let app = app();
    seed_graph(&app).await;

    let (status, body) = send(&app, "GET", "/hybrid/documents?limit=1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["documents"][0]["id"], "ai_healthcare");

    let (status, body) = send(
        &app,
        "PUT",
        "/hybrid/documents/cancer_ml",
        Some(json!({ "text": "Deep learning finds tumours" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["text"], "Deep learning finds tumours");
    assert_eq!(body["metadata"]["type"], "Concept");

    let (status, body) = send(&app, "DELETE", "/hybrid/documents/cancer_ml", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"], true);

    let (status, body) = send(&app, "GET", "/hybrid/documents/cancer_ml", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], 404);
}
