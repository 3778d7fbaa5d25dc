use std::time::Instant;

use axum::{extract::Request, middleware::Next, response::Response};
use metrics::{counter, histogram};

/// Logging middleware
pub async fn request_logger(req: Request, next: Next) -> Response {
    let path = req.uri().path().to_owned();
    let method = req.method().clone();

    let start = Instant::now();
    let response = next.run(req).await;
    let latency = start.elapsed();
    let status = response.status().as_u16();

    counter!("http_requests_total", 1, "status" => status.to_string());
    histogram!("http_request_duration_ms", latency.as_secs_f64() * 1000.0);
    tracing::info!(
        method = %method,
        path = %path,
        status = status,
        latency = ?latency,
        "Request"
    );

    response
}
