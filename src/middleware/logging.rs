//! Request logging middleware.
//!
//! Logs every HTTP request with method, path, status code, and latency.

use axum::{body::Body, http::Request, middleware::Next, response::Response};
use std::time::Instant;
use tracing::{info, warn, Instrument};

/// Middleware that logs HTTP requests with timing information.
///
/// Logs at INFO level for successful and client-error requests, WARN level
/// for server errors. Health checks are not logged.
pub async fn request_logging(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    // Skip logging for health checks to reduce noise
    if path == "/health" {
        return next.run(request).await;
    }

    let start = Instant::now();

    // Create a span for this request
    let span = tracing::info_span!(
        "http_request",
        method = %method,
        path = %path,
        status = tracing::field::Empty,
        latency_ms = tracing::field::Empty,
    );

    let response = next.run(request).instrument(span.clone()).await;

    let latency = start.elapsed();
    let status = response.status().as_u16();

    // Record values in span
    span.record("status", status);
    span.record("latency_ms", latency.as_millis() as u64);

    span.in_scope(|| {
        if status >= 500 {
            warn!(
                method = %method,
                path = %path,
                status = status,
                latency_ms = latency.as_millis(),
                "Request failed (5xx)"
            );
        } else if status >= 400 {
            info!(
                method = %method,
                path = %path,
                status = status,
                latency_ms = latency.as_millis(),
                "Request completed (4xx)"
            );
        } else {
            info!(
                method = %method,
                path = %path,
                status = status,
                latency_ms = latency.as_millis(),
                "Request completed"
            );
        }
    });

    response
}
