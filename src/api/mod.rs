//! HTTP surface: artifact routes, health check, the upload page and the
//! layers shared by all of them.

pub mod artifacts;

use axum::{extract::DefaultBodyLimit, middleware, response::Json, routing::get, Router};
use serde::Serialize;
use std::path::PathBuf;
use tower_http::{cors::CorsLayer, services::ServeFile};

use crate::middleware::request_logging;

pub use artifacts::{artifact_router, ApiError, AppState, UNSUPPORTED_METHOD_MESSAGE};

/// Knobs for [`app_router`] that come from configuration.
#[derive(Debug, Clone)]
pub struct RouterOptions {
    pub max_upload_bytes: usize,
    /// Static page served at `/`. Not mounted when `None`.
    pub index_page: Option<PathBuf>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

/// Health check endpoint
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Create the full application router.
pub fn app_router(state: AppState, options: RouterOptions) -> Router {
    let mut router = Router::new()
        .route("/health", get(health_check))
        .merge(artifact_router());

    if let Some(page) = options.index_page {
        router = router.route_service("/", ServeFile::new(page));
    }

    router
        .with_state(state)
        .layer(DefaultBodyLimit::max(options.max_upload_bytes))
        .layer(middleware::from_fn(request_logging))
        .layer(CorsLayer::permissive())
}
