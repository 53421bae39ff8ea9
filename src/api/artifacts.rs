//! Artifact API Endpoints
//!
//! # Endpoints
//!
//! - `GET /artifact?page=N` - One page of records, newest first
//! - `POST /artifact` - Upload `{"File": "<base64 jpeg>", "Type": "..."}`
//! - `GET /image?source=<file>` - Stored image bytes
//!
//! Any other method on `/artifact` gets a plain-text 405.

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinError;
use tracing::{error, warn};

use crate::artifact::{
    ArtifactInput, ArtifactRecord, ArtifactService, ImageAccessError, IngestError,
    RepositoryError,
};

pub const UNSUPPORTED_METHOD_MESSAGE: &str = "Sorry, only GET and POST methods are supported.";

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ArtifactService>,
}

impl AppState {
    pub fn new(service: ArtifactService) -> Self {
        Self {
            service: Arc::new(service),
        }
    }
}

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Internal(String),
}

impl From<IngestError> for ApiError {
    fn from(err: IngestError) -> Self {
        if err.is_client_error() {
            ApiError::BadRequest(err.to_string())
        } else {
            ApiError::Internal(err.to_string())
        }
    }
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<ImageAccessError> for ApiError {
    fn from(err: ImageAccessError) -> Self {
        match err {
            ImageAccessError::InvalidSource(_) => ApiError::BadRequest(err.to_string()),
            ImageAccessError::NotFound(_) => ApiError::NotFound(err.to_string()),
            ImageAccessError::Storage(_) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<JoinError> for ApiError {
    fn from(err: JoinError) -> Self {
        ApiError::Internal(format!("worker task failed: {err}"))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Internal(msg) => {
                error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

// =============================================================================
// HANDLERS
// =============================================================================

fn parse_page(raw: Option<&str>) -> i64 {
    match raw {
        None => 1,
        Some(raw) => raw.trim().parse().unwrap_or_else(|e| {
            warn!(page = %raw, error = %e, "Invalid page parameter, using page 1");
            1
        }),
    }
}

/// First `page` value in the query string. Extra values are ignored.
fn first_page_param(params: &[(String, String)]) -> Option<&str> {
    params
        .iter()
        .find(|(key, _)| key == "page")
        .map(|(_, value)| value.as_str())
}

/// GET /artifact - List artifacts
///
/// The query is taken as raw pairs so a repeated or malformed `page` still
/// falls back to page 1.
pub async fn list_artifacts(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<Vec<ArtifactRecord>>, ApiError> {
    let page = parse_page(first_page_param(&params));
    let service = state.service.clone();
    let records = tokio::task::spawn_blocking(move || service.list(page)).await??;
    Ok(Json(records))
}

/// POST /artifact - Upload one image
pub async fn upload_artifact(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<ArtifactRecord>, ApiError> {
    if body.is_empty() {
        return Err(ApiError::BadRequest("request body is empty".to_string()));
    }

    let input: ArtifactInput = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("invalid JSON body: {e}")))?;

    let service = state.service.clone();
    let record = tokio::task::spawn_blocking(move || service.upload(&input))
        .await?
        .map_err(|e| {
            warn!(error = %e, "Artifact upload rejected");
            ApiError::from(e)
        })?;

    Ok(Json(record))
}

#[derive(Debug, Deserialize)]
pub struct ImageQuery {
    pub source: Option<String>,
}

/// GET /image - Serve a stored image
pub async fn get_image(
    State(state): State<AppState>,
    Query(query): Query<ImageQuery>,
) -> Result<Response, ApiError> {
    let source = query
        .source
        .ok_or_else(|| ApiError::BadRequest("missing source parameter".to_string()))?;

    let service = state.service.clone();
    let bytes = tokio::task::spawn_blocking(move || service.open(&source)).await??;

    Ok(([(header::CONTENT_TYPE, "image/jpeg")], bytes).into_response())
}

async fn unsupported_method() -> (StatusCode, &'static str) {
    (StatusCode::METHOD_NOT_ALLOWED, UNSUPPORTED_METHOD_MESSAGE)
}

// =============================================================================
// ROUTER
// =============================================================================

pub fn artifact_router() -> Router<AppState> {
    Router::new()
        .route(
            "/artifact",
            get(list_artifacts)
                .post(upload_artifact)
                .fallback(unsupported_method),
        )
        .route("/image", get(get_image))
}

// =============================================================================
// TESTS
// =============================================================================
