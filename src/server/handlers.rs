//! HTTP request handlers for the render API.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::catalog::Selection;
use crate::error::{ComposeError, ConfigError, RenderError, StoreError};
use crate::render::{
    RateLimited, Render2dRequest, RenderOutcome, RenderRequest, RenderService, RequestLimiter,
};
use crate::store::AssetStore;

// =============================================================================
// Application State
// =============================================================================

/// Shared application state, passed to handlers via Axum's State extractor.
pub struct AppState<S: AssetStore> {
    /// The render service running the pipeline
    pub render_service: Arc<RenderService<S>>,

    /// Minimum inter-arrival limiter, checked before the core is entered
    pub limiter: Arc<RequestLimiter>,
}

impl<S: AssetStore> AppState<S> {
    /// Create application state from a service and a limiter.
    pub fn new(render_service: RenderService<S>, limiter: RequestLimiter) -> Self {
        Self {
            render_service: Arc::new(render_service),
            limiter: Arc::new(limiter),
        }
    }
}

impl<S: AssetStore> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            render_service: Arc::clone(&self.render_service),
            limiter: Arc::clone(&self.limiter),
        }
    }
}

// =============================================================================
// Request Payloads
// =============================================================================

/// Body of `POST /api/render`.
///
/// `selection` values may be null (an explicit "nothing chosen" for a
/// layer); a missing layer key means the same thing.
#[derive(Debug, Deserialize)]
pub struct RenderPayload {
    /// Client identifier
    pub client: String,

    /// Scene identifier
    pub scene: String,

    /// Layer id → chosen item id
    pub selection: Selection,
}

/// Body of `POST /api/render2d`.
#[derive(Debug, Deserialize)]
pub struct Render2dPayload {
    pub client: String,

    pub scene: String,

    /// Kept for symmetry with `/api/render`
    pub selection: Selection,

    /// Build string computed by the caller; never recalculated here
    #[serde(rename = "buildString")]
    pub build_string: String,
}

// =============================================================================
// Response Types
// =============================================================================

/// Response from `POST /api/render`.
#[derive(Debug, Serialize)]
pub struct RenderResponse {
    /// "cached" or "generated"
    pub status: String,

    pub client: String,

    pub scene: String,

    pub build: String,

    #[serde(rename = "tileRoot")]
    pub tile_root: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tiles_count: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_seconds: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Response from `POST /api/render2d`.
#[derive(Debug, Serialize)]
pub struct Render2dResponse {
    /// "cached" or "generated"
    pub status: String,

    pub client: String,

    pub scene: String,

    pub build: String,

    /// Path of the published JPEG relative to the CDN root
    pub url: String,
}

/// JSON error response returned for all error conditions.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error type identifier (e.g., "not_found", "invalid_request")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// HTTP status code (included for convenience)
    pub status: u16,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

// =============================================================================
// Error Mapping
// =============================================================================

/// Handler-level error wrapper implementing IntoResponse.
#[derive(Debug)]
pub enum ApiError {
    /// Request arrived inside the rate-limit interval
    RateLimited(RateLimited),

    /// Payload failed boundary validation
    BadRequest(String),

    /// The pipeline failed
    Render(RenderError),
}

impl From<RenderError> for ApiError {
    fn from(err: RenderError) -> Self {
        ApiError::Render(err)
    }
}

impl From<RateLimited> for ApiError {
    fn from(err: RateLimited) -> Self {
        ApiError::RateLimited(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            ApiError::RateLimited(err) => {
                (StatusCode::TOO_MANY_REQUESTS, "rate_limited", err.to_string())
            }

            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, "invalid_request", message.clone())
            }

            ApiError::Render(err) => match err {
                // Bad or missing configuration is a client-side failure,
                // except when the store itself misbehaved
                RenderError::Config(ConfigError::Store(store_err)) => match store_err {
                    StoreError::NotFound(key) => (
                        StatusCode::NOT_FOUND,
                        "not_found",
                        format!("resource not found: {key}"),
                    ),
                    StoreError::Connection(msg) => (
                        StatusCode::BAD_GATEWAY,
                        "connection_error",
                        format!("connection error: {msg}"),
                    ),
                    StoreError::Storage(msg) => (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "storage_error",
                        format!("storage error: {msg}"),
                    ),
                },
                RenderError::Config(config_err) => (
                    StatusCode::BAD_REQUEST,
                    "invalid_config",
                    config_err.to_string(),
                ),

                RenderError::Compose(ComposeError::BaseImageNotFound { key }) => (
                    StatusCode::NOT_FOUND,
                    "base_image_not_found",
                    format!("base image not found: {key}"),
                ),

                RenderError::Compose(ComposeError::MissingOverlays(_)) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "missing_overlays",
                    err.to_string(),
                ),

                RenderError::Compose(ComposeError::Store(store_err)) => match store_err {
                    StoreError::Connection(msg) => (
                        StatusCode::BAD_GATEWAY,
                        "connection_error",
                        format!("connection error: {msg}"),
                    ),
                    _ => (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "storage_error",
                        store_err.to_string(),
                    ),
                },

                RenderError::Encode(encode_err) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "encoding_overflow",
                    encode_err.to_string(),
                ),

                other => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "render_error",
                    other.to_string(),
                ),
            },
        };

        // Log errors based on severity
        if status.is_server_error() {
            error!(
                error_type = error_type,
                status = status.as_u16(),
                "server error: {message}"
            );
        } else if status == StatusCode::NOT_FOUND {
            debug!(
                error_type = error_type,
                status = status.as_u16(),
                "resource not found: {message}"
            );
        } else {
            warn!(
                error_type = error_type,
                status = status.as_u16(),
                "client error: {message}"
            );
        }

        let body = ErrorResponse {
            error: error_type.to_string(),
            message,
            status: status.as_u16(),
        };

        (status, Json(body)).into_response()
    }
}

// =============================================================================
// Handlers
// =============================================================================

fn validate_ids(client: &str, scene: &str) -> Result<(), ApiError> {
    if client.is_empty() {
        return Err(ApiError::BadRequest("client missing in payload".to_string()));
    }
    if scene.is_empty() {
        return Err(ApiError::BadRequest("scene missing in payload".to_string()));
    }
    Ok(())
}

/// Handle `POST /api/render`.
pub async fn render_handler<S: AssetStore + 'static>(
    State(state): State<AppState<S>>,
    Json(payload): Json<RenderPayload>,
) -> Result<Json<RenderResponse>, ApiError> {
    state.limiter.try_acquire()?;
    validate_ids(&payload.client, &payload.scene)?;

    let request = RenderRequest {
        client: payload.client.clone(),
        scene: payload.scene.clone(),
        selection: payload.selection,
    };

    let outcome = state.render_service.render(request).await?;

    let response = match outcome {
        RenderOutcome::Cached { build, tile_root } => RenderResponse {
            status: "cached".to_string(),
            client: payload.client,
            scene: payload.scene,
            build,
            tile_root,
            tiles_count: None,
            elapsed_seconds: None,
            message: Some("tiles already published, consume directly".to_string()),
        },
        RenderOutcome::Generated {
            build,
            tile_root,
            tiles_count,
            elapsed,
        } => RenderResponse {
            status: "generated".to_string(),
            client: payload.client,
            scene: payload.scene,
            build,
            tile_root,
            tiles_count: Some(tiles_count),
            elapsed_seconds: Some((elapsed.as_secs_f64() * 100.0).round() / 100.0),
            message: None,
        },
    };

    Ok(Json(response))
}

/// Handle `POST /api/render2d`.
pub async fn render_2d_handler<S: AssetStore + 'static>(
    State(state): State<AppState<S>>,
    Json(payload): Json<Render2dPayload>,
) -> Result<Json<Render2dResponse>, ApiError> {
    state.limiter.try_acquire()?;
    validate_ids(&payload.client, &payload.scene)?;
    if payload.build_string.is_empty() {
        return Err(ApiError::BadRequest(
            "buildString missing in payload".to_string(),
        ));
    }

    let request = Render2dRequest {
        client: payload.client.clone(),
        scene: payload.scene.clone(),
        selection: payload.selection,
        build: payload.build_string,
    };

    let outcome = state.render_service.render_2d(request).await?;

    Ok(Json(Render2dResponse {
        status: if outcome.cached {
            "cached".to_string()
        } else {
            "generated".to_string()
        },
        client: payload.client,
        scene: payload.scene,
        build: outcome.build,
        url: format!("/{}", outcome.key),
    }))
}

/// Handle `GET /api/health`.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: "panoweave".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_ids_rejects_empty() {
        assert!(validate_ids("", "kitchen").is_err());
        assert!(validate_ids("acme", "").is_err());
        assert!(validate_ids("acme", "kitchen").is_ok());
    }

    #[test]
    fn test_render_payload_accepts_null_selection_values() {
        let payload: RenderPayload = serde_json::from_str(
            r#"{"client": "acme", "scene": "kitchen", "selection": {"floor": "a", "deco": null}}"#,
        )
        .unwrap();
        assert_eq!(
            payload.selection.get("floor"),
            Some(&Some("a".to_string()))
        );
        assert_eq!(payload.selection.get("deco"), Some(&None));
    }

    #[test]
    fn test_render_payload_rejects_non_object_selection() {
        let result: Result<RenderPayload, _> = serde_json::from_str(
            r#"{"client": "acme", "scene": "kitchen", "selection": "floor=a"}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_render_2d_payload_uses_build_string_key() {
        let payload: Render2dPayload = serde_json::from_str(
            r#"{"client": "acme", "scene": "kitchen", "selection": {}, "buildString": "000103"}"#,
        )
        .unwrap();
        assert_eq!(payload.build_string, "000103");
    }

    #[test]
    fn test_cached_response_omits_tile_counts() {
        let response = RenderResponse {
            status: "cached".to_string(),
            client: "acme".to_string(),
            scene: "kitchen".to_string(),
            build: "0001".to_string(),
            tile_root: "cubemap/acme/kitchen/tiles/0001".to_string(),
            tiles_count: None,
            elapsed_seconds: None,
            message: Some("tiles already published, consume directly".to_string()),
        };
        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("tiles_count").is_none());
        assert_eq!(json["tileRoot"], "cubemap/acme/kitchen/tiles/0001");
    }
}
