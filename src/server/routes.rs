//! Router configuration.
//!
//! # Route Structure
//!
//! ```text
//! POST /api/render     - composite + publish cubemap tiles
//! POST /api/render2d   - composite + publish a single 2D JPEG
//! GET  /api/health     - health check
//! ```

use std::time::Duration;

use axum::{
    routing::{get, post},
    Router,
};
use http::header::CONTENT_TYPE;
use http::Method;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::render::{RenderService, RequestLimiter};
use crate::store::AssetStore;

use super::handlers::{health_handler, render_2d_handler, render_handler, AppState};

// =============================================================================
// Router Configuration
// =============================================================================

/// Configuration for the HTTP router.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Allowed CORS origins (None = allow any origin)
    pub cors_origins: Option<Vec<String>>,

    /// Minimum interval between render-request starts
    pub min_request_interval: Duration,

    /// Whether to enable request tracing
    pub enable_tracing: bool,
}

impl RouterConfig {
    /// Create a configuration with defaults: any CORS origin, a one second
    /// rate-limit interval, tracing enabled.
    pub fn new() -> Self {
        Self {
            cors_origins: None,
            min_request_interval: Duration::from_secs(1),
            enable_tracing: true,
        }
    }

    /// Set specific allowed CORS origins.
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = Some(origins);
        self
    }

    /// Set the minimum interval between render-request starts.
    pub fn with_min_request_interval(mut self, interval: Duration) -> Self {
        self.min_request_interval = interval;
        self
    }

    /// Enable or disable request tracing.
    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Router Builder
// =============================================================================

/// Create the application router.
///
/// # Arguments
///
/// * `render_service` - The render service handling requests
/// * `config` - Router configuration
pub fn create_router<S>(render_service: RenderService<S>, config: RouterConfig) -> Router
where
    S: AssetStore + 'static,
{
    let limiter = RequestLimiter::new(config.min_request_interval);
    let app_state = AppState::new(render_service, limiter);

    let cors = build_cors_layer(&config);

    let router = Router::new()
        .route("/api/render", post(render_handler::<S>))
        .route("/api/render2d", post(render_2d_handler::<S>))
        .route("/api/health", get(health_handler))
        .with_state(app_state)
        .layer(cors);

    if config.enable_tracing {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

/// Build the CORS layer based on configuration.
fn build_cors_layer(config: &RouterConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(86400)); // 24 hours

    match &config.cors_origins {
        None => cors.allow_origin(Any),
        Some(origins) if origins.is_empty() => {
            // No origins allowed - this effectively disables CORS
            cors
        }
        Some(origins) => {
            let parsed_origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            cors.allow_origin(parsed_origins)
        }
    }
}
