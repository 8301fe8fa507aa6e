//! Axum-based HTTP boundary.
//!
//! The server layer marshals typed request payloads into the render
//! service and maps typed errors back to HTTP responses. Payload
//! validation happens here, at the boundary, so the core can assume
//! well-typed, already-validated arguments.
//!
//! # Endpoints
//!
//! - `POST /api/render`   - composite a selection and publish cubemap tiles
//! - `POST /api/render2d` - composite the 2D variant into a single JPEG
//! - `GET  /api/health`   - health check

mod handlers;
mod routes;

pub use handlers::{
    health_handler, render_2d_handler, render_handler, ApiError, AppState, ErrorResponse,
    HealthResponse, Render2dPayload, Render2dResponse, RenderPayload, RenderResponse,
};
pub use routes::{create_router, RouterConfig};
