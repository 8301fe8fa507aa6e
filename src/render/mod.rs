//! Render orchestration.
//!
//! The render service runs one request end to end: resolve catalog →
//! encode build string → derive cache key → existence check → composite →
//! split → upload → publish metadata. A hit on the existence check skips
//! compositing and tiling entirely - the build string is pure over the
//! catalog and selection, so it can be derived before any pixel work.
//!
//! Concurrent requests for the same cache key are coalesced: one build
//! runs, later arrivals wait and then observe the published metadata as a
//! cache hit. Requests for distinct keys proceed independently.

mod limiter;
mod service;

pub use limiter::{RateLimited, RequestLimiter};
pub use service::{
    BuildMetadata, Render2dOutcome, Render2dRequest, RenderOutcome, RenderRequest, RenderService,
    DEFAULT_TILE_SIZE,
};
