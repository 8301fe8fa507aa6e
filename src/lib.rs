//! # Panoweave
//!
//! A render backend for panorama configurators.
//!
//! Panoweave composites a base panorama with a set of user-selected overlay
//! layers, deterministically encodes the selection into a short build
//! string, splits the composite into cubemap tiles, and publishes tiles
//! plus a metadata object to object storage keyed by that build string.
//! Because the key is a pure function of the selection, a repeat request
//! is answered by a single existence check - the composite is never
//! rendered twice.
//!
//! ## Pipeline
//!
//! ```text
//! selection ──► catalog resolve ──► build string ──► cache check ──► hit? done
//!                                                        │ miss
//!                                                        ▼
//!                              composite ──► cubemap split ──► upload + metadata
//! ```
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`store`] - asset store capability (S3 and local backends)
//! - [`catalog`] - client config loading and scene normalization
//! - [`build`] - selection encoding and cache-key derivation
//! - [`compose`] - alpha-compositing engine (panorama and 2D)
//! - [`tiles`] - cubemap face splitting
//! - [`render`] - request orchestration, coalescing, rate limiting
//! - [`server`] - Axum-based HTTP boundary
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use panoweave::render::{RenderRequest, RenderService};
//! use panoweave::store::LocalAssetStore;
//! use panoweave::tiles::CubemapSplitter;
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = Arc::new(LocalAssetStore::new("/var/panoweave"));
//!     let service = RenderService::new(store, Arc::new(CubemapSplitter::default()));
//!
//!     let request = RenderRequest {
//!         client: "acme".to_string(),
//!         scene: "kitchen".to_string(),
//!         selection: [("floor".to_string(), Some("oak".to_string()))]
//!             .into_iter()
//!             .collect(),
//!     };
//!
//!     match service.render(request).await {
//!         Ok(outcome) => println!("{outcome:?}"),
//!         Err(err) => eprintln!("render failed: {err}"),
//!     }
//! }
//! ```

pub mod build;
pub mod catalog;
pub mod compose;
pub mod config;
pub mod error;
pub mod render;
pub mod server;
pub mod store;
pub mod tiles;

// Re-export commonly used types
pub use build::{build_string, key};
pub use catalog::{CatalogRegistry, ClientConfig, Item, Layer, SceneContext, Selection};
pub use compose::{composite, composite_2d, LayerOutcome, LayerResolution};
pub use config::Config;
pub use error::{
    ComposeError, ConfigError, EncodeError, RenderError, SchemaError, SplitError, StoreError,
};
pub use render::{
    BuildMetadata, RenderOutcome, RenderRequest, RenderService, RequestLimiter,
};
pub use server::{create_router, AppState, RouterConfig};
pub use store::{create_s3_client, AssetStore, LocalAssetStore, S3AssetStore};
pub use tiles::{CubemapSplitter, TileSplitter};
