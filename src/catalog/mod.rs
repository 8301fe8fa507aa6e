//! Scene catalog layer.
//!
//! A client's catalog (`source/clients/{client}/config.json`) describes its
//! scenes: for each scene, an ordered list of layers, and for each layer a
//! closed set of selectable items carrying a stable numeric index. This
//! module loads that catalog from the asset store and normalizes it into
//! [`SceneContext`], the single canonical shape every downstream component
//! consumes.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │             Render Service              │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │           CatalogRegistry               │
//! │  (LRU of parsed client configs)         │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │   ClientConfig::resolve_scene           │
//! │  (scenes as mapping OR list → one       │
//! │   canonical SceneContext)               │
//! └─────────────────────────────────────────┘
//! ```
//!
//! Catalogs in the wild store `scenes` either as a keyed mapping or as a
//! list of records carrying their own `id`. The dual representation is
//! collapsed here, at load time; the encoder and the compositing engine
//! only ever see [`SceneContext`].

mod model;
mod registry;
mod resolver;

pub use model::{resolve_selected_item, Item, Layer, SceneContext, Selection};
pub use registry::{CatalogRegistry, DEFAULT_CATALOG_CACHE_CAPACITY};
pub use resolver::ClientConfig;
