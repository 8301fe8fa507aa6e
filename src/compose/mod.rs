//! Compositing engine.
//!
//! Produces the flattened scene image for a selection: the scene's base
//! panorama with each chosen layer's overlay alpha-composited on top, in
//! `build_order`. The engine owns no state and performs no writes; its only
//! side effect is reading asset bytes through the store, so every
//! invocation is independent and safely re-entrant.

mod engine;

pub use engine::{
    composite, composite_2d, encode_jpeg, LayerOutcome, LayerResolution, RENDER_2D_JPEG_QUALITY,
};
