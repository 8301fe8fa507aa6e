//! Tile-splitting collaborator.
//!
//! The render service treats tile generation as opaque: it hands the
//! splitter a composed image and a scratch directory, then enumerates and
//! uploads whatever files came back. The [`TileSplitter`] trait is that
//! seam; [`CubemapSplitter`] is the shipped implementation.

mod splitter;

pub use splitter::{CubemapSplitter, TileSplitter, CUBE_FACES, DEFAULT_TILE_JPEG_QUALITY};
