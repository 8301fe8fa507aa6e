//! Cache-key derivation.
//!
//! Keys are stable, hierarchical storage paths combining client, scene,
//! and build string, so distinct (client, scene, selection) triples never
//! collide and identical triples always map to the same key. The metadata
//! object published at [`metadata_key`] *is* the cache: its existence is
//! the entire hit/miss decision, with no separate index to keep in sync.

/// Fixed-width scene-index prefix for the build string.
///
/// Two lowercase hex characters, so scenes sharing one logical namespace
/// stay distinguishable even when their layer catalogs coincide.
pub fn scene_prefix(scene_index: u32) -> String {
    format!("{scene_index:02x}")
}

/// Full build string: scene prefix + encoded selection body.
pub fn prefixed_build(scene_index: u32, body: &str) -> String {
    format!("{}{}", scene_prefix(scene_index), body)
}

/// Root key under which one build's tiles are published.
pub fn tile_root(client: &str, scene: &str, build: &str) -> String {
    format!("cubemap/{client}/{scene}/tiles/{build}")
}

/// Key of the metadata object whose existence marks a build as published.
pub fn metadata_key(tile_root: &str) -> String {
    format!("{tile_root}/metadata.json")
}

/// Key of a published 2D render. The JPEG itself doubles as the cache
/// marker for the 2D flow.
pub fn render_2d_key(build: &str) -> String {
    format!("renders/2d_{build}.jpg")
}
