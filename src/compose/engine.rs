//! Layer stacking over the asset store.
//!
//! # Asset layout
//!
//! All paths are convention-derived from ids, never read from the catalog,
//! which keeps the filesystem layout and the config decoupled and auditable:
//!
//! ```text
//! {assets_root}/base_{scene}.jpg                          panorama base
//! {assets_root}/2d_base_{scene}.jpg                       2D base
//! {assets_root}/layers/{layer}/{layer}_{item}.png         panorama overlay
//! {assets_root}/layers/{layer}/2d_{layer}_{item}.png      2D overlay
//! ```
//!
//! # Missing-asset policy
//!
//! The base image is always fatal. A missing panorama overlay is collected
//! and the scan continues, so one request surfaces every broken reference
//! at once; the partial composite is then discarded. A missing 2D overlay
//! is skipped outright - 2D art is optional per item.

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{RgbImage, RgbaImage};
use tracing::debug;

use crate::catalog::{resolve_selected_item, Layer, SceneContext, Selection};
use crate::error::{ComposeError, StoreError};
use crate::store::AssetStore;

/// JPEG quality for published 2D renders.
pub const RENDER_2D_JPEG_QUALITY: u8 = 95;

/// How one layer resolved during compositing.
///
/// The encoding deliberately collapses "nothing selected", "unknown item
/// id", and "item with no overlay" into the same neutral code point; the
/// report keeps them distinguishable for logging and tests without
/// changing that behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayerResolution {
    /// Overlay fetched and composited
    Applied { file_name: String },

    /// The selection has no (or a null/empty) entry for this layer
    NoSelection,

    /// The selection names an item the layer's catalog does not contain
    UnknownItem { item_id: String },

    /// The chosen item deliberately declares no overlay (`file: null`)
    NoOverlay { item_id: String },
}

/// Per-layer resolution report entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerOutcome {
    pub layer_id: String,
    pub resolution: LayerResolution,
}

/// Composite the scene's base panorama with every chosen overlay.
///
/// Layers are applied strictly in ascending `build_order`; ordering is
/// significant because alpha compositing is order-dependent. Item choice
/// follows the exact resolution policy of the selection encoder, so the
/// image and the build string always describe the same selection.
///
/// Returns the alpha-flattened RGB composite plus the per-layer report.
///
/// # Errors
///
/// - [`ComposeError::BaseImageNotFound`] - no base image; always fatal
/// - [`ComposeError::MissingOverlays`] - one or more referenced overlays
///   absent, reported all at once after the full scan
/// - [`ComposeError::Decode`] - undecodable base or overlay bytes
pub async fn composite<S: AssetStore>(
    ctx: &SceneContext,
    selection: &Selection,
    store: &S,
) -> Result<(RgbImage, Vec<LayerOutcome>), ComposeError> {
    let assets_root = ctx.assets_root();
    let base_key = format!("{}/base_{}.jpg", assets_root, ctx.scene);

    let mut base = load_rgba(store, &base_key).await.map_err(|err| match err {
        ComposeError::Store(StoreError::NotFound(_)) => {
            ComposeError::BaseImageNotFound { key: base_key }
        }
        other => other,
    })?;

    let mut outcomes = Vec::with_capacity(ctx.layers.len());
    let mut missing: Vec<(String, String)> = Vec::new();

    for layer in ctx.layers_in_build_order() {
        match classify(layer, selection) {
            LayerChoice::Neutral(resolution) => {
                outcomes.push(LayerOutcome {
                    layer_id: layer.id.clone(),
                    resolution,
                });
            }
            LayerChoice::Overlay { item_id } => {
                let file_name = format!("{}_{}.png", layer.id, item_id);
                let key = format!("{}/layers/{}/{}", assets_root, layer.id, file_name);

                let overlay = match load_rgba(store, &key).await {
                    Ok(overlay) => overlay,
                    Err(ComposeError::Store(StoreError::NotFound(_))) => {
                        missing.push((layer.id.clone(), file_name));
                        continue;
                    }
                    Err(other) => return Err(other),
                };

                apply_overlay(&mut base, overlay);
                outcomes.push(LayerOutcome {
                    layer_id: layer.id.clone(),
                    resolution: LayerResolution::Applied { file_name },
                });
            }
        }
    }

    if !missing.is_empty() {
        return Err(ComposeError::MissingOverlays(missing));
    }

    Ok((flatten(base), outcomes))
}

/// Composite the scene's 2D base with every chosen 2D overlay.
///
/// Same selection resolution and ordering as [`composite`], but a missing
/// 2D overlay file is skipped rather than collected - clients ship 2D art
/// for a subset of items.
pub async fn composite_2d<S: AssetStore>(
    ctx: &SceneContext,
    selection: &Selection,
    store: &S,
) -> Result<RgbImage, ComposeError> {
    let assets_root = ctx.assets_root();
    let base_key = format!("{}/2d_base_{}.jpg", assets_root, ctx.scene);

    let mut base = load_rgba(store, &base_key).await.map_err(|err| match err {
        ComposeError::Store(StoreError::NotFound(_)) => {
            ComposeError::BaseImageNotFound { key: base_key }
        }
        other => other,
    })?;

    for layer in ctx.layers_in_build_order() {
        let item_id = match classify(layer, selection) {
            LayerChoice::Overlay { item_id } => item_id,
            LayerChoice::Neutral(_) => continue,
        };

        let key = format!(
            "{}/layers/{}/2d_{}_{}.png",
            assets_root, layer.id, layer.id, item_id
        );

        let overlay = match load_rgba(store, &key).await {
            Ok(overlay) => overlay,
            Err(ComposeError::Store(StoreError::NotFound(_))) => {
                debug!(layer = %layer.id, %key, "2d overlay absent, skipping");
                continue;
            }
            Err(other) => return Err(other),
        };

        apply_overlay(&mut base, overlay);
    }

    Ok(flatten(base))
}

/// Encode a flattened composite as JPEG.
pub fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Bytes, ComposeError> {
    let mut output = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut output, quality);
    encoder
        .encode_image(image)
        .map_err(|e| ComposeError::Encode {
            message: e.to_string(),
        })?;
    Ok(Bytes::from(output))
}

/// The compositing-relevant outcome of item resolution for one layer.
enum LayerChoice {
    /// Nothing to composite; carries the report entry
    Neutral(LayerResolution),
    /// Fetch and composite this item's overlay
    Overlay { item_id: String },
}

fn classify(layer: &Layer, selection: &Selection) -> LayerChoice {
    let requested = selection
        .get(&layer.id)
        .and_then(|entry| entry.as_deref())
        .filter(|id| !id.is_empty());

    let Some(requested) = requested else {
        return LayerChoice::Neutral(LayerResolution::NoSelection);
    };

    // Same resolution as the encoder; `requested` only refines the report.
    match resolve_selected_item(layer, selection) {
        None => LayerChoice::Neutral(LayerResolution::UnknownItem {
            item_id: requested.to_string(),
        }),
        Some(item) => match item.file {
            None => LayerChoice::Neutral(LayerResolution::NoOverlay {
                item_id: item.id.clone(),
            }),
            Some(_) => LayerChoice::Overlay {
                item_id: item.id.clone(),
            },
        },
    }
}

async fn load_rgba<S: AssetStore>(store: &S, key: &str) -> Result<RgbaImage, ComposeError> {
    let data = store.read_bytes(key).await?;
    let image = image::load_from_memory(&data).map_err(|e| ComposeError::Decode {
        key: key.to_string(),
        message: e.to_string(),
    })?;
    Ok(image.to_rgba8())
}

/// Alpha-composite an overlay onto the accumulating base.
///
/// An overlay whose dimensions differ from the base is stretched to the
/// full canvas with Catmull-Rom - never cropped, never aspect-fitted: the
/// canvas is the contract.
fn apply_overlay(base: &mut RgbaImage, overlay: RgbaImage) {
    let overlay = if overlay.dimensions() != base.dimensions() {
        imageops::resize(&overlay, base.width(), base.height(), FilterType::CatmullRom)
    } else {
        overlay
    };
    imageops::overlay(base, &overlay, 0, 0);
}

/// Drop the alpha channel, producing the fully opaque result.
fn flatten(image: RgbaImage) -> RgbImage {
    image::DynamicImage::ImageRgba8(image).to_rgb8()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Item;
    use crate::error::StoreError;

    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use image::Rgba;

    /// In-memory store preloaded with encoded images.
    struct MemoryStore {
        objects: Mutex<HashMap<String, Bytes>>,
    }

    impl MemoryStore {
        fn new() -> Self {
            Self {
                objects: Mutex::new(HashMap::new()),
            }
        }

        fn put_png(&self, key: &str, image: &RgbaImage) {
            let mut data = Vec::new();
            image
                .write_to(
                    &mut std::io::Cursor::new(&mut data),
                    image::ImageFormat::Png,
                )
                .unwrap();
            self.objects
                .lock()
                .unwrap()
                .insert(key.to_string(), Bytes::from(data));
        }

        fn put_jpeg(&self, key: &str, image: &RgbImage) {
            let data = encode_jpeg(image, 95).unwrap();
            self.objects.lock().unwrap().insert(key.to_string(), data);
        }
    }

    #[async_trait]
    impl AssetStore for MemoryStore {
        async fn exists(&self, key: &str) -> Result<bool, StoreError> {
            Ok(self.objects.lock().unwrap().contains_key(key))
        }

        async fn read_bytes(&self, key: &str) -> Result<Bytes, StoreError> {
            self.objects
                .lock()
                .unwrap()
                .get(key)
                .cloned()
                .ok_or_else(|| StoreError::NotFound(key.to_string()))
        }

        async fn write_bytes(
            &self,
            key: &str,
            data: Bytes,
            _content_type: &str,
        ) -> Result<(), StoreError> {
            self.objects
                .lock()
                .unwrap()
                .insert(key.to_string(), data);
            Ok(())
        }
    }

    fn solid_rgb(width: u32, height: u32, rgb: [u8; 3]) -> RgbImage {
        RgbImage::from_pixel(width, height, image::Rgb(rgb))
    }

    fn solid_rgba(width: u32, height: u32, rgba: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba(rgba))
    }

    fn scene(layers: Vec<Layer>) -> SceneContext {
        SceneContext {
            client: "acme".to_string(),
            scene: "kitchen".to_string(),
            scene_index: 0,
            layers,
            config_string_base: 36,
            build_chars: 2,
        }
    }

    fn layer(id: &str, order: i64, items: Vec<Item>) -> Layer {
        Layer {
            id: id.to_string(),
            label: id.to_string(),
            build_order: order,
            items,
        }
    }

    fn item(id: &str, index: u32, file: Option<&str>) -> Item {
        Item {
            id: id.to_string(),
            index,
            file: file.map(|f| f.to_string()),
        }
    }

    fn select(pairs: &[(&str, &str)]) -> Selection {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), Some(v.to_string())))
            .collect()
    }

    const BASE_KEY: &str = "source/clients/acme/scenes/kitchen/base_kitchen.jpg";

    fn store_with_base() -> MemoryStore {
        let store = MemoryStore::new();
        store.put_jpeg(BASE_KEY, &solid_rgb(8, 8, [100, 100, 100]));
        store
    }

    #[tokio::test]
    async fn test_missing_base_image_is_fatal() {
        let store = MemoryStore::new();
        let ctx = scene(vec![]);

        let result = composite(&ctx, &Selection::new(), &store).await;
        assert!(matches!(
            result,
            Err(ComposeError::BaseImageNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_opaque_overlay_replaces_base_pixels() {
        let store = store_with_base();
        store.put_png(
            "source/clients/acme/scenes/kitchen/layers/floor/floor_a.png",
            &solid_rgba(8, 8, [200, 10, 10, 255]),
        );

        let ctx = scene(vec![layer(
            "floor",
            0,
            vec![item("a", 1, Some("floor_a.png"))],
        )]);
        let (image, outcomes) = composite(&ctx, &select(&[("floor", "a")]), &store)
            .await
            .unwrap();

        assert_eq!(image.get_pixel(4, 4).0, [200, 10, 10]);
        assert_eq!(
            outcomes,
            vec![LayerOutcome {
                layer_id: "floor".to_string(),
                resolution: LayerResolution::Applied {
                    file_name: "floor_a.png".to_string()
                },
            }]
        );
    }

    #[tokio::test]
    async fn test_transparent_overlay_leaves_base_visible() {
        let store = store_with_base();
        store.put_png(
            "source/clients/acme/scenes/kitchen/layers/floor/floor_a.png",
            &solid_rgba(8, 8, [200, 10, 10, 0]),
        );

        let ctx = scene(vec![layer(
            "floor",
            0,
            vec![item("a", 1, Some("floor_a.png"))],
        )]);
        let (image, _) = composite(&ctx, &select(&[("floor", "a")]), &store)
            .await
            .unwrap();

        // JPEG round-trip of the base is lossy; stay near gray
        let [r, g, b] = image.get_pixel(4, 4).0;
        assert!(r.abs_diff(100) < 8 && g.abs_diff(100) < 8 && b.abs_diff(100) < 8);
    }

    #[tokio::test]
    async fn test_mismatched_overlay_is_stretched_to_canvas() {
        let store = store_with_base();
        store.put_png(
            "source/clients/acme/scenes/kitchen/layers/floor/floor_a.png",
            &solid_rgba(2, 2, [0, 200, 0, 255]),
        );

        let ctx = scene(vec![layer(
            "floor",
            0,
            vec![item("a", 1, Some("floor_a.png"))],
        )]);
        let (image, _) = composite(&ctx, &select(&[("floor", "a")]), &store)
            .await
            .unwrap();

        // Stretched to the full 8x8 canvas: corners covered too
        assert_eq!(image.get_pixel(0, 0).0, [0, 200, 0]);
        assert_eq!(image.get_pixel(7, 7).0, [0, 200, 0]);
    }

    #[tokio::test]
    async fn test_no_file_item_is_a_visual_noop() {
        let store = store_with_base();
        let ctx = scene(vec![layer("floor", 0, vec![item("a", 1, None)])]);

        let (with_item, outcomes) = composite(&ctx, &select(&[("floor", "a")]), &store)
            .await
            .unwrap();
        let (without, _) = composite(&ctx, &Selection::new(), &store).await.unwrap();

        // Byte-identical: the layer never produced a path or a lookup
        assert_eq!(with_item.as_raw(), without.as_raw());
        assert_eq!(
            outcomes[0].resolution,
            LayerResolution::NoOverlay {
                item_id: "a".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_unknown_item_reported_but_not_fatal() {
        let store = store_with_base();
        let ctx = scene(vec![layer(
            "floor",
            0,
            vec![item("a", 1, Some("floor_a.png"))],
        )]);

        let (_, outcomes) = composite(&ctx, &select(&[("floor", "zzz")]), &store)
            .await
            .unwrap();
        assert_eq!(
            outcomes[0].resolution,
            LayerResolution::UnknownItem {
                item_id: "zzz".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_missing_overlay_detection_is_exhaustive() {
        let store = store_with_base();
        let ctx = scene(vec![
            layer("floor", 0, vec![item("a", 1, Some("floor_a.png"))]),
            layer("walls", 1, vec![item("b", 1, Some("walls_b.png"))]),
        ]);

        let result = composite(
            &ctx,
            &select(&[("floor", "a"), ("walls", "b")]),
            &store,
        )
        .await;

        match result {
            Err(ComposeError::MissingOverlays(missing)) => {
                assert_eq!(
                    missing,
                    vec![
                        ("floor".to_string(), "floor_a.png".to_string()),
                        ("walls".to_string(), "walls_b.png".to_string()),
                    ]
                );
            }
            other => panic!("expected MissingOverlays, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_layers_composite_in_build_order() {
        let store = store_with_base();
        store.put_png(
            "source/clients/acme/scenes/kitchen/layers/under/under_a.png",
            &solid_rgba(8, 8, [10, 10, 200, 255]),
        );
        store.put_png(
            "source/clients/acme/scenes/kitchen/layers/over/over_b.png",
            &solid_rgba(8, 8, [200, 200, 10, 255]),
        );

        // "over" appears first in the catalog but has the higher build_order
        let ctx = scene(vec![
            layer("over", 5, vec![item("b", 1, Some("over_b.png"))]),
            layer("under", 1, vec![item("a", 1, Some("under_a.png"))]),
        ]);

        let (image, outcomes) = composite(
            &ctx,
            &select(&[("under", "a"), ("over", "b")]),
            &store,
        )
        .await
        .unwrap();

        // The higher build_order wins the pixel
        assert_eq!(image.get_pixel(4, 4).0, [200, 200, 10]);
        assert_eq!(outcomes[0].layer_id, "under");
        assert_eq!(outcomes[1].layer_id, "over");
    }

    #[tokio::test]
    async fn test_2d_missing_base_is_fatal() {
        let store = MemoryStore::new();
        let ctx = scene(vec![]);
        let result = composite_2d(&ctx, &Selection::new(), &store).await;
        assert!(matches!(
            result,
            Err(ComposeError::BaseImageNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_2d_missing_overlay_is_skipped() {
        let store = MemoryStore::new();
        store.put_jpeg(
            "source/clients/acme/scenes/kitchen/2d_base_kitchen.jpg",
            &solid_rgb(8, 8, [100, 100, 100]),
        );

        let ctx = scene(vec![layer(
            "floor",
            0,
            vec![item("a", 1, Some("floor_a.png"))],
        )]);

        // No 2D overlay uploaded: output equals the (re-encoded) base
        let with_selection = composite_2d(&ctx, &select(&[("floor", "a")]), &store)
            .await
            .unwrap();
        let without = composite_2d(&ctx, &Selection::new(), &store).await.unwrap();
        assert_eq!(with_selection.as_raw(), without.as_raw());
    }

    #[tokio::test]
    async fn test_2d_overlay_applied_when_present() {
        let store = MemoryStore::new();
        store.put_jpeg(
            "source/clients/acme/scenes/kitchen/2d_base_kitchen.jpg",
            &solid_rgb(8, 8, [100, 100, 100]),
        );
        store.put_png(
            "source/clients/acme/scenes/kitchen/layers/floor/2d_floor_a.png",
            &solid_rgba(8, 8, [10, 200, 10, 255]),
        );

        let ctx = scene(vec![layer(
            "floor",
            0,
            vec![item("a", 1, Some("floor_a.png"))],
        )]);
        let image = composite_2d(&ctx, &select(&[("floor", "a")]), &store)
            .await
            .unwrap();
        assert_eq!(image.get_pixel(4, 4).0, [10, 200, 10]);
    }

    #[test]
    fn test_encode_jpeg_produces_jpeg_magic() {
        let data = encode_jpeg(&solid_rgb(4, 4, [1, 2, 3]), 80).unwrap();
        assert_eq!(&data[0..2], &[0xFF, 0xD8]);
    }
}
