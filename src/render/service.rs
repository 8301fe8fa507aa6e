//! Render Service for orchestrating panorama builds.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                         RenderService                            │
//! │  ┌──────────────────────────────────────────────────────────┐    │
//! │  │                      render()                            │    │
//! │  │  1. Resolve catalog     4. Composite (miss only)         │    │
//! │  │  2. Encode build string 5. Split into tiles (scratch)    │    │
//! │  │  3. Coalesce + cache    6. Upload + publish metadata     │    │
//! │  └──────────────────────────────────────────────────────────┘    │
//! │        │                  │                     │                │
//! │        ▼                  ▼                     ▼                │
//! │ ┌───────────────┐  ┌──────────────┐  ┌───────────────────┐      │
//! │ │CatalogRegistry│  │ compose::    │  │ dyn TileSplitter  │      │
//! │ └───────────────┘  │ composite    │  └───────────────────┘      │
//! │                    └──────────────┘                             │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The existence of `{tile_root}/metadata.json` in the asset store is the
//! entire caching decision. Publication is not atomic: two builds of the
//! same key may race, but the artifact is a pure function of the key, so a
//! duplicate write is benign. The in-flight registry makes that race rare
//! by coalescing same-key requests in-process.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::build::{self, key};
use crate::catalog::{CatalogRegistry, SceneContext, Selection};
use crate::compose;
use crate::error::{RenderError, StoreError};
use crate::store::AssetStore;
use crate::tiles::TileSplitter;

/// Default edge length of published tiles, in pixels.
pub const DEFAULT_TILE_SIZE: u32 = 512;

// =============================================================================
// Requests and outcomes
// =============================================================================

/// A panorama render request.
#[derive(Debug, Clone)]
pub struct RenderRequest {
    /// Client identifier
    pub client: String,

    /// Scene identifier within the client's catalog
    pub scene: String,

    /// Layer id → chosen item id
    pub selection: Selection,
}

/// A 2D render request.
///
/// Carries the build string computed by the caller; the 2D flow never
/// recalculates it.
#[derive(Debug, Clone)]
pub struct Render2dRequest {
    pub client: String,
    pub scene: String,
    pub selection: Selection,
    pub build: String,
}

/// Outcome of a panorama render.
#[derive(Debug, Clone)]
pub enum RenderOutcome {
    /// The build was already published; compositing was skipped entirely
    Cached { build: String, tile_root: String },

    /// The build was rendered and published by this request
    Generated {
        build: String,
        tile_root: String,
        tiles_count: usize,
        elapsed: Duration,
    },
}

/// Outcome of a 2D render.
#[derive(Debug, Clone)]
pub struct Render2dOutcome {
    pub build: String,

    /// Storage key of the published JPEG
    pub key: String,

    /// Whether the render was already published
    pub cached: bool,
}

/// Metadata object published at `{tile_root}/metadata.json`.
///
/// Its existence at the derived key marks the build as ready; there is no
/// separate index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildMetadata {
    pub client: String,
    pub scene: String,
    pub build: String,
    #[serde(rename = "tileRoot")]
    pub tile_root: String,
    pub tiles_count: usize,
    /// Unix seconds
    pub generated_at: u64,
    pub status: String,
}

// =============================================================================
// Render Service
// =============================================================================

/// Service running the full selection → published-tiles pipeline.
///
/// # Type Parameters
///
/// * `S` - The asset store implementation (S3, local, ...)
pub struct RenderService<S: AssetStore> {
    store: Arc<S>,

    /// Parsed-config cache in front of the store
    catalogs: CatalogRegistry<S>,

    /// Tile-splitting collaborator (opaque)
    splitter: Arc<dyn TileSplitter>,

    tile_size: u32,

    /// Per-key build gates. Holding a gate's lock marks a build for that
    /// cache key as in flight; followers block on the same gate and then
    /// re-check the cache, so at most one build per key runs at a time.
    in_flight: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl<S: AssetStore> RenderService<S> {
    /// Create a service with the default tile size.
    pub fn new(store: Arc<S>, splitter: Arc<dyn TileSplitter>) -> Self {
        Self::with_tile_size(store, splitter, DEFAULT_TILE_SIZE)
    }

    /// Create a service with a custom tile size.
    pub fn with_tile_size(
        store: Arc<S>,
        splitter: Arc<dyn TileSplitter>,
        tile_size: u32,
    ) -> Self {
        Self::with_settings(
            store,
            splitter,
            tile_size,
            crate::catalog::DEFAULT_CATALOG_CACHE_CAPACITY,
        )
    }

    /// Create a service with custom tile size and catalog cache capacity.
    pub fn with_settings(
        store: Arc<S>,
        splitter: Arc<dyn TileSplitter>,
        tile_size: u32,
        catalog_capacity: usize,
    ) -> Self {
        Self {
            catalogs: CatalogRegistry::with_capacity(store.clone(), catalog_capacity),
            store,
            splitter,
            tile_size,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve the scene context for a request.
    async fn resolve(&self, client: &str, scene: &str) -> Result<SceneContext, RenderError> {
        let config = self.catalogs.get_config(client).await?;
        Ok(config.resolve_scene(scene)?)
    }

    /// Run one panorama render request.
    ///
    /// # Errors
    ///
    /// Configuration, encoding, and compositing errors propagate typed; an
    /// individual tile-upload failure is logged and skipped, never fatal.
    pub async fn render(&self, request: RenderRequest) -> Result<RenderOutcome, RenderError> {
        let ctx = self.resolve(&request.client, &request.scene).await?;

        // The build string is pure over (catalog, selection): derive it
        // before any pixel work so cache hits never touch the engine.
        let body = build::build_string(&ctx, &request.selection)?;
        let build = key::prefixed_build(ctx.scene_index, &body);
        let tile_root = key::tile_root(&request.client, &request.scene, &build);
        let metadata_key = key::metadata_key(&tile_root);

        debug!(%build, %tile_root, "resolved build");

        loop {
            let gate = {
                let mut in_flight = self.in_flight.lock().await;
                in_flight
                    .entry(metadata_key.clone())
                    .or_insert_with(|| Arc::new(Mutex::new(())))
                    .clone()
            };

            let attempt = gate.try_lock();
            match attempt {
                Ok(_guard) => {
                    // Leader for this key. The existence check inside
                    // build_and_publish still runs, so a build finished by
                    // a previous leader is observed as a hit.
                    let result = self
                        .build_and_publish(&ctx, &request, &build, &tile_root, &metadata_key)
                        .await;
                    self.in_flight.lock().await.remove(&metadata_key);
                    return result;
                }
                Err(_) => {
                    // A build for this exact key is in flight; wait for its
                    // gate, then re-enter - the published metadata makes the
                    // next pass a cache hit.
                    drop(gate.lock().await);
                }
            }
        }
    }

    async fn build_and_publish(
        &self,
        ctx: &SceneContext,
        request: &RenderRequest,
        build: &str,
        tile_root: &str,
        metadata_key: &str,
    ) -> Result<RenderOutcome, RenderError> {
        if self
            .store
            .exists(metadata_key)
            .await
            .map_err(crate::error::ComposeError::Store)?
        {
            info!(build, "cache hit");
            return Ok(RenderOutcome::Cached {
                build: build.to_string(),
                tile_root: tile_root.to_string(),
            });
        }

        let start = Instant::now();

        let (image, outcomes) = compose::composite(ctx, &request.selection, &*self.store).await?;
        debug!(
            build,
            layers = outcomes.len(),
            "composite ready ({}x{})",
            image.width(),
            image.height()
        );

        // Scratch directory scoped to this build; removed on every exit
        // path when the TempDir drops.
        let scratch = tempfile::Builder::new()
            .prefix(&format!("{build}_"))
            .tempdir()
            .map_err(|e| RenderError::Scratch {
                message: e.to_string(),
            })?;

        let tile_paths = self
            .splitter
            .split(&image, scratch.path(), self.tile_size, 0, build)?;
        drop(image);

        let tiles_count = self.upload_tiles(&tile_paths, tile_root).await;

        if tiles_count > 0 {
            self.publish_metadata(request, build, tile_root, metadata_key, tiles_count)
                .await?;
        }

        let elapsed = start.elapsed();
        info!(
            build,
            tiles_count,
            elapsed_ms = elapsed.as_millis() as u64,
            "render complete"
        );

        Ok(RenderOutcome::Generated {
            build: build.to_string(),
            tile_root: tile_root.to_string(),
            tiles_count,
            elapsed,
        })
    }

    /// Upload every produced tile, skipping failures.
    ///
    /// Returns how many uploads succeeded. A failed tile is logged and the
    /// batch continues; no retry.
    async fn upload_tiles(&self, tile_paths: &[std::path::PathBuf], tile_root: &str) -> usize {
        let mut uploaded = 0;

        for path in tile_paths {
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !file_name.to_lowercase().ends_with(".jpg") {
                continue;
            }

            let data = match tokio::fs::read(path).await {
                Ok(data) => Bytes::from(data),
                Err(e) => {
                    error!(tile = file_name, "failed to read tile from scratch: {e}");
                    continue;
                }
            };

            let tile_key = format!("{tile_root}/{file_name}");
            match self.store.write_bytes(&tile_key, data, "image/jpeg").await {
                Ok(()) => uploaded += 1,
                Err(e) => error!(tile = file_name, "tile upload failed: {e}"),
            }
        }

        uploaded
    }

    async fn publish_metadata(
        &self,
        request: &RenderRequest,
        build: &str,
        tile_root: &str,
        metadata_key: &str,
        tiles_count: usize,
    ) -> Result<(), RenderError> {
        let metadata = BuildMetadata {
            client: request.client.clone(),
            scene: request.scene.clone(),
            build: build.to_string(),
            tile_root: tile_root.to_string(),
            tiles_count,
            generated_at: unix_seconds(),
            status: "ready".to_string(),
        };

        let payload = serde_json::to_vec(&metadata).map_err(|e| RenderError::PublishMetadata {
            key: metadata_key.to_string(),
            source: StoreError::Storage(e.to_string()),
        })?;

        self.store
            .write_bytes(metadata_key, Bytes::from(payload), "application/json")
            .await
            .map_err(|source| RenderError::PublishMetadata {
                key: metadata_key.to_string(),
                source,
            })
    }

    /// Run one 2D render request.
    ///
    /// The published JPEG itself is the cache marker; when it exists the
    /// engine is not invoked.
    pub async fn render_2d(
        &self,
        request: Render2dRequest,
    ) -> Result<Render2dOutcome, RenderError> {
        let render_key = key::render_2d_key(&request.build);

        if self
            .store
            .exists(&render_key)
            .await
            .map_err(crate::error::ComposeError::Store)?
        {
            info!(build = %request.build, "2d cache hit");
            return Ok(Render2dOutcome {
                build: request.build,
                key: render_key,
                cached: true,
            });
        }

        let ctx = self.resolve(&request.client, &request.scene).await?;
        let image = compose::composite_2d(&ctx, &request.selection, &*self.store).await?;
        let data = compose::encode_jpeg(&image, compose::RENDER_2D_JPEG_QUALITY)?;

        self.store
            .write_bytes(&render_key, data, "image/jpeg")
            .await
            .map_err(|source| RenderError::PublishRender {
                key: render_key.clone(),
                source,
            })?;

        info!(build = %request.build, key = %render_key, "2d render published");

        Ok(Render2dOutcome {
            build: request.build,
            key: render_key,
            cached: false,
        })
    }

    /// Get a reference to the underlying store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }
}

fn unix_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ComposeError, ConfigError, SplitError};
    use crate::tiles::CubemapSplitter;

    use std::collections::HashMap as StdHashMap;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    use async_trait::async_trait;
    use image::{Rgb, RgbImage, Rgba, RgbaImage};

    /// In-memory asset store.
    struct MemoryStore {
        objects: StdMutex<StdHashMap<String, Bytes>>,
    }

    impl MemoryStore {
        fn new() -> Self {
            Self {
                objects: StdMutex::new(StdHashMap::new()),
            }
        }

        fn put(&self, key: &str, data: Bytes) {
            self.objects
                .lock()
                .unwrap()
                .insert(key.to_string(), data);
        }

        fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
            self.objects
                .lock()
                .unwrap()
                .keys()
                .filter(|k| k.starts_with(prefix))
                .cloned()
                .collect()
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
            self.put(key, data);
            Ok(())
        }
    }

    /// Splitter wrapper counting invocations.
    struct CountingSplitter {
        inner: CubemapSplitter,
        calls: AtomicUsize,
    }

    impl CountingSplitter {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                inner: CubemapSplitter::default(),
                calls: AtomicUsize::new(0),
            })
        }
    }

    impl TileSplitter for CountingSplitter {
        fn split(
            &self,
            image: &RgbImage,
            output_dir: &Path,
            tile_size: u32,
            level: u32,
            build: &str,
        ) -> Result<Vec<PathBuf>, SplitError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.split(image, output_dir, tile_size, level, build)
        }
    }

    const CONFIG: &str = r#"{
        "scenes": {
            "kitchen": {
                "scene_index": 0,
                "layers": [
                    {
                        "id": "floor",
                        "build_order": 0,
                        "items": [{"id": "a", "index": 1, "file": "floor_a.png"}]
                    }
                ]
            }
        }
    }"#;

    fn encode_jpeg_bytes(image: &RgbImage) -> Bytes {
        compose::encode_jpeg(image, 95).unwrap()
    }

    fn encode_png_bytes(image: &RgbaImage) -> Bytes {
        let mut data = Vec::new();
        image
            .write_to(
                &mut std::io::Cursor::new(&mut data),
                image::ImageFormat::Png,
            )
            .unwrap();
        Bytes::from(data)
    }

    /// Store seeded with a config, base image, and one overlay.
    fn seeded_store() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store.put(
            "source/clients/acme/config.json",
            Bytes::from(CONFIG.as_bytes()),
        );
        store.put(
            "source/clients/acme/scenes/kitchen/base_kitchen.jpg",
            encode_jpeg_bytes(&RgbImage::from_pixel(64, 32, Rgb([90, 90, 90]))),
        );
        store.put(
            "source/clients/acme/scenes/kitchen/layers/floor/floor_a.png",
            encode_png_bytes(&RgbaImage::from_pixel(64, 32, Rgba([180, 20, 20, 255]))),
        );
        store
    }

    fn request(selection: &[(&str, &str)]) -> RenderRequest {
        RenderRequest {
            client: "acme".to_string(),
            scene: "kitchen".to_string(),
            selection: selection
                .iter()
                .map(|(k, v)| (k.to_string(), Some(v.to_string())))
                .collect(),
        }
    }

    fn service(store: Arc<MemoryStore>) -> RenderService<MemoryStore> {
        RenderService::with_tile_size(store, Arc::new(CubemapSplitter::default()), 16)
    }

    #[tokio::test]
    async fn test_generate_then_cache_hit() {
        let store = seeded_store();
        let svc = service(store.clone());

        let first = svc.render(request(&[("floor", "a")])).await.unwrap();
        let RenderOutcome::Generated {
            build,
            tile_root,
            tiles_count,
            ..
        } = first
        else {
            panic!("expected Generated");
        };
        assert_eq!(build, "0001");
        assert_eq!(tile_root, "cubemap/acme/kitchen/tiles/0001");
        // face_size = 64/4 = 16, tile_size 16 → one tile per face
        assert_eq!(tiles_count, 6);

        // metadata published and well-formed
        let metadata_key = "cubemap/acme/kitchen/tiles/0001/metadata.json";
        assert!(store.exists(metadata_key).await.unwrap());
        let metadata: BuildMetadata =
            serde_json::from_slice(&store.read_bytes(metadata_key).await.unwrap()).unwrap();
        assert_eq!(metadata.build, "0001");
        assert_eq!(metadata.tiles_count, 6);
        assert_eq!(metadata.status, "ready");

        // identical request short-circuits
        let second = svc.render(request(&[("floor", "a")])).await.unwrap();
        assert!(matches!(second, RenderOutcome::Cached { build, .. } if build == "0001"));
    }

    #[tokio::test]
    async fn test_cache_hit_does_not_invoke_engine_or_splitter() {
        let store = seeded_store();
        let splitter = CountingSplitter::new();
        let svc = RenderService::with_tile_size(store.clone(), splitter.clone(), 16);

        svc.render(request(&[("floor", "a")])).await.unwrap();
        assert_eq!(splitter.calls.load(Ordering::SeqCst), 1);

        // Remove the base image: a true cache hit must not need it
        store
            .objects
            .lock()
            .unwrap()
            .remove("source/clients/acme/scenes/kitchen/base_kitchen.jpg");

        let outcome = svc.render(request(&[("floor", "a")])).await.unwrap();
        assert!(matches!(outcome, RenderOutcome::Cached { .. }));
        assert_eq!(splitter.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_neutral_selection_builds_with_zero_fields() {
        let store = seeded_store();
        let svc = service(store);

        let outcome = svc.render(request(&[])).await.unwrap();
        let RenderOutcome::Generated { build, .. } = outcome else {
            panic!("expected Generated");
        };
        assert_eq!(build, "0000");
    }

    #[tokio::test]
    async fn test_missing_overlay_fails_and_publishes_nothing() {
        let store = seeded_store();
        store
            .objects
            .lock()
            .unwrap()
            .remove("source/clients/acme/scenes/kitchen/layers/floor/floor_a.png");
        let svc = service(store.clone());

        let result = svc.render(request(&[("floor", "a")])).await;
        assert!(matches!(
            result,
            Err(RenderError::Compose(ComposeError::MissingOverlays(ref missing)))
                if missing == &vec![("floor".to_string(), "floor_a.png".to_string())]
        ));

        assert!(store.keys_with_prefix("cubemap/").is_empty());
    }

    #[tokio::test]
    async fn test_unknown_client_is_config_error() {
        let store = seeded_store();
        let svc = service(store);

        let mut req = request(&[]);
        req.client = "nobody".to_string();

        let result = svc.render(req).await;
        assert!(matches!(
            result,
            Err(RenderError::Config(ConfigError::NotFound { .. }))
        ));
    }

    #[tokio::test]
    async fn test_concurrent_same_key_requests_build_once() {
        let store = seeded_store();
        let splitter = CountingSplitter::new();
        let svc = Arc::new(RenderService::with_tile_size(store, splitter.clone(), 16));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let svc = svc.clone();
            handles.push(tokio::spawn(async move {
                svc.render(request(&[("floor", "a")])).await
            }));
        }

        let mut generated = 0;
        let mut cached = 0;
        for handle in handles {
            match handle.await.unwrap().unwrap() {
                RenderOutcome::Generated { .. } => generated += 1,
                RenderOutcome::Cached { .. } => cached += 1,
            }
        }

        assert_eq!(generated, 1);
        assert_eq!(cached, 3);
        assert_eq!(splitter.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_render_2d_generates_then_caches() {
        let store = seeded_store();
        store.put(
            "source/clients/acme/scenes/kitchen/2d_base_kitchen.jpg",
            encode_jpeg_bytes(&RgbImage::from_pixel(16, 16, Rgb([50, 50, 50]))),
        );
        let svc = service(store.clone());

        let req = Render2dRequest {
            client: "acme".to_string(),
            scene: "kitchen".to_string(),
            selection: Selection::new(),
            build: "0000".to_string(),
        };

        let first = svc.render_2d(req.clone()).await.unwrap();
        assert!(!first.cached);
        assert_eq!(first.key, "renders/2d_0000.jpg");
        assert!(store.exists("renders/2d_0000.jpg").await.unwrap());

        let second = svc.render_2d(req).await.unwrap();
        assert!(second.cached);
    }

    #[tokio::test]
    async fn test_render_2d_missing_base_is_fatal() {
        let store = seeded_store();
        let svc = service(store);

        let req = Render2dRequest {
            client: "acme".to_string(),
            scene: "kitchen".to_string(),
            selection: Selection::new(),
            build: "0000".to_string(),
        };

        let result = svc.render_2d(req).await;
        assert!(matches!(
            result,
            Err(RenderError::Compose(ComposeError::BaseImageNotFound { .. }))
        ));
    }
}
