//! Asset store abstraction.
//!
//! Everything the pipeline reads (scene configs, base images, overlays) and
//! everything it publishes (tiles, metadata) goes through the [`AssetStore`]
//! capability. The core never touches a storage SDK directly, which keeps
//! compositing and encoding testable against an in-memory or on-disk store.
//!
//! # Implementations
//!
//! - [`S3AssetStore`] - S3 or S3-compatible object storage (MinIO, R2)
//! - [`LocalAssetStore`] - a directory tree on the local filesystem, useful
//!   for development and integration tests

mod local;
mod s3;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::StoreError;

pub use local::LocalAssetStore;
pub use s3::{create_s3_client, S3AssetStore};

/// Capability trait for reading and publishing assets by key.
///
/// Keys are `/`-separated paths relative to the store root (bucket or base
/// directory), e.g. `source/clients/acme/scenes/kitchen/base_kitchen.jpg`.
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Check whether an object exists at the given key.
    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    /// Read the full bytes of the object at the given key.
    ///
    /// Returns [`StoreError::NotFound`] when there is no such object.
    async fn read_bytes(&self, key: &str) -> Result<Bytes, StoreError>;

    /// Write bytes to the given key with the given content type.
    ///
    /// Overwrites any existing object at the key. The pipeline relies on
    /// overwrites being harmless: two concurrent builds of the same
    /// selection publish identical artifacts.
    async fn write_bytes(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<(), StoreError>;
}
