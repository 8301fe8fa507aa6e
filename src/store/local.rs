//! Filesystem-backed asset store.
//!
//! Maps asset keys onto paths under a base directory. Intended for local
//! development and integration tests; the directory layout matches the key
//! layout exactly, so a bucket can be mirrored with `aws s3 sync`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::StoreError;

use super::AssetStore;

/// Local-filesystem implementation of [`AssetStore`].
#[derive(Clone)]
pub struct LocalAssetStore {
    root: PathBuf,
}

impl LocalAssetStore {
    /// Create a new store rooted at the given directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Get the root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        // Keys are forward-slash separated; joining components one at a
        // time keeps the layout identical on non-Unix hosts.
        let mut path = self.root.clone();
        for part in key.split('/').filter(|p| !p.is_empty()) {
            path.push(part);
        }
        path
    }
}

#[async_trait]
impl AssetStore for LocalAssetStore {
    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let path = self.path_for(key);
        tokio::fs::try_exists(&path)
            .await
            .map_err(|e| StoreError::Storage(e.to_string()))
    }

    async fn read_bytes(&self, key: &str) -> Result<Bytes, StoreError> {
        let path = self.path_for(key);
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(key.to_string()))
            }
            Err(e) => Err(StoreError::Storage(e.to_string())),
        }
    }

    async fn write_bytes(
        &self,
        key: &str,
        data: Bytes,
        _content_type: &str,
    ) -> Result<(), StoreError> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::Storage(e.to_string()))?;
        }
        tokio::fs::write(&path, &data)
            .await
            .map_err(|e| StoreError::Storage(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_then_read_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalAssetStore::new(dir.path());

        let key = "source/clients/acme/config.json";
        let payload = Bytes::from_static(b"{\"scenes\":{}}");

        assert!(!store.exists(key).await.unwrap());

        store
            .write_bytes(key, payload.clone(), "application/json")
            .await
            .unwrap();

        assert!(store.exists(key).await.unwrap());
        assert_eq!(store.read_bytes(key).await.unwrap(), payload);
    }

    #[tokio::test]
    async fn test_read_missing_key_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalAssetStore::new(dir.path());

        let result = store.read_bytes("missing/object.png").await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_nested_keys_create_directories() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalAssetStore::new(dir.path());

        store
            .write_bytes(
                "cubemap/acme/kitchen/tiles/000102/metadata.json",
                Bytes::from_static(b"{}"),
                "application/json",
            )
            .await
            .unwrap();

        assert!(dir
            .path()
            .join("cubemap/acme/kitchen/tiles/000102/metadata.json")
            .exists());
    }
}
