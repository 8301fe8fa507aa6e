//! S3-backed asset store.
//!
//! Works with AWS S3 and S3-compatible services (MinIO, Cloudflare R2) via
//! a custom endpoint URL. Existence checks use `HeadObject`, so a cache-hit
//! decision costs one round trip and no payload transfer.

use async_trait::async_trait;
use aws_sdk_s3::Client;
use bytes::Bytes;

use crate::error::StoreError;

use super::AssetStore;

/// Create an S3 client, optionally pointed at a custom endpoint.
///
/// # Arguments
/// * `endpoint_url` - Custom endpoint for S3-compatible services. When set,
///   path-style addressing is forced (required by MinIO and most compatibles).
/// * `region` - AWS region name.
pub async fn create_s3_client(endpoint_url: Option<&str>, region: &str) -> Client {
    let region = aws_config::Region::new(region.to_string());
    let mut config_loader =
        aws_config::defaults(aws_config::BehaviorVersion::latest()).region(region);

    if let Some(endpoint) = endpoint_url {
        config_loader = config_loader.endpoint_url(endpoint);
    }

    let sdk_config = config_loader.load().await;

    let s3_config = if endpoint_url.is_some() {
        aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(true)
            .build()
    } else {
        aws_sdk_s3::config::Builder::from(&sdk_config).build()
    };

    Client::from_conf(s3_config)
}

/// S3 implementation of [`AssetStore`].
///
/// The asset key is used as the object key within the bucket.
#[derive(Clone)]
pub struct S3AssetStore {
    client: Client,
    bucket: String,
}

impl S3AssetStore {
    /// Create a new store for the given bucket.
    pub fn new(client: Client, bucket: String) -> Self {
        Self { client, bucket }
    }

    /// Get the bucket name.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[async_trait]
impl AssetStore for S3AssetStore {
    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_not_found() {
                    Ok(false)
                } else {
                    Err(StoreError::Storage(service_err.to_string()))
                }
            }
        }
    }

    async fn read_bytes(&self, key: &str) -> Result<Bytes, StoreError> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| {
                let service_err = err.into_service_error();
                if service_err.is_no_such_key() {
                    StoreError::NotFound(key.to_string())
                } else {
                    StoreError::Storage(service_err.to_string())
                }
            })?;

        let data = output
            .body
            .collect()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        Ok(data.into_bytes())
    }

    async fn write_bytes(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<(), StoreError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(data.into())
            .send()
            .await
            .map_err(|err| StoreError::Storage(err.into_service_error().to_string()))?;

        Ok(())
    }
}
