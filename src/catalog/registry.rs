//! Catalog registry: cached access to parsed client configs.
//!
//! Client configs are small JSON objects read on every render request.
//! The registry parses each config once and keeps it behind an LRU keyed
//! by client id, so steady-state requests skip both the store read and the
//! JSON parse.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use tokio::sync::RwLock;

use crate::error::{ConfigError, StoreError};
use crate::store::AssetStore;

use super::resolver::ClientConfig;

/// Default number of parsed client configs to cache.
pub const DEFAULT_CATALOG_CACHE_CAPACITY: usize = 100;

/// Storage key for a client's config object.
fn config_key(client: &str) -> String {
    format!("source/clients/{client}/config.json")
}

/// Registry of parsed client configs with LRU eviction.
pub struct CatalogRegistry<S: AssetStore> {
    store: Arc<S>,
    cache: RwLock<LruCache<String, Arc<ClientConfig>>>,
}

impl<S: AssetStore> CatalogRegistry<S> {
    /// Create a registry with the default cache capacity.
    pub fn new(store: Arc<S>) -> Self {
        Self::with_capacity(store, DEFAULT_CATALOG_CACHE_CAPACITY)
    }

    /// Create a registry with a custom cache capacity.
    pub fn with_capacity(store: Arc<S>, capacity: usize) -> Self {
        Self {
            store,
            cache: RwLock::new(LruCache::new(
                NonZeroUsize::new(capacity.max(1)).unwrap(),
            )),
        }
    }

    /// Get a client's parsed config, reading and parsing on first access.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::NotFound`] when the client has no config object
    /// - [`ConfigError::Parse`] / [`ConfigError::MissingScenes`] from parsing
    pub async fn get_config(&self, client: &str) -> Result<Arc<ClientConfig>, ConfigError> {
        {
            let mut cache = self.cache.write().await;
            if let Some(config) = cache.get(client) {
                return Ok(config.clone());
            }
        }

        let key = config_key(client);
        let data = match self.store.read_bytes(&key).await {
            Ok(data) => data,
            Err(StoreError::NotFound(_)) => {
                return Err(ConfigError::NotFound {
                    client: client.to_string(),
                })
            }
            Err(err) => return Err(err.into()),
        };

        let config = Arc::new(ClientConfig::from_bytes(client, &data)?);

        let mut cache = self.cache.write().await;
        cache.put(client.to_string(), config.clone());

        Ok(config)
    }

    /// Drop a client's cached config, forcing a re-read on next access.
    pub async fn invalidate(&self, client: &str) {
        let mut cache = self.cache.write().await;
        cache.pop(client);
    }
}
