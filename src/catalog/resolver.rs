//! Client catalog parsing and scene normalization.
//!
//! Catalogs are duck-typed JSON by contract: `scenes` may be a keyed
//! mapping or a list of records carrying their own `id`, and individual
//! layers or items may be malformed. Parsing is therefore done over
//! `serde_json::Value` with an explicit tolerance policy - malformed layers
//! and items are skipped, never fatal - instead of rigid derive structs
//! that would reject the whole catalog.

use serde_json::Value;
use tracing::debug;

use crate::error::{ConfigError, SchemaError};

use super::model::{Item, Layer, SceneContext};

/// Default numeric base for build-string fields.
const DEFAULT_CONFIG_STRING_BASE: u32 = 36;

/// Default field width in characters per layer.
const DEFAULT_BUILD_CHARS: usize = 2;

/// A client's parsed scene catalog.
///
/// Holds the raw `scenes` value; normalization into [`SceneContext`]
/// happens per request in [`ClientConfig::resolve_scene`], so a cached
/// config can serve every scene a client owns.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    client: String,
    scenes: Value,
}

impl ClientConfig {
    /// Parse a client config from raw JSON bytes.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::Parse`] when the payload is not a JSON object
    /// - [`ConfigError::MissingScenes`] when there is no non-empty `scenes`
    ///   entry
    pub fn from_bytes(client: &str, data: &[u8]) -> Result<Self, ConfigError> {
        let root: Value = serde_json::from_slice(data).map_err(|e| ConfigError::Parse {
            client: client.to_string(),
            message: e.to_string(),
        })?;

        if !root.is_object() {
            return Err(ConfigError::Parse {
                client: client.to_string(),
                message: "expected a JSON object at the top level".to_string(),
            });
        }

        let scenes = root.get("scenes").cloned().unwrap_or(Value::Null);
        let empty = match &scenes {
            Value::Null => true,
            Value::Object(map) => map.is_empty(),
            Value::Array(list) => list.is_empty(),
            _ => false,
        };
        if empty {
            return Err(ConfigError::MissingScenes {
                client: client.to_string(),
            });
        }

        Ok(Self {
            client: client.to_string(),
            scenes,
        })
    }

    /// Get the client identifier this config belongs to.
    pub fn client(&self) -> &str {
        &self.client
    }

    /// Resolve a scene into the canonical [`SceneContext`].
    ///
    /// Accepts `scenes` as either a keyed mapping or a list of scene
    /// records; both shapes normalize identically.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::SceneNotFound`] when the scene is absent from
    ///   either representation
    /// - [`SchemaError::ScenesShape`] when `scenes` is neither shape
    /// - [`SchemaError::LayersNotList`] when `layers` is present but not
    ///   list-shaped
    pub fn resolve_scene(&self, scene_id: &str) -> Result<SceneContext, ConfigError> {
        let scene = match &self.scenes {
            Value::Object(map) => map.get(scene_id).ok_or_else(|| ConfigError::SceneNotFound {
                client: self.client.clone(),
                scene: scene_id.to_string(),
            })?,
            Value::Array(list) => list
                .iter()
                .find(|entry| entry.get("id").and_then(Value::as_str) == Some(scene_id))
                .ok_or_else(|| ConfigError::SceneNotFound {
                    client: self.client.clone(),
                    scene: scene_id.to_string(),
                })?,
            _ => {
                return Err(SchemaError::ScenesShape {
                    client: self.client.clone(),
                }
                .into())
            }
        };

        let layers = normalize_layers(scene_id, scene.get("layers"))?;

        Ok(SceneContext {
            client: self.client.clone(),
            scene: scene_id.to_string(),
            scene_index: scene
                .get("scene_index")
                .and_then(Value::as_u64)
                .unwrap_or(0) as u32,
            layers,
            config_string_base: scene
                .get("configStringBase")
                .and_then(Value::as_u64)
                .map(|b| b as u32)
                .unwrap_or(DEFAULT_CONFIG_STRING_BASE),
            build_chars: scene
                .get("buildChars")
                .and_then(Value::as_u64)
                .map(|c| c as usize)
                .unwrap_or(DEFAULT_BUILD_CHARS),
        })
    }
}

/// Normalize the raw `layers` value into catalog layers.
///
/// A layer without a non-empty `id` is skipped, not fatal. Items without an
/// `id` or a numeric `index` are skipped the same way. Both skips log at
/// debug level so a broken catalog can be diagnosed without failing every
/// render against it.
fn normalize_layers(scene_id: &str, layers: Option<&Value>) -> Result<Vec<Layer>, ConfigError> {
    let entries = match layers {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(entries)) => entries,
        Some(_) => {
            return Err(SchemaError::LayersNotList {
                scene: scene_id.to_string(),
            }
            .into())
        }
    };

    let mut normalized = Vec::with_capacity(entries.len());

    for entry in entries {
        let layer_id = match entry.get("id").and_then(Value::as_str) {
            Some(id) if !id.is_empty() => id,
            _ => {
                debug!(scene = scene_id, "skipping layer without id");
                continue;
            }
        };

        let items = entry
            .get("items")
            .and_then(Value::as_array)
            .map(|items| normalize_items(layer_id, items))
            .unwrap_or_default();

        normalized.push(Layer {
            id: layer_id.to_string(),
            label: entry
                .get("label")
                .and_then(Value::as_str)
                .unwrap_or(layer_id)
                .to_string(),
            build_order: entry
                .get("build_order")
                .and_then(Value::as_i64)
                .unwrap_or(0),
            items,
        });
    }

    Ok(normalized)
}

fn normalize_items(layer_id: &str, items: &[Value]) -> Vec<Item> {
    let mut normalized = Vec::with_capacity(items.len());

    for entry in items {
        let item_id = match entry.get("id").and_then(Value::as_str) {
            Some(id) if !id.is_empty() => id,
            _ => {
                debug!(layer = layer_id, "skipping item without id");
                continue;
            }
        };

        let index = match entry.get("index").and_then(Value::as_u64) {
            Some(index) => index as u32,
            None => {
                debug!(layer = layer_id, item = item_id, "skipping item without index");
                continue;
            }
        };

        let file = entry
            .get("file")
            .and_then(Value::as_str)
            .map(|f| f.to_string());

        normalized.push(Item {
            id: item_id.to_string(),
            index,
            file,
        });
    }

    normalized
}
