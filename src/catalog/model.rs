//! Normalized catalog types consumed by the encoder and the compositing
//! engine.

use std::collections::HashMap;

/// One selectable option within a layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    /// Item identifier, unique within its layer
    pub id: String,

    /// Stable catalog index. This is the *only* legitimate source of the
    /// encoded build-string value; it is never recomputed from list
    /// position, so items can be reordered or removed without changing the
    /// meaning of previously published build strings.
    pub index: u32,

    /// Overlay file reference. `None` means this choice deliberately has no
    /// visual overlay, which is distinct from "nothing selected".
    pub file: Option<String>,
}

/// A named, ordered slot in a scene with a closed catalog of items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layer {
    /// Layer identifier, unique within the scene, never empty
    pub id: String,

    /// Human-readable label (falls back to the id)
    pub label: String,

    /// Composite and encode ordering; ties broken by source order
    pub build_order: i64,

    /// Selectable items in catalog order
    pub items: Vec<Item>,
}

/// A user's selection: layer id → chosen item id.
///
/// A layer absent from the map, mapped to `None`, or mapped to an empty or
/// unknown item id is "neutral" - index 0, no overlay - and never an error.
pub type Selection = HashMap<String, Option<String>>;

/// A scene catalog normalized for one request.
///
/// Immutable once resolved. Owned by the resolver output for the duration
/// of one request; nothing downstream mutates it.
#[derive(Debug, Clone)]
pub struct SceneContext {
    /// Client identifier
    pub client: String,

    /// Scene identifier
    pub scene: String,

    /// Scene position within the client's catalog, used as a fixed-width
    /// build-string prefix so scenes sharing a namespace cannot collide
    pub scene_index: u32,

    /// Layers in catalog source order (use [`SceneContext::layers_in_build_order`]
    /// for composite/encode ordering)
    pub layers: Vec<Layer>,

    /// Numeric base for build-string fields (16 = hex, anything else = base-36)
    pub config_string_base: u32,

    /// Field width in characters per layer
    pub build_chars: usize,
}

impl SceneContext {
    /// Key prefix under which this scene's assets live.
    pub fn assets_root(&self) -> String {
        format!("source/clients/{}/scenes/{}", self.client, self.scene)
    }

    /// Layers sorted by ascending `build_order`.
    ///
    /// The sort is stable: layers with equal `build_order` keep their
    /// catalog source order. Both the selection encoder and the compositing
    /// engine iterate this exact ordering, which is what makes the build
    /// string a faithful key for the composite.
    pub fn layers_in_build_order(&self) -> Vec<&Layer> {
        let mut ordered: Vec<&Layer> = self.layers.iter().collect();
        ordered.sort_by_key(|layer| layer.build_order);
        ordered
    }
}

/// Resolve the chosen item for a layer under the neutral-on-missing policy.
///
/// Returns `None` when the layer has no entry in the selection, the entry
/// is null or empty, or no item in the layer matches the chosen id. The
/// encoder maps `None` to index 0 and the compositing engine maps it to
/// "no overlay"; sharing this one function is what keeps the two from ever
/// disagreeing about which items are chosen.
pub fn resolve_selected_item<'a>(layer: &'a Layer, selection: &Selection) -> Option<&'a Item> {
    let selected_id = selection.get(&layer.id)?.as_deref()?;
    if selected_id.is_empty() {
        return None;
    }
    layer.items.iter().find(|item| item.id == selected_id)
}
