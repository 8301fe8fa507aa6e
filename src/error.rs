use thiserror::Error;

/// Errors from the asset store (S3 or local filesystem).
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Error from S3 or S3-compatible storage
    #[error("storage error: {0}")]
    Storage(String),

    /// Network or connection error
    #[error("connection error: {0}")]
    Connection(String),

    /// Object not found
    #[error("object not found: {0}")]
    NotFound(String),
}

/// Structural errors in a client's scene catalog.
///
/// These indicate a config that parsed as JSON but does not have the
/// expected shape, as opposed to a config that is missing entirely.
#[derive(Debug, Clone, Error)]
pub enum SchemaError {
    /// `scenes` is neither a keyed mapping nor a list of scene records
    #[error("scenes entry for client '{client}' is neither a mapping nor a list")]
    ScenesShape { client: String },

    /// `layers` is present but not list-shaped
    #[error("layers for scene '{scene}' is not a list")]
    LayersNotList { scene: String },
}

/// Errors loading or resolving a client's scene catalog.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// The client has no config object in the store
    #[error("no configuration found for client '{client}'")]
    NotFound { client: String },

    /// The config object is not valid JSON
    #[error("configuration for client '{client}' is not valid JSON: {message}")]
    Parse { client: String, message: String },

    /// The config has no `scenes` entry
    #[error("configuration for client '{client}' has no 'scenes' entry")]
    MissingScenes { client: String },

    /// The named scene is absent from the catalog
    #[error("scene '{scene}' not found in client '{client}' configuration")]
    SceneNotFound { client: String, scene: String },

    /// Structural error in the catalog
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// I/O error while reading the config from the store
    #[error("failed to read configuration: {0}")]
    Store(#[from] StoreError),
}

/// Errors producing a build string from a selection.
#[derive(Debug, Clone, Error)]
pub enum EncodeError {
    /// An item index does not fit in the configured field width.
    ///
    /// The encoder fails loudly here rather than truncating: a truncated
    /// field would silently collide with a different selection.
    #[error("index {index} for layer '{layer_id}' does not fit in {chars} base-{base} digit(s)")]
    Overflow {
        layer_id: String,
        index: u32,
        base: u32,
        chars: usize,
    },
}

/// Errors from the compositing engine.
#[derive(Debug, Clone, Error)]
pub enum ComposeError {
    /// The scene's base image is absent from the asset store (always fatal)
    #[error("base image not found: {key}")]
    BaseImageNotFound { key: String },

    /// One or more referenced overlays are absent from the asset store.
    ///
    /// Collected across the whole layer scan so a single request surfaces
    /// every broken reference at once. Entries are `(layer_id, file_name)`.
    #[error("missing overlays: {0:?}")]
    MissingOverlays(Vec<(String, String)>),

    /// An image could not be decoded
    #[error("failed to decode {key}: {message}")]
    Decode { key: String, message: String },

    /// The composed image could not be encoded
    #[error("failed to encode composite: {message}")]
    Encode { message: String },

    /// I/O error while reading asset bytes
    #[error("asset read failed: {0}")]
    Store(#[from] StoreError),
}

/// Errors from the tile splitter collaborator.
#[derive(Debug, Clone, Error)]
pub enum SplitError {
    /// A tile file could not be written to the scratch directory
    #[error("failed to write tile {path}: {message}")]
    Write { path: String, message: String },

    /// A face or tile could not be encoded
    #[error("failed to encode tile: {message}")]
    Encode { message: String },
}

/// Top-level errors from the render service.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Bad or missing client/scene configuration
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Build string could not be produced
    #[error(transparent)]
    Encode(#[from] EncodeError),

    /// Compositing failed
    #[error(transparent)]
    Compose(#[from] ComposeError),

    /// Tile splitting failed
    #[error(transparent)]
    Split(#[from] SplitError),

    /// Scratch directory could not be created
    #[error("failed to create scratch directory: {message}")]
    Scratch { message: String },

    /// Metadata object could not be published
    #[error("failed to publish metadata at {key}: {source}")]
    PublishMetadata { key: String, source: StoreError },

    /// The final 2D render could not be published
    #[error("failed to publish render at {key}: {source}")]
    PublishRender { key: String, source: StoreError },
}
