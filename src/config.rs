//! Configuration management for Panoweave.
//!
//! Supports command-line arguments via clap, environment variables with a
//! `PANO_` prefix, and sensible defaults for all optional settings.
//!
//! # Environment Variables
//!
//! - `PANO_HOST` - Server bind address (default: 0.0.0.0)
//! - `PANO_PORT` - Server port (default: 8000)
//! - `PANO_S3_BUCKET` - S3 bucket holding assets and published tiles
//! - `PANO_S3_ENDPOINT` - Custom S3 endpoint for S3-compatible services
//! - `PANO_S3_REGION` - AWS region (default: us-east-1)
//! - `PANO_LOCAL_ROOT` - Local directory backend (alternative to S3)
//! - `PANO_TILE_SIZE` - Tile edge length in pixels (default: 512)
//! - `PANO_TILE_QUALITY` - Tile JPEG quality (default: 85)
//! - `PANO_MIN_INTERVAL_MS` - Rate-limit interval (default: 1000)
//! - `PANO_CACHE_CONFIGS` - Parsed client configs to cache (default: 100)

use std::path::PathBuf;

use clap::Parser;

use crate::catalog::DEFAULT_CATALOG_CACHE_CAPACITY;
use crate::render::DEFAULT_TILE_SIZE;
use crate::tiles::DEFAULT_TILE_JPEG_QUALITY;

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 8000;

/// Default AWS region.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Default minimum interval between render-request starts, in milliseconds.
pub const DEFAULT_MIN_INTERVAL_MS: u64 = 1000;

// =============================================================================
// CLI Arguments
// =============================================================================

/// Panoweave - a render backend for panorama configurators.
///
/// Composites user-selected overlay layers onto a base panorama, splits the
/// result into cubemap tiles, and publishes them to object storage keyed by
/// a deterministic build string.
#[derive(Parser, Debug, Clone)]
#[command(name = "panoweave")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "PANO_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "PANO_PORT")]
    pub port: u16,

    // =========================================================================
    // Storage Configuration
    // =========================================================================
    /// S3 bucket holding source assets and published tiles.
    #[arg(long, env = "PANO_S3_BUCKET")]
    pub s3_bucket: Option<String>,

    /// Custom S3 endpoint URL for S3-compatible services (MinIO, R2, etc.).
    #[arg(long, env = "PANO_S3_ENDPOINT")]
    pub s3_endpoint: Option<String>,

    /// AWS region for S3.
    #[arg(long, default_value = DEFAULT_REGION, env = "PANO_S3_REGION")]
    pub s3_region: String,

    /// Local directory backend. Mutually exclusive with --s3-bucket.
    #[arg(long, env = "PANO_LOCAL_ROOT")]
    pub local_root: Option<PathBuf>,

    // =========================================================================
    // Render Configuration
    // =========================================================================
    /// Edge length of published tiles, in pixels.
    #[arg(long, default_value_t = DEFAULT_TILE_SIZE, env = "PANO_TILE_SIZE")]
    pub tile_size: u32,

    /// JPEG quality for published tiles (1-100).
    #[arg(long, default_value_t = DEFAULT_TILE_JPEG_QUALITY, env = "PANO_TILE_QUALITY")]
    pub tile_quality: u8,

    /// Minimum interval between render-request starts, in milliseconds.
    ///
    /// Requests arriving sooner are rejected with 429. Zero disables the
    /// limiter.
    #[arg(long, default_value_t = DEFAULT_MIN_INTERVAL_MS, env = "PANO_MIN_INTERVAL_MS")]
    pub min_interval_ms: u64,

    // =========================================================================
    // Cache Configuration
    // =========================================================================
    /// Maximum number of parsed client configs to keep in memory.
    #[arg(long, default_value_t = DEFAULT_CATALOG_CACHE_CAPACITY, env = "PANO_CACHE_CONFIGS")]
    pub cache_configs: usize,

    // =========================================================================
    // CORS Configuration
    // =========================================================================
    /// Allowed CORS origins (comma-separated).
    ///
    /// If not specified, allows any origin.
    #[arg(long, env = "PANO_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl Config {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        match (&self.s3_bucket, &self.local_root) {
            (None, None) => {
                return Err(
                    "no storage backend configured. Set --s3-bucket (or PANO_S3_BUCKET) \
                     or --local-root (or PANO_LOCAL_ROOT)"
                        .to_string(),
                )
            }
            (Some(_), Some(_)) => {
                return Err(
                    "both --s3-bucket and --local-root are set; pick exactly one storage backend"
                        .to_string(),
                )
            }
            (Some(bucket), None) if bucket.is_empty() => {
                return Err("S3 bucket name must not be empty".to_string())
            }
            _ => {}
        }

        if self.tile_quality == 0 || self.tile_quality > 100 {
            return Err("tile_quality must be between 1 and 100".to_string());
        }

        if self.tile_size < 64 || self.tile_size > 4096 {
            return Err("tile_size must be between 64 and 4096".to_string());
        }

        if self.cache_configs == 0 {
            return Err("cache_configs must be greater than 0".to_string());
        }

        Ok(())
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// =============================================================================
// Tests
// =============================================================================
