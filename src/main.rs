//! Panoweave - a render backend for panorama configurators.
//!
//! This binary starts the HTTP server and wires all components together.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use panoweave::{
    config::Config,
    create_s3_client,
    render::RenderService,
    server::{create_router, RouterConfig},
    store::{AssetStore, LocalAssetStore, S3AssetStore},
    tiles::CubemapSplitter,
};

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();

    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    info!("Panoweave v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration:");
    info!("  Tile size: {}px, quality {}", config.tile_size, config.tile_quality);
    info!("  Rate limit: {}ms between request starts", config.min_interval_ms);

    if let Some(bucket) = config.s3_bucket.clone() {
        info!("  Storage: s3://{}", bucket);
        if let Some(ref endpoint) = config.s3_endpoint {
            info!("  S3 endpoint: {}", endpoint);
        }
        info!("  S3 region: {}", config.s3_region);

        let client = create_s3_client(config.s3_endpoint.as_deref(), &config.s3_region).await;
        let store = Arc::new(S3AssetStore::new(client, bucket));
        serve(store, &config).await
    } else {
        // validate() guarantees local_root is set when s3_bucket is not
        let root = config.local_root.clone().unwrap_or_default();
        info!("  Storage: local directory {}", root.display());

        let store = Arc::new(LocalAssetStore::new(root));
        serve(store, &config).await
    }
}

/// Wire the service and router for the chosen store, then serve.
async fn serve<S: AssetStore + 'static>(store: Arc<S>, config: &Config) -> ExitCode {
    let splitter = Arc::new(CubemapSplitter::new(config.tile_quality));
    let service = RenderService::with_settings(
        store,
        splitter,
        config.tile_size,
        config.cache_configs,
    );

    let mut router_config = RouterConfig::new()
        .with_min_request_interval(Duration::from_millis(config.min_interval_ms))
        .with_tracing(!config.no_tracing);

    if let Some(origins) = config.cors_origins.clone() {
        router_config = router_config.with_cors_origins(origins);
    }

    let router = create_router(service, router_config);
    let addr = config.bind_address();

    info!("");
    info!("Server listening on http://{}", addr);
    info!("  curl http://{}/api/health", addr);
    info!("");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = axum::serve(listener, router).await {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "panoweave=debug,tower_http=debug"
    } else {
        "panoweave=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
