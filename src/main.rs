//! pdf2img-server - rasterize uploaded PDFs into page images.
//!
//! This binary starts the HTTP server and configures all components.

use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pdf2img_server::{
    config::Config,
    convert::ConversionService,
    render::{PopplerEngine, Rasterizer, RenderEngine},
    server::{create_router, RouterConfig},
};

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();

    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    info!("pdf2img-server v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration:");
    info!("  Upload ceiling: {} MB", config.max_upload_mb);
    info!("  Converter: {}", config.converter.binary());
    info!("  Workers per request: {}", config.workers);
    if let Some(ref dir) = config.poppler_path {
        info!("  Poppler path: {}", dir.display());
    }
    if let Some(ref dir) = config.temp_dir {
        info!("  Temp dir: {}", dir.display());
    }
    if config.strict {
        info!("  Strict syntax checking: enabled");
    }

    let mut engine = PopplerEngine::new()
        .with_converter(config.converter)
        .with_strict(config.strict);
    if let Some(ref dir) = config.poppler_path {
        engine = engine.with_poppler_path(dir.clone());
    }

    match engine.probe().await {
        Ok(version) => info!("  Poppler: {}", version),
        Err(e) => {
            warn!("  Poppler check failed: {}", e);
            warn!("        Conversions will fail until poppler-utils is installed");
        }
    }

    let mut rasterizer = Rasterizer::new(engine).with_worker_count(config.workers);
    if let Some(ref dir) = config.temp_dir {
        rasterizer = rasterizer.with_temp_root(dir.clone());
    }

    let service = ConversionService::new(rasterizer);
    let router = create_router(service, build_router_config(&config));

    let addr = config.bind_address();
    info!("Server listening on: http://{}", addr);

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
        "pdf2img_server=debug,tower_http=debug"
    } else {
        "pdf2img_server=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Build RouterConfig from the application Config.
fn build_router_config(config: &Config) -> RouterConfig {
    let mut router_config = RouterConfig::new(config.max_upload_bytes());

    if let Some(ref origins) = config.cors_origins {
        router_config = router_config.with_cors_origins(origins.clone());
    }

    router_config.with_tracing(!config.no_tracing)
}
