//! Router configuration for the PDF rasterization server.
//!
//! This module defines the HTTP routes and applies middleware for CORS,
//! request body limits and tracing.
//!
//! # Route Structure
//!
//! ```text
//! /health, /api/v1/health                          - Health check
//! /api/v1/convert/pdf/img, /convert                - PDF to zip of page images
//! /api/v1/convert/pdf/img/single, /convert/single  - PDF page to single image
//! ```
//!
//! # Example
//!
//! ```ignore
//! use pdf2img_server::convert::ConversionService;
//! use pdf2img_server::render::{PopplerEngine, Rasterizer};
//! use pdf2img_server::server::routes::{create_router, RouterConfig};
//!
//! let service = ConversionService::new(Rasterizer::new(PopplerEngine::new()));
//!
//! let config = RouterConfig::new(50 * 1024 * 1024)
//!     .with_cors_origins(vec!["https://example.com".to_string()]);
//!
//! let router = create_router(service, config);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8000").await?;
//! axum::serve(listener, router).await?;
//! ```

use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use http::{HeaderName, Method};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{convert_handler, convert_single_handler, health_handler, AppState};
use crate::convert::ConversionService;
use crate::render::RenderEngine;

/// Extra body allowance for multipart boundaries and part headers.
pub const MULTIPART_OVERHEAD_BYTES: u64 = 64 * 1024;

// =============================================================================
// Router Configuration
// =============================================================================

/// Configuration for the HTTP router.
#[derive(Clone)]
pub struct RouterConfig {
    /// Maximum accepted PDF size in bytes
    pub max_upload_bytes: u64,

    /// Allowed CORS origins (None = allow any origin)
    pub cors_origins: Option<Vec<String>>,

    /// Whether to enable request tracing
    pub enable_tracing: bool,
}

impl RouterConfig {
    /// Create a new router configuration with the given upload ceiling.
    ///
    /// By default:
    /// - CORS allows any origin
    /// - Tracing is enabled
    pub fn new(max_upload_bytes: u64) -> Self {
        Self {
            max_upload_bytes,
            cors_origins: None,
            enable_tracing: true,
        }
    }

    /// Set specific allowed CORS origins.
    ///
    /// Pass an empty vec to disallow all cross-origin requests.
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = Some(origins);
        self
    }

    /// Enable or disable request tracing.
    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }

    /// Request body limit applied to conversion routes.
    ///
    /// Slightly above the upload ceiling so oversize files are reported by
    /// the upload validator with a size message.
    pub fn body_limit(&self) -> usize {
        usize::try_from(self.max_upload_bytes.saturating_add(MULTIPART_OVERHEAD_BYTES))
            .unwrap_or(usize::MAX)
    }
}

// =============================================================================
// Router Builder
// =============================================================================

/// Create the main application router.
///
/// # Arguments
///
/// * `service` - The conversion service handling uploads
/// * `config` - Router configuration
pub fn create_router<E: RenderEngine>(service: ConversionService<E>, config: RouterConfig) -> Router {
    let app_state = AppState::new(service, config.max_upload_bytes);
    let cors = build_cors_layer(&config);

    let router = Router::new()
        .route("/health", get(health_handler))
        .route("/api/v1/health", get(health_handler))
        .route("/api/v1/convert/pdf/img", post(convert_handler::<E>))
        .route(
            "/api/v1/convert/pdf/img/single",
            post(convert_single_handler::<E>),
        )
        .route("/convert", post(convert_handler::<E>))
        .route("/convert/single", post(convert_single_handler::<E>))
        .with_state(app_state)
        .layer(DefaultBodyLimit::max(config.body_limit()))
        .layer(cors);

    if config.enable_tracing {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

/// Build the CORS layer based on configuration.
fn build_cors_layer(config: &RouterConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .expose_headers([CONTENT_DISPOSITION, HeaderName::from_static("x-page-count")])
        .max_age(Duration::from_secs(86400));

    match &config.cors_origins {
        None => cors.allow_origin(Any),
        Some(origins) if origins.is_empty() => cors,
        Some(origins) => {
            let parsed_origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            cors.allow_origin(parsed_origins)
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
