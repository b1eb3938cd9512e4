//! # pdf2img-server
//!
//! An HTTP service that rasterizes uploaded PDF documents into PNG or JPEG
//! page images.
//!
//! Rendering is delegated to the poppler command-line tools. A request's page
//! window is split across several converter processes that run concurrently
//! inside a scoped temporary directory, and the results are returned either
//! as a zip archive in page order or as a single image.
//!
//! ## Architecture
//!
//! - [`render`] - Render engine abstraction, poppler backend and rasterizer
//! - [`convert`] - Request model, upload validation, zip packaging and service
//! - [`server`] - Axum-based HTTP server and routes
//! - [`config`] - CLI and configuration types
//! - [`error`] - Error type shared by all layers
//!
//! ## Example
//!
//! ```rust,no_run
//! use pdf2img_server::{create_router, ConversionService, PopplerEngine, Rasterizer, RouterConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let service = ConversionService::new(Rasterizer::new(PopplerEngine::new()));
//!     let router = create_router(service, RouterConfig::new(50 * 1024 * 1024));
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:8000").await.unwrap();
//!     axum::serve(listener, router).await.unwrap();
//! }
//! ```

pub mod config;
pub mod convert;
pub mod error;
pub mod render;
pub mod server;

// Re-export commonly used types
pub use config::Config;
pub use convert::{
    archive_filename, build_archive, validate_parameters, validate_upload, ConversionOutput,
    ConversionParams, ConversionService, ImageFormat, Packaging, UploadGuard,
};
pub use error::ConvertError;
pub use render::{
    split_page_range, Converter, PageWindow, PopplerEngine, RasterizedPage, Rasterizer,
    RenderEngine, RenderJob, RenderedPages,
};
pub use server::{create_router, AppState, ErrorResponse, HealthResponse, RouterConfig};
