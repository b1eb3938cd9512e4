//! Conversion pipeline.
//!
//! This module holds the request model, the validator, the zip archiver and
//! the service that drives rasterization for one request.
//!
//! # Components
//!
//! - [`ConversionParams`]: validated query parameters for a conversion
//! - [`ImageFormat`]: output format (`png`, or `jpeg` with `jpg` alias)
//! - [`validate_upload`] / [`UploadGuard`]: PDF signature and size ceiling checks
//! - [`validate_parameters`]: dpi, format, page window and timeout checks
//! - [`build_archive`]: deflate zip of the rendered pages in page order
//! - [`ConversionService`]: rasterize, then zip or pass the first page through
//!
//! # Example
//!
//! ```ignore
//! use pdf2img_server::convert::{validate_parameters, ConversionService, Packaging};
//! use pdf2img_server::render::{PopplerEngine, Rasterizer};
//!
//! let service = ConversionService::new(Rasterizer::new(PopplerEngine::new()));
//! let params = validate_parameters(150, "jpg", Some(1), Some(3), 120)?;
//! let output = service
//!     .convert(pdf_bytes, params, Some("report.pdf"), Packaging::Archive)
//!     .await?;
//! assert_eq!(output.content_type, "application/zip");
//! ```

mod archive;
mod request;
mod service;
mod validate;

pub use archive::{archive_filename, build_archive};
pub use request::{
    ConversionParams, ImageFormat, DEFAULT_DPI, DEFAULT_TIMEOUT_SECS, MAX_DPI, MAX_TIMEOUT_SECS,
    MIN_DPI, MIN_TIMEOUT_SECS,
};
pub use service::{ConversionOutput, ConversionService, Packaging, ZIP_CONTENT_TYPE};
pub use validate::{validate_parameters, validate_upload, UploadGuard, PDF_SIGNATURE};
