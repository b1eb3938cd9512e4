//! HTTP request handlers for the PDF rasterization API.
//!
//! This module contains the Axum handlers for conversions and health checks.
//!
//! # Endpoints
//!
//! - `POST /api/v1/convert/pdf/img` - Convert all requested pages into a zip
//! - `POST /api/v1/convert/pdf/img/single` - Convert the first requested page into an image
//! - `GET /health` - Health check endpoint

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{
        multipart::{MultipartError, MultipartRejection},
        rejection::QueryRejection,
        Multipart, Query, State,
    },
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::convert::{
    validate_parameters, ConversionOutput, ConversionService, Packaging, UploadGuard,
    DEFAULT_DPI, DEFAULT_TIMEOUT_SECS,
};
use crate::error::ConvertError;
use crate::render::RenderEngine;

/// Multipart field carrying the PDF.
pub const UPLOAD_FIELD: &str = "file";

// =============================================================================
// Application State
// =============================================================================

/// Shared application state containing the conversion service.
///
/// This is passed to all handlers via Axum's State extractor. Nothing in it
/// changes after startup.
pub struct AppState<E: RenderEngine> {
    /// The conversion service for processing uploads
    pub service: Arc<ConversionService<E>>,

    /// Maximum accepted upload size in bytes
    pub max_upload_bytes: u64,
}

impl<E: RenderEngine> AppState<E> {
    /// Create a new application state.
    pub fn new(service: ConversionService<E>, max_upload_bytes: u64) -> Self {
        Self {
            service: Arc::new(service),
            max_upload_bytes,
        }
    }
}

impl<E: RenderEngine> Clone for AppState<E> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            max_upload_bytes: self.max_upload_bytes,
        }
    }
}

// =============================================================================
// Request Parameters
// =============================================================================

/// Query parameters for conversion requests.
#[derive(Debug, Deserialize)]
pub struct ConvertQueryParams {
    /// Rendering resolution (72-600, defaults to 200)
    #[serde(default = "default_dpi")]
    pub dpi: u32,

    /// Output format: png, jpeg or jpg (defaults to png)
    #[serde(default = "default_format")]
    pub format: String,

    /// First page to render (1-based)
    #[serde(default)]
    pub first_page: Option<u32>,

    /// Last page to render (1-based, inclusive)
    #[serde(default)]
    pub last_page: Option<u32>,

    /// Rendering timeout in seconds (10-1800, defaults to 300)
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

fn default_dpi() -> u32 {
    DEFAULT_DPI
}

fn default_format() -> String {
    "png".to_string()
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

// =============================================================================
// Response Types
// =============================================================================

/// JSON error response returned for all error conditions.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Human-readable error message
    pub detail: String,

    /// Error type identifier (e.g., "invalid_input", "timeout")
    pub error: String,
}

impl ErrorResponse {
    /// Create a new error response.
    pub fn new(detail: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
            error: error.into(),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service version
    pub version: String,
}

// =============================================================================
// Error Mapping
// =============================================================================

/// HTTP status code for each error kind.
pub fn status_for(err: &ConvertError) -> StatusCode {
    match err {
        ConvertError::InvalidInput(_)
        | ConvertError::CorruptDocument(_)
        | ConvertError::SyntaxError(_) => StatusCode::BAD_REQUEST,
        ConvertError::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        ConvertError::NoPagesProduced => StatusCode::UNPROCESSABLE_ENTITY,
        ConvertError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        ConvertError::RenderEngineMissing { .. } | ConvertError::Internal(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Convert ConvertError to HTTP response.
///
/// This implementation logs errors appropriately based on their severity:
/// - 4xx errors are logged at WARN level (client errors)
/// - 5xx errors are logged at ERROR level (server errors)
impl IntoResponse for ConvertError {
    fn into_response(self) -> Response {
        let status = status_for(&self);
        let error_type = self.kind();
        let message = self.to_string();

        if status.is_server_error() {
            match &self {
                ConvertError::RenderEngineMissing { tool } => error!(
                    error_type = error_type,
                    status = status.as_u16(),
                    tool = %tool,
                    "Server error: {}",
                    message
                ),
                _ => error!(
                    error_type = error_type,
                    status = status.as_u16(),
                    "Server error: {}",
                    message
                ),
            }
        } else {
            warn!(
                error_type = error_type,
                status = status.as_u16(),
                "Client error: {}",
                message
            );
        }

        (status, Json(ErrorResponse::new(message, error_type))).into_response()
    }
}

fn multipart_error(err: MultipartError, max_upload_bytes: u64) -> ConvertError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ConvertError::too_large(max_upload_bytes)
    } else {
        ConvertError::InvalidInput(format!("Invalid multipart upload: {}", err.body_text()))
    }
}

// =============================================================================
// Request Lifecycle
// =============================================================================

/// Stages a conversion request moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStage {
    Received,
    Validating,
    Rasterizing,
    Archiving,
    Streaming,
    Done,
}

/// Tracks and logs the current stage of one request.
#[derive(Debug)]
struct RequestProgress {
    stage: RequestStage,
    packaging: Packaging,
    started: Instant,
}

impl RequestProgress {
    fn new(packaging: Packaging) -> Self {
        debug!(?packaging, "Conversion request received");
        Self {
            stage: RequestStage::Received,
            packaging,
            started: Instant::now(),
        }
    }

    fn advance(&mut self, next: RequestStage) {
        debug!(
            from = ?self.stage,
            to = ?next,
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            "Conversion stage"
        );
        self.stage = next;
    }

    fn fail(&self, err: &ConvertError) {
        debug!(
            stage = ?self.stage,
            error_type = err.kind(),
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            "Conversion failed"
        );
    }

    fn finish(&mut self, output: &ConversionOutput) {
        self.advance(RequestStage::Done);
        info!(
            packaging = ?self.packaging,
            pages = output.page_count,
            bytes = output.body.len(),
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            "Conversion completed"
        );
    }
}

/// Read the `file` field, validating signature and size while streaming.
async fn read_upload(
    multipart: &mut Multipart,
    max_upload_bytes: u64,
) -> Result<(Bytes, Option<String>), ConvertError> {
    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, max_upload_bytes))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let filename = field.file_name().map(str::to_string);
        let mut guard = UploadGuard::new(max_upload_bytes);
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| multipart_error(e, max_upload_bytes))?
        {
            guard.push(&chunk)?;
        }

        let bytes = guard.finish(filename.as_deref())?;
        return Ok((bytes, filename));
    }

    Err(ConvertError::InvalidInput(format!(
        "No file uploaded in field '{}'.",
        UPLOAD_FIELD
    )))
}

/// Build a `Content-Disposition` value for `filename`.
///
/// Non-ASCII names get an ASCII fallback plus an RFC 5987 `filename*`.
pub fn content_disposition(filename: &str) -> String {
    if filename.is_ascii() {
        return format!("attachment; filename=\"{}\"", filename);
    }

    let fallback: String = filename
        .chars()
        .map(|c| if c.is_ascii() { c } else { '_' })
        .collect();
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        urlencoding::encode(filename)
    )
}

async fn run_conversion<E: RenderEngine>(
    state: &AppState<E>,
    query: Result<Query<ConvertQueryParams>, QueryRejection>,
    multipart: Result<Multipart, MultipartRejection>,
    packaging: Packaging,
    progress: &mut RequestProgress,
) -> Result<Response, ConvertError> {
    progress.advance(RequestStage::Validating);

    let Query(query) =
        query.map_err(|e| ConvertError::InvalidInput(format!("Invalid query: {}", e.body_text())))?;
    let params = validate_parameters(
        query.dpi,
        &query.format,
        query.first_page,
        query.last_page,
        query.timeout,
    )?;

    let mut multipart = multipart
        .map_err(|e| ConvertError::InvalidInput(format!("Invalid upload: {}", e.body_text())))?;
    let (pdf, filename) = read_upload(&mut multipart, state.max_upload_bytes).await?;

    progress.advance(RequestStage::Rasterizing);
    let rendered = state.service.rasterize(&pdf, &params, packaging).await?;
    drop(pdf);

    progress.advance(RequestStage::Archiving);
    let output = state
        .service
        .package(rendered, params.format, filename.as_deref(), packaging)
        .await?;

    progress.advance(RequestStage::Streaming);
    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, output.content_type)
        .header(
            header::CONTENT_DISPOSITION,
            content_disposition(&output.filename),
        )
        .header("X-Page-Count", output.page_count.to_string())
        .body(Body::from(output.body.clone()))
        .map_err(|e| ConvertError::internal(format!("response: {}", e)))?;

    progress.finish(&output);
    Ok(response)
}

// =============================================================================
// Handlers
// =============================================================================

/// Handle multi-page conversion requests.
///
/// # Endpoint
///
/// `POST /api/v1/convert/pdf/img` (alias `POST /convert`)
///
/// # Request
///
/// `multipart/form-data` with the PDF in the `file` field.
///
/// # Query Parameters
///
/// - `dpi`: 72-600 (default: 200)
/// - `format`: png | jpeg | jpg (default: png)
/// - `first_page`, `last_page`: optional 1-based inclusive page window
/// - `timeout`: 10-1800 seconds (default: 300)
///
/// # Response
///
/// - `200 OK`: zip archive, one entry per page, `Content-Type: application/zip`
/// - `400 Bad Request`: not a PDF, bad parameters, corrupt or malformed document
/// - `413 Payload Too Large`: upload exceeds the size ceiling
/// - `422 Unprocessable Entity`: no pages in the requested window
/// - `500 Internal Server Error`: poppler missing or conversion failure
/// - `504 Gateway Timeout`: rendering exceeded `timeout`
pub async fn convert_handler<E: RenderEngine>(
    State(state): State<AppState<E>>,
    query: Result<Query<ConvertQueryParams>, QueryRejection>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ConvertError> {
    handle(state, query, multipart, Packaging::Archive).await
}

/// Handle single-image conversion requests.
///
/// # Endpoint
///
/// `POST /api/v1/convert/pdf/img/single` (alias `POST /convert/single`)
///
/// Takes the same parameters as [`convert_handler`] but renders only
/// `first_page` (default 1) and responds with the raw image
/// (`Content-Type: image/png` or `image/jpeg`).
pub async fn convert_single_handler<E: RenderEngine>(
    State(state): State<AppState<E>>,
    query: Result<Query<ConvertQueryParams>, QueryRejection>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ConvertError> {
    handle(state, query, multipart, Packaging::SingleImage).await
}

async fn handle<E: RenderEngine>(
    state: AppState<E>,
    query: Result<Query<ConvertQueryParams>, QueryRejection>,
    multipart: Result<Multipart, MultipartRejection>,
    packaging: Packaging,
) -> Result<Response, ConvertError> {
    let mut progress = RequestProgress::new(packaging);
    let result = run_conversion(&state, query, multipart, packaging, &mut progress).await;
    if let Err(ref err) = result {
        progress.fail(err);
    }
    result
}

/// Handle health check requests.
///
/// # Endpoint
///
/// `GET /health` (alias `GET /api/v1/health`)
///
/// # Response
///
/// `200 OK` with JSON body:
/// ```json
/// {
///   "status": "ok",
///   "version": "0.1.0"
/// }
/// ```
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// =============================================================================
// Tests
// =============================================================================
