//! Conversion service orchestrating rasterization and packaging.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                    ConversionService                       │
//! │  ┌──────────────────────────────────────────────────────┐  │
//! │  │                     convert()                        │  │
//! │  │  1. rasterize(): render pages into a scoped temp dir │  │
//! │  │  2. package():   zip or pass through, drop temp dir  │  │
//! │  └──────────────────────────────────────────────────────┘  │
//! │              │                           │                 │
//! │              ▼                           ▼                 │
//! │      ┌──────────────┐           ┌─────────────────┐        │
//! │      │  Rasterizer  │           │  build_archive  │        │
//! │      └──────────────┘           └─────────────────┘        │
//! └────────────────────────────────────────────────────────────┘
//! ```

use bytes::Bytes;
use tracing::debug;

use crate::error::ConvertError;
use crate::render::{Rasterizer, RenderEngine, RenderedPages};

use super::archive::{archive_filename, build_archive};
use super::request::{ConversionParams, ImageFormat};

/// MIME type of multi-page responses.
pub const ZIP_CONTENT_TYPE: &str = "application/zip";

/// How the rendered pages are delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Packaging {
    /// All requested pages in one zip archive
    Archive,

    /// Only the first requested page, as a raw image
    SingleImage,
}

/// Finished conversion ready to be sent to the client.
#[derive(Debug, Clone)]
pub struct ConversionOutput {
    /// Response body (zip archive or encoded image)
    pub body: Bytes,

    /// MIME type of `body`
    pub content_type: &'static str,

    /// Suggested download filename
    pub filename: String,

    /// Number of pages contained in `body`
    pub page_count: usize,
}

/// Service turning uploaded PDFs into packaged page images.
pub struct ConversionService<E: RenderEngine> {
    rasterizer: Rasterizer<E>,
}

impl<E: RenderEngine> ConversionService<E> {
    /// Create a new service around the given rasterizer.
    pub fn new(rasterizer: Rasterizer<E>) -> Self {
        Self { rasterizer }
    }

    /// Get a reference to the rasterizer.
    pub fn rasterizer(&self) -> &Rasterizer<E> {
        &self.rasterizer
    }

    /// Rasterize `pdf` and package the result.
    ///
    /// `upload_name` is only used to derive the suggested filename. The
    /// temporary directory holding the page files is gone by the time this
    /// returns, on success and on error.
    pub async fn convert(
        &self,
        pdf: Bytes,
        params: ConversionParams,
        upload_name: Option<&str>,
        packaging: Packaging,
    ) -> Result<ConversionOutput, ConvertError> {
        let rendered = self.rasterize(&pdf, &params, packaging).await?;
        self.package(rendered, params.format, upload_name, packaging)
            .await
    }

    /// Render the pages needed for `packaging`.
    ///
    /// A single-image request only renders its first page.
    pub async fn rasterize(
        &self,
        pdf: &Bytes,
        params: &ConversionParams,
        packaging: Packaging,
    ) -> Result<RenderedPages, ConvertError> {
        let params = match packaging {
            Packaging::Archive => *params,
            Packaging::SingleImage => params.single_page(),
        };
        self.rasterizer.rasterize(pdf, &params).await
    }

    /// Turn rendered pages into the response payload, consuming the temp dir.
    pub async fn package(
        &self,
        rendered: RenderedPages,
        format: ImageFormat,
        upload_name: Option<&str>,
        packaging: Packaging,
    ) -> Result<ConversionOutput, ConvertError> {
        match packaging {
            Packaging::Archive => {
                let page_count = rendered.len();
                debug!(pages = page_count, "Archiving rendered pages");
                let body = archive_off_thread(rendered).await?;

                Ok(ConversionOutput {
                    body: Bytes::from(body),
                    content_type: ZIP_CONTENT_TYPE,
                    filename: archive_filename(upload_name, "zip"),
                    page_count,
                })
            }
            Packaging::SingleImage => {
                let page = rendered.first().ok_or(ConvertError::NoPagesProduced)?;
                let body = page.read().await?;
                drop(rendered);

                Ok(ConversionOutput {
                    body,
                    content_type: format.mime_type(),
                    filename: archive_filename(upload_name, format.extension()),
                    page_count: 1,
                })
            }
        }
    }
}

impl<E: RenderEngine> Clone for ConversionService<E> {
    fn clone(&self) -> Self {
        Self {
            rasterizer: self.rasterizer.clone(),
        }
    }
}

/// Build the zip on the blocking pool; the temp dir is dropped there too.
async fn archive_off_thread(rendered: RenderedPages) -> Result<Vec<u8>, ConvertError> {
    tokio::task::spawn_blocking(move || {
        let result = build_archive(rendered.pages());
        drop(rendered);
        result
    })
    .await
    .map_err(|e| ConvertError::internal(format!("archive task failed: {}", e)))?
}
