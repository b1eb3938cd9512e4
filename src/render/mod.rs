//! Rasterization layer.
//!
//! This module wraps the external PDF rendering toolkit behind a uniform
//! contract: PDF bytes in, ordered page image files out.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │           ConversionService             │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │              Rasterizer                 │
//! │  (scoped temp dir, timeout, ordering,   │
//! │   page-set integrity)                   │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │          RenderEngine Trait             │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │            PopplerEngine                │
//! │   (pdfinfo + pdftocairo / pdftoppm)     │
//! └─────────────────────────────────────────┘
//! ```
//!
//! Swapping the toolkit means providing another [`RenderEngine`]; the
//! rasterizer, archiver and HTTP layer are unaffected.

mod poppler;
mod rasterizer;

use std::path::Path;

use async_trait::async_trait;

use crate::convert::ImageFormat;
use crate::error::ConvertError;

pub use poppler::{split_page_range, Converter, PopplerEngine};
pub use rasterizer::{page_index_from_name, RasterizedPage, Rasterizer, RenderedPages};

/// Default number of engine workers per request.
pub const DEFAULT_WORKER_COUNT: usize = 2;

/// Upper bound on engine workers per request.
pub const MAX_WORKER_COUNT: usize = 8;

/// One invocation of the rendering engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderJob {
    /// Rendering resolution in dots per inch
    pub dpi: u32,

    /// Output image format
    pub format: ImageFormat,

    /// First page to render (defaults to 1)
    pub first_page: Option<u32>,

    /// Last page to render (defaults to the document's last page)
    pub last_page: Option<u32>,

    /// Number of parallel engine workers to use for this document
    pub worker_count: usize,
}

/// Inclusive page range an engine rendered.
///
/// The rasterizer requires exactly one output file for every page in the
/// window, so an engine that silently drops pages is caught.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    /// First rendered page (1-based)
    pub first: u32,

    /// Last rendered page (1-based, inclusive)
    pub last: u32,
}

impl PageWindow {
    /// Create a window, or `None` if it contains no pages.
    pub fn new(first: u32, last: u32) -> Option<Self> {
        (first >= 1 && first <= last).then_some(Self { first, last })
    }

    /// Resolve the pages `job` selects from a document of `page_count` pages.
    ///
    /// `first` defaults to 1 and `last` to `page_count`; `last` is clamped
    /// to `page_count`. Returns `NoPagesProduced` when nothing is left.
    pub fn for_job(job: &RenderJob, page_count: u32) -> Result<Self, ConvertError> {
        let first = job.first_page.unwrap_or(1);
        let last = job
            .last_page
            .map_or(page_count, |last| last.min(page_count));
        Self::new(first, last).ok_or(ConvertError::NoPagesProduced)
    }
}

/// External rendering capability.
///
/// Implementations render `input` into `output_dir`, one file per page,
/// named `{output_prefix}-{page}.{ext}` where `page` is the decimal page
/// number (zero padding allowed). Failures must be reported with the
/// distinct [`ConvertError`] kinds: `RenderEngineMissing`,
/// `CorruptDocument`, `SyntaxError`, or `Internal` for anything else.
///
/// Implementations must be cancel-safe: dropping the returned future must
/// stop any child processes it started.
#[async_trait]
pub trait RenderEngine: Send + Sync + 'static {
    /// Render the pages selected by `job` from `input` into `output_dir`.
    ///
    /// Returns the window actually rendered (the requested range clamped to
    /// the document), or `NoPagesProduced` if that window is empty.
    async fn render(
        &self,
        input: &Path,
        job: &RenderJob,
        output_dir: &Path,
    ) -> Result<PageWindow, ConvertError>;

    /// Filename prefix of the page files this engine writes.
    fn output_prefix(&self) -> &str {
        "page"
    }

    /// Check that the engine is usable on this host.
    async fn probe(&self) -> Result<String, ConvertError>;
}
