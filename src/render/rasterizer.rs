//! Rasterizer adapter around a [`RenderEngine`].
//!
//! Every call gets its own temporary directory. The directory is owned by the
//! returned [`RenderedPages`] (or dropped on the error path), so the input
//! copy and every page file are removed on success, failure, timeout and task
//! cancellation alike.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tempfile::TempDir;
use tracing::{debug, warn};

use crate::convert::{ConversionParams, ImageFormat};
use crate::error::ConvertError;

use super::{PageWindow, RenderEngine, RenderJob, DEFAULT_WORKER_COUNT, MAX_WORKER_COUNT};

/// Prefix of the per-request temporary directory.
const TEMP_DIR_PREFIX: &str = "pdf2img-";

/// Name of the PDF copy handed to the engine.
const INPUT_FILE_NAME: &str = "input.pdf";

/// Subdirectory the engine writes pages into.
const OUTPUT_DIR_NAME: &str = "pages";

/// Attempts made to remove a scratch directory after a failed render.
const CLEANUP_ATTEMPTS: u32 = 5;

/// Pause between scratch directory removal attempts.
const CLEANUP_RETRY_DELAY: Duration = Duration::from_millis(100);

// =============================================================================
// Rasterized Pages
// =============================================================================

/// One rendered page image on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterizedPage {
    /// 1-based page number in the source document
    pub index: u32,

    /// Location of the encoded image inside the scoped temp directory
    pub path: PathBuf,

    /// Image format of the file
    pub format: ImageFormat,
}

impl RasterizedPage {
    /// Base name of the page file, without any directory component.
    pub fn file_name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
    }

    /// Read the encoded image bytes.
    pub async fn read(&self) -> Result<Bytes, ConvertError> {
        let data = tokio::fs::read(&self.path).await?;
        Ok(Bytes::from(data))
    }
}

/// Ordered page images together with the temp directory that holds them.
///
/// Dropping this value deletes the directory and all of its contents.
#[derive(Debug)]
pub struct RenderedPages {
    pages: Vec<RasterizedPage>,
    dir: TempDir,
}

impl RenderedPages {
    /// Pages in strictly increasing index order.
    pub fn pages(&self) -> &[RasterizedPage] {
        &self.pages
    }

    /// Number of rendered pages (always at least one).
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    /// Whether no pages were rendered.
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// The lowest-numbered page.
    pub fn first(&self) -> Option<&RasterizedPage> {
        self.pages.first()
    }

    /// The scoped temp directory backing these pages.
    pub fn directory(&self) -> &Path {
        self.dir.path()
    }

    /// Remove the temp directory now, reporting any failure.
    pub fn close(self) -> std::io::Result<()> {
        self.dir.close()
    }
}

// =============================================================================
// Rasterizer
// =============================================================================

/// Uniform call contract over a rendering engine.
pub struct Rasterizer<E: RenderEngine> {
    engine: Arc<E>,
    worker_count: usize,
    temp_root: Option<PathBuf>,
}

impl<E: RenderEngine> Rasterizer<E> {
    /// Create a rasterizer with the default worker count and system temp dir.
    pub fn new(engine: E) -> Self {
        Self {
            engine: Arc::new(engine),
            worker_count: DEFAULT_WORKER_COUNT,
            temp_root: None,
        }
    }

    /// Set the number of engine workers per request (clamped to 1..=8).
    pub fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count.clamp(1, MAX_WORKER_COUNT);
        self
    }

    /// Create per-request directories under `root` instead of the system temp dir.
    pub fn with_temp_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.temp_root = Some(root.into());
        self
    }

    /// Get a reference to the underlying engine.
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Configured worker count.
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Render the pages selected by `params` from `pdf`.
    ///
    /// # Errors
    ///
    /// - `Timeout` if the engine does not finish within `params.timeout_secs`
    /// - `NoPagesProduced` if the engine succeeds without writing pages
    /// - `Internal` if the produced pages do not cover the rendered window exactly
    /// - any error kind reported by the engine itself
    pub async fn rasterize(
        &self,
        pdf: &Bytes,
        params: &ConversionParams,
    ) -> Result<RenderedPages, ConvertError> {
        let dir = self.create_temp_dir()?;
        let input = dir.path().join(INPUT_FILE_NAME);
        let output_dir = dir.path().join(OUTPUT_DIR_NAME);

        tokio::fs::write(&input, pdf).await?;
        tokio::fs::create_dir(&output_dir).await?;

        let job = RenderJob {
            dpi: params.dpi,
            format: params.format,
            first_page: params.first_page,
            last_page: params.last_page,
            worker_count: self.worker_count,
        };

        debug!(
            dir = %dir.path().display(),
            dpi = job.dpi,
            format = %job.format,
            first_page = ?job.first_page,
            last_page = ?job.last_page,
            workers = job.worker_count,
            "Invoking render engine"
        );

        let limit = Duration::from_secs(params.timeout_secs);
        let window =
            match tokio::time::timeout(limit, self.engine.render(&input, &job, &output_dir)).await
            {
                Ok(Ok(window)) => window,
                Ok(Err(err)) => {
                    discard_scratch(dir).await;
                    return Err(err);
                }
                Err(_) => {
                    warn!(
                        timeout_secs = params.timeout_secs,
                        "Render engine exceeded its time limit"
                    );
                    discard_scratch(dir).await;
                    return Err(ConvertError::Timeout {
                        seconds: params.timeout_secs,
                    });
                }
            };
        check_window(&window, params)?;

        let pages = collect_pages(&output_dir, self.engine.output_prefix(), params.format).await?;
        verify_page_sequence(&pages, &window)?;

        debug!(pages = pages.len(), "Render engine finished");

        Ok(RenderedPages { pages, dir })
    }

    fn create_temp_dir(&self) -> Result<TempDir, ConvertError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(TEMP_DIR_PREFIX);
        let dir = match &self.temp_root {
            Some(root) => builder.tempdir_in(root)?,
            None => builder.tempdir()?,
        };
        Ok(dir)
    }
}

impl<E: RenderEngine> Clone for Rasterizer<E> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            worker_count: self.worker_count,
            temp_root: self.temp_root.clone(),
        }
    }
}

// =============================================================================
// Output Discovery
// =============================================================================

/// Extract the page number from an engine output name like `page-007.png`.
///
/// Returns `None` if the name does not start with `{prefix}-` or the part
/// after it is not a decimal number.
pub fn page_index_from_name(name: &str, prefix: &str) -> Option<u32> {
    let (stem, _ext) = name.rsplit_once('.')?;
    let digits = stem.strip_prefix(prefix)?.strip_prefix('-')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// List the page files in `output_dir`, sorted by numeric page index.
async fn collect_pages(
    output_dir: &Path,
    prefix: &str,
    format: ImageFormat,
) -> Result<Vec<RasterizedPage>, ConvertError> {
    let mut pages = Vec::new();
    let mut entries = tokio::fs::read_dir(output_dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }

        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };

        let has_format_extension = name
            .rsplit_once('.')
            .map(|(_, ext)| format.matches_extension(ext))
            .unwrap_or(false);
        if !has_format_extension || !name.starts_with(prefix) {
            continue;
        }

        let index = page_index_from_name(name, prefix).ok_or_else(|| {
            ConvertError::internal(format!("cannot determine page number of '{}'", name))
        })?;

        pages.push(RasterizedPage {
            index,
            path: entry.path(),
            format,
        });
    }

    pages.sort_by_key(|page| page.index);
    Ok(pages)
}

/// Check that the engine reports the window that was asked for.
fn check_window(window: &PageWindow, params: &ConversionParams) -> Result<(), ConvertError> {
    let requested_first = params.first_page.unwrap_or(1);
    let beyond_last = params.last_page.is_some_and(|last| window.last > last);
    if window.first != requested_first || beyond_last {
        return Err(ConvertError::internal(format!(
            "engine rendered pages {}-{} for a request starting at page {}",
            window.first, window.last, requested_first
        )));
    }
    Ok(())
}

/// Check that `pages` hold exactly one file for every page of `window`.
fn verify_page_sequence(pages: &[RasterizedPage], window: &PageWindow) -> Result<(), ConvertError> {
    if pages.is_empty() {
        return Err(ConvertError::NoPagesProduced);
    }

    let mut expected = window.first;
    let mut previous = None;
    for page in pages {
        if page.index < window.first || page.index > window.last {
            return Err(ConvertError::internal(format!(
                "engine produced page {} outside pages {}-{}",
                page.index, window.first, window.last
            )));
        }
        if previous == Some(page.index) {
            return Err(ConvertError::internal(format!(
                "engine produced page {} more than once",
                page.index
            )));
        }
        if page.index != expected {
            return Err(ConvertError::internal(format!(
                "engine skipped page {}",
                expected
            )));
        }
        previous = Some(page.index);
        expected += 1;
    }

    if expected <= window.last {
        return Err(ConvertError::internal(format!(
            "engine skipped page {}",
            expected
        )));
    }

    Ok(())
}

// =============================================================================
// Cleanup
// =============================================================================

/// Remove a scratch directory after a failed or abandoned render.
///
/// Engine processes killed on timeout may still be exiting, so removal is
/// retried briefly and a final failure is logged.
async fn discard_scratch(dir: TempDir) {
    let path = dir.path().to_path_buf();

    for attempt in 1..=CLEANUP_ATTEMPTS {
        match tokio::fs::remove_dir_all(&path).await {
            Ok(()) => return,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return,
            Err(e) if attempt == CLEANUP_ATTEMPTS => {
                warn!(
                    dir = %path.display(),
                    attempts = attempt,
                    error = %e,
                    "Failed to remove scratch directory"
                );
            }
            Err(_) => tokio::time::sleep(CLEANUP_RETRY_DELAY).await,
        }
    }

    drop(dir);
}
