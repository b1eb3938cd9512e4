//! Poppler-backed render engine.
//!
//! Uses `pdfinfo` to read the page count, then runs one converter process
//! (`pdftocairo` or `pdftoppm`) per contiguous chunk of the page range. All
//! children are spawned with `kill_on_drop`, so dropping the render future on
//! timeout terminates them.

use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::convert::ImageFormat;
use crate::error::ConvertError;

use super::{PageWindow, RenderEngine, RenderJob};

/// Diagnostic poppler prints for structural parse errors.
const SYNTAX_ERROR_MARKER: &str = "Syntax Error";

/// Page-count tool shipped with poppler.
const PDFINFO: &str = "pdfinfo";

// =============================================================================
// Converter
// =============================================================================

/// Which poppler converter renders the pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Converter {
    /// `pdftocairo` (cairo backend)
    #[default]
    Pdftocairo,

    /// `pdftoppm` (splash backend)
    Pdftoppm,
}

impl Converter {
    /// Executable name of the converter.
    pub const fn binary(&self) -> &'static str {
        match self {
            Converter::Pdftocairo => "pdftocairo",
            Converter::Pdftoppm => "pdftoppm",
        }
    }
}

// =============================================================================
// Poppler Engine
// =============================================================================

/// [`RenderEngine`] that shells out to the poppler command-line tools.
#[derive(Debug, Clone, Default)]
pub struct PopplerEngine {
    converter: Converter,
    poppler_path: Option<PathBuf>,
    strict: bool,
}

impl PopplerEngine {
    /// Create an engine using `pdftocairo` from `PATH`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Select the converter binary.
    pub fn with_converter(mut self, converter: Converter) -> Self {
        self.converter = converter;
        self
    }

    /// Look up poppler binaries in `dir` instead of `PATH`.
    pub fn with_poppler_path(mut self, dir: impl Into<PathBuf>) -> Self {
        self.poppler_path = Some(dir.into());
        self
    }

    /// Treat poppler "Syntax Error" diagnostics as fatal.
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    fn tool(&self, name: &str) -> PathBuf {
        match &self.poppler_path {
            Some(dir) => dir.join(name),
            None => PathBuf::from(name),
        }
    }

    fn command(&self, name: &str) -> Command {
        let mut command = Command::new(self.tool(name));
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }

    /// Read the document's page count with `pdfinfo`.
    pub async fn page_count(&self, input: &Path) -> Result<u32, ConvertError> {
        let output = self
            .command(PDFINFO)
            .arg(input)
            .output()
            .await
            .map_err(|e| spawn_error(PDFINFO, e))?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if self.strict && stderr.contains(SYNTAX_ERROR_MARKER) {
            return Err(ConvertError::syntax(stderr.as_ref()));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_page_count(&stdout).ok_or_else(|| {
            ConvertError::corrupt(format!("Unable to get page count. {}", stderr.trim()))
        })
    }

    fn converter_args(
        &self,
        input: &Path,
        job: &RenderJob,
        first: u32,
        last: u32,
        output_prefix: &Path,
    ) -> Vec<OsString> {
        vec![
            "-r".into(),
            job.dpi.to_string().into(),
            "-f".into(),
            first.to_string().into(),
            "-l".into(),
            last.to_string().into(),
            format_flag(job.format).into(),
            input.as_os_str().to_owned(),
            output_prefix.as_os_str().to_owned(),
        ]
    }

    fn check_converter_output(&self, output: Output) -> Result<(), ConvertError> {
        let binary = self.converter.binary();
        let stderr = String::from_utf8_lossy(&output.stderr);

        if self.strict && stderr.contains(SYNTAX_ERROR_MARKER) {
            return Err(ConvertError::syntax(stderr.as_ref()));
        }
        if !output.status.success() {
            return Err(ConvertError::internal(format!(
                "{} exited with {}: {}",
                binary,
                output.status,
                stderr.trim()
            )));
        }
        if !stderr.trim().is_empty() {
            debug!(tool = binary, "Converter diagnostics: {}", stderr.trim());
        }
        Ok(())
    }
}

#[async_trait]
impl RenderEngine for PopplerEngine {
    async fn render(
        &self,
        input: &Path,
        job: &RenderJob,
        output_dir: &Path,
    ) -> Result<PageWindow, ConvertError> {
        let page_count = self.page_count(input).await?;

        let window = match PageWindow::for_job(job, page_count) {
            Ok(window) => window,
            Err(err) => {
                debug!(
                    first_page = ?job.first_page,
                    last_page = ?job.last_page,
                    page_count,
                    "Requested page window selects no pages"
                );
                return Err(err);
            }
        };

        let chunks = split_page_range(window.first, window.last, job.worker_count);

        let output_prefix = output_dir.join(self.output_prefix());
        let binary = self.converter.binary();

        // Start every chunk before waiting on any of them so they run concurrently.
        let mut children = Vec::with_capacity(chunks.len());
        for (chunk_first, chunk_last) in chunks {
            let child = self
                .command(binary)
                .args(self.converter_args(input, job, chunk_first, chunk_last, &output_prefix))
                .stdout(Stdio::null())
                .spawn()
                .map_err(|e| spawn_error(binary, e))?;
            children.push(child);
        }

        for child in children {
            let output = child
                .wait_with_output()
                .await
                .map_err(|e| ConvertError::internal(format!("{}: {}", binary, e)))?;
            self.check_converter_output(output)?;
        }

        Ok(window)
    }

    async fn probe(&self) -> Result<String, ConvertError> {
        let mut versions = Vec::new();
        for tool in [PDFINFO, self.converter.binary()] {
            let output = self
                .command(tool)
                .arg("-v")
                .output()
                .await
                .map_err(|e| spawn_error(tool, e))?;

            // Poppler tools print their version banner on stderr.
            let banner = String::from_utf8_lossy(&output.stderr);
            let line = banner
                .lines()
                .chain(String::from_utf8_lossy(&output.stdout).lines())
                .find(|line| !line.trim().is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| tool.to_string());
            versions.push(line);
        }
        Ok(versions.join("; "))
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn spawn_error(tool: &str, err: std::io::Error) -> ConvertError {
    if err.kind() == ErrorKind::NotFound {
        warn!(tool, "Poppler tool not found");
        ConvertError::RenderEngineMissing {
            tool: tool.to_string(),
        }
    } else {
        ConvertError::internal(format!("failed to start {}: {}", tool, err))
    }
}

fn format_flag(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Png => "-png",
        ImageFormat::Jpeg => "-jpeg",
    }
}

/// Parse the `Pages:` line of `pdfinfo` output.
fn parse_page_count(stdout: &str) -> Option<u32> {
    stdout.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        if key.trim() == "Pages" {
            value.trim().parse().ok()
        } else {
            None
        }
    })
}

/// Split `[first, last]` into at most `workers` contiguous chunks.
///
/// Chunk sizes differ by at most one, with earlier chunks taking the
/// remainder. Returns an empty list when `first > last`.
pub fn split_page_range(first: u32, last: u32, workers: usize) -> Vec<(u32, u32)> {
    if first > last {
        return Vec::new();
    }

    let total = last - first + 1;
    let workers = (workers.max(1) as u32).min(total);
    let base = total / workers;
    let mut remainder = total % workers;

    let mut chunks = Vec::with_capacity(workers as usize);
    let mut start = first;
    for _ in 0..workers {
        let mut size = base;
        if remainder > 0 {
            size += 1;
            remainder -= 1;
        }
        chunks.push((start, start + size - 1));
        start += size;
    }
    chunks
}
