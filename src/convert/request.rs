//! Conversion request types.
//!
//! A request is parsed once from the HTTP query string and is immutable after
//! that. The uploaded bytes travel next to it as a `Bytes` handle.

use std::fmt;
use std::str::FromStr;

use crate::error::ConvertError;

/// Default rendering resolution.
pub const DEFAULT_DPI: u32 = 200;

/// Minimum allowed rendering resolution.
pub const MIN_DPI: u32 = 72;

/// Maximum allowed rendering resolution.
pub const MAX_DPI: u32 = 600;

/// Default rasterization timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Minimum allowed rasterization timeout in seconds.
pub const MIN_TIMEOUT_SECS: u64 = 10;

/// Maximum allowed rasterization timeout in seconds.
pub const MAX_TIMEOUT_SECS: u64 = 1800;

// =============================================================================
// Image Format
// =============================================================================

/// Output image format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    Png,
    Jpeg,
}

impl ImageFormat {
    /// Canonical lowercase name (`png` or `jpeg`).
    pub const fn name(&self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpeg",
        }
    }

    /// MIME type used for single-image responses.
    pub const fn mime_type(&self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
        }
    }

    /// File extension written by the rendering engine.
    pub const fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpg",
        }
    }

    /// Whether a file extension (case-insensitive) belongs to this format.
    pub fn matches_extension(&self, ext: &str) -> bool {
        let ext = ext.to_ascii_lowercase();
        match self {
            ImageFormat::Png => ext == "png",
            ImageFormat::Jpeg => ext == "jpg" || ext == "jpeg",
        }
    }
}

impl FromStr for ImageFormat {
    type Err = ConvertError;

    /// Parse case-insensitively; `jpg` is an alias for `jpeg`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "png" => Ok(ImageFormat::Png),
            "jpeg" | "jpg" => Ok(ImageFormat::Jpeg),
            _ => Err(ConvertError::InvalidInput(format!(
                "Unsupported format: {}",
                normalized
            ))),
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Conversion Parameters
// =============================================================================

/// Validated parameters for a single conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConversionParams {
    /// Rendering resolution in dots per inch
    pub dpi: u32,

    /// Output image format
    pub format: ImageFormat,

    /// First page to render (1-based, inclusive)
    pub first_page: Option<u32>,

    /// Last page to render (1-based, inclusive)
    pub last_page: Option<u32>,

    /// Wall-clock limit for the rendering engine
    pub timeout_secs: u64,
}

impl ConversionParams {
    /// Parameters with every optional value at its default.
    pub fn new(format: ImageFormat) -> Self {
        Self {
            dpi: DEFAULT_DPI,
            format,
            first_page: None,
            last_page: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Narrow the request to its first page, for single-image responses.
    pub fn single_page(mut self) -> Self {
        let page = self.first_page.unwrap_or(1);
        self.first_page = Some(page);
        self.last_page = Some(page);
        self
    }
}
