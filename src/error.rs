use thiserror::Error;

/// Maximum number of characters of engine-provided text surfaced to clients.
pub const MAX_DETAIL_CHARS: usize = 200;

/// Errors that can occur while converting a PDF into page images.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConvertError {
    /// Upload or query parameters are invalid (should map to HTTP 400)
    #[error("{0}")]
    InvalidInput(String),

    /// Upload exceeds the configured size ceiling (should map to HTTP 413)
    #[error("PDF exceeds {}.", size_label(*limit_bytes))]
    TooLarge { limit_bytes: u64 },

    /// The native rendering toolkit is not installed or not reachable
    #[error("Poppler is not installed on the server.")]
    RenderEngineMissing { tool: String },

    /// The engine could not determine the page count or read the structure
    #[error("Corrupt or unreadable PDF: {0}")]
    CorruptDocument(String),

    /// The engine reported a syntax-level parse error
    #[error("PDF syntax error: {0}")]
    SyntaxError(String),

    /// The engine finished without writing a single page
    #[error("No images were generated.")]
    NoPagesProduced,

    /// The engine did not finish within the allotted time
    #[error("Conversion timed out after {seconds} seconds.")]
    Timeout { seconds: u64 },

    /// Any failure that does not fit the kinds above
    #[error("Conversion failed: {0}")]
    Internal(String),
}

impl ConvertError {
    /// Build a size-ceiling error for an upload limit of `limit_bytes`.
    pub fn too_large(limit_bytes: u64) -> Self {
        ConvertError::TooLarge { limit_bytes }
    }

    /// Build a corrupt-document error, truncating the engine's diagnostic.
    pub fn corrupt(detail: impl AsRef<str>) -> Self {
        ConvertError::CorruptDocument(truncate_detail(detail.as_ref()))
    }

    /// Build a syntax error, truncating the engine's diagnostic.
    pub fn syntax(detail: impl AsRef<str>) -> Self {
        ConvertError::SyntaxError(truncate_detail(detail.as_ref()))
    }

    /// Build an internal error, truncating the underlying message.
    pub fn internal(detail: impl AsRef<str>) -> Self {
        ConvertError::Internal(truncate_detail(detail.as_ref()))
    }

    /// Stable snake_case identifier for the error kind.
    pub const fn kind(&self) -> &'static str {
        match self {
            ConvertError::InvalidInput(_) => "invalid_input",
            ConvertError::TooLarge { .. } => "too_large",
            ConvertError::RenderEngineMissing { .. } => "render_engine_missing",
            ConvertError::CorruptDocument(_) => "corrupt_document",
            ConvertError::SyntaxError(_) => "syntax_error",
            ConvertError::NoPagesProduced => "no_pages_produced",
            ConvertError::Timeout { .. } => "timeout",
            ConvertError::Internal(_) => "internal",
        }
    }
}

impl From<std::io::Error> for ConvertError {
    fn from(err: std::io::Error) -> Self {
        ConvertError::internal(err.to_string())
    }
}

impl From<zip::result::ZipError> for ConvertError {
    fn from(err: zip::result::ZipError) -> Self {
        ConvertError::internal(format!("archive: {}", err))
    }
}

const MIB: u64 = 1024 * 1024;

/// Render a byte ceiling as whole megabytes when it is one, or as bytes.
fn size_label(bytes: u64) -> String {
    if bytes >= MIB && bytes % MIB == 0 {
        format!("{} MB", bytes / MIB)
    } else {
        format!("{} bytes", bytes)
    }
}

/// Trim surrounding whitespace and cap the text at [`MAX_DETAIL_CHARS`] characters.
pub fn truncate_detail(detail: &str) -> String {
    let detail = detail.trim();
    match detail.char_indices().nth(MAX_DETAIL_CHARS) {
        Some((cut, _)) => detail[..cut].to_string(),
        None => detail.to_string(),
    }
}
