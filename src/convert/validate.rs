//! Upload and parameter validation.
//!
//! The upload is identified by its leading bytes only. Declared filenames and
//! content types are never consulted.

use bytes::{Bytes, BytesMut};

use crate::error::ConvertError;

use super::request::{
    ConversionParams, ImageFormat, MAX_DPI, MAX_TIMEOUT_SECS, MIN_DPI, MIN_TIMEOUT_SECS,
};

/// Leading signature every PDF file starts with.
pub const PDF_SIGNATURE: &[u8; 5] = b"%PDF-";

const NOT_A_PDF: &str = "The file does not appear to be a valid PDF.";

/// Check that `bytes` look like a PDF and fit within `max_size_bytes`.
///
/// The signature is checked before the size.
pub fn validate_upload(
    bytes: &[u8],
    declared_filename: Option<&str>,
    max_size_bytes: u64,
) -> Result<(), ConvertError> {
    if !has_pdf_signature(bytes) {
        tracing::debug!(
            filename = declared_filename.unwrap_or("<none>"),
            len = bytes.len(),
            "Upload rejected: missing PDF signature"
        );
        return Err(ConvertError::InvalidInput(NOT_A_PDF.to_string()));
    }

    if bytes.len() as u64 > max_size_bytes {
        return Err(ConvertError::too_large(max_size_bytes));
    }

    Ok(())
}

/// Validate and normalize query parameters into [`ConversionParams`].
pub fn validate_parameters(
    dpi: u32,
    format: &str,
    first_page: Option<u32>,
    last_page: Option<u32>,
    timeout_secs: u64,
) -> Result<ConversionParams, ConvertError> {
    let format: ImageFormat = format.parse()?;

    if !(MIN_DPI..=MAX_DPI).contains(&dpi) {
        return Err(ConvertError::InvalidInput(format!(
            "dpi must be between {} and {}, got {}",
            MIN_DPI, MAX_DPI, dpi
        )));
    }

    if !(MIN_TIMEOUT_SECS..=MAX_TIMEOUT_SECS).contains(&timeout_secs) {
        return Err(ConvertError::InvalidInput(format!(
            "timeout must be between {} and {} seconds, got {}",
            MIN_TIMEOUT_SECS, MAX_TIMEOUT_SECS, timeout_secs
        )));
    }

    if first_page == Some(0) {
        return Err(ConvertError::InvalidInput(
            "first_page must be at least 1".to_string(),
        ));
    }
    if last_page == Some(0) {
        return Err(ConvertError::InvalidInput(
            "last_page must be at least 1".to_string(),
        ));
    }

    if let (Some(first), Some(last)) = (first_page, last_page) {
        if first > last {
            return Err(ConvertError::InvalidInput(format!(
                "first_page ({}) must not be greater than last_page ({})",
                first, last
            )));
        }
    }

    Ok(ConversionParams {
        dpi,
        format,
        first_page,
        last_page,
        timeout_secs,
    })
}

fn has_pdf_signature(bytes: &[u8]) -> bool {
    bytes.len() >= PDF_SIGNATURE.len() && &bytes[..PDF_SIGNATURE.len()] == PDF_SIGNATURE
}

// =============================================================================
// Streaming Upload Guard
// =============================================================================

/// Incremental validator for uploads that arrive in chunks.
///
/// Rejects a non-PDF as soon as the first five bytes are known, and an
/// oversized upload as soon as the running total crosses the ceiling, so the
/// remainder of the body is never buffered.
#[derive(Debug)]
pub struct UploadGuard {
    buffer: BytesMut,
    max_size_bytes: u64,
    signature_checked: bool,
}

impl UploadGuard {
    /// Create a guard enforcing the given size ceiling.
    pub fn new(max_size_bytes: u64) -> Self {
        Self {
            buffer: BytesMut::new(),
            max_size_bytes,
            signature_checked: false,
        }
    }

    /// Number of bytes accepted so far.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Whether no bytes have been accepted yet.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Accept the next chunk of the upload.
    pub fn push(&mut self, chunk: &[u8]) -> Result<(), ConvertError> {
        if (self.buffer.len() + chunk.len()) as u64 > self.max_size_bytes {
            // An oversized body that is not a PDF is still reported as not a PDF.
            if !self.signature_checked {
                let mut head = self.buffer.to_vec();
                head.extend_from_slice(&chunk[..chunk.len().min(PDF_SIGNATURE.len())]);
                if head.len() >= PDF_SIGNATURE.len() && !has_pdf_signature(&head) {
                    return Err(ConvertError::InvalidInput(NOT_A_PDF.to_string()));
                }
            }
            return Err(ConvertError::too_large(self.max_size_bytes));
        }

        self.buffer.extend_from_slice(chunk);

        if !self.signature_checked && self.buffer.len() >= PDF_SIGNATURE.len() {
            if !has_pdf_signature(&self.buffer) {
                return Err(ConvertError::InvalidInput(NOT_A_PDF.to_string()));
            }
            self.signature_checked = true;
        }

        Ok(())
    }

    /// Finish the upload and return its bytes.
    pub fn finish(self, declared_filename: Option<&str>) -> Result<Bytes, ConvertError> {
        let bytes = self.buffer.freeze();
        validate_upload(&bytes, declared_filename, self.max_size_bytes)?;
        Ok(bytes)
    }
}
