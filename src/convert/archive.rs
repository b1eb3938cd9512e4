//! Zip packaging of rendered pages.

use std::fs::File;
use std::io::{Cursor, Write};

use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::ConvertError;
use crate::render::RasterizedPage;

/// Base name used when the upload carries no usable filename.
const FALLBACK_BASE_NAME: &str = "output";

/// Package pages into an in-memory zip, one deflated entry per page.
///
/// Entries appear in the order given. Page files are streamed from disk
/// into the archive.
pub fn build_archive(pages: &[RasterizedPage]) -> Result<Vec<u8>, ConvertError> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    for page in pages {
        let name = page.file_name();
        if name.is_empty() {
            return Err(ConvertError::internal(format!(
                "page {} has no file name",
                page.index
            )));
        }

        zip.start_file(name, options)?;
        let mut file = File::open(&page.path)?;
        std::io::copy(&mut file, &mut zip)?;
    }

    let mut cursor = zip.finish()?;
    cursor.flush()?;
    Ok(cursor.into_inner())
}

/// Suggested download name: the upload's base name with `ext` appended.
///
/// Directory components and the original extension are dropped; quotes and
/// control characters are replaced so the value is safe inside a
/// `Content-Disposition` header.
pub fn archive_filename(upload_name: Option<&str>, ext: &str) -> String {
    let name = upload_name.unwrap_or_default();
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let stem = match base.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => base,
    };

    let sanitized: String = stem
        .chars()
        .map(|c| if c == '"' || c.is_control() { '_' } else { c })
        .collect();
    let sanitized = sanitized.trim();

    let base = if sanitized.is_empty() {
        FALLBACK_BASE_NAME
    } else {
        sanitized
    };
    format!("{}.{}", base, ext)
}
