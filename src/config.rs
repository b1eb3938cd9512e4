//! Configuration management for the PDF rasterization server.
//!
//! This module provides a flexible configuration system that supports:
//! - Command-line arguments via clap
//! - Environment variables with `PDF2IMG_` prefix
//! - Sensible defaults for all optional settings
//!
//! Configuration is parsed once at startup and never mutated afterwards.
//!
//! # Example
//!
//! ```ignore
//! use pdf2img_server::config::Config;
//!
//! let config = Config::parse();
//! println!("Listening on {}", config.bind_address());
//! println!("Upload ceiling: {} bytes", config.max_upload_bytes());
//! ```
//!
//! # Environment Variables
//!
//! - `PDF2IMG_HOST` - Server bind address (default: 0.0.0.0)
//! - `PDF2IMG_PORT` - Server port (default: 8000)
//! - `PDF2IMG_MAX_UPLOAD_MB` - Upload size ceiling in MB (default: 50)
//! - `PDF2IMG_WORKERS` - Render workers per request (default: 2)
//! - `PDF2IMG_CONVERTER` - `pdftocairo` or `pdftoppm` (default: pdftocairo)
//! - `PDF2IMG_POPPLER_PATH` - Directory containing the poppler binaries
//! - `PDF2IMG_TEMP_DIR` - Root for per-request scratch directories
//! - `PDF2IMG_STRICT` - Fail on poppler "Syntax Error" diagnostics (default: false)
//! - `PDF2IMG_CORS_ORIGINS` - Allowed CORS origins, comma-separated (default: any)

use std::path::PathBuf;

use clap::Parser;

use crate::render::{Converter, DEFAULT_WORKER_COUNT, MAX_WORKER_COUNT};

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 8000;

/// Default upload size ceiling in megabytes.
pub const DEFAULT_MAX_UPLOAD_MB: u64 = 50;

/// Largest accepted upload ceiling in megabytes.
pub const MAX_UPLOAD_MB_LIMIT: u64 = 1024;

// =============================================================================
// CLI Arguments
// =============================================================================

/// pdf2img-server - rasterize uploaded PDFs into PNG or JPEG pages.
///
/// Rendering is delegated to the poppler command-line tools, which must be
/// installed on the host (or pointed to with --poppler-path).
#[derive(Parser, Debug, Clone)]
#[command(name = "pdf2img-server")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "PDF2IMG_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "PDF2IMG_PORT")]
    pub port: u16,

    /// Maximum accepted PDF size in megabytes.
    #[arg(long, default_value_t = DEFAULT_MAX_UPLOAD_MB, env = "PDF2IMG_MAX_UPLOAD_MB")]
    pub max_upload_mb: u64,

    // =========================================================================
    // Rendering Configuration
    // =========================================================================
    /// Number of converter processes used for a single document (1-8).
    #[arg(long, default_value_t = DEFAULT_WORKER_COUNT, env = "PDF2IMG_WORKERS")]
    pub workers: usize,

    /// Poppler converter used to rasterize pages.
    #[arg(long, value_enum, default_value_t = Converter::Pdftocairo, env = "PDF2IMG_CONVERTER")]
    pub converter: Converter,

    /// Directory containing pdfinfo and the converter binaries.
    ///
    /// If not specified, the binaries are looked up on PATH.
    #[arg(long, env = "PDF2IMG_POPPLER_PATH")]
    pub poppler_path: Option<PathBuf>,

    /// Root directory for per-request scratch directories.
    ///
    /// If not specified, the system temp directory is used.
    #[arg(long, env = "PDF2IMG_TEMP_DIR")]
    pub temp_dir: Option<PathBuf>,

    /// Reject documents for which poppler reports a syntax error.
    #[arg(long, default_value_t = false, env = "PDF2IMG_STRICT")]
    pub strict: bool,

    // =========================================================================
    // CORS Configuration
    // =========================================================================
    /// Allowed CORS origins (comma-separated).
    ///
    /// If not specified, allows any origin.
    #[arg(long, env = "PDF2IMG_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl Config {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_upload_mb == 0 || self.max_upload_mb > MAX_UPLOAD_MB_LIMIT {
            return Err(format!(
                "max_upload_mb must be between 1 and {}",
                MAX_UPLOAD_MB_LIMIT
            ));
        }

        if self.workers == 0 || self.workers > MAX_WORKER_COUNT {
            return Err(format!(
                "workers must be between 1 and {}",
                MAX_WORKER_COUNT
            ));
        }

        if let Some(ref dir) = self.poppler_path {
            if !dir.is_dir() {
                return Err(format!(
                    "poppler_path '{}' is not a directory",
                    dir.display()
                ));
            }
        }

        if let Some(ref dir) = self.temp_dir {
            if !dir.is_dir() {
                return Err(format!("temp_dir '{}' is not a directory", dir.display()));
            }
        }

        Ok(())
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Upload size ceiling in bytes.
    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_mb * 1024 * 1024
    }
}

// =============================================================================
// Tests
// =============================================================================
