//! HTTP server layer for the PDF rasterization service.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP Layer                              │
//! │           POST /api/v1/convert/pdf/img[/single]                 │
//! │                                                                 │
//! │  ┌──────────────────────────┐  ┌─────────────────────────────┐  │
//! │  │        handlers          │  │           routes            │  │
//! │  │ (multipart, responses)   │  │ (router, CORS, body limit)  │  │
//! │  └──────────────────────────┘  └─────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod handlers;
pub mod routes;

pub use handlers::{
    content_disposition, convert_handler, convert_single_handler, health_handler, status_for,
    AppState, ConvertQueryParams, ErrorResponse, HealthResponse, RequestStage, UPLOAD_FIELD,
};
pub use routes::{create_router, RouterConfig, MULTIPART_OVERHEAD_BYTES};
