//! API integration tests for conversions and error handling.
//!
//! Tests verify:
//! - Zip and single-image responses for valid uploads
//! - Parameter and upload validation before any rendering
//! - Error status codes and JSON bodies
//! - Scratch directory cleanup on success, failure and timeout

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use http_body_util::BodyExt;
use std::time::Duration;
use tower::ServiceExt;

use pdf2img_server::error::ConvertError;

use super::test_utils::{
    is_empty_dir, multipart_body, sample_pdf, test_router, upload_request, zip_entries,
    zip_entry_names, MockEngine, BOUNDARY,
};

const MB: u64 = 1024 * 1024;

async fn body_bytes(response: Response) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

async fn json_body(response: Response) -> serde_json::Value {
    let body = body_bytes(response).await;
    serde_json::from_slice(&body).unwrap()
}

// =============================================================================
// Successful Conversions
// =============================================================================

#[tokio::test]
async fn test_convert_all_pages_to_zip() {
    let temp = tempfile::tempdir().unwrap();
    let engine = MockEngine::new(3);
    let router = test_router(engine.clone(), temp.path(), 50 * MB);

    let request = upload_request("/api/v1/convert/pdf/img", "report.pdf", &sample_pdf());
    let response = router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "application/zip"
    );
    assert_eq!(
        response.headers().get("content-disposition").unwrap(),
        "attachment; filename=\"report.zip\""
    );
    assert_eq!(response.headers().get("x-page-count").unwrap(), "3");

    let body = body_bytes(response).await;
    let entries = zip_entries(&body);
    assert_eq!(
        entries,
        vec![
            ("page-1.png".to_string(), "png page 1".to_string()),
            ("page-2.png".to_string(), "png page 2".to_string()),
            ("page-3.png".to_string(), "png page 3".to_string()),
        ]
    );

    let job = engine.last_job().unwrap();
    assert_eq!(job.dpi, 200);
    assert_eq!(job.first_page, None);
    assert_eq!(job.last_page, None);

    assert!(is_empty_dir(temp.path()));
}

#[tokio::test]
async fn test_zip_entries_in_numeric_page_order() {
    let temp = tempfile::tempdir().unwrap();
    let router = test_router(MockEngine::new(12), temp.path(), 50 * MB);

    let request = upload_request("/convert", "long.pdf", &sample_pdf());
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let names = zip_entry_names(&body_bytes(response).await);
    let expected: Vec<String> = (1..=12).map(|p| format!("page-{}.png", p)).collect();
    assert_eq!(names, expected);
}

#[tokio::test]
async fn test_zero_padded_names_keep_order() {
    let temp = tempfile::tempdir().unwrap();
    let router = test_router(MockEngine::new(11).with_padding(2), temp.path(), 50 * MB);

    let request = upload_request("/convert", "doc.pdf", &sample_pdf());
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let names = zip_entry_names(&body_bytes(response).await);
    assert_eq!(names.first().unwrap(), "page-01.png");
    assert_eq!(names.last().unwrap(), "page-11.png");
    assert_eq!(names.len(), 11);
}

#[tokio::test]
async fn test_page_window() {
    let temp = tempfile::tempdir().unwrap();
    let engine = MockEngine::new(10);
    let router = test_router(engine.clone(), temp.path(), 50 * MB);

    let request = upload_request(
        "/api/v1/convert/pdf/img?first_page=3&last_page=5&dpi=150",
        "doc.pdf",
        &sample_pdf(),
    );
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("x-page-count").unwrap(), "3");

    let names = zip_entry_names(&body_bytes(response).await);
    assert_eq!(names, vec!["page-3.png", "page-4.png", "page-5.png"]);

    let job = engine.last_job().unwrap();
    assert_eq!(job.dpi, 150);
    assert_eq!(job.first_page, Some(3));
    assert_eq!(job.last_page, Some(5));
}

#[tokio::test]
async fn test_last_page_beyond_document_is_clamped() {
    let temp = tempfile::tempdir().unwrap();
    let router = test_router(MockEngine::new(4), temp.path(), 50 * MB);

    let request = upload_request(
        "/convert?first_page=3&last_page=99",
        "doc.pdf",
        &sample_pdf(),
    );
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let names = zip_entry_names(&body_bytes(response).await);
    assert_eq!(names, vec!["page-3.png", "page-4.png"]);
}

#[tokio::test]
async fn test_jpg_and_jpeg_are_equivalent() {
    for format in ["jpeg", "jpg", "JPG"] {
        let temp = tempfile::tempdir().unwrap();
        let engine = MockEngine::new(2);
        let router = test_router(engine.clone(), temp.path(), 50 * MB);

        let uri = format!("/convert?format={}", format);
        let response = router
            .oneshot(upload_request(&uri, "doc.pdf", &sample_pdf()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK, "format={}", format);

        let entries = zip_entries(&body_bytes(response).await);
        assert_eq!(
            entries,
            vec![
                ("page-1.jpg".to_string(), "jpeg page 1".to_string()),
                ("page-2.jpg".to_string(), "jpeg page 2".to_string()),
            ]
        );
    }
}

#[tokio::test]
async fn test_single_image_png() {
    let temp = tempfile::tempdir().unwrap();
    let engine = MockEngine::new(5);
    let router = test_router(engine.clone(), temp.path(), 50 * MB);

    let request = upload_request("/api/v1/convert/pdf/img/single", "scan.pdf", &sample_pdf());
    let response = router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("content-type").unwrap(), "image/png");
    assert_eq!(
        response.headers().get("content-disposition").unwrap(),
        "attachment; filename=\"scan.png\""
    );
    assert_eq!(response.headers().get("x-page-count").unwrap(), "1");
    assert_eq!(body_bytes(response).await, b"png page 1");

    // Only the first page is rendered
    let job = engine.last_job().unwrap();
    assert_eq!(job.first_page, Some(1));
    assert_eq!(job.last_page, Some(1));
    assert!(is_empty_dir(temp.path()));
}

#[tokio::test]
async fn test_single_image_jpeg_from_first_page() {
    let temp = tempfile::tempdir().unwrap();
    let router = test_router(MockEngine::new(5), temp.path(), 50 * MB);

    let request = upload_request(
        "/convert/single?format=jpg&first_page=4",
        "scan.pdf",
        &sample_pdf(),
    );
    let response = router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("content-type").unwrap(), "image/jpeg");
    assert_eq!(
        response.headers().get("content-disposition").unwrap(),
        "attachment; filename=\"scan.jpg\""
    );
    assert_eq!(body_bytes(response).await, b"jpeg page 4");
}

// =============================================================================
// Upload Validation
// =============================================================================

#[tokio::test]
async fn test_non_pdf_rejected_before_rendering() {
    let temp = tempfile::tempdir().unwrap();
    let engine = MockEngine::new(3);
    let router = test_router(engine.clone(), temp.path(), 50 * MB);

    let request = upload_request("/convert", "notes.txt", b"just some text, not a pdf");
    let response = router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error = json_body(response).await;
    assert_eq!(error["error"], "invalid_input");
    assert_eq!(
        error["detail"],
        "The file does not appear to be a valid PDF."
    );

    assert_eq!(engine.call_count(), 0);
    assert!(is_empty_dir(temp.path()));
}

#[tokio::test]
async fn test_renamed_pdf_is_accepted() {
    let temp = tempfile::tempdir().unwrap();
    let router = test_router(MockEngine::new(1), temp.path(), 50 * MB);

    // Content decides, not the declared name
    let request = upload_request("/convert", "document.bin", &sample_pdf());
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_oversize_upload_rejected() {
    let temp = tempfile::tempdir().unwrap();
    let engine = MockEngine::new(3);
    let router = test_router(engine.clone(), temp.path(), MB);

    let mut pdf = sample_pdf();
    pdf.resize(MB as usize + 1, b' ');
    let request = upload_request("/convert", "big.pdf", &pdf);
    let response = router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let error = json_body(response).await;
    assert_eq!(error["error"], "too_large");
    assert_eq!(error["detail"], "PDF exceeds 1 MB.");

    assert_eq!(engine.call_count(), 0);
    assert!(is_empty_dir(temp.path()));
}

#[tokio::test]
async fn test_upload_at_ceiling_accepted() {
    let temp = tempfile::tempdir().unwrap();
    let router = test_router(MockEngine::new(1), temp.path(), MB);

    let mut pdf = sample_pdf();
    pdf.resize(MB as usize, b' ');
    let request = upload_request("/convert", "edge.pdf", &pdf);
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_body_far_beyond_limit_rejected() {
    let temp = tempfile::tempdir().unwrap();
    let engine = MockEngine::new(1);
    let router = test_router(engine.clone(), temp.path(), MB);

    let mut pdf = sample_pdf();
    pdf.resize(3 * MB as usize, b' ');
    let response = router
        .oneshot(upload_request("/convert", "huge.pdf", &pdf))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(engine.call_count(), 0);
}

#[tokio::test]
async fn test_sub_megabyte_ceiling_reported_in_bytes() {
    let temp = tempfile::tempdir().unwrap();
    let engine = MockEngine::new(1);
    let router = test_router(engine.clone(), temp.path(), 1000);

    let mut small = sample_pdf();
    small.resize(2000, b' ');
    let response = router
        .clone()
        .oneshot(upload_request("/convert", "small.pdf", &small))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(json_body(response).await["detail"], "PDF exceeds 1000 bytes.");

    let mut huge = sample_pdf();
    huge.resize(MB as usize, b' ');
    let response = router
        .oneshot(upload_request("/convert", "huge.pdf", &huge))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(json_body(response).await["detail"], "PDF exceeds 1000 bytes.");

    assert_eq!(engine.call_count(), 0);
}

#[tokio::test]
async fn test_missing_file_field() {
    let temp = tempfile::tempdir().unwrap();
    let router = test_router(MockEngine::new(1), temp.path(), 50 * MB);

    let request = Request::builder()
        .method("POST")
        .uri("/convert")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(multipart_body(
            "attachment",
            "doc.pdf",
            &sample_pdf(),
        )))
        .unwrap();
    let response = router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error = json_body(response).await;
    assert_eq!(error["error"], "invalid_input");
}

#[tokio::test]
async fn test_non_multipart_body() {
    let temp = tempfile::tempdir().unwrap();
    let router = test_router(MockEngine::new(1), temp.path(), 50 * MB);

    let request = Request::builder()
        .method("POST")
        .uri("/convert")
        .header("content-type", "application/pdf")
        .body(Body::from(sample_pdf()))
        .unwrap();
    let response = router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error = json_body(response).await;
    assert_eq!(error["error"], "invalid_input");
}

// =============================================================================
// Parameter Validation
// =============================================================================

#[tokio::test]
async fn test_invalid_parameters_rejected() {
    let cases = [
        "/convert?first_page=5&last_page=2",
        "/convert?first_page=0",
        "/convert?dpi=10",
        "/convert?dpi=601",
        "/convert?format=gif",
        "/convert?timeout=5",
        "/convert?timeout=1801",
        "/convert?dpi=abc",
    ];

    for uri in cases {
        let temp = tempfile::tempdir().unwrap();
        let engine = MockEngine::new(3);
        let router = test_router(engine.clone(), temp.path(), 50 * MB);

        let response = router
            .oneshot(upload_request(uri, "doc.pdf", &sample_pdf()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "uri={}", uri);
        let error = json_body(response).await;
        assert_eq!(error["error"], "invalid_input", "uri={}", uri);
        assert!(error["detail"].is_string());
        assert_eq!(engine.call_count(), 0, "uri={}", uri);
    }
}

#[tokio::test]
async fn test_unsupported_format_message() {
    let temp = tempfile::tempdir().unwrap();
    let router = test_router(MockEngine::new(1), temp.path(), 50 * MB);

    let response = router
        .oneshot(upload_request("/convert?format=tiff", "doc.pdf", &sample_pdf()))
        .await
        .unwrap();

    let error = json_body(response).await;
    assert_eq!(error["detail"], "Unsupported format: tiff");
}

// =============================================================================
// Engine Failures
// =============================================================================

#[tokio::test]
async fn test_engine_errors_map_to_status() {
    let cases = vec![
        (
            ConvertError::RenderEngineMissing {
                tool: "pdfinfo".to_string(),
            },
            StatusCode::INTERNAL_SERVER_ERROR,
            "render_engine_missing",
        ),
        (
            ConvertError::corrupt("Couldn't read xref table"),
            StatusCode::BAD_REQUEST,
            "corrupt_document",
        ),
        (
            ConvertError::syntax("Illegal character"),
            StatusCode::BAD_REQUEST,
            "syntax_error",
        ),
        (
            ConvertError::internal("converter exited with status 99"),
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal",
        ),
    ];

    for (error, status, kind) in cases {
        let temp = tempfile::tempdir().unwrap();
        let router = test_router(
            MockEngine::new(3).with_error(error.clone()),
            temp.path(),
            50 * MB,
        );

        let response = router
            .oneshot(upload_request("/convert", "doc.pdf", &sample_pdf()))
            .await
            .unwrap();

        assert_eq!(response.status(), status, "kind={}", kind);
        let body = json_body(response).await;
        assert_eq!(body["error"], kind);
        assert_eq!(body["detail"], error.to_string());
        assert!(is_empty_dir(temp.path()), "kind={}", kind);
    }
}

#[tokio::test]
async fn test_no_pages_in_window() {
    let temp = tempfile::tempdir().unwrap();
    let router = test_router(MockEngine::new(3), temp.path(), 50 * MB);

    let response = router
        .oneshot(upload_request(
            "/convert?first_page=7",
            "doc.pdf",
            &sample_pdf(),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let error = json_body(response).await;
    assert_eq!(error["error"], "no_pages_produced");
    assert_eq!(error["detail"], "No images were generated.");
    assert!(is_empty_dir(temp.path()));
}

#[tokio::test]
async fn test_dropped_page_returns_500() {
    let temp = tempfile::tempdir().unwrap();
    let router = test_router(MockEngine::new(3).with_missing_page(3), temp.path(), 50 * MB);

    let response = router
        .oneshot(upload_request("/convert", "doc.pdf", &sample_pdf()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let error = json_body(response).await;
    assert_eq!(error["error"], "internal");
    assert!(is_empty_dir(temp.path()));
}

#[tokio::test]
async fn test_timeout_returns_504_and_cleans_up() {
    let temp = tempfile::tempdir().unwrap();
    let engine = MockEngine::new(3).with_delay(Duration::from_secs(30));
    let router = test_router(engine.clone(), temp.path(), 50 * MB);

    let started = std::time::Instant::now();
    let response = router
        .oneshot(upload_request(
            "/convert?timeout=10",
            "slow.pdf",
            &sample_pdf(),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    assert!(started.elapsed() < Duration::from_secs(25));

    let error = json_body(response).await;
    assert_eq!(error["error"], "timeout");
    assert_eq!(error["detail"], "Conversion timed out after 10 seconds.");

    let scratch = engine.last_dir().unwrap();
    assert!(!scratch.exists());
    assert!(is_empty_dir(temp.path()));
}

// =============================================================================
// Health and Routing
// =============================================================================

#[tokio::test]
async fn test_health_check() {
    let temp = tempfile::tempdir().unwrap();

    for uri in ["/health", "/api/v1/health"] {
        let router = test_router(MockEngine::new(1), temp.path(), 50 * MB);
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let response = router.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "ok");
        assert!(body["version"].is_string());
    }
}

#[tokio::test]
async fn test_get_on_convert_not_allowed() {
    let temp = tempfile::tempdir().unwrap();
    let router = test_router(MockEngine::new(1), temp.path(), 50 * MB);

    let request = Request::builder()
        .uri("/api/v1/convert/pdf/img")
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_unknown_route() {
    let temp = tempfile::tempdir().unwrap();
    let router = test_router(MockEngine::new(1), temp.path(), 50 * MB);

    let request = Request::builder()
        .uri("/nonexistent")
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
