use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::handlers;
use crate::state::AppState;

pub fn create_router(state: AppState, max_upload_bytes: usize) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    // Leave headroom above the configured image limit for multipart framing.
    let body_limit = max_upload_bytes + 64 * 1024;

    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/process", post(handlers::process_receipt))
        .route("/api/receipts", get(handlers::list_receipts))
        .route("/api/receipts/pending", get(handlers::list_pending))
        .route("/api/receipts/{id}/status", post(handlers::update_receipt_status))
        .route("/api/analytics", get(handlers::analytics))
        .route("/api/export.csv", get(handlers::export_csv))
        .route("/api/export.json", get(handlers::export_json))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(trace_layer)
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use image::{DynamicImage, GrayImage, ImageBuffer, Luma};
    use tower::ServiceExt;

    use ledgerlens_engine::ReceiptPipeline;
    use ledgerlens_ocr::{MockRecognizer, OcrBackend};
    use ledgerlens_storage::create_db;

    const RECEIPT_TEXT: &str = "STARBUCKS\nJanuary 15, 2024\nLatte  $5.50\nTotal: $5.50\nVISA";

    async fn test_app(dir: &tempfile::TempDir) -> Router {
        let pool = create_db(&dir.path().join("receipts.db")).await.unwrap();
        let recognizer: Box<dyn OcrBackend> = Box::new(MockRecognizer::new(RECEIPT_TEXT));
        let pipeline =
            ReceiptPipeline::new(recognizer, dir.path().join("attachments"));
        let state = AppState { pool, pipeline: Arc::new(pipeline) };
        create_router(state, 5 * 1024 * 1024)
    }

    fn tiny_png() -> Vec<u8> {
        let img: GrayImage = ImageBuffer::from_fn(16, 16, |x, _| Luma([(x * 16) as u8]));
        let mut buf = Vec::new();
        DynamicImage::ImageLuma8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    fn multipart_upload(filename: &str, data: &[u8]) -> Request<Body> {
        let boundary = "ledgerlens-test-boundary";
        let mut body = Vec::new();
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri("/api/process")
            .header("content-type", format!("multipart/form-data; boundary={boundary}"))
            .body(Body::from(body))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_endpoint() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(&dir).await;

        let response =
            app.oneshot(Request::get("/health").body(Body::empty()).unwrap()).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn process_upload_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(&dir).await;

        let response =
            app.oneshot(multipart_upload("coffee.jpg", &tiny_png())).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "success");
        assert_eq!(body["ai_model"], "ocr-only");
        assert_eq!(body["data"]["vendor"], "STARBUCKS");
        assert_eq!(body["data"]["amount"], 5.5);
        assert_eq!(body["data"]["category"], "Meals & Entertainment");
        assert!(body["processing_time"].as_f64().unwrap() >= 0.0);
    }

    #[tokio::test]
    async fn duplicate_upload_reports_duplicate_status() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(&dir).await;
        let png = tiny_png();

        let first = app
            .clone()
            .oneshot(multipart_upload("a.jpg", &png))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = app.oneshot(multipart_upload("b.jpg", &png)).await.unwrap();
        let body = json_body(second).await;
        assert_eq!(body["status"], "duplicate");
    }

    #[tokio::test]
    async fn missing_file_field_is_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(&dir).await;

        let boundary = "ledgerlens-test-boundary";
        let body = format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"other\"\r\n\r\nhi\r\n--{boundary}--\r\n"
        );
        let request = Request::builder()
            .method("POST")
            .uri("/api/process")
            .header("content-type", format!("multipart/form-data; boundary={boundary}"))
            .body(Body::from(body))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(json_body(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn unsupported_extension_is_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(&dir).await;

        let response =
            app.oneshot(multipart_upload("receipt.pdf", &tiny_png())).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn receipts_listing_and_pending_filter() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(&dir).await;
        app.clone().oneshot(multipart_upload("a.jpg", &tiny_png())).await.unwrap();

        let all = app
            .clone()
            .oneshot(Request::get("/api/receipts").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(all.status(), StatusCode::OK);
        let body = json_body(all).await;
        assert_eq!(body.as_array().unwrap().len(), 1);

        // High-confidence receipt, so the pending list stays empty.
        let pending = app
            .oneshot(Request::get("/api/receipts/pending").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(json_body(pending).await.as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn status_update_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(&dir).await;

        let uploaded =
            app.clone().oneshot(multipart_upload("a.jpg", &tiny_png())).await.unwrap();
        let id = json_body(uploaded).await["data"]["id"].as_str().unwrap().to_string();

        let request = Request::builder()
            .method("POST")
            .uri(format!("/api/receipts/{id}/status"))
            .header("content-type", "application/json")
            .body(Body::from(r#"{"status": "approved", "note": "looks right"}"#))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "approved");
        assert!(body["notes"].as_str().unwrap().contains("looks right"));

        // Unknown id gives 404.
        let request = Request::builder()
            .method("POST")
            .uri(format!("/api/receipts/{}/status", uuid::Uuid::new_v4()))
            .header("content-type", "application/json")
            .body(Body::from(r#"{"status": "approved"}"#))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn analytics_shape() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(&dir).await;
        app.clone().oneshot(multipart_upload("a.jpg", &tiny_png())).await.unwrap();

        let response = app
            .oneshot(Request::get("/api/analytics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["total_processed"], 1);
        assert_eq!(body["total_amount"], 5.5);
        assert!(body["avg_confidence"].as_f64().unwrap() > 0.0);
        assert!(body.get("average_confidence").is_none());
        assert_eq!(body["categories"]["Meals & Entertainment"], 5.5);
        assert_eq!(body["recent"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn csv_export_has_rows() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(&dir).await;
        app.clone().oneshot(multipart_upload("a.jpg", &tiny_png())).await.unwrap();

        let response = app
            .oneshot(Request::get("/api/export.csv").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response
            .headers()
            .get("content-type")
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("text/csv"));
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("STARBUCKS"));
    }
}
