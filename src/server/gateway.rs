//! The public gateway: `POST /convert` and `GET /health`.
//!
//! ```text
//! multipart upload ──▶ split ──▶ dispatcher.convert_batch ──▶ ["# p1", "# p2", …]
//! ```
//!
//! The response is one string per page, in page order. A page that failed
//! keeps its slot as a Markdown comment starting with
//! [`FAILURE_MARKER_PREFIX`](crate::output::FAILURE_MARKER_PREFIX), and its
//! 1-based number is listed in the `x-pdf2md-failed-pages` header.
//! `?detail=true` returns the typed [`BatchOutput`](crate::output::BatchOutput)
//! instead.

use crate::config::GatewayConfig;
use crate::dispatch::WorkDispatcher;
use crate::error::Pdf2MdError;
use crate::server::ApiError;
use crate::split::split_pages;
use axum::{
    body::Bytes,
    extract::multipart::{MultipartError, MultipartRejection},
    extract::rejection::QueryRejection,
    extract::{DefaultBodyLimit, Multipart, Query, State},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

/// Multipart field carrying the PDF.
pub const UPLOAD_FIELD: &str = "file";

/// Header listing failed 1-based page numbers, comma separated.
pub const FAILED_PAGES_HEADER: &str = "x-pdf2md-failed-pages";

#[derive(Clone)]
struct GatewayState {
    dispatcher: Arc<dyn WorkDispatcher>,
    max_upload_bytes: usize,
}

#[derive(Debug, Default, Deserialize)]
struct ConvertParams {
    #[serde(default)]
    detail: bool,
}

/// Build the gateway router around `dispatcher`.
pub fn gateway_router(dispatcher: Arc<dyn WorkDispatcher>, config: &GatewayConfig) -> Router {
    let state = GatewayState {
        dispatcher,
        max_upload_bytes: config.max_upload_bytes,
    };
    Router::new()
        .route("/convert", post(convert))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health(State(state): State<GatewayState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "pdf2md-gateway",
        "version": env!("CARGO_PKG_VERSION"),
        "dispatcher": state.dispatcher.describe(),
    }))
}

async fn convert(
    State(state): State<GatewayState>,
    params: Result<Query<ConvertParams>, QueryRejection>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ApiError> {
    let start = Instant::now();
    let Query(params) = params.map_err(|e| Pdf2MdError::InvalidUpload(e.body_text()))?;
    let multipart = multipart.map_err(|e| Pdf2MdError::InvalidUpload(e.to_string()))?;
    let upload = read_upload(multipart, state.max_upload_bytes).await?;

    let pages = split_pages(upload).await?;
    let page_total = pages.len();
    debug!("Upload split into {} pages", page_total);

    // Awaited inline: a dropped connection drops the dispatch with it.
    let output = state.dispatcher.convert_batch(pages).await?;
    let failed = output.failed_pages();

    info!(
        "POST /convert: {} pages, {} failed, {}ms",
        page_total,
        failed.len(),
        start.elapsed().as_millis()
    );

    let mut response = if params.detail {
        Json(output).into_response()
    } else {
        Json(output.into_markdown_list()).into_response()
    };

    if !failed.is_empty() {
        let list = failed
            .iter()
            .map(usize::to_string)
            .collect::<Vec<_>>()
            .join(",");
        if let Ok(value) = HeaderValue::from_str(&list) {
            response.headers_mut().insert(FAILED_PAGES_HEADER, value);
        }
    }
    Ok(response)
}

/// Pick the `file` field, or the first field carrying a filename.
async fn read_upload(mut multipart: Multipart, limit: usize) -> Result<Bytes, Pdf2MdError> {
    let mut fallback: Option<Bytes> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit))?
    {
        let name = field.name().unwrap_or("").to_string();
        let is_file = field.file_name().is_some();
        debug!("Multipart field '{}' (file: {})", name, is_file);

        if name == UPLOAD_FIELD {
            return field.bytes().await.map_err(|e| multipart_error(e, limit));
        }
        if is_file && fallback.is_none() {
            fallback = Some(field.bytes().await.map_err(|e| multipart_error(e, limit))?);
        }
    }

    fallback.ok_or_else(|| {
        Pdf2MdError::InvalidUpload(format!(
            "no file provided; send the PDF in the multipart field '{}'",
            UPLOAD_FIELD
        ))
    })
}

fn multipart_error(e: MultipartError, limit: usize) -> Pdf2MdError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        Pdf2MdError::UploadTooLarge { limit_bytes: limit }
    } else {
        Pdf2MdError::InvalidUpload(e.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{ConversionJob, JobOutput};
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    struct Unreachable;

    #[async_trait]
    impl WorkDispatcher for Unreachable {
        fn describe(&self) -> String {
            "nowhere".into()
        }

        async fn submit(&self, _job: ConversionJob) -> Result<JobOutput, Pdf2MdError> {
            Err(Pdf2MdError::Transport {
                endpoint: "http://nowhere".into(),
                reason: "connection refused".into(),
            })
        }
    }

    fn router() -> Router {
        gateway_router(Arc::new(Unreachable), &GatewayConfig::default())
    }

    fn multipart_request(field: &str, filename: &str, data: &[u8]) -> Request<Body> {
        let boundary = "XBOUNDARYX";
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: application/pdf\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
        Request::builder()
            .method("POST")
            .uri("/convert")
            .header("content-type", format!("multipart/form-data; boundary={boundary}"))
            .body(Body::from(body))
            .unwrap()
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_names_dispatcher() {
        let response = router()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["dispatcher"], "nowhere");
    }

    #[tokio::test]
    async fn non_pdf_upload_is_bad_request() {
        let response = router()
            .oneshot(multipart_request("file", "notes.txt", b"just some text"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["error"], "parse_error");
    }

    #[tokio::test]
    async fn missing_multipart_is_bad_request() {
        let request = Request::post("/convert")
            .header("content-type", "application/json")
            .body(Body::from("{}"))
            .unwrap();
        let response = router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "invalid_request");
    }

    #[tokio::test]
    async fn malformed_query_is_json_bad_request() {
        let request = Request::post("/convert?detail=yes")
            .header("content-type", "multipart/form-data; boundary=B")
            .body(Body::from("--B--\r\n"))
            .unwrap();
        let response = router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["error"], "invalid_request");
        assert!(body["message"].as_str().unwrap().contains("query string"), "got {body}");
    }

    #[tokio::test]
    async fn upload_without_file_field_is_bad_request() {
        let boundary = "B";
        let body = format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"note\"\r\n\r\nhello\r\n--{boundary}--\r\n"
        );
        let request = Request::post("/convert")
            .header("content-type", format!("multipart/form-data; boundary={boundary}"))
            .body(Body::from(body))
            .unwrap();
        let response = router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn oversized_upload_is_rejected() {
        let config = GatewayConfig {
            max_upload_bytes: 64,
            ..GatewayConfig::default()
        };
        let app = gateway_router(Arc::new(Unreachable), &config);
        let response = app
            .oneshot(multipart_request("file", "big.pdf", &[b'%'; 4096]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
