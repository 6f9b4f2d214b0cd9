//! End-to-end tests against a live VLM.
//!
//! These tests render pages with pdfium and call a real provider, so they
//! are gated behind the `E2E_ENABLED` environment variable and do not run in
//! CI unless explicitly requested.
//!
//! Run with:
//!   E2E_ENABLED=1 OPENAI_API_KEY=sk-... cargo test --test e2e -- --nocapture
//!
//! Set `PDFIUM_LIB_PATH` if libpdfium is not in `./` or on the system path.

mod common;

use axum::http::StatusCode;
use common::{json_body, sample_pdf, upload};
use pdf2md_gateway::{
    gateway_router, ConverterWorker, EngineConfig, GatewayConfig, LocalDispatcher,
    VlmEngineFactory, WorkerState,
};
use std::path::PathBuf;
use std::sync::Arc;
use tower::ServiceExt;

macro_rules! e2e_skip_unless_enabled {
    () => {
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP — set E2E_ENABLED=1 to run e2e tests");
            return;
        }
    };
}

fn vlm_worker() -> Arc<ConverterWorker> {
    let config = EngineConfig::builder()
        .max_rendered_pixels(1200)
        .concurrency(2)
        .build()
        .unwrap();
    Arc::new(ConverterWorker::new(Arc::new(VlmEngineFactory::new(config))))
}

/// Assert the markdown passes basic quality checks.
fn assert_markdown_quality(md: &str, context: &str) {
    assert!(!md.trim().is_empty(), "[{context}] Markdown is empty");
    assert!(md.ends_with('\n'), "[{context}] Markdown must end with a newline");
    assert!(
        !md.trim_start().starts_with("```"),
        "[{context}] Output is still wrapped in a code fence"
    );
}

#[tokio::test]
async fn test_vlm_engine_starts() {
    e2e_skip_unless_enabled!();
    let worker = vlm_worker();
    worker.initialize().await.expect("engine start-up failed");
    assert_eq!(worker.state(), WorkerState::Ready);
}

#[tokio::test]
async fn test_convert_one_generated_pdf() {
    e2e_skip_unless_enabled!();
    let worker = vlm_worker();
    let md = worker
        .convert_one(&sample_pdf(1))
        .await
        .expect("conversion failed");
    println!("{md}");
    assert_markdown_quality(&md, "single page");
    assert!(md.contains("Page 1"), "expected the page text, got: {md}");
}

#[tokio::test]
async fn test_gateway_with_vlm_worker() {
    e2e_skip_unless_enabled!();
    let dispatcher = Arc::new(LocalDispatcher::new(vlm_worker()));
    let app = gateway_router(dispatcher, &GatewayConfig::default());

    let response = app
        .oneshot(upload("/convert", "file", &sample_pdf(3)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    let pages = body.as_array().expect("JSON array");
    assert_eq!(pages.len(), 3);
    for (i, page) in pages.iter().enumerate() {
        let md = page.as_str().unwrap();
        assert_markdown_quality(md, &format!("page {}", i + 1));
        assert!(md.contains(&format!("Page {}", i + 1)), "page {}: {md}", i + 1);
    }
}

/// Warm-up with the deployment sample, when one is present.
#[tokio::test]
async fn test_warm_up_with_sample() {
    e2e_skip_unless_enabled!();
    let sample = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test.pdf");
    if !sample.exists() {
        println!("SKIP — sample not found: {}", sample.display());
        return;
    }
    let worker = vlm_worker();
    worker.warm_up(&sample).await.expect("warm-up failed");
    assert_eq!(worker.state(), WorkerState::Ready);
}
