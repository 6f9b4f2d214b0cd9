//! Shared fixtures: in-memory PDFs and deterministic engines.
#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::Request;
use axum::response::Response;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use pdf2md_gateway::{
    ConversionEngine, ConverterWorker, LocalDispatcher, Pdf2MdError, PrebuiltEngine,
};
use std::sync::Arc;

/// Build a PDF whose page `i` (1-based) shows the text `Page i`.
pub fn sample_pdf(page_total: usize) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for i in 1..=page_total {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 36.into()]),
                Operation::new("Td", vec![72.into(), 700.into()]),
                Operation::new("Tj", vec![Object::string_literal(format!("Page {i}"))]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_total as i64,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf).unwrap();
    buf
}

/// Every string literal shown on every page, in page order.
pub fn shown_text(pdf: &[u8]) -> Result<Vec<String>, Pdf2MdError> {
    let doc = Document::load_mem(pdf).map_err(|e| Pdf2MdError::CorruptPdf {
        detail: e.to_string(),
    })?;
    let mut out = Vec::new();
    for (_, page_id) in doc.get_pages() {
        let raw = doc
            .get_page_content(page_id)
            .map_err(|e| Pdf2MdError::Conversion {
                detail: e.to_string(),
            })?;
        let raw = String::from_utf8_lossy(&raw);
        let mut rest = raw.as_ref();
        while let Some(open) = rest.find('(') {
            let after = &rest[open + 1..];
            let Some(close) = after.find(')') else { break };
            out.push(after[..close].to_string());
            rest = &after[close + 1..];
        }
    }
    Ok(out)
}

/// Turns every shown string into a heading.
pub struct HeadingEngine;

#[async_trait]
impl ConversionEngine for HeadingEngine {
    fn name(&self) -> &str {
        "heading"
    }

    fn max_concurrency(&self) -> usize {
        2
    }

    async fn convert(&self, document: &[u8]) -> Result<String, Pdf2MdError> {
        let lines: Vec<String> = shown_text(document)?
            .into_iter()
            .map(|t| format!("# {t}"))
            .collect();
        Ok(format!("{}\n", lines.join("\n\n")))
    }
}

/// Like [`HeadingEngine`] but fails on any page showing `fail_on`.
pub struct FailingEngine {
    pub fail_on: &'static str,
}

#[async_trait]
impl ConversionEngine for FailingEngine {
    fn name(&self) -> &str {
        "failing"
    }

    async fn convert(&self, document: &[u8]) -> Result<String, Pdf2MdError> {
        if shown_text(document)?.iter().any(|t| t == self.fail_on) {
            return Err(Pdf2MdError::Conversion {
                detail: format!("engine choked on '{}'", self.fail_on),
            });
        }
        HeadingEngine.convert(document).await
    }
}

pub fn worker_with(engine: impl ConversionEngine + 'static) -> Arc<ConverterWorker> {
    Arc::new(ConverterWorker::new(Arc::new(PrebuiltEngine(Arc::new(engine)))))
}

pub fn local_dispatcher(engine: impl ConversionEngine + 'static) -> Arc<LocalDispatcher> {
    Arc::new(LocalDispatcher::new(worker_with(engine)))
}

/// A `POST /convert` request uploading `data` in `field`.
pub fn upload(uri: &str, field: &str, data: &[u8]) -> Request<Body> {
    let boundary = "pdf2md-test-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"upload.pdf\"\r\nContent-Type: application/pdf\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    Request::post(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .unwrap()
}

pub async fn json_body(response: Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
