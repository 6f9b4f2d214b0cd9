//! The conversion engine seam.
//!
//! The worker treats the engine as a black box: document bytes in, Markdown
//! or an error out. [`ConversionEngine`] is that contract and
//! [`EngineFactory`] is how a worker builds its single instance during the
//! start-up hook.
//!
//! One engine ships with the crate, [`vlm::VlmEngine`], assembled from these
//! stages:
//!
//! ```text
//! bytes ──▶ render ──▶ encode ──▶ llm ──▶ postprocess
//!          (pdfium)   (base64)   (VLM)    (cleanup)
//! ```
//!
//! 1. [`render`] — rasterise every page; runs in `spawn_blocking` because
//!    pdfium is not async-safe
//! 2. [`encode`] — PNG-encode and base64-wrap each page image
//! 3. [`llm`]    — the VLM call with retry/backoff
//! 4. [`postprocess`] — deterministic cleanup of model quirks

pub mod encode;
pub mod llm;
pub mod postprocess;
pub mod prompts;
pub mod render;
pub mod vlm;

use crate::error::Pdf2MdError;
use async_trait::async_trait;
use std::sync::Arc;

pub use vlm::{VlmEngine, VlmEngineFactory};

/// A document-to-Markdown converter.
///
/// Implementations must be `Send + Sync`; the worker shares one instance
/// behind an `Arc` and never calls it from more than
/// [`max_concurrency`](ConversionEngine::max_concurrency) tasks at once.
#[async_trait]
pub trait ConversionEngine: Send + Sync {
    /// Short name used in logs and health output.
    fn name(&self) -> &str;

    /// How many conversions may run at the same time. Default: 1, i.e. the
    /// engine is only safe for sequential reuse.
    fn max_concurrency(&self) -> usize {
        1
    }

    /// Convert one complete PDF to Markdown.
    async fn convert(&self, document: &[u8]) -> Result<String, Pdf2MdError>;
}

/// Builds the engine once per worker lifetime.
#[async_trait]
pub trait EngineFactory: Send + Sync {
    /// Name of the engine this factory produces.
    fn engine_name(&self) -> &str;

    /// Construct the engine. Called at most once per successful worker start.
    async fn create(&self) -> Result<Arc<dyn ConversionEngine>, Pdf2MdError>;
}

/// A factory that hands out an engine constructed up-front.
///
/// Useful when the caller already owns an engine, e.g. in tests or when an
/// embedding application builds it with custom middleware.
pub struct PrebuiltEngine(pub Arc<dyn ConversionEngine>);

#[async_trait]
impl EngineFactory for PrebuiltEngine {
    fn engine_name(&self) -> &str {
        self.0.name()
    }

    async fn create(&self) -> Result<Arc<dyn ConversionEngine>, Pdf2MdError> {
        Ok(Arc::clone(&self.0))
    }
}
