//! Vision-language-model conversion engine.
//!
//! Every page of the document is rasterised with pdfium, sent to a VLM as a
//! PNG, and the cleaned per-page answers are joined in page order. A
//! document converts only if every page does; the gateway sends single-page
//! documents, so a failure there maps to exactly one failed page.

use crate::config::EngineConfig;
use crate::engine::{encode, llm, postprocess, render, ConversionEngine, EngineFactory};
use crate::error::Pdf2MdError;
use async_trait::async_trait;
use edgequake_llm::{LLMProvider, ProviderFactory};
use futures::stream::{self, StreamExt, TryStreamExt};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// The pdfium + VLM engine.
pub struct VlmEngine {
    provider: Arc<dyn LLMProvider>,
    config: EngineConfig,
}

impl VlmEngine {
    /// Bind pdfium and resolve the LLM provider.
    ///
    /// Both checks run here so a misconfigured worker fails at start-up
    /// rather than on its first request.
    pub async fn new(config: EngineConfig) -> Result<Self, Pdf2MdError> {
        render::probe_pdfium(config.pdfium_lib_path.clone()).await?;
        let provider = resolve_provider(&config)?;
        info!(
            "VLM engine ready (model: {})",
            config.model.as_deref().unwrap_or(DEFAULT_MODEL)
        );
        Ok(Self { provider, config })
    }
}

#[async_trait]
impl ConversionEngine for VlmEngine {
    fn name(&self) -> &str {
        "vlm"
    }

    fn max_concurrency(&self) -> usize {
        self.config.concurrency.max(1)
    }

    async fn convert(&self, document: &[u8]) -> Result<String, Pdf2MdError> {
        let start = Instant::now();
        let images = render::render_document(
            document.to_vec(),
            self.config.max_rendered_pixels,
            self.config.pdfium_lib_path.clone(),
        )
        .await?;

        let encoded = images
            .iter()
            .enumerate()
            .map(|(idx, img)| {
                encode::encode_page(img).map_err(|e| Pdf2MdError::Conversion {
                    detail: format!("image encoding failed for page {}: {}", idx + 1, e),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        // Pages of one document share the engine's concurrency budget.
        let pages: Vec<String> = stream::iter(encoded.into_iter().enumerate().map(
            |(idx, image)| async move {
                let markdown =
                    llm::transcribe_page(&self.provider, idx + 1, image, &self.config).await?;
                Ok::<_, Pdf2MdError>(postprocess::clean_markdown(&markdown))
            },
        ))
        .buffered(self.max_concurrency())
        .try_collect()
        .await?;

        debug!(
            "Converted {} pages in {}ms",
            pages.len(),
            start.elapsed().as_millis()
        );
        Ok(postprocess::join_pages(&pages))
    }
}

/// Builds a [`VlmEngine`] during the worker start-up hook.
#[derive(Debug, Clone)]
pub struct VlmEngineFactory {
    config: EngineConfig,
}

impl VlmEngineFactory {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl EngineFactory for VlmEngineFactory {
    fn engine_name(&self) -> &str {
        "vlm"
    }

    async fn create(&self) -> Result<Arc<dyn ConversionEngine>, Pdf2MdError> {
        let engine = VlmEngine::new(self.config.clone()).await?;
        Ok(Arc::new(engine))
    }
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`), used as-is.
/// 2. **Named provider** (`config.provider_name`) with `config.model`.
/// 3. **Environment pair** `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`.
/// 4. **OpenAI** when `OPENAI_API_KEY` is set.
/// 5. **Full auto-detection** via [`ProviderFactory::from_env`].
fn resolve_provider(config: &EngineConfig) -> Result<Arc<dyn LLMProvider>, Pdf2MdError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);

    if let Some(ref name) = config.provider_name {
        return create_vision_provider(name, model);
    }

    if let (Ok(prov), Ok(env_model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !env_model.is_empty() {
            return create_vision_provider(&prov, &env_model);
        }
    }

    if std::env::var("OPENAI_API_KEY").is_ok_and(|k| !k.is_empty()) {
        return create_vision_provider("openai", model);
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| Pdf2MdError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or pass --provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, Pdf2MdError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        Pdf2MdError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}
