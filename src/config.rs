//! Configuration types for the engine, the worker and the gateway.
//!
//! [`EngineConfig`] controls the VLM conversion engine and is built through
//! [`EngineConfigBuilder`], which clamps and validates every knob.
//! [`WorkerConfig`] and [`GatewayConfig`] are small plain structs with
//! defaults; the CLI fills them from flags and `PDF2MD_*` environment
//! variables.

use crate::error::Pdf2MdError;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

/// Default sample document used by the warm-up hook and the CLI.
pub const DEFAULT_SAMPLE_PDF: &str = "./test.pdf";

/// Configuration for the VLM conversion engine.
///
/// # Example
/// ```rust
/// use pdf2md_gateway::EngineConfig;
///
/// let config = EngineConfig::builder()
///     .max_rendered_pixels(1600)
///     .concurrency(4)
///     .model("gpt-4.1-nano")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct EngineConfig {
    /// Longest rendered edge in pixels. Default: 2000.
    ///
    /// Caps memory on oversized pages; 1 000–2 000 px is where vision
    /// models read body text reliably.
    pub max_rendered_pixels: u32,

    /// Concurrent VLM calls allowed inside one engine. Default: 4.
    ///
    /// The engine reports this as its `max_concurrency`, which sizes the
    /// worker's gate.
    pub concurrency: usize,

    /// LLM model identifier. If None, `gpt-4.1-nano`.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    /// If None along with `provider`, auto-detected from the environment.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.1.
    pub temperature: f32,

    /// Maximum output tokens per page. Default: 4096.
    pub max_tokens: usize,

    /// Retries per page on a failed VLM call. Default: 3.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Custom system prompt. If None, uses the built-in prompt.
    pub system_prompt: Option<String>,

    /// Explicit libpdfium path. If None, `PDFIUM_LIB_PATH`, then `./`, then
    /// the system library search path.
    pub pdfium_lib_path: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_rendered_pixels: 2000,
            concurrency: 4,
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.1,
            max_tokens: 4096,
            max_retries: 3,
            retry_backoff_ms: 500,
            system_prompt: None,
            pdfium_lib_path: None,
        }
    }
}

impl fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineConfig")
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("concurrency", &self.concurrency)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("pdfium_lib_path", &self.pdfium_lib_path)
            .finish()
    }
}

impl EngineConfig {
    /// Create a new builder for `EngineConfig`.
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`EngineConfig`].
#[derive(Debug)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<EngineConfig, Pdf2MdError> {
        let c = &self.config;
        if c.max_tokens == 0 {
            return Err(Pdf2MdError::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        if let Some(ref prompt) = c.system_prompt {
            if prompt.trim().is_empty() {
                return Err(Pdf2MdError::InvalidConfig(
                    "system prompt is empty".into(),
                ));
            }
        }
        Ok(self.config)
    }
}

/// Worker-side settings.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Address the worker RPC server binds to. Default: `0.0.0.0:9000`.
    pub bind: SocketAddr,
    /// Per-document conversion timeout. `None` disables it. Default: none.
    pub item_timeout_secs: Option<u64>,
    /// Document converted once at start-up to load engine assets.
    pub warm_up_sample: Option<PathBuf>,
    /// Largest accepted RPC request body. Default: 256 MiB.
    pub max_request_bytes: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 9000)),
            item_timeout_secs: None,
            warm_up_sample: None,
            max_request_bytes: 256 * 1024 * 1024,
        }
    }
}

/// Gateway-side settings.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Address the gateway binds to. Default: `0.0.0.0:8000`.
    pub bind: SocketAddr,
    /// Remote worker base URL. `None` runs an in-process worker.
    pub worker_url: Option<String>,
    /// Whole-batch timeout for remote dispatch. Default: 600 s.
    pub dispatch_timeout_secs: u64,
    /// Largest accepted upload. Default: 64 MiB.
    pub max_upload_bytes: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 8000)),
            worker_url: None,
            dispatch_timeout_secs: 600,
            max_upload_bytes: 64 * 1024 * 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_clamps_values() {
        let c = EngineConfig::builder()
            .concurrency(0)
            .temperature(9.0)
            .max_rendered_pixels(10)
            .build()
            .unwrap();
        assert_eq!(c.concurrency, 1);
        assert_eq!(c.temperature, 2.0);
        assert_eq!(c.max_rendered_pixels, 100);
    }

    #[test]
    fn builder_rejects_zero_tokens() {
        let err = EngineConfig::builder().max_tokens(0).build().unwrap_err();
        assert!(matches!(err, Pdf2MdError::InvalidConfig(_)));
    }

    #[test]
    fn builder_rejects_blank_prompt() {
        assert!(EngineConfig::builder().system_prompt("  ").build().is_err());
    }

    #[test]
    fn gateway_defaults() {
        let g = GatewayConfig::default();
        assert_eq!(g.bind.port(), 8000);
        assert_eq!(g.dispatch_timeout_secs, 600);
        assert!(g.worker_url.is_none());
    }

    #[test]
    fn debug_hides_provider() {
        let s = format!("{:?}", EngineConfig::default());
        assert!(s.contains("EngineConfig"));
        assert!(s.contains("provider: None"));
    }
}
