//! VLM call for one rendered page, with retry and exponential backoff.
//!
//! The wait before retry `n` is `retry_backoff_ms * 2^(n-1)`; with the
//! defaults that is 500 ms → 1 s → 2 s.

use crate::config::EngineConfig;
use crate::engine::prompts::{DEFAULT_SYSTEM_PROMPT, PAGE_INSTRUCTION};
use crate::error::Pdf2MdError;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, Duration};
use tracing::{debug, warn};

/// Ask the VLM to transcribe one page image.
///
/// `page_num` is 1-based and only used for logging and error text.
pub async fn transcribe_page(
    provider: &Arc<dyn LLMProvider>,
    page_num: usize,
    image: ImageData,
    config: &EngineConfig,
) -> Result<String, Pdf2MdError> {
    let start = Instant::now();
    let system_prompt = config
        .system_prompt
        .as_deref()
        .unwrap_or(DEFAULT_SYSTEM_PROMPT);

    let messages = vec![
        ChatMessage::system(system_prompt),
        ChatMessage::user_with_images(PAGE_INSTRUCTION, vec![image]),
    ];
    let options = build_options(config);

    let mut last_err = String::from("no attempt made");
    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let backoff = backoff_ms(config.retry_backoff_ms, attempt);
            warn!(
                "Page {}: retry {}/{} after {}ms",
                page_num, attempt, config.max_retries, backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        match provider.chat(&messages, Some(&options)).await {
            Ok(response) => {
                debug!(
                    "Page {}: {} input tokens, {} output tokens, {:?}",
                    page_num,
                    response.prompt_tokens,
                    response.completion_tokens,
                    start.elapsed()
                );
                return Ok(response.content);
            }
            Err(e) => {
                last_err = e.to_string();
                warn!("Page {}: attempt {} failed: {}", page_num, attempt + 1, last_err);
            }
        }
    }

    Err(Pdf2MdError::Conversion {
        detail: format!(
            "page {}: VLM call failed after {} retries: {}",
            page_num, config.max_retries, last_err
        ),
    })
}

fn backoff_ms(base: u64, attempt: u32) -> u64 {
    base.saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)))
}

fn build_options(config: &EngineConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}
