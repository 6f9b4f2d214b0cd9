//! Remote dispatch over the worker's JSON RPC.

use crate::dispatch::wire::{ErrorBody, RpcRequest, RpcResponse, HEALTH_PATH, SUBMIT_PATH};
use crate::dispatch::{ConversionJob, JobOutput, WorkDispatcher};
use crate::error::{ErrorKind, Pdf2MdError};
use async_trait::async_trait;
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Sends jobs to a worker process at `base_url`.
///
/// The whole request, upload and conversion included, must finish within
/// `timeout`; past that the job fails with
/// [`Pdf2MdError::TransportTimeout`].
#[derive(Debug, Clone)]
pub struct HttpDispatcher {
    client: Client,
    base_url: String,
    timeout_secs: u64,
}

impl HttpDispatcher {
    /// # Errors
    /// [`Pdf2MdError::InvalidConfig`] when `base_url` is not an http(s) URL
    /// or the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Result<Self, Pdf2MdError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(Pdf2MdError::InvalidConfig(format!(
                "worker URL must start with http:// or https://, got '{}'",
                base_url
            )));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| Pdf2MdError::InvalidConfig(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            timeout_secs,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch the worker's health document.
    pub async fn health(&self) -> Result<serde_json::Value, Pdf2MdError> {
        let endpoint = format!("{}{}", self.base_url, HEALTH_PATH);
        let response = self
            .client
            .get(&endpoint)
            .send()
            .await
            .map_err(|e| self.transport_error(&endpoint, e))?;
        if !response.status().is_success() {
            return Err(Pdf2MdError::RemoteStatus {
                status: response.status().as_u16(),
                message: "health check failed".into(),
            });
        }
        response
            .json()
            .await
            .map_err(|e| self.transport_error(&endpoint, e))
    }

    fn transport_error(&self, endpoint: &str, e: reqwest::Error) -> Pdf2MdError {
        if e.is_timeout() {
            Pdf2MdError::TransportTimeout {
                endpoint: endpoint.to_string(),
                secs: self.timeout_secs,
            }
        } else {
            Pdf2MdError::Transport {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            }
        }
    }
}

#[async_trait]
impl WorkDispatcher for HttpDispatcher {
    fn describe(&self) -> String {
        self.base_url.clone()
    }

    async fn submit(&self, job: ConversionJob) -> Result<JobOutput, Pdf2MdError> {
        let endpoint = format!("{}{}", self.base_url, SUBMIT_PATH);
        let start = Instant::now();
        debug!("Remote dispatch: {} → {}", job.op_name(), endpoint);

        let response = self
            .client
            .post(&endpoint)
            .json(&RpcRequest::from(&job))
            .send()
            .await
            .map_err(|e| self.transport_error(&endpoint, e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let (kind, message) = match serde_json::from_str::<ErrorBody>(&text) {
                Ok(body) => (ErrorKind::from_name(&body.error), body.message),
                Err(_) => (None, text),
            };
            warn!("Worker answered {} to {}: {}", status, job.op_name(), message);
            return Err(Pdf2MdError::from_remote(status.as_u16(), kind, message));
        }

        let reply: RpcResponse = response
            .json()
            .await
            .map_err(|e| self.transport_error(&endpoint, e))?;

        info!(
            "Worker finished {} in {}ms",
            job.op_name(),
            start.elapsed().as_millis()
        );
        Ok(reply.into())
    }
}
