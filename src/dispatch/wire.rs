//! JSON bodies exchanged with a remote worker.
//!
//! Document bytes travel as standard base64 strings. Both enums are tagged
//! by `op`, so a request and its reply carry the same discriminator:
//!
//! ```json
//! {"op":"convert_batch","documents":["JVBERi0x…","JVBERi0x…"]}
//! {"op":"convert_batch","output":{"outcomes":[…],"stats":{…}}}
//! ```

use crate::dispatch::{ConversionJob, JobOutput};
use crate::error::Pdf2MdError;
use crate::output::BatchOutput;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};

/// Path of the job endpoint on a worker.
pub const SUBMIT_PATH: &str = "/rpc/submit";

/// Path of the health endpoint on a worker.
pub const HEALTH_PATH: &str = "/health";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum RpcRequest {
    ConvertOne { document: String },
    ConvertBatch { documents: Vec<String> },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum RpcResponse {
    ConvertOne { markdown: String },
    ConvertBatch { output: BatchOutput },
}

/// Error body shared by the worker RPC and the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Machine-readable kind, see [`crate::error::ErrorKind::as_str`].
    pub error: String,
    pub message: String,
}

impl From<&ConversionJob> for RpcRequest {
    fn from(job: &ConversionJob) -> Self {
        match job {
            ConversionJob::ConvertOne { document } => RpcRequest::ConvertOne {
                document: BASE64.encode(document),
            },
            ConversionJob::ConvertBatch { documents } => RpcRequest::ConvertBatch {
                documents: documents.iter().map(|d| BASE64.encode(d)).collect(),
            },
        }
    }
}

impl RpcRequest {
    /// Decode the base64 payload back into a job.
    ///
    /// # Errors
    /// [`Pdf2MdError::InvalidUpload`] naming the first undecodable entry.
    pub fn into_job(self) -> Result<ConversionJob, Pdf2MdError> {
        match self {
            RpcRequest::ConvertOne { document } => Ok(ConversionJob::ConvertOne {
                document: decode(&document, None)?,
            }),
            RpcRequest::ConvertBatch { documents } => {
                let documents = documents
                    .iter()
                    .enumerate()
                    .map(|(i, d)| decode(d, Some(i)))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(ConversionJob::ConvertBatch { documents })
            }
        }
    }
}

impl From<JobOutput> for RpcResponse {
    fn from(output: JobOutput) -> Self {
        match output {
            JobOutput::Markdown(markdown) => RpcResponse::ConvertOne { markdown },
            JobOutput::Batch(output) => RpcResponse::ConvertBatch { output },
        }
    }
}

impl From<RpcResponse> for JobOutput {
    fn from(response: RpcResponse) -> Self {
        match response {
            RpcResponse::ConvertOne { markdown } => JobOutput::Markdown(markdown),
            RpcResponse::ConvertBatch { output } => JobOutput::Batch(output),
        }
    }
}

fn decode(data: &str, index: Option<usize>) -> Result<Vec<u8>, Pdf2MdError> {
    BASE64.decode(data).map_err(|e| match index {
        Some(i) => Pdf2MdError::InvalidUpload(format!("documents[{}] is not base64: {}", i, e)),
        None => Pdf2MdError::InvalidUpload(format!("document is not base64: {}", e)),
    })
}
