//! The seam between the gateway and a converter worker.
//!
//! The gateway never calls a [`ConverterWorker`](crate::worker::ConverterWorker)
//! directly. It hands a [`ConversionJob`] to a [`WorkDispatcher`] and awaits
//! the [`JobOutput`]. Two transports ship:
//!
//! * [`LocalDispatcher`] — the worker lives in the same process
//! * [`HttpDispatcher`] — the worker is a separate process reached over the
//!   JSON RPC served by [`crate::server::rpc`]
//!
//! Dropping the future returned by [`WorkDispatcher::submit`] cancels the
//! job as far as the transport allows.

pub mod local;
pub mod remote;
pub mod wire;

use crate::error::Pdf2MdError;
use crate::output::BatchOutput;
use async_trait::async_trait;

pub use local::LocalDispatcher;
pub use remote::HttpDispatcher;

/// Work a dispatcher can run on a worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionJob {
    /// Convert one complete PDF.
    ConvertOne { document: Vec<u8> },
    /// Convert every entry independently, preserving positions.
    ConvertBatch { documents: Vec<Vec<u8>> },
}

impl ConversionJob {
    pub fn op_name(&self) -> &'static str {
        match self {
            ConversionJob::ConvertOne { .. } => "convert_one",
            ConversionJob::ConvertBatch { .. } => "convert_batch",
        }
    }
}

/// Result of a [`ConversionJob`]; the variant mirrors the job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutput {
    Markdown(String),
    Batch(BatchOutput),
}

/// Runs conversion jobs on some worker.
#[async_trait]
pub trait WorkDispatcher: Send + Sync {
    /// Human-readable target, e.g. `local:vlm` or a worker URL.
    fn describe(&self) -> String;

    /// Run `job` and wait for its result.
    async fn submit(&self, job: ConversionJob) -> Result<JobOutput, Pdf2MdError>;

    /// Submit a [`ConversionJob::ConvertOne`].
    async fn convert_one(&self, document: Vec<u8>) -> Result<String, Pdf2MdError> {
        match self.submit(ConversionJob::ConvertOne { document }).await? {
            JobOutput::Markdown(markdown) => Ok(markdown),
            JobOutput::Batch(_) => Err(mismatched("convert_one", "batch")),
        }
    }

    /// Submit a [`ConversionJob::ConvertBatch`].
    async fn convert_batch(&self, documents: Vec<Vec<u8>>) -> Result<BatchOutput, Pdf2MdError> {
        match self.submit(ConversionJob::ConvertBatch { documents }).await? {
            JobOutput::Batch(output) => Ok(output),
            JobOutput::Markdown(_) => Err(mismatched("convert_batch", "markdown")),
        }
    }
}

fn mismatched(op: &str, got: &str) -> Pdf2MdError {
    Pdf2MdError::Internal(format!("worker answered {} job with a {} result", op, got))
}
