//! In-process dispatch: the worker shares the gateway's runtime.

use crate::dispatch::{ConversionJob, JobOutput, WorkDispatcher};
use crate::error::Pdf2MdError;
use crate::worker::ConverterWorker;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Runs jobs on a [`ConverterWorker`] owned by this process.
#[derive(Clone)]
pub struct LocalDispatcher {
    worker: Arc<ConverterWorker>,
}

impl LocalDispatcher {
    pub fn new(worker: Arc<ConverterWorker>) -> Self {
        Self { worker }
    }

    pub fn worker(&self) -> &Arc<ConverterWorker> {
        &self.worker
    }
}

#[async_trait]
impl WorkDispatcher for LocalDispatcher {
    fn describe(&self) -> String {
        format!("local:{}", self.worker.engine_name())
    }

    async fn submit(&self, job: ConversionJob) -> Result<JobOutput, Pdf2MdError> {
        debug!("Local dispatch: {}", job.op_name());
        match job {
            ConversionJob::ConvertOne { document } => {
                self.worker.convert_one(&document).await.map(JobOutput::Markdown)
            }
            ConversionJob::ConvertBatch { documents } => {
                self.worker.convert_batch(documents).await.map(JobOutput::Batch)
            }
        }
    }
}
