//! The converter worker: one engine instance, created once, reused forever.
//!
//! ## Lifecycle
//!
//! ```text
//! Uninitialized ──initialize()──▶ Ready
//!       ▲              │
//!       └── on error ──┘
//! ```
//!
//! The transition is guarded by a [`tokio::sync::OnceCell`]: concurrent
//! first callers wait on the same initialisation and the factory runs once.
//! A failed initialisation leaves the cell empty so the next call retries.
//! `Ready` is terminal.
//!
//! ## Why a semaphore?
//!
//! Heavy engines are often unsafe for concurrent use. The engine declares
//! how many conversions it tolerates through
//! [`ConversionEngine::max_concurrency`] and every call takes a permit, so
//! single-document calls and batch items share one budget.

use crate::config::WorkerConfig;
use crate::engine::{ConversionEngine, EngineFactory};
use crate::error::{PageError, Pdf2MdError};
use crate::files::read_document;
use crate::output::{BatchOutput, PageOutcome};
use crate::progress::{NoopProgressCallback, ProgressCallback};
use crate::split::check_pdf_magic;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{OnceCell, Semaphore};
use tracing::{debug, info, warn};

/// Observable worker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    Uninitialized,
    Ready,
}

struct ReadyEngine {
    engine: Arc<dyn ConversionEngine>,
    gate: Semaphore,
}

/// Owns exactly one [`ConversionEngine`] for its whole lifetime.
pub struct ConverterWorker {
    factory: Arc<dyn EngineFactory>,
    ready: OnceCell<ReadyEngine>,
    item_timeout: Option<Duration>,
    progress: ProgressCallback,
}

impl ConverterWorker {
    /// A worker that builds its engine from `factory` on first use.
    pub fn new(factory: Arc<dyn EngineFactory>) -> Self {
        Self {
            factory,
            ready: OnceCell::new(),
            item_timeout: None,
            progress: Arc::new(NoopProgressCallback),
        }
    }

    /// A worker configured from [`WorkerConfig`].
    pub fn from_config(factory: Arc<dyn EngineFactory>, config: &WorkerConfig) -> Self {
        Self::new(factory).with_item_timeout(config.item_timeout_secs.map(Duration::from_secs))
    }

    /// Abort a single conversion that runs longer than `timeout`.
    pub fn with_item_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.item_timeout = timeout;
        self
    }

    /// Report batch progress to `callback`.
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = callback;
        self
    }

    pub fn state(&self) -> WorkerState {
        if self.ready.initialized() {
            WorkerState::Ready
        } else {
            WorkerState::Uninitialized
        }
    }

    /// Name of the engine this worker runs (or will run).
    pub fn engine_name(&self) -> &str {
        self.factory.engine_name()
    }

    /// Start-up hook: build the engine if it is not built yet.
    ///
    /// Idempotent. Concurrent callers share one factory invocation.
    ///
    /// # Errors
    /// [`Pdf2MdError::EngineInit`] when the factory fails; the worker stays
    /// `Uninitialized`.
    pub async fn initialize(&self) -> Result<(), Pdf2MdError> {
        self.ready().await.map(|_| ())
    }

    /// Build hook: initialise, then convert `sample` once so the engine's
    /// assets are loaded before the first real request.
    pub async fn warm_up(&self, sample: &Path) -> Result<(), Pdf2MdError> {
        self.initialize().await?;
        let bytes = read_document(sample).await?;
        let start = Instant::now();
        let markdown = self.convert_one(&bytes).await?;
        info!(
            "Warm-up converted {} ({} chars) in {}ms",
            sample.display(),
            markdown.len(),
            start.elapsed().as_millis()
        );
        Ok(())
    }

    /// Convert one complete PDF.
    ///
    /// # Errors
    /// * [`Pdf2MdError::NotAPdf`] when the bytes lack the `%PDF` marker
    /// * [`Pdf2MdError::EngineInit`] when lazy initialisation fails
    /// * whatever the engine returns, or [`Pdf2MdError::ConversionTimeout`]
    pub async fn convert_one(&self, document: &[u8]) -> Result<String, Pdf2MdError> {
        check_pdf_magic(document)?;
        let ready = self.ready().await?;
        self.run(ready, document).await
    }

    /// Convert every entry independently.
    ///
    /// `outcomes[i]` always describes `documents[i]`: a failing entry becomes
    /// [`PageOutcome::Failed`] in its own slot and its siblings still run.
    ///
    /// # Errors
    /// Only when the engine cannot be initialised. Per-entry failures never
    /// fail the batch.
    pub async fn convert_batch(&self, documents: Vec<Vec<u8>>) -> Result<BatchOutput, Pdf2MdError> {
        let start = Instant::now();
        let total = documents.len();
        if total == 0 {
            return Ok(BatchOutput::default());
        }

        let ready = self.ready().await?;
        self.progress.on_batch_start(total);
        info!("Batch started: {} documents", total);

        let outcomes: Vec<PageOutcome> =
            stream::iter((0..total).map(|index| {
                let documents = &documents;
                async move {
                    let doc = &documents[index];
                    self.progress.on_item_start(index, total);
                    let result = match check_pdf_magic(doc) {
                        Ok(()) => self.run(ready, doc).await,
                        Err(e) => Err(e),
                    };
                    match result {
                        Ok(markdown) => {
                            self.progress.on_item_complete(index, total, markdown.len());
                            PageOutcome::Converted { markdown }
                        }
                        Err(e) => {
                            warn!("Batch entry {} failed: {}", index, e);
                            self.progress.on_item_error(index, total, &e.to_string());
                            PageOutcome::Failed {
                                error: PageError::from_error(index, &e),
                            }
                        }
                    }
                }
            }))
            .buffered(ready.engine.max_concurrency().max(1))
            .collect()
            .await;

        let output = BatchOutput::from_outcomes(outcomes, start.elapsed().as_millis() as u64);
        self.progress.on_batch_complete(total, output.stats.converted);
        info!(
            "Batch complete: {}/{} converted, {}ms",
            output.stats.converted, output.stats.total, output.stats.duration_ms
        );
        Ok(output)
    }

    async fn ready(&self) -> Result<&ReadyEngine, Pdf2MdError> {
        self.ready
            .get_or_try_init(|| async {
                let name = self.factory.engine_name().to_string();
                info!("Initialising engine '{}'", name);
                let start = Instant::now();
                let engine = self.factory.create().await.map_err(|e| match e {
                    e @ Pdf2MdError::EngineInit { .. } => e,
                    e => Pdf2MdError::EngineInit {
                        engine: name.clone(),
                        detail: e.to_string(),
                    },
                })?;
                let permits = engine.max_concurrency().max(1);
                info!(
                    "Engine '{}' ready in {}ms ({} concurrent)",
                    name,
                    start.elapsed().as_millis(),
                    permits
                );
                Ok(ReadyEngine {
                    engine,
                    gate: Semaphore::new(permits),
                })
            })
            .await
    }

    async fn run(&self, ready: &ReadyEngine, document: &[u8]) -> Result<String, Pdf2MdError> {
        let _permit = ready
            .gate
            .acquire()
            .await
            .map_err(|e| Pdf2MdError::Internal(format!("engine gate closed: {}", e)))?;

        let start = Instant::now();
        let result = match self.item_timeout {
            Some(limit) => tokio::time::timeout(limit, ready.engine.convert(document))
                .await
                .map_err(|_| Pdf2MdError::ConversionTimeout {
                    secs: limit.as_secs(),
                })?,
            None => ready.engine.convert(document).await,
        };
        debug!(
            "Engine '{}' finished {} bytes in {}ms",
            ready.engine.name(),
            document.len(),
            start.elapsed().as_millis()
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::PrebuiltEngine;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Echoes a digest of the input; fails on documents containing `BROKEN`.
    struct EchoEngine;

    #[async_trait]
    impl ConversionEngine for EchoEngine {
        fn name(&self) -> &str {
            "echo"
        }

        async fn convert(&self, document: &[u8]) -> Result<String, Pdf2MdError> {
            let text = String::from_utf8_lossy(document);
            if text.contains("BROKEN") {
                return Err(Pdf2MdError::CorruptPdf {
                    detail: "unreadable xref".into(),
                });
            }
            Ok(format!("# {}", text.trim_start_matches("%PDF-1.7 ")))
        }
    }

    struct CountingFactory {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl EngineFactory for CountingFactory {
        fn engine_name(&self) -> &str {
            "echo"
        }

        async fn create(&self) -> Result<Arc<dyn ConversionEngine>, Pdf2MdError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            if self.fail {
                return Err(Pdf2MdError::Internal("model weights missing".into()));
            }
            Ok(Arc::new(EchoEngine))
        }
    }

    struct SlowEngine;

    #[async_trait]
    impl ConversionEngine for SlowEngine {
        fn name(&self) -> &str {
            "slow"
        }

        async fn convert(&self, _document: &[u8]) -> Result<String, Pdf2MdError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(String::new())
        }
    }

    fn echo_worker() -> ConverterWorker {
        ConverterWorker::new(Arc::new(PrebuiltEngine(Arc::new(EchoEngine))))
    }

    fn doc(label: &str) -> Vec<u8> {
        format!("%PDF-1.7 {label}").into_bytes()
    }

    #[tokio::test]
    async fn starts_uninitialized_and_becomes_ready() {
        let worker = echo_worker();
        assert_eq!(worker.state(), WorkerState::Uninitialized);
        worker.initialize().await.unwrap();
        assert_eq!(worker.state(), WorkerState::Ready);
        worker.initialize().await.unwrap();
        assert_eq!(worker.state(), WorkerState::Ready);
    }

    #[tokio::test]
    async fn empty_batch_is_empty() {
        let worker = echo_worker();
        let output = worker.convert_batch(Vec::new()).await.unwrap();
        assert!(output.outcomes.is_empty());
        assert_eq!(output.stats.total, 0);
    }

    #[tokio::test]
    async fn batch_preserves_order() {
        let worker = echo_worker();
        let docs = (1..=5).map(|i| doc(&format!("page {i}"))).collect();
        let output = worker.convert_batch(docs).await.unwrap();
        let markdown: Vec<_> = output
            .outcomes
            .iter()
            .map(|o| o.markdown().unwrap().to_string())
            .collect();
        assert_eq!(
            markdown,
            vec!["# page 1", "# page 2", "# page 3", "# page 4", "# page 5"]
        );
    }

    #[tokio::test]
    async fn corrupt_entry_fails_in_place() {
        let worker = echo_worker();
        let docs = vec![
            doc("a"),
            b"GIF89a".to_vec(),
            doc("c"),
            doc("BROKEN"),
            doc("e"),
        ];
        let output = worker.convert_batch(docs).await.unwrap();
        assert_eq!(output.outcomes.len(), 5);
        assert_eq!(output.outcomes[0].markdown(), Some("# a"));
        assert_eq!(output.outcomes[2].markdown(), Some("# c"));
        assert_eq!(output.outcomes[4].markdown(), Some("# e"));
        match &output.outcomes[1] {
            PageOutcome::Failed { error } => {
                assert!(matches!(error, PageError::Parse { index: 1, .. }))
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert!(!output.outcomes[3].is_converted());
        assert_eq!(output.failed_pages(), vec![2, 4]);
        assert_eq!(output.stats.converted, 3);
    }

    #[tokio::test]
    async fn convert_one_is_deterministic() {
        let worker = echo_worker();
        let a = worker.convert_one(&doc("same")).await.unwrap();
        let b = worker.convert_one(&doc("same")).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn convert_one_rejects_non_pdf() {
        let worker = echo_worker();
        let err = worker.convert_one(b"plain text").await.unwrap_err();
        assert!(matches!(err, Pdf2MdError::NotAPdf { .. }));
    }

    #[tokio::test]
    async fn concurrent_first_use_initialises_once() {
        let factory = Arc::new(CountingFactory {
            calls: AtomicUsize::new(0),
            fail: false,
        });
        let worker = Arc::new(ConverterWorker::new(factory.clone()));
        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let worker = Arc::clone(&worker);
                tokio::spawn(async move { worker.convert_one(&doc(&i.to_string())).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }
        assert_eq!(factory.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_init_stays_uninitialized_and_retries() {
        let factory = Arc::new(CountingFactory {
            calls: AtomicUsize::new(0),
            fail: true,
        });
        let worker = ConverterWorker::new(factory.clone());
        let err = worker.initialize().await.unwrap_err();
        assert!(matches!(err, Pdf2MdError::EngineInit { .. }), "got {err:?}");
        assert_eq!(worker.state(), WorkerState::Uninitialized);
        assert!(worker.initialize().await.is_err());
        assert_eq!(factory.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn item_timeout_fails_only_that_item() {
        let worker = ConverterWorker::new(Arc::new(PrebuiltEngine(Arc::new(SlowEngine))))
            .with_item_timeout(Some(Duration::from_millis(20)));
        let output = worker.convert_batch(vec![doc("x")]).await.unwrap();
        assert!(matches!(
            output.outcomes[0],
            PageOutcome::Failed {
                error: PageError::Timeout { index: 0, .. }
            }
        ));
    }

    #[tokio::test]
    async fn warm_up_reports_missing_sample() {
        let worker = echo_worker();
        let err = worker
            .warm_up(Path::new("/definitely/not/here.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, Pdf2MdError::FileNotFound { .. }));
        assert_eq!(worker.state(), WorkerState::Ready);
    }

    #[derive(Default)]
    struct Tally {
        completed: AtomicUsize,
        failed: AtomicUsize,
        converted_at_end: AtomicUsize,
    }

    impl crate::progress::BatchProgressCallback for Tally {
        fn on_item_complete(&self, _index: usize, _total: usize, _markdown_len: usize) {
            self.completed.fetch_add(1, Ordering::SeqCst);
        }

        fn on_item_error(&self, _index: usize, _total: usize, _error: &str) {
            self.failed.fetch_add(1, Ordering::SeqCst);
        }

        fn on_batch_complete(&self, _total: usize, converted: usize) {
            self.converted_at_end.store(converted, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn progress_callback_sees_every_entry() {
        let tally = Arc::new(Tally::default());
        let worker = echo_worker().with_progress(tally.clone());
        let docs = vec![doc("a"), b"not a pdf".to_vec(), doc("c")];
        worker.convert_batch(docs).await.unwrap();

        assert_eq!(tally.completed.load(Ordering::SeqCst), 2);
        assert_eq!(tally.failed.load(Ordering::SeqCst), 1);
        assert_eq!(tally.converted_at_end.load(Ordering::SeqCst), 2);
    }
}
