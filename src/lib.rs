//! # edgequake-pdf2md-gateway
//!
//! Serve a heavyweight PDF-to-Markdown engine behind a page-splitting HTTP
//! gateway.
//!
//! ## Why this crate?
//!
//! Conversion engines that read pages with a vision model are expensive to
//! load and slow per document. Running one per request wastes the load,
//! and sending a 300-page upload as a single job means one bad page sinks
//! the whole answer. This crate keeps exactly one engine per worker process
//! and feeds it single-page PDFs, so pages convert independently and a
//! failure costs one slot, never the document.
//!
//! ## Architecture
//!
//! ```text
//!  client ──POST /convert──▶ gateway ──split──▶ [page₁ … pageₙ]
//!                              │
//!                              ▼
//!                        WorkDispatcher ──(in-process or HTTP RPC)──▶ ConverterWorker
//!                              │                                          │
//!                              ◀────────────── BatchOutput ◀── engine ────┘
//!                              │
//!  client ◀── ["# p1", …, "# pn"]
//! ```
//!
//! * [`split`] — one multi-page PDF → ordered single-page PDFs (lopdf)
//! * [`worker`] — [`ConverterWorker`]: lifecycle and batch semantics
//! * [`engine`] — [`ConversionEngine`] trait and the pdfium + VLM engine
//! * [`dispatch`] — [`WorkDispatcher`] with local and HTTP transports
//! * [`server`] — axum routers for the gateway and the worker RPC
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf2md_gateway::{
//!     gateway_router, ConverterWorker, EngineConfig, GatewayConfig, LocalDispatcher,
//!     VlmEngineFactory,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let factory = VlmEngineFactory::new(EngineConfig::default());
//!     let worker = Arc::new(ConverterWorker::new(Arc::new(factory)));
//!     worker.initialize().await?;
//!
//!     let config = GatewayConfig::default();
//!     let app = gateway_router(Arc::new(LocalDispatcher::new(worker)), &config);
//!     let listener = tokio::net::TcpListener::bind(config.bind).await?;
//!     pdf2md_gateway::server::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2md-gateway` binary (clap + anyhow + indicatif + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod files;
pub mod output;
pub mod progress;
pub mod server;
pub mod split;
pub mod worker;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    EngineConfig, EngineConfigBuilder, GatewayConfig, WorkerConfig, DEFAULT_SAMPLE_PDF,
};
pub use dispatch::{ConversionJob, HttpDispatcher, JobOutput, LocalDispatcher, WorkDispatcher};
pub use engine::{ConversionEngine, EngineFactory, PrebuiltEngine, VlmEngine, VlmEngineFactory};
pub use error::{ErrorKind, PageError, Pdf2MdError};
pub use output::{BatchOutput, BatchStats, PageOutcome, FAILURE_MARKER_PREFIX};
pub use progress::{BatchProgressCallback, NoopProgressCallback, ProgressCallback};
pub use server::{gateway_router, rpc_router};
pub use split::{check_pdf_magic, page_count, split_pages, split_pages_blocking};
pub use worker::{ConverterWorker, WorkerState};
