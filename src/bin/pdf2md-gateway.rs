//! CLI binary for edgequake-pdf2md-gateway.
//!
//! A thin shim over the library crate: each subcommand maps its flags onto
//! the library config types and runs one of the services or a one-shot
//! conversion.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use pdf2md_gateway::{
    engine::postprocess::join_pages, files, gateway_router, rpc_router, server, split_pages,
    BatchProgressCallback, ConverterWorker, EngineConfig, GatewayConfig, HttpDispatcher,
    LocalDispatcher, VlmEngineFactory, WorkDispatcher, WorkerConfig, DEFAULT_SAMPLE_PDF,
};
use std::io::{self, Write};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Progress bar for `convert --per-page`. Items may finish out of order.
struct CliProgressCallback {
    bar: ProgressBar,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self {
            bar,
            errors: AtomicUsize::new(0),
        })
    }
}

impl BatchProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total: usize) {
        self.bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  \
                 [{bar:42.green/238}] {pos:>3}/{len} pages  \
                 ⏱ {elapsed_precise}  ETA {eta_precise}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  "),
        );
        self.bar.set_length(total as u64);
        self.bar.set_prefix("Converting");
        self.bar.reset_eta();
    }

    fn on_item_complete(&self, index: usize, total: usize, markdown_len: usize) {
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}",
            green("✓"),
            index + 1,
            total,
            dim(&format!("{markdown_len:>5} chars")),
        ));
        self.bar.inc(1);
    }

    fn on_item_error(&self, index: usize, total: usize, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        let first_line = error.lines().next().unwrap_or(error);
        let msg: String = if first_line.chars().count() > 80 {
            first_line.chars().take(79).chain(['…']).collect()
        } else {
            first_line.to_string()
        };
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}",
            red("✗"),
            index + 1,
            total,
            red(&msg),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total: usize, converted: usize) {
        self.bar.finish_and_clear();
        let failed = self.errors.load(Ordering::SeqCst);
        if failed == 0 {
            eprintln!("{} {} pages converted", green("✔"), bold(&converted.to_string()));
        } else {
            eprintln!(
                "{} {}/{} pages converted  ({} failed)",
                red("✘"),
                bold(&converted.to_string()),
                total,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Gateway with an in-process worker
  pdf2md-gateway serve --bind 0.0.0.0:8000

  # Worker process on a GPU box, warmed up with the sample document
  pdf2md-gateway worker --bind 0.0.0.0:9000 --warm-up ./test.pdf

  # Gateway forwarding to that worker
  pdf2md-gateway serve --worker-url http://gpu-box:9000

  # Upload a document
  curl -F file=@paper.pdf http://localhost:8000/convert

  # One-shot conversion (defaults to ./test.pdf)
  pdf2md-gateway convert paper.pdf -o paper.md
  pdf2md-gateway convert paper.pdf --per-page --worker-url http://gpu-box:9000

  # Split only
  pdf2md-gateway split paper.pdf -o pages/

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Path to libpdfium
  PDF2MD_WORKER_URL       Remote worker for `serve` and `convert`
  RUST_LOG                Log filter, e.g. info,tower_http=debug
"#;

/// Split PDFs into pages and convert them to Markdown through a worker.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2md-gateway",
    version,
    about = "PDF-to-Markdown gateway, worker and CLI",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "PDF2MD_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "PDF2MD_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP gateway (`POST /convert`).
    Serve(ServeArgs),
    /// Run a worker process exposing the RPC endpoint.
    Worker(WorkerArgs),
    /// Convert one PDF and print the Markdown.
    Convert(ConvertArgs),
    /// Split a PDF into single-page files.
    Split(SplitArgs),
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// Address to listen on.
    #[arg(long, env = "PDF2MD_GATEWAY_BIND", default_value = "0.0.0.0:8000")]
    bind: SocketAddr,

    /// Forward pages to this worker instead of converting in-process.
    #[arg(long, env = "PDF2MD_WORKER_URL")]
    worker_url: Option<String>,

    /// Seconds a remote worker may spend on one upload.
    #[arg(long, env = "PDF2MD_DISPATCH_TIMEOUT", default_value_t = 600)]
    dispatch_timeout: u64,

    /// Largest accepted upload in MiB.
    #[arg(long, env = "PDF2MD_MAX_UPLOAD_MB", default_value_t = 64)]
    max_upload_mb: usize,

    #[command(flatten)]
    local: LocalWorkerArgs,
}

#[derive(Args, Debug)]
struct WorkerArgs {
    /// Address to listen on.
    #[arg(long, env = "PDF2MD_WORKER_BIND", default_value = "0.0.0.0:9000")]
    bind: SocketAddr,

    /// Largest accepted RPC body in MiB.
    #[arg(long, env = "PDF2MD_MAX_REQUEST_MB", default_value_t = 256)]
    max_request_mb: usize,

    #[command(flatten)]
    local: LocalWorkerArgs,
}

/// Settings for a worker running in this process.
#[derive(Args, Debug)]
struct LocalWorkerArgs {
    /// Convert this document once at start-up. Without a value: ./test.pdf.
    #[arg(long, env = "PDF2MD_WARM_UP", num_args = 0..=1, default_missing_value = DEFAULT_SAMPLE_PDF)]
    warm_up: Option<PathBuf>,

    /// Per-document conversion timeout in seconds (0 disables).
    #[arg(long, env = "PDF2MD_ITEM_TIMEOUT", default_value_t = 600)]
    item_timeout: u64,

    #[command(flatten)]
    engine: EngineArgs,
}

#[derive(Args, Debug)]
struct ConvertArgs {
    /// PDF to convert.
    #[arg(default_value = DEFAULT_SAMPLE_PDF)]
    input: PathBuf,

    /// Write Markdown to this file instead of stdout.
    #[arg(short, long, env = "PDF2MD_OUTPUT")]
    output: Option<PathBuf>,

    /// Convert on this worker instead of in-process.
    #[arg(long, env = "PDF2MD_WORKER_URL")]
    worker_url: Option<String>,

    /// Split first and convert pages as a batch.
    #[arg(long)]
    per_page: bool,

    /// With --per-page: print the batch result as JSON.
    #[arg(long, requires = "per_page")]
    json: bool,

    /// Disable the progress bar.
    #[arg(long, env = "PDF2MD_NO_PROGRESS")]
    no_progress: bool,

    /// Seconds a remote worker may spend on the document.
    #[arg(long, env = "PDF2MD_DISPATCH_TIMEOUT", default_value_t = 600)]
    dispatch_timeout: u64,

    #[command(flatten)]
    engine: EngineArgs,
}

#[derive(Args, Debug)]
struct SplitArgs {
    /// PDF to split.
    input: PathBuf,

    /// Directory receiving page-0001.pdf, page-0002.pdf, …
    #[arg(short, long)]
    output: PathBuf,
}

/// Flags of the VLM engine.
#[derive(Args, Debug)]
struct EngineArgs {
    /// LLM model ID (e.g. gpt-4.1-nano, gpt-4.1, claude-sonnet-4-20250514).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Longest rendered page edge in pixels.
    #[arg(long, env = "PDF2MD_MAX_PIXELS", default_value_t = 2000)]
    max_pixels: u32,

    /// Concurrent VLM calls inside the engine.
    #[arg(short, long, env = "PDF2MD_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "PDF2MD_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Max LLM output tokens per page.
    #[arg(long, env = "PDF2MD_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// Retries per page on LLM failure.
    #[arg(long, env = "PDF2MD_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Path to a text file containing a custom system prompt.
    #[arg(long, env = "PDF2MD_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Path to libpdfium.
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs for interactive conversions.
    let interactive = matches!(
        &cli.command,
        Command::Convert(args) if args.per_page && !args.no_progress && !args.json
    );
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || interactive {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Serve(args) => run_serve(args).await,
        Command::Worker(args) => run_worker(args).await,
        Command::Convert(args) => run_convert(args, cli.quiet).await,
        Command::Split(args) => run_split(args, cli.quiet).await,
    }
}

async fn run_serve(args: ServeArgs) -> Result<()> {
    let config = GatewayConfig {
        bind: args.bind,
        worker_url: args.worker_url,
        dispatch_timeout_secs: args.dispatch_timeout,
        max_upload_bytes: args.max_upload_mb * 1024 * 1024,
    };

    let dispatcher: Arc<dyn WorkDispatcher> = match config.worker_url {
        Some(ref url) => {
            let remote = HttpDispatcher::new(url.as_str(), config.dispatch_timeout_secs)?;
            match remote.health().await {
                Ok(health) => info!("Worker at {} is up: {}", url, health),
                Err(e) => warn!("Worker at {} is not answering yet: {}", url, e),
            }
            Arc::new(remote)
        }
        None => {
            let worker = start_local_worker(&args.local, None).await?;
            Arc::new(LocalDispatcher::new(worker))
        }
    };

    info!("Gateway dispatching to {}", dispatcher.describe());
    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind))?;
    server::serve(listener, gateway_router(dispatcher, &config)).await?;
    Ok(())
}

async fn run_worker(args: WorkerArgs) -> Result<()> {
    let config = WorkerConfig {
        bind: args.bind,
        max_request_bytes: args.max_request_mb * 1024 * 1024,
        ..WorkerConfig::default()
    };
    let worker = start_local_worker(&args.local, None).await?;
    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind))?;
    server::serve(listener, rpc_router(worker, config.max_request_bytes)).await?;
    Ok(())
}

async fn run_convert(args: ConvertArgs, quiet: bool) -> Result<()> {
    let start = Instant::now();
    let bytes = files::read_document(&args.input).await?;

    let dispatcher: Arc<dyn WorkDispatcher> = match args.worker_url {
        Some(ref url) => Arc::new(HttpDispatcher::new(url.as_str(), args.dispatch_timeout)?),
        None => {
            let progress: Option<Arc<dyn BatchProgressCallback>> =
                if args.per_page && !args.no_progress && !args.json && !quiet {
                    Some(CliProgressCallback::new() as Arc<dyn BatchProgressCallback>)
                } else {
                    None
                };
            let local = LocalWorkerArgs {
                warm_up: None,
                item_timeout: 0,
                engine: args.engine,
            };
            Arc::new(LocalDispatcher::new(start_local_worker(&local, progress).await?))
        }
    };

    let markdown = if args.per_page {
        let pages = split_pages(bytes).await.context("Failed to split PDF")?;
        let output = dispatcher
            .convert_batch(pages)
            .await
            .context("Conversion failed")?;
        if args.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&output).context("Failed to serialise output")?
            );
            return Ok(());
        }
        join_pages(&output.into_markdown_list())
    } else {
        dispatcher
            .convert_one(bytes)
            .await
            .context("Conversion failed")?
    };

    match args.output {
        Some(ref path) => {
            files::write_atomic(path, markdown.as_bytes()).await?;
            if !quiet {
                eprintln!(
                    "{}  {}ms  →  {}",
                    green("✔"),
                    start.elapsed().as_millis(),
                    bold(&path.display().to_string())
                );
            }
        }
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(markdown.as_bytes())
                .context("Failed to write to stdout")?;
            if !markdown.ends_with('\n') {
                handle.write_all(b"\n").ok();
            }
        }
    }
    Ok(())
}

async fn run_split(args: SplitArgs, quiet: bool) -> Result<()> {
    let bytes = files::read_document(&args.input).await?;
    let pages = split_pages(bytes).await.context("Failed to split PDF")?;
    let written = files::write_pages(&args.output, &pages).await?;
    if !quiet {
        eprintln!(
            "{} {} pages → {}",
            green("✔"),
            bold(&written.len().to_string()),
            args.output.display()
        );
    }
    Ok(())
}

/// Build the engine config, create the worker and run the start-up hooks.
async fn start_local_worker(
    args: &LocalWorkerArgs,
    progress: Option<Arc<dyn BatchProgressCallback>>,
) -> Result<Arc<ConverterWorker>> {
    let engine = build_engine_config(&args.engine).await?;
    let config = WorkerConfig {
        item_timeout_secs: (args.item_timeout > 0).then_some(args.item_timeout),
        warm_up_sample: args.warm_up.clone(),
        ..WorkerConfig::default()
    };

    let mut worker = ConverterWorker::from_config(Arc::new(VlmEngineFactory::new(engine)), &config);
    if let Some(cb) = progress {
        worker = worker.with_progress(cb);
    }
    let worker = Arc::new(worker);

    worker
        .initialize()
        .await
        .context("Failed to start the conversion engine")?;
    if let Some(ref sample) = config.warm_up_sample {
        worker
            .warm_up(sample)
            .await
            .with_context(|| format!("Warm-up with {} failed", sample.display()))?;
    }
    Ok(worker)
}

/// Map CLI args to `EngineConfig`.
async fn build_engine_config(args: &EngineArgs) -> Result<EngineConfig> {
    let mut builder = EngineConfig::builder()
        .max_rendered_pixels(args.max_pixels)
        .concurrency(args.concurrency)
        .temperature(args.temperature)
        .max_tokens(args.max_tokens)
        .max_retries(args.max_retries);

    if let Some(ref model) = args.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = args.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(ref path) = args.pdfium_lib {
        builder = builder.pdfium_lib_path(path);
    }
    if let Some(ref path) = args.system_prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt from {:?}", path))?;
        builder = builder.system_prompt(prompt);
    }

    Ok(builder.build()?)
}
