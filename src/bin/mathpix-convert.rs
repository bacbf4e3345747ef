//! CLI binary for mathpix-convert.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ProcessorConfig`, runs one PDF through the service and prints where the
//! results landed.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use mathpix_convert::config::{DEFAULT_API_BASE_URL, DEFAULT_OUTPUT_DIR};
use mathpix_convert::{
    ConversionOrchestrator, ConversionRequest, Credentials, OutputFormat,
    ProcessingProgressCallback, ProcessorConfig, ProgressCallback, RunSummary,
};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a spinner while uploading, then a 0–100 %
/// bar fed by status polls, then one line per saved format.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Whether the bar has switched from spinner to percentage style.
    activated: AtomicBool,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(100);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            activated: AtomicBool::new(false),
        })
    }

    /// Switch to the percentage bar once the job exists.
    fn activate_bar(&self) {
        if self.activated.swap(true, Ordering::SeqCst) {
            return;
        }
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}%  {msg}  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_style(progress_style);
        self.bar.set_prefix("Processing PDF");
        self.bar.set_position(0);
        self.bar.reset_elapsed();
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProcessingProgressCallback for CliProgressCallback {
    fn on_upload_start(&self, pdf_path: &Path) {
        self.bar.set_prefix("Uploading");
        self.bar.set_message(pdf_path.display().to_string());
    }

    fn on_job_submitted(&self, job_id: &str) {
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Submitted as job {job_id}"))
        ));
        self.activate_bar();
    }

    fn on_progress(&self, percent: f64, pages_done: u32, total_pages: u32) {
        self.activate_bar();
        self.bar.set_position(percent.round() as u64);
        if total_pages > 0 {
            self.bar.set_message(format!("{pages_done}/{total_pages} pages"));
        }
    }

    fn on_processing_complete(&self, _job_id: &str) {
        self.bar.set_position(100);
        self.bar.println(format!("{} Processing finished", green("✓")));
        self.bar.set_prefix("Downloading");
        self.bar.set_message("");
    }

    fn on_format_saved(&self, format: OutputFormat, path: &Path, bytes: usize) {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.bar.println(format!(
            "  {} {:<8} {}  {}",
            green("✓"),
            format.extension(),
            name,
            dim(&format!("{bytes} bytes")),
        ));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert lecture notes into ./processed_notes/<timestamp>/
  mathpix-convert --pdf lecture.pdf

  # Custom output directory, with per-stage timings
  mathpix-convert --pdf lecture.pdf --output notes --profile

  # Only Markdown and HTML
  mathpix-convert --pdf paper.pdf --formats mmd,html

  # Machine-readable summary
  mathpix-convert --pdf paper.pdf --json > summary.json

FORMATS:
  mmd       Mathpix Markdown (always available)
  md        Markdown
  docx      Word document
  tex.zip   LaTeX with images
  html      HTML rendering

PRICING (estimate):
  ≤ 40,000 pages   $0.025 / page
  > 40,000 pages   $0.01  / page

ENVIRONMENT VARIABLES:
  MATHPIX_APP_ID    Mathpix application id  (required)
  MATHPIX_APP_KEY   Mathpix application key (required)
  RUST_LOG          Log filter, e.g. mathpix_convert=debug

  Variables may also be placed in a .env file in the working directory.
"#;

/// Convert PDFs with the Mathpix API.
#[derive(Parser, Debug)]
#[command(
    name = "mathpix-convert",
    version,
    about = "Process lecture notes and papers with the Mathpix PDF API",
    long_about = "Upload a PDF to Mathpix, wait for processing, and download the converted \
Markdown, LaTeX and HTML into a timestamped directory. Prints an estimated processing cost.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Path to the PDF file.
    #[arg(long, env = "MATHPIX_PDF", default_value = "")]
    pdf: String,

    /// Output directory; each run writes into a new timestamped subdirectory.
    #[arg(long, env = "MATHPIX_OUTPUT_DIR", default_value = DEFAULT_OUTPUT_DIR)]
    output: PathBuf,

    /// Print per-stage timings after the run.
    #[arg(long, env = "MATHPIX_PROFILE")]
    profile: bool,

    /// Formats to download, comma-separated.
    #[arg(long, env = "MATHPIX_FORMATS", value_delimiter = ',', default_value = "mmd,tex.zip,html")]
    formats: Vec<OutputFormat>,

    /// Seconds between status checks.
    #[arg(long, env = "MATHPIX_POLL_INTERVAL", default_value_t = 2,
          value_parser = clap::value_parser!(u64).range(1..))]
    poll_interval: u64,

    /// Maximum processing time in seconds before giving up.
    #[arg(long, env = "MATHPIX_TIMEOUT", default_value_t = 600,
          value_parser = clap::value_parser!(u64).range(1..))]
    timeout: u64,

    /// Per-HTTP-request timeout in seconds.
    #[arg(long, env = "MATHPIX_REQUEST_TIMEOUT", default_value_t = 120,
          value_parser = clap::value_parser!(u64).range(1..))]
    request_timeout: u64,

    /// API base URL.
    #[arg(long, env = "MATHPIX_API_URL", default_value = DEFAULT_API_BASE_URL)]
    api_url: String,

    /// Output the run summary as JSON on stdout.
    #[arg(long, env = "MATHPIX_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "MATHPIX_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "MATHPIX_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "MATHPIX_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env must be loaded before clap reads its `env` fallbacks.
    let dotenv_result = dotenv::dotenv();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
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

    match dotenv_result {
        Ok(path) => info!("Loaded environment from: {}", path.display()),
        Err(e) if e.not_found() => info!("No .env file found"),
        Err(e) => warn!("Error loading .env file: {}", e),
    }

    tokio::select! {
        result = run(cli, show_progress) => result,
        _ = tokio::signal::ctrl_c() => {
            warn!("Received interrupt signal, exiting");
            std::process::exit(130);
        }
    }
}

async fn run(cli: Cli, show_progress: bool) -> Result<()> {
    let credentials = Credentials::from_env().context("Cannot start without Mathpix credentials")?;

    let mut config = build_config(&cli)?;

    let request = ConversionRequest::new(&cli.pdf, config.options.clone())
        .with_context(|| format!("Cannot process '{}'", cli.pdf))?;

    if !cli.quiet && !cli.json {
        eprintln!("\nProcessing: {}", request.pdf_path().display());
    }

    // Created only now so validation errors above never print under a live spinner.
    let progress = show_progress.then(CliProgressCallback::new);
    config.progress_callback = progress.clone().map(|cb| cb as ProgressCallback);

    let orchestrator = ConversionOrchestrator::with_mathpix(credentials, config)
        .context("Failed to initialise the Mathpix client")?;
    let result = orchestrator.run(&request, &cli.output).await;

    if let Some(ref cb) = progress {
        cb.finish();
    }
    let summary = result.context("Process failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&summary).context("Failed to serialise summary")?;
        println!("{json}");
    } else if !cli.quiet {
        print_summary(&summary);
    }

    if cli.profile && !cli.json {
        print_profile(&summary);
    }

    Ok(())
}

/// Map CLI args to `ProcessorConfig`.
fn build_config(cli: &Cli) -> Result<ProcessorConfig> {
    ProcessorConfig::builder()
        .api_base_url(&cli.api_url)
        .formats(cli.formats.clone())
        .poll_interval(Duration::from_secs(cli.poll_interval))
        .timeout(Duration::from_secs(cli.timeout))
        .request_timeout(Duration::from_secs(cli.request_timeout))
        .build()
        .context("Invalid configuration")
}

fn print_summary(summary: &RunSummary) {
    println!("\n{}", bold("Processing complete!"));
    println!(
        "\nProcessed files location: {}",
        summary.bundle.run_dir.display()
    );
    for (format, path) in &summary.bundle.files {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        println!("- {} ({}): {}", format, format.description(), name);
    }
    match summary.cost {
        Some(cost) => println!("\nEstimated cost: {cost}"),
        None => println!("\nEstimated cost: unavailable (page count unknown)"),
    }
}

fn print_profile(summary: &RunSummary) {
    let t = &summary.timings;
    eprintln!("\n{}", bold("Timings"));
    eprintln!("  upload       {:>8} ms", t.upload_ms);
    eprintln!(
        "  processing   {:>8} ms  {}",
        t.processing_ms,
        dim(&format!("({} polls)", summary.job.polls))
    );
    eprintln!("  download     {:>8} ms", t.download_ms);
    eprintln!("  page count   {:>8} ms", t.inspect_ms);
    eprintln!("  total        {:>8} ms", t.total_ms);
}
