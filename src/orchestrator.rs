//! The upload → poll → download workflow.
//!
//! ```text
//! Idle ─▶ Uploading ─▶ Polling ─▶ Downloading ─▶ Done
//!             │            │            │
//!             └────────────┴────────────┴──▶ Failed
//! ```
//!
//! Every step is awaited in turn; a fatal error from any step returns
//! immediately and no later step runs. Per-format download failures are the
//! one exception: they are recorded in the [`OutputBundle`] and the remaining
//! formats are still fetched.

use crate::config::{Credentials, OutputFormat, ProcessorConfig};
use crate::cost::CostEstimate;
use crate::error::{DownloadError, MathpixError};
use crate::input::{self, ConversionRequest};
use crate::job::{ConversionJob, JobState};
use crate::output::{OutputBundle, RunSummary, StageTimings};
use crate::service::{ConversionService, MathpixService};
use chrono::{DateTime, Local};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

/// `strftime` pattern for run directories and file names.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Upper bound on `_N` suffixes tried when a run directory already exists.
const MAX_DIR_SUFFIX: u32 = 1000;

/// Drives one PDF through the conversion service.
///
/// Holds the service as `Arc<dyn ConversionService>` so the same workflow
/// runs against [`MathpixService`] in production and scripted mocks in
/// tests.
pub struct ConversionOrchestrator {
    service: Arc<dyn ConversionService>,
    config: ProcessorConfig,
}

impl ConversionOrchestrator {
    pub fn new(service: Arc<dyn ConversionService>, config: ProcessorConfig) -> Self {
        Self { service, config }
    }

    /// Orchestrator backed by the real Mathpix HTTP API.
    pub fn with_mathpix(credentials: Credentials, config: ProcessorConfig) -> Result<Self, MathpixError> {
        let service = MathpixService::new(credentials, &config)?;
        Ok(Self::new(Arc::new(service), config))
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// Validate `pdf_path` into a request carrying the configured options.
    pub fn request(&self, pdf_path: impl AsRef<Path>) -> Result<ConversionRequest, MathpixError> {
        ConversionRequest::new(pdf_path, self.config.options.clone())
    }

    /// Upload the PDF and return the service's job id.
    pub async fn submit(&self, request: &ConversionRequest) -> Result<String, MathpixError> {
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_upload_start(request.pdf_path());
        }
        let job_id = self.service.submit(request).await?;
        info!("Submitted {} as job {}", request.pdf_path().display(), job_id);
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_job_submitted(&job_id);
        }
        Ok(job_id)
    }

    /// Poll `job_id` every `poll_interval` until it completes.
    ///
    /// The first poll is issued immediately. Progress is reported to the
    /// configured callback after every poll that finds the job still running.
    ///
    /// # Errors
    /// - [`MathpixError::ProcessingFailed`] as soon as the service reports `error`
    /// - [`MathpixError::Timeout`] once more than `timeout` has elapsed without
    ///   a terminal state, regardless of how much progress was reported
    pub async fn await_completion(
        &self,
        job_id: &str,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Result<ConversionJob, MathpixError> {
        let start = Instant::now();
        let mut job = ConversionJob::new(job_id);

        loop {
            if start.elapsed() > timeout {
                warn!(
                    "Job {}: no terminal state after {} polls ({:.0}% done)",
                    job_id, job.polls, job.percent_done
                );
                return Err(MathpixError::Timeout {
                    job_id: job_id.to_string(),
                    secs: timeout.as_secs(),
                });
            }

            let snapshot = self.service.status(job_id).await?;
            match job.observe(snapshot) {
                JobState::Completed => {
                    info!(
                        "Job {} completed after {} polls in {:.1}s",
                        job_id,
                        job.polls,
                        start.elapsed().as_secs_f64()
                    );
                    if let Some(ref cb) = self.config.progress_callback {
                        cb.on_processing_complete(job_id);
                    }
                    return Ok(job);
                }
                JobState::Error => {
                    return Err(MathpixError::ProcessingFailed {
                        job_id: job_id.to_string(),
                        payload: job.last_payload.to_string(),
                    });
                }
                JobState::InProgress => {}
            }

            if let Some(ref cb) = self.config.progress_callback {
                cb.on_progress(job.percent_done, job.pages_completed, job.total_pages);
            }
            sleep(poll_interval).await;
        }
    }

    /// Download `formats` into a fresh timestamped directory under `destination_dir`.
    ///
    /// The timestamp is taken when this call starts. A format whose download
    /// or write fails is logged and left out of the bundle; only failing to
    /// create the run directory is fatal.
    pub async fn fetch_outputs(
        &self,
        job_id: &str,
        formats: &[OutputFormat],
        destination_dir: &Path,
    ) -> Result<OutputBundle, MathpixError> {
        self.fetch_outputs_at(job_id, formats, destination_dir, Local::now())
            .await
    }

    /// [`Self::fetch_outputs`] with an explicit start time.
    pub async fn fetch_outputs_at(
        &self,
        job_id: &str,
        formats: &[OutputFormat],
        destination_dir: &Path,
        started_at: DateTime<Local>,
    ) -> Result<OutputBundle, MathpixError> {
        let timestamp = started_at.format(TIMESTAMP_FORMAT).to_string();
        let run_dir = create_run_dir(destination_dir, &timestamp).await?;
        info!("Downloading {} formats to {}", formats.len(), run_dir.display());

        let mut bundle = OutputBundle::new(run_dir.clone(), timestamp.clone());

        for &format in formats {
            let result = match self.service.download(job_id, format).await {
                Ok(bytes) => {
                    let path = run_dir.join(format!(
                        "{}_{}.{}",
                        self.config.file_prefix,
                        timestamp,
                        format.extension()
                    ));
                    match write_output(&path, &bytes).await {
                        Ok(()) => Ok((path, bytes.len())),
                        Err(e) => Err(DownloadError::Write {
                            format,
                            path,
                            detail: e.to_string(),
                        }),
                    }
                }
                Err(e) => Err(e),
            };

            match result {
                Ok((path, size)) => {
                    debug!("Saved {} ({} bytes) to {}", format, size, path.display());
                    if let Some(ref cb) = self.config.progress_callback {
                        cb.on_format_saved(format, &path, size);
                    }
                    bundle.files.insert(format, path);
                }
                Err(e) => {
                    warn!("Skipping {}", e);
                    if let Some(ref cb) = self.config.progress_callback {
                        cb.on_format_skipped(&e);
                    }
                    bundle.skipped.push(e);
                }
            }
        }

        Ok(bundle)
    }

    /// Run the whole workflow for one PDF and estimate its cost.
    ///
    /// Uses the poll interval, timeout and formats from the config. The page
    /// count comes from the local PDF; if lopdf cannot parse it the count
    /// reported by the service is used, and if neither is known the summary
    /// carries no estimate.
    pub async fn run(
        &self,
        request: &ConversionRequest,
        output_dir: &Path,
    ) -> Result<RunSummary, MathpixError> {
        let total_start = Instant::now();
        info!("Processing: {}", request.pdf_path().display());

        for format in &self.config.formats {
            if *format != OutputFormat::Mmd
                && !request.options().enabled_formats().any(|f| f == *format)
            {
                warn!(
                    "{} is not enabled in conversion_formats; its download will likely fail",
                    format
                );
            }
        }

        // ── Step 1: Upload ───────────────────────────────────────────────────
        let stage = Instant::now();
        let job_id = self.submit(request).await?;
        let upload_ms = stage.elapsed().as_millis() as u64;

        // ── Step 2: Poll ─────────────────────────────────────────────────────
        let stage = Instant::now();
        let job = self
            .await_completion(&job_id, self.config.poll_interval, self.config.timeout)
            .await?;
        let processing_ms = stage.elapsed().as_millis() as u64;

        // ── Step 3: Download ─────────────────────────────────────────────────
        let stage = Instant::now();
        let bundle = self
            .fetch_outputs(&job_id, &self.config.formats, output_dir)
            .await?;
        let download_ms = stage.elapsed().as_millis() as u64;

        // ── Step 4: Estimate cost ────────────────────────────────────────────
        let stage = Instant::now();
        let page_count = match input::page_count(request.pdf_path()).await {
            Ok(n) => Some(n),
            Err(e) => {
                warn!("{}", e);
                (job.total_pages > 0).then(|| {
                    debug!("Using page count reported by the service: {}", job.total_pages);
                    job.total_pages as usize
                })
            }
        };
        let cost = page_count.map(|n| CostEstimate::for_pages(n as i64));
        let inspect_ms = stage.elapsed().as_millis() as u64;

        let timings = StageTimings {
            upload_ms,
            processing_ms,
            download_ms,
            inspect_ms,
            total_ms: total_start.elapsed().as_millis() as u64,
        };
        info!(
            "Run complete: {}/{} formats saved, {}ms total",
            bundle.len(),
            self.config.formats.len(),
            timings.total_ms
        );

        Ok(RunSummary {
            pdf_path: request.pdf_path().to_path_buf(),
            job,
            bundle,
            page_count,
            cost,
            timings,
        })
    }
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Create `<destination>/<timestamp>`, or `<timestamp>_N` if that exists.
async fn create_run_dir(destination: &Path, timestamp: &str) -> Result<PathBuf, MathpixError> {
    tokio::fs::create_dir_all(destination)
        .await
        .map_err(|e| MathpixError::OutputWriteFailed {
            path: destination.to_path_buf(),
            source: e,
        })?;

    for n in 0..MAX_DIR_SUFFIX {
        let name = if n == 0 {
            timestamp.to_string()
        } else {
            format!("{timestamp}_{n}")
        };
        let candidate = destination.join(name);
        match tokio::fs::create_dir(&candidate).await {
            Ok(()) => return Ok(candidate),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                debug!("{} exists, trying next suffix", candidate.display());
            }
            Err(e) => {
                return Err(MathpixError::OutputWriteFailed {
                    path: candidate,
                    source: e,
                })
            }
        }
    }

    Err(MathpixError::Internal(format!(
        "could not find a free run directory for {timestamp} under {}",
        destination.display()
    )))
}

/// Write via a `.part` sibling and rename, so a crash never leaves a
/// truncated file under the final name.
async fn write_output(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut tmp: OsString = path.as_os_str().to_owned();
    tmp.push(".part");
    let tmp = PathBuf::from(tmp);
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await
}
