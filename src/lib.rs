//! # mathpix-convert
//!
//! Submit a PDF to the Mathpix conversion API, wait for it to be processed,
//! and download the results as Mathpix Markdown, a zipped LaTeX project, and
//! HTML. Lecture notes and papers with heavy math are the intended input:
//! the service keeps equations as LaTeX instead of flattening them to text.
//!
//! ## Workflow
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Upload    multipart POST with options_json → job id
//!  ├─ 2. Poll      GET status every 2 s until completed / error / 600 s
//!  ├─ 3. Download  one GET per format into <output>/<timestamp>/
//!  └─ 4. Estimate  page count × tiered rate
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mathpix_convert::{ConversionOrchestrator, Credentials, ProcessorConfig};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // MATHPIX_APP_ID / MATHPIX_APP_KEY
//!     let credentials = Credentials::from_env()?;
//!     let orchestrator = ConversionOrchestrator::with_mathpix(credentials, ProcessorConfig::default())?;
//!     let request = orchestrator.request("lecture.pdf")?;
//!     let summary = orchestrator.run(&request, Path::new("processed_notes")).await?;
//!     for (format, path) in &summary.bundle.files {
//!         println!("{format}: {}", path.display());
//!     }
//!     if let Some(cost) = summary.cost {
//!         println!("Estimated cost: {cost}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `mathpix-convert` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! ## Pricing
//!
//! | Pages | $/page |
//! |-------|--------|
//! | ≤ 40 000 | 0.025 |
//! | > 40 000 | 0.01 (whole document) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod cost;
pub mod error;
pub mod input;
pub mod job;
pub mod orchestrator;
pub mod output;
pub mod progress;
pub mod service;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{Credentials, OutputFormat, ProcessingOptions, ProcessorConfig, ProcessorConfigBuilder};
pub use cost::{estimate_cost, CostEstimate};
pub use error::{DownloadError, MathpixError};
pub use input::ConversionRequest;
pub use job::{ConversionJob, JobSnapshot, JobState};
pub use orchestrator::ConversionOrchestrator;
pub use output::{OutputBundle, RunSummary, StageTimings};
pub use progress::{NoopProgressCallback, ProcessingProgressCallback, ProgressCallback};
pub use service::{ConversionService, MathpixService};
