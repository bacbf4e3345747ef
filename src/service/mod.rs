//! The external conversion service, seen from the orchestrator.
//!
//! [`ConversionService`] is the seam between workflow and transport: the
//! orchestrator only knows "submit", "status" and "download", and holds the
//! service as `Arc<dyn ConversionService>`. [`MathpixService`] is the real
//! reqwest-backed implementation; tests substitute scripted mocks.
//!
//! ```text
//! submit   POST {base}/pdf              multipart: file + options_json
//! status   GET  {base}/pdf/{id}         → JSON status record
//! download GET  {base}/pdf/{id}.{ext}   → raw bytes
//! ```

pub mod endpoints;
mod http;

pub use http::MathpixService;

use crate::config::OutputFormat;
use crate::error::{DownloadError, MathpixError};
use crate::input::ConversionRequest;
use crate::job::JobSnapshot;
use async_trait::async_trait;

/// The three logical operations of the remote conversion API.
///
/// Implementations must be `Send + Sync`; the orchestrator stores them
/// behind an `Arc` and may be shared across tasks by library users.
#[async_trait]
pub trait ConversionService: Send + Sync {
    /// Upload the PDF with its options and return the job id.
    ///
    /// # Errors
    /// [`MathpixError::AuthenticationFailed`] when credentials are rejected,
    /// [`MathpixError::UploadFailed`] for any other non-success response.
    async fn submit(&self, request: &ConversionRequest) -> Result<String, MathpixError>;

    /// Fetch the current status of a job.
    async fn status(&self, job_id: &str) -> Result<JobSnapshot, MathpixError>;

    /// Download one converted output.
    ///
    /// Failures are per-format and non-fatal, hence [`DownloadError`].
    async fn download(&self, job_id: &str, format: OutputFormat) -> Result<Vec<u8>, DownloadError>;
}
