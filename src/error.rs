//! Error types for the mathpix-convert library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`MathpixError`] — **Fatal**: the run cannot proceed at all (missing
//!   credentials, rejected upload, job error, timeout). Returned as
//!   `Err(MathpixError)` from the orchestrator and aborts every later step.
//!
//! * [`DownloadError`] — **Non-fatal**: a single output format could not be
//!   fetched or written, but the other formats are fine. Stored inside
//!   [`crate::output::OutputBundle`] so callers can inspect partial success
//!   instead of losing the whole run to one missing format.

use crate::config::OutputFormat;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the mathpix-convert library.
///
/// Per-format download failures use [`DownloadError`] and are stored in
/// [`crate::output::OutputBundle`] rather than propagated here.
#[derive(Debug, Error)]
pub enum MathpixError {
    // ── Configuration errors ──────────────────────────────────────────────
    /// `MATHPIX_APP_ID` or `MATHPIX_APP_KEY` is absent or empty.
    #[error(
        "Missing Mathpix credentials: {missing} is not set.\n\
Set MATHPIX_APP_ID and MATHPIX_APP_KEY in the environment or a .env file."
    )]
    MissingCredentials { missing: &'static str },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Input errors ──────────────────────────────────────────────────────
    /// No input path was supplied.
    #[error("Invalid input '{input}': expected a path to a PDF file")]
    InvalidInput { input: String },

    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    /// lopdf could not parse the document to count its pages.
    #[error("Could not read page count from '{path}': {detail}")]
    PdfInspection { path: PathBuf, detail: String },

    // ── Service errors ────────────────────────────────────────────────────
    /// The service rejected the credentials (HTTP 401/403).
    #[error("Authentication rejected by the conversion service (HTTP {status}): {body}")]
    AuthenticationFailed { status: u16, body: String },

    /// The upload request returned a non-success response.
    #[error("PDF processing failed (HTTP {status}): {body}")]
    UploadFailed { status: u16, body: String },

    /// A status request returned a non-success response.
    #[error("Status check for job '{job_id}' failed (HTTP {status}): {body}")]
    StatusCheckFailed {
        job_id: String,
        status: u16,
        body: String,
    },

    /// The service reported the job as errored.
    #[error("Processing error for job '{job_id}': {payload}")]
    ProcessingFailed { job_id: String, payload: String },

    /// The job did not reach a terminal state within the polling ceiling.
    #[error("PDF processing took too long: job '{job_id}' not finished after {secs}s\nIncrease --timeout.")]
    Timeout { job_id: String, secs: u64 },

    /// The service answered with a body we could not interpret.
    #[error("Unexpected response from the conversion service: {0}")]
    InvalidResponse(String),

    /// Transport-level failure (DNS, TLS, connection reset, request timeout).
    #[error("HTTP request to '{url}' failed: {reason}")]
    Http { url: String, reason: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create the output directory.
    #[error("Failed to write output '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single output format.
///
/// Stored in [`crate::output::OutputBundle::skipped`] when a download fails.
/// The run continues with the remaining formats.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum DownloadError {
    /// The download endpoint answered with a non-success status.
    #[error("{format}: download returned HTTP {status}")]
    HttpStatus { format: OutputFormat, status: u16 },

    /// The request never produced a response.
    #[error("{format}: download failed: {detail}")]
    Transport { format: OutputFormat, detail: String },

    /// The bytes arrived but could not be written to disk.
    #[error("{format}: could not write '{path}': {detail}")]
    Write {
        format: OutputFormat,
        path: PathBuf,
        detail: String,
    },
}

impl DownloadError {
    /// The format this failure belongs to.
    pub fn format(&self) -> OutputFormat {
        match self {
            DownloadError::HttpStatus { format, .. }
            | DownloadError::Transport { format, .. }
            | DownloadError::Write { format, .. } => *format,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_credentials_names_variable() {
        let e = MathpixError::MissingCredentials {
            missing: "MATHPIX_APP_KEY",
        };
        let msg = e.to_string();
        assert!(msg.contains("MATHPIX_APP_KEY"), "got: {msg}");
        assert!(msg.contains(".env"));
    }

    #[test]
    fn upload_failed_carries_body() {
        let e = MathpixError::UploadFailed {
            status: 400,
            body: "{\"error\":\"bad options\"}".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("400"));
        assert!(msg.contains("bad options"));
    }

    #[test]
    fn timeout_display() {
        let e = MathpixError::Timeout {
            job_id: "abc".into(),
            secs: 600,
        };
        assert!(e.to_string().contains("600s"));
        assert!(e.to_string().contains("abc"));
    }

    #[test]
    fn download_error_reports_format() {
        let e = DownloadError::HttpStatus {
            format: OutputFormat::TexZip,
            status: 404,
        };
        assert_eq!(e.format(), OutputFormat::TexZip);
        assert_eq!(e.to_string(), "tex.zip: download returned HTTP 404");
    }
}
