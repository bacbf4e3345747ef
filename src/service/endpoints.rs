//! URL builders for the three service operations.
//!
//! Pure string formatting; no I/O and no validation beyond what
//! [`crate::config::ProcessorConfigBuilder::build`] already did on the base URL.

use crate::config::OutputFormat;

/// `POST` target for uploading a PDF.
pub fn submit_url(base: &str) -> String {
    format!("{}/pdf", base.trim_end_matches('/'))
}

/// `GET` target for polling a job.
pub fn status_url(base: &str, job_id: &str) -> String {
    format!("{}/pdf/{}", base.trim_end_matches('/'), job_id)
}

/// `GET` target for one converted output.
pub fn download_url(base: &str, job_id: &str, format: OutputFormat) -> String {
    format!(
        "{}/pdf/{}.{}",
        base.trim_end_matches('/'),
        job_id,
        format.extension()
    )
}
