//! reqwest-backed [`ConversionService`] talking to the Mathpix v3 API.

use super::{endpoints, ConversionService};
use crate::config::{Credentials, OutputFormat, ProcessorConfig};
use crate::error::{DownloadError, MathpixError};
use crate::input::ConversionRequest;
use crate::job::JobSnapshot;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, StatusCode};
use serde::Deserialize;
use tracing::{debug, info};

/// HTTP client for the Mathpix PDF endpoints.
///
/// Every request carries the `app_id` / `app_key` headers. One
/// `reqwest::Client` is reused for the whole run so the TLS connection to the
/// API host is kept alive between polls.
pub struct MathpixService {
    client: reqwest::Client,
    credentials: Credentials,
    base_url: String,
}

impl MathpixService {
    /// Build a client for `config.api_base_url` with `config.request_timeout`.
    pub fn new(credentials: Credentials, config: &ProcessorConfig) -> Result<Self, MathpixError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| MathpixError::Internal(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            credentials,
            base_url: config.api_base_url.clone(),
        })
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("app_id", self.credentials.app_id())
            .header("app_key", self.credentials.app_key())
    }
}

#[async_trait]
impl ConversionService for MathpixService {
    async fn submit(&self, request: &ConversionRequest) -> Result<String, MathpixError> {
        let url = endpoints::submit_url(&self.base_url);
        let path = request.pdf_path();

        let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::PermissionDenied => MathpixError::PermissionDenied {
                path: path.to_path_buf(),
            },
            _ => MathpixError::FileNotFound {
                path: path.to_path_buf(),
            },
        })?;
        let size = bytes.len();

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload.pdf".to_string());
        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("application/pdf")
            .map_err(|e| MathpixError::Internal(format!("multipart: {e}")))?;
        let form = Form::new()
            .part("file", part)
            .text("options_json", request.options().to_json()?);

        info!("Uploading {} ({} bytes) to {}", path.display(), size, url);
        let response = self
            .authed(self.client.post(&url))
            .multipart(form)
            .send()
            .await
            .map_err(|e| transport_error(&url, e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| transport_error(&url, e))?;
        parse_submit_response(status, &body)
    }

    async fn status(&self, job_id: &str) -> Result<JobSnapshot, MathpixError> {
        let url = endpoints::status_url(&self.base_url, job_id);
        let response = self
            .authed(self.client.get(&url))
            .send()
            .await
            .map_err(|e| transport_error(&url, e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| transport_error(&url, e))?;
        let snapshot = parse_status_response(job_id, status, body)?;
        debug!(
            "Job {}: status '{}' {:.1}% ({}/{} pages)",
            job_id, snapshot.status, snapshot.percent_done, snapshot.pages_completed, snapshot.total_pages
        );
        Ok(snapshot)
    }

    async fn download(&self, job_id: &str, format: OutputFormat) -> Result<Vec<u8>, DownloadError> {
        let url = endpoints::download_url(&self.base_url, job_id, format);
        let response = self
            .authed(self.client.get(&url))
            .send()
            .await
            .map_err(|e| DownloadError::Transport {
                format,
                detail: e.to_string(),
            })?;

        check_download_status(format, response.status())?;

        let bytes = response.bytes().await.map_err(|e| DownloadError::Transport {
            format,
            detail: e.to_string(),
        })?;
        debug!("Job {}: downloaded {} ({} bytes)", job_id, format, bytes.len());
        Ok(bytes.to_vec())
    }
}

#[derive(Deserialize)]
struct SubmitResponse {
    pdf_id: Option<String>,
    error: Option<serde_json::Value>,
}

/// Turn the upload response into a job id or a typed error.
fn parse_submit_response(status: StatusCode, body: &str) -> Result<String, MathpixError> {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(MathpixError::AuthenticationFailed {
            status: status.as_u16(),
            body: body.to_string(),
        });
    }
    if !status.is_success() {
        return Err(MathpixError::UploadFailed {
            status: status.as_u16(),
            body: body.to_string(),
        });
    }

    let parsed: SubmitResponse = serde_json::from_str(body)
        .map_err(|e| MathpixError::InvalidResponse(format!("upload body is not JSON ({e}): {body}")))?;

    match parsed {
        SubmitResponse {
            pdf_id: Some(id), ..
        } if !id.is_empty() => Ok(id),
        SubmitResponse { error: Some(_), .. } => Err(MathpixError::UploadFailed {
            status: status.as_u16(),
            body: body.to_string(),
        }),
        _ => Err(MathpixError::InvalidResponse(format!(
            "upload response has no 'pdf_id': {body}"
        ))),
    }
}

/// Turn a status-check response into a snapshot or a typed error.
fn parse_status_response(
    job_id: &str,
    status: StatusCode,
    body: String,
) -> Result<JobSnapshot, MathpixError> {
    if !status.is_success() {
        return Err(MathpixError::StatusCheckFailed {
            job_id: job_id.to_string(),
            status: status.as_u16(),
            body,
        });
    }
    let payload: serde_json::Value = serde_json::from_str(&body)
        .map_err(|e| MathpixError::InvalidResponse(format!("status body is not JSON ({e}): {body}")))?;
    JobSnapshot::from_json(payload)
}

/// Only an exact 200 counts; 202/204 mean the conversion is not ready.
fn check_download_status(format: OutputFormat, status: StatusCode) -> Result<(), DownloadError> {
    if status == StatusCode::OK {
        Ok(())
    } else {
        Err(DownloadError::HttpStatus {
            format,
            status: status.as_u16(),
        })
    }
}

fn transport_error(url: &str, e: reqwest::Error) -> MathpixError {
    let reason = if e.is_timeout() {
        format!("request timed out ({e})")
    } else {
        e.to_string()
    };
    MathpixError::Http {
        url: url.to_string(),
        reason,
    }
}
