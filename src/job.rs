//! Job status records returned by the conversion service.
//!
//! The service reports a free-form `status` string (`received`, `loaded`,
//! `split`, `processing`, `completed`, `error`, …). Only two values are
//! terminal; everything else collapses into [`JobState::InProgress`].

use crate::error::MathpixError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// Lifecycle state of a conversion job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Queued, splitting, or processing pages.
    InProgress,
    /// All pages processed; outputs can be downloaded.
    Completed,
    /// The service gave up on the job.
    Error,
}

impl JobState {
    /// Map the service's `status` string to a state.
    pub fn from_status(status: &str) -> Self {
        match status {
            "completed" => JobState::Completed,
            "error" => JobState::Error,
            _ => JobState::InProgress,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobState::InProgress)
    }
}

/// One parsed status response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSnapshot {
    /// Raw `status` value as sent by the service.
    pub status: String,
    pub state: JobState,
    /// Completion percentage, clamped to 0–100.
    pub percent_done: f64,
    pub pages_completed: u32,
    pub total_pages: u32,
    /// Full response body, kept for error reporting.
    pub payload: Value,
}

impl JobSnapshot {
    /// Interpret a status response body.
    ///
    /// Missing progress fields default to zero; a missing `status` field is
    /// an [`MathpixError::InvalidResponse`].
    pub fn from_json(payload: Value) -> Result<Self, MathpixError> {
        let status = payload
            .get("status")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                MathpixError::InvalidResponse(format!("status response has no 'status' field: {payload}"))
            })?
            .to_string();

        let percent_done = payload
            .get("percent_done")
            .and_then(Value::as_f64)
            .unwrap_or(0.0)
            .clamp(0.0, 100.0);
        let count = |key: &str| {
            payload
                .get(key)
                .and_then(Value::as_u64)
                .map(|n| n.min(u32::MAX as u64) as u32)
                .unwrap_or(0)
        };
        let pages_completed = count("num_pages_completed");
        let total_pages = count("num_pages");

        Ok(Self {
            state: JobState::from_status(&status),
            status,
            percent_done,
            pages_completed,
            total_pages,
            payload,
        })
    }
}

/// A job tracked by the service, updated only through polling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionJob {
    pub id: String,
    pub state: JobState,
    pub percent_done: f64,
    pub pages_completed: u32,
    pub total_pages: u32,
    /// Number of status polls applied so far.
    pub polls: u32,
    /// Body of the most recent status response.
    pub last_payload: Value,
}

impl ConversionJob {
    /// A freshly submitted job with no status observed yet.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            state: JobState::InProgress,
            percent_done: 0.0,
            pages_completed: 0,
            total_pages: 0,
            polls: 0,
            last_payload: Value::Null,
        }
    }

    /// Apply a poll result and return the resulting state.
    ///
    /// Once a terminal state has been observed the job is frozen: later
    /// snapshots are ignored, so a job can never re-enter `InProgress`.
    pub fn observe(&mut self, snapshot: JobSnapshot) -> JobState {
        if self.state.is_terminal() {
            debug!(
                "Job {}: ignoring '{}' after terminal state {:?}",
                self.id, snapshot.status, self.state
            );
            return self.state;
        }
        self.polls += 1;
        self.state = snapshot.state;
        self.percent_done = snapshot.percent_done;
        self.pages_completed = snapshot.pages_completed;
        self.total_pages = snapshot.total_pages;
        self.last_payload = snapshot.payload;
        self.state
    }
}
