//! Result types produced by a conversion run.

use crate::config::OutputFormat;
use crate::cost::CostEstimate;
use crate::error::DownloadError;
use crate::job::ConversionJob;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Files written by [`crate::orchestrator::ConversionOrchestrator::fetch_outputs`].
///
/// `files` only ever contains formats that were written successfully; a
/// format that failed is absent there and listed in `skipped` instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputBundle {
    /// Timestamped directory holding this run's files.
    pub run_dir: PathBuf,
    /// Timestamp used for the directory and file names (`%Y%m%d_%H%M%S`).
    pub timestamp: String,
    /// Format → written file.
    pub files: BTreeMap<OutputFormat, PathBuf>,
    /// Formats that could not be downloaded or written.
    pub skipped: Vec<DownloadError>,
}

impl OutputBundle {
    pub(crate) fn new(run_dir: PathBuf, timestamp: String) -> Self {
        Self {
            run_dir,
            timestamp,
            files: BTreeMap::new(),
            skipped: Vec::new(),
        }
    }

    /// Path of a downloaded format, if it succeeded.
    pub fn get(&self, format: OutputFormat) -> Option<&Path> {
        self.files.get(&format).map(PathBuf::as_path)
    }

    pub fn contains(&self, format: OutputFormat) -> bool {
        self.files.contains_key(&format)
    }

    /// Number of formats written.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Wall-clock time spent in each stage of a run, in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTimings {
    pub upload_ms: u64,
    pub processing_ms: u64,
    pub download_ms: u64,
    pub inspect_ms: u64,
    pub total_ms: u64,
}

/// Everything a completed run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// Source PDF.
    pub pdf_path: PathBuf,
    /// Final job record (always in the completed state).
    pub job: ConversionJob,
    pub bundle: OutputBundle,
    /// Page count read locally; `None` if the PDF could not be parsed.
    pub page_count: Option<usize>,
    pub cost: Option<CostEstimate>,
    pub timings: StageTimings,
}
