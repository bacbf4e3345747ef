//! Workflow tests for `ConversionOrchestrator` against a scripted service.
//!
//! No network: `MockService` replays canned status payloads and download
//! results. Polling tests run on tokio's paused clock, so a 600 s timeout
//! elapses instantly and deterministically.

use async_trait::async_trait;
use chrono::{Local, TimeZone};
use lopdf::{dictionary, Document, Object};
use mathpix_convert::{
    ConversionOrchestrator, ConversionRequest, ConversionService, DownloadError, JobSnapshot,
    MathpixError, OutputFormat, ProcessingOptions, ProcessingProgressCallback, ProcessorConfig,
};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

// ── Test helpers ─────────────────────────────────────────────────────────────

enum SubmitBehaviour {
    Accept(&'static str),
    Unauthorized,
}

struct MockService {
    submit: SubmitBehaviour,
    /// Replayed in order; the last entry repeats forever.
    statuses: Mutex<VecDeque<Value>>,
    failing_formats: Vec<OutputFormat>,
    submits: AtomicUsize,
    uploaded_options: Mutex<Vec<ProcessingOptions>>,
    polls: AtomicUsize,
    downloads: Mutex<Vec<OutputFormat>>,
}

impl MockService {
    fn new(statuses: Vec<Value>) -> Self {
        Self {
            submit: SubmitBehaviour::Accept("job-42"),
            statuses: Mutex::new(statuses.into()),
            failing_formats: Vec::new(),
            submits: AtomicUsize::new(0),
            uploaded_options: Mutex::new(Vec::new()),
            polls: AtomicUsize::new(0),
            downloads: Mutex::new(Vec::new()),
        }
    }

    fn failing(mut self, formats: &[OutputFormat]) -> Self {
        self.failing_formats = formats.to_vec();
        self
    }

    fn rejecting_credentials(mut self) -> Self {
        self.submit = SubmitBehaviour::Unauthorized;
        self
    }

    fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConversionService for MockService {
    async fn submit(&self, request: &ConversionRequest) -> Result<String, MathpixError> {
        self.submits.fetch_add(1, Ordering::SeqCst);
        self.uploaded_options
            .lock()
            .unwrap()
            .push(request.options().clone());
        match self.submit {
            SubmitBehaviour::Accept(id) => Ok(id.to_string()),
            SubmitBehaviour::Unauthorized => Err(MathpixError::AuthenticationFailed {
                status: 401,
                body: r#"{"error":"Invalid credentials"}"#.to_string(),
            }),
        }
    }

    async fn status(&self, _job_id: &str) -> Result<JobSnapshot, MathpixError> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        let mut statuses = self.statuses.lock().unwrap();
        let next = if statuses.len() > 1 {
            statuses.pop_front().unwrap()
        } else {
            statuses.front().cloned().unwrap()
        };
        JobSnapshot::from_json(next)
    }

    async fn download(&self, job_id: &str, format: OutputFormat) -> Result<Vec<u8>, DownloadError> {
        self.downloads.lock().unwrap().push(format);
        if self.failing_formats.contains(&format) {
            return Err(DownloadError::HttpStatus { format, status: 404 });
        }
        Ok(format!("{job_id} as {format}").into_bytes())
    }
}

#[derive(Default)]
struct RecordingCallback {
    progress: Mutex<Vec<(f64, u32, u32)>>,
    completed: AtomicUsize,
    skipped: AtomicUsize,
}

impl ProcessingProgressCallback for RecordingCallback {
    fn on_progress(&self, percent: f64, pages_done: u32, total_pages: u32) {
        self.progress
            .lock()
            .unwrap()
            .push((percent, pages_done, total_pages));
    }

    fn on_processing_complete(&self, _job_id: &str) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }

    fn on_format_skipped(&self, _error: &DownloadError) {
        self.skipped.fetch_add(1, Ordering::SeqCst);
    }
}

const ALL_THREE: [OutputFormat; 3] = [OutputFormat::Mmd, OutputFormat::TexZip, OutputFormat::Html];

fn orchestrator(service: Arc<MockService>) -> ConversionOrchestrator {
    ConversionOrchestrator::new(service, ProcessorConfig::default())
}

fn orchestrator_with_callback(
    service: Arc<MockService>,
    cb: Arc<RecordingCallback>,
) -> ConversionOrchestrator {
    let config = ProcessorConfig::builder()
        .progress_callback(cb)
        .build()
        .unwrap();
    ConversionOrchestrator::new(service, config)
}

/// Write a structurally valid PDF with `pages` empty pages.
fn write_pdf(path: &Path, pages: usize) {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let kids: Vec<Object> = (0..pages)
        .map(|_| {
            doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
            })
            .into()
        })
        .collect();
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => pages as i64,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.save(path).unwrap();
}

fn request_in(dir: &Path, pages: usize) -> ConversionRequest {
    let path = dir.join("lecture.pdf");
    write_pdf(&path, pages);
    ConversionRequest::new(&path, ProcessingOptions::default()).unwrap()
}

fn files_in(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    files.sort();
    files
}

// ── await_completion ────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn completed_on_first_poll_returns_without_sleeping() {
    let service = Arc::new(MockService::new(vec![json!({
        "status": "completed",
        "percent_done": 100,
        "num_pages": 4,
        "num_pages_completed": 4
    })]));
    let orch = orchestrator(Arc::clone(&service));

    let start = Instant::now();
    let job = orch
        .await_completion("job-42", Duration::from_secs(2), Duration::from_secs(600))
        .await
        .expect("completed job should succeed");

    assert_eq!(service.polls(), 1);
    assert_eq!(start.elapsed(), Duration::ZERO);
    assert_eq!(job.id, "job-42");
    assert_eq!(job.total_pages, 4);
}

#[tokio::test(start_paused = true)]
async fn error_status_fails_on_first_poll() {
    let service = Arc::new(MockService::new(vec![json!({
        "status": "error",
        "error": "PDF is password protected"
    })]));
    let orch = orchestrator(Arc::clone(&service));

    let err = orch
        .await_completion("job-42", Duration::from_secs(2), Duration::from_secs(600))
        .await
        .unwrap_err();

    assert_eq!(service.polls(), 1);
    match err {
        MathpixError::ProcessingFailed { job_id, payload } => {
            assert_eq!(job_id, "job-42");
            assert!(payload.contains("password protected"), "got: {payload}");
        }
        other => panic!("expected ProcessingFailed, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn never_terminal_times_out_after_ceiling() {
    let service = Arc::new(MockService::new(vec![json!({
        "status": "split",
        "percent_done": 0
    })]));
    let orch = orchestrator(Arc::clone(&service));

    let start = Instant::now();
    let err = orch
        .await_completion("job-42", Duration::from_secs(2), Duration::from_secs(600))
        .await
        .unwrap_err();

    assert!(
        matches!(err, MathpixError::Timeout { secs: 600, .. }),
        "expected Timeout, got {err:?}"
    );
    assert!(start.elapsed() > Duration::from_secs(600));
    // Polls at t = 0, 2, …, 600 s; the check at 602 s gives up.
    assert_eq!(service.polls(), 301);
}

#[tokio::test(start_paused = true)]
async fn short_ceiling_bounds_polling() {
    let service = Arc::new(MockService::new(vec![json!({ "status": "processing" })]));
    let orch = orchestrator(Arc::clone(&service));

    let err = orch
        .await_completion("job-42", Duration::from_secs(5), Duration::from_secs(12))
        .await
        .unwrap_err();

    assert!(matches!(err, MathpixError::Timeout { secs: 12, .. }));
    // t = 0, 5, 10 polled; t = 15 is past the ceiling.
    assert_eq!(service.polls(), 3);
}

#[tokio::test(start_paused = true)]
async fn progress_is_reported_until_completion() {
    let service = Arc::new(MockService::new(vec![
        json!({ "status": "split", "percent_done": 10, "num_pages": 10, "num_pages_completed": 1 }),
        json!({ "status": "processing", "percent_done": 50.5, "num_pages": 10, "num_pages_completed": 5 }),
        json!({ "status": "completed", "percent_done": 100, "num_pages": 10, "num_pages_completed": 10 }),
    ]));
    let cb = Arc::new(RecordingCallback::default());
    let orch = orchestrator_with_callback(Arc::clone(&service), Arc::clone(&cb));

    let start = Instant::now();
    let job = orch
        .await_completion("job-42", Duration::from_secs(2), Duration::from_secs(600))
        .await
        .unwrap();

    assert_eq!(service.polls(), 3);
    assert_eq!(job.polls, 3);
    assert_eq!(start.elapsed(), Duration::from_secs(4));
    assert_eq!(
        *cb.progress.lock().unwrap(),
        vec![(10.0, 1, 10), (50.5, 5, 10)]
    );
    assert_eq!(cb.completed.load(Ordering::SeqCst), 1);
}

// ── fetch_outputs ───────────────────────────────────────────────────────────

#[tokio::test]
async fn failed_format_is_omitted_without_error() {
    let dir = tempfile::tempdir().unwrap();
    let service = Arc::new(
        MockService::new(vec![json!({ "status": "completed" })]).failing(&[OutputFormat::TexZip]),
    );
    let cb = Arc::new(RecordingCallback::default());
    let orch = orchestrator_with_callback(Arc::clone(&service), Arc::clone(&cb));

    let bundle = orch
        .fetch_outputs("job-42", &ALL_THREE, dir.path())
        .await
        .expect("a single failed format must not fail the call");

    assert_eq!(bundle.len(), 2);
    assert!(bundle.contains(OutputFormat::Mmd));
    assert!(bundle.contains(OutputFormat::Html));
    assert!(!bundle.contains(OutputFormat::TexZip));
    assert_eq!(bundle.skipped.len(), 1);
    assert_eq!(bundle.skipped[0].format(), OutputFormat::TexZip);
    assert_eq!(cb.skipped.load(Ordering::SeqCst), 1);

    // Every format was attempted, in order.
    assert_eq!(*service.downloads.lock().unwrap(), ALL_THREE.to_vec());

    let mmd = bundle.get(OutputFormat::Mmd).unwrap();
    assert_eq!(std::fs::read_to_string(mmd).unwrap(), "job-42 as mmd");
    assert_eq!(files_in(&bundle.run_dir).len(), 2);
}

#[tokio::test]
async fn files_are_named_after_the_timestamp() {
    let dir = tempfile::tempdir().unwrap();
    let service = Arc::new(MockService::new(vec![json!({ "status": "completed" })]));
    let orch = orchestrator(service);
    let at = Local.with_ymd_and_hms(2025, 3, 14, 9, 26, 53).unwrap();

    let bundle = orch
        .fetch_outputs_at("job-42", &ALL_THREE, dir.path(), at)
        .await
        .unwrap();

    assert_eq!(bundle.timestamp, "20250314_092653");
    assert_eq!(bundle.run_dir, dir.path().join("20250314_092653"));
    assert_eq!(
        bundle.get(OutputFormat::TexZip).unwrap(),
        dir.path().join("20250314_092653/notes_20250314_092653.tex.zip")
    );
}

#[tokio::test]
async fn sequential_runs_do_not_overwrite_each_other() {
    let dir = tempfile::tempdir().unwrap();
    let service = Arc::new(MockService::new(vec![json!({ "status": "completed" })]));
    let orch = orchestrator(service);
    let first_at = Local.with_ymd_and_hms(2025, 3, 14, 9, 0, 0).unwrap();
    let second_at = Local.with_ymd_and_hms(2025, 3, 14, 9, 0, 7).unwrap();

    let first = orch
        .fetch_outputs_at("job-42", &ALL_THREE, dir.path(), first_at)
        .await
        .unwrap();
    let second = orch
        .fetch_outputs_at("job-42", &ALL_THREE, dir.path(), second_at)
        .await
        .unwrap();

    assert_ne!(first.run_dir, second.run_dir);
    assert_eq!(files_in(&first.run_dir).len(), 3);
    assert_eq!(files_in(&second.run_dir).len(), 3);
    assert_eq!(files_in(dir.path()).len(), 2);
}

#[tokio::test]
async fn same_second_runs_get_suffixed_directories() {
    let dir = tempfile::tempdir().unwrap();
    let service = Arc::new(MockService::new(vec![json!({ "status": "completed" })]));
    let orch = orchestrator(service);
    let at = Local.with_ymd_and_hms(2025, 3, 14, 9, 0, 0).unwrap();

    let first = orch
        .fetch_outputs_at("job-42", &ALL_THREE, dir.path(), at)
        .await
        .unwrap();
    let second = orch
        .fetch_outputs_at("job-42", &ALL_THREE, dir.path(), at)
        .await
        .unwrap();

    assert_eq!(second.run_dir, dir.path().join("20250314_090000_1"));
    assert_eq!(files_in(&first.run_dir).len(), 3);
    assert_eq!(files_in(&second.run_dir).len(), 3);
}

// ── run ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn full_run_downloads_and_estimates_cost() {
    let dir = tempfile::tempdir().unwrap();
    let request = request_in(dir.path(), 2);
    let service = Arc::new(MockService::new(vec![json!({
        "status": "completed",
        "percent_done": 100,
        "num_pages": 2,
        "num_pages_completed": 2
    })]));
    let orch = orchestrator(Arc::clone(&service));
    let out = dir.path().join("processed_notes");

    let summary = orch.run(&request, &out).await.unwrap();

    assert_eq!(service.submits.load(Ordering::SeqCst), 1);
    assert_eq!(summary.job.id, "job-42");
    assert_eq!(summary.bundle.len(), 3);
    assert!(summary.bundle.run_dir.starts_with(&out));
    assert_eq!(summary.page_count, Some(2));
    let cost = summary.cost.unwrap();
    assert_eq!(cost.pages, 2);
    assert_eq!(cost.amount, 2.0 * 0.025);
}

#[tokio::test]
async fn configured_options_reach_the_upload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("lecture.pdf");
    write_pdf(&path, 1);

    let mut options = ProcessingOptions::default();
    options.rm_spaces = false;
    options.conversion_formats.insert(OutputFormat::Docx, true);
    let config = ProcessorConfig::builder()
        .options(options.clone())
        .build()
        .unwrap();
    let service = Arc::new(MockService::new(vec![json!({ "status": "completed" })]));
    let orch = ConversionOrchestrator::new(Arc::clone(&service) as Arc<dyn ConversionService>, config);

    let request = orch.request(&path).unwrap();
    orch.run(&request, &dir.path().join("out")).await.unwrap();

    let uploaded = service.uploaded_options.lock().unwrap();
    assert_eq!(uploaded.len(), 1);
    assert_eq!(uploaded[0], options);
    assert!(!uploaded[0].rm_spaces);
}

#[tokio::test]
async fn rejected_credentials_stop_before_polling() {
    let dir = tempfile::tempdir().unwrap();
    let request = request_in(dir.path(), 1);
    let service = Arc::new(
        MockService::new(vec![json!({ "status": "completed" })]).rejecting_credentials(),
    );
    let orch = orchestrator(Arc::clone(&service));
    let out = dir.path().join("processed_notes");

    let err = orch.run(&request, &out).await.unwrap_err();

    assert!(matches!(err, MathpixError::AuthenticationFailed { status: 401, .. }));
    assert_eq!(service.polls(), 0);
    assert!(service.downloads.lock().unwrap().is_empty());
    assert!(!out.exists());
}

#[tokio::test]
async fn processing_error_stops_before_download() {
    let dir = tempfile::tempdir().unwrap();
    let request = request_in(dir.path(), 1);
    let service = Arc::new(MockService::new(vec![
        json!({ "status": "split", "percent_done": 0 }),
        json!({ "status": "error", "error": "unsupported file" }),
    ]));
    let config = ProcessorConfig::builder()
        .poll_interval(Duration::from_millis(10))
        .build()
        .unwrap();
    let orch = ConversionOrchestrator::new(Arc::clone(&service) as Arc<dyn ConversionService>, config);
    let out = dir.path().join("processed_notes");

    let err = orch.run(&request, &out).await.unwrap_err();

    assert!(matches!(err, MathpixError::ProcessingFailed { .. }));
    assert_eq!(service.polls(), 2);
    assert!(service.downloads.lock().unwrap().is_empty());
    assert!(!out.exists());
}
