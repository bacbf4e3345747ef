//! Configuration types for a Mathpix conversion run.
//!
//! Everything the orchestrator needs that is not per-request lives in
//! [`ProcessorConfig`], built via its [`ProcessorConfigBuilder`]: the API base
//! URL, the options payload sent with every upload, which formats to
//! download, and the polling cadence. Nothing here is process-global, so tests
//! can point a config at a mock service and shrink the timings freely.
//!
//! [`Credentials`] are kept separate because they come from the environment,
//! not from flags, and must never end up in a log line.

use crate::error::MathpixError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Default Mathpix v3 API root.
pub const DEFAULT_API_BASE_URL: &str = "https://api.mathpix.com/v3";

/// Default directory (relative to the working directory) for run outputs.
pub const DEFAULT_OUTPUT_DIR: &str = "processed_notes";

// ── Credentials ──────────────────────────────────────────────────────────

/// Mathpix application id + key.
///
/// Loaded once at start-up and shared read-only for the rest of the process.
#[derive(Clone)]
pub struct Credentials {
    app_id: String,
    app_key: String,
}

impl Credentials {
    /// Environment variable holding the application id.
    pub const APP_ID_VAR: &'static str = "MATHPIX_APP_ID";
    /// Environment variable holding the application key.
    pub const APP_KEY_VAR: &'static str = "MATHPIX_APP_KEY";

    /// Build credentials from explicit values. Both must be non-blank.
    pub fn new(app_id: impl Into<String>, app_key: impl Into<String>) -> Result<Self, MathpixError> {
        let app_id = app_id.into();
        let app_key = app_key.into();
        if app_id.trim().is_empty() {
            return Err(MathpixError::MissingCredentials {
                missing: Self::APP_ID_VAR,
            });
        }
        if app_key.trim().is_empty() {
            return Err(MathpixError::MissingCredentials {
                missing: Self::APP_KEY_VAR,
            });
        }
        Ok(Self { app_id, app_key })
    }

    /// Read `MATHPIX_APP_ID` / `MATHPIX_APP_KEY` from the process environment.
    pub fn from_env() -> Result<Self, MathpixError> {
        let app_id = std::env::var(Self::APP_ID_VAR).unwrap_or_default();
        let app_key = std::env::var(Self::APP_KEY_VAR).unwrap_or_default();
        Self::new(app_id, app_key)
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    pub fn app_key(&self) -> &str {
        &self.app_key
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("app_id", &self.app_id)
            .field("app_key", &"<redacted>")
            .finish()
    }
}

// ── Output formats ───────────────────────────────────────────────────────

/// A representation the service can convert a processed PDF into.
///
/// The serialised name doubles as the file extension and as the suffix of
/// the download endpoint (`/pdf/{id}.{ext}`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OutputFormat {
    /// Mathpix Markdown. Always available, no conversion needed.
    #[serde(rename = "mmd")]
    Mmd,
    /// Plain Markdown.
    #[serde(rename = "md")]
    Md,
    /// Word document.
    #[serde(rename = "docx")]
    Docx,
    /// LaTeX source plus images, zipped.
    #[serde(rename = "tex.zip")]
    TexZip,
    /// Rendered HTML.
    #[serde(rename = "html")]
    Html,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 5] = [
        OutputFormat::Mmd,
        OutputFormat::Md,
        OutputFormat::Docx,
        OutputFormat::TexZip,
        OutputFormat::Html,
    ];

    /// File extension, also used in the download URL.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Mmd => "mmd",
            OutputFormat::Md => "md",
            OutputFormat::Docx => "docx",
            OutputFormat::TexZip => "tex.zip",
            OutputFormat::Html => "html",
        }
    }

    /// Human-readable label for summaries.
    pub fn description(&self) -> &'static str {
        match self {
            OutputFormat::Mmd => "Mathpix Markdown",
            OutputFormat::Md => "Markdown",
            OutputFormat::Docx => "Word document",
            OutputFormat::TexZip => "LaTeX with images",
            OutputFormat::Html => "HTML rendering",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = MathpixError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().trim_start_matches('.').to_lowercase();
        OutputFormat::ALL
            .into_iter()
            .find(|f| f.extension() == wanted)
            .ok_or_else(|| {
                MathpixError::InvalidConfig(format!(
                    "unknown output format '{s}' (expected one of: mmd, md, docx, tex.zip, html)"
                ))
            })
    }
}

// ── Processing options ───────────────────────────────────────────────────

/// The `options_json` payload sent alongside the uploaded PDF.
///
/// Field names match the service's wire format exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingOptions {
    /// Formats the service should prepare in addition to Mathpix Markdown.
    pub conversion_formats: BTreeMap<OutputFormat, bool>,
    /// Opening/closing delimiters for inline math.
    pub math_inline_delimiters: [String; 2],
    /// Opening/closing delimiters for display math.
    pub math_display_delimiters: [String; 2],
    /// Strip superfluous whitespace around math and text.
    pub rm_spaces: bool,
    /// Fall back to image-based table recognition when structure fails.
    pub enable_tables_fallback: bool,
    /// Keep equation numbers (`\tag{}`) in the output.
    pub include_equation_tags: bool,
    /// Render bare numbers in math mode.
    pub numbers_default_to_math: bool,
}

impl Default for ProcessingOptions {
    fn default() -> Self {
        let conversion_formats = [OutputFormat::Md, OutputFormat::TexZip, OutputFormat::Html]
            .into_iter()
            .map(|f| (f, true))
            .collect();
        Self {
            conversion_formats,
            math_inline_delimiters: ["$".to_string(), "$".to_string()],
            math_display_delimiters: ["$$".to_string(), "$$".to_string()],
            rm_spaces: true,
            enable_tables_fallback: true,
            include_equation_tags: true,
            numbers_default_to_math: true,
        }
    }
}

impl ProcessingOptions {
    /// Serialise to the JSON string carried in the `options_json` form field.
    pub fn to_json(&self) -> Result<String, MathpixError> {
        serde_json::to_string(self)
            .map_err(|e| MathpixError::Internal(format!("options serialisation: {e}")))
    }

    /// Formats enabled in `conversion_formats`.
    pub fn enabled_formats(&self) -> impl Iterator<Item = OutputFormat> + '_ {
        self.conversion_formats
            .iter()
            .filter(|(_, on)| **on)
            .map(|(f, _)| *f)
    }
}

// ── Processor config ─────────────────────────────────────────────────────

/// Injected configuration for [`crate::orchestrator::ConversionOrchestrator`]
/// and [`crate::service::MathpixService`].
///
/// Built via [`ProcessorConfig::builder()`] or [`ProcessorConfig::default()`].
///
/// # Example
/// ```rust
/// use mathpix_convert::{OutputFormat, ProcessorConfig};
/// use std::time::Duration;
///
/// let config = ProcessorConfig::builder()
///     .poll_interval(Duration::from_secs(5))
///     .formats(vec![OutputFormat::Mmd, OutputFormat::Html])
///     .build()
///     .unwrap();
/// assert_eq!(config.formats.len(), 2);
/// ```
#[derive(Clone)]
pub struct ProcessorConfig {
    /// API root; endpoint URLs are derived from it. Default: [`DEFAULT_API_BASE_URL`].
    pub api_base_url: String,

    /// Options for requests built by [`crate::ConversionOrchestrator::request`].
    ///
    /// The upload always sends the options carried by the
    /// [`crate::ConversionRequest`] itself.
    pub options: ProcessingOptions,

    /// Formats downloaded once the job completes. Default: mmd, tex.zip, html.
    pub formats: Vec<OutputFormat>,

    /// Delay between status polls. Default: 2 s.
    pub poll_interval: Duration,

    /// Ceiling on total polling time before the run fails. Default: 600 s.
    pub timeout: Duration,

    /// Per-HTTP-request timeout. Default: 120 s.
    ///
    /// Uploads of large PDFs are the slow case; status and download calls
    /// normally return in well under a second.
    pub request_timeout: Duration,

    /// Stem of each downloaded file: `<prefix>_<timestamp>.<ext>`. Default: `notes`.
    pub file_prefix: String,

    /// Observer notified of upload, polling and download events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            options: ProcessingOptions::default(),
            formats: vec![OutputFormat::Mmd, OutputFormat::TexZip, OutputFormat::Html],
            poll_interval: Duration::from_secs(2),
            timeout: Duration::from_secs(600),
            request_timeout: Duration::from_secs(120),
            file_prefix: "notes".to_string(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ProcessorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessorConfig")
            .field("api_base_url", &self.api_base_url)
            .field("options", &self.options)
            .field("formats", &self.formats)
            .field("poll_interval", &self.poll_interval)
            .field("timeout", &self.timeout)
            .field("request_timeout", &self.request_timeout)
            .field("file_prefix", &self.file_prefix)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ProcessingProgressCallback>"),
            )
            .finish()
    }
}

impl ProcessorConfig {
    /// Create a new builder for `ProcessorConfig`.
    pub fn builder() -> ProcessorConfigBuilder {
        ProcessorConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ProcessorConfig`].
#[derive(Debug)]
pub struct ProcessorConfigBuilder {
    config: ProcessorConfig,
}

impl ProcessorConfigBuilder {
    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn options(mut self, options: ProcessingOptions) -> Self {
        self.config.options = options;
        self
    }

    pub fn formats(mut self, formats: Vec<OutputFormat>) -> Self {
        self.config.formats = formats;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    pub fn file_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.file_prefix = prefix.into();
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ProcessorConfig, MathpixError> {
        let c = &self.config;
        if !(c.api_base_url.starts_with("http://") || c.api_base_url.starts_with("https://")) {
            return Err(MathpixError::InvalidConfig(format!(
                "API base URL must be http(s), got '{}'",
                c.api_base_url
            )));
        }
        if c.formats.is_empty() {
            return Err(MathpixError::InvalidConfig(
                "at least one output format is required".into(),
            ));
        }
        if c.poll_interval.is_zero() {
            return Err(MathpixError::InvalidConfig(
                "poll interval must be greater than zero".into(),
            ));
        }
        if c.timeout.is_zero() {
            return Err(MathpixError::InvalidConfig(
                "timeout must be greater than zero".into(),
            ));
        }
        if c.request_timeout.is_zero() {
            return Err(MathpixError::InvalidConfig(
                "request timeout must be greater than zero".into(),
            ));
        }
        if c.file_prefix.is_empty() || c.file_prefix.contains(['/', '\\']) {
            return Err(MathpixError::InvalidConfig(format!(
                "file prefix must be a plain file name, got '{}'",
                c.file_prefix
            )));
        }
        let mut config = self.config;
        let mut seen = Vec::with_capacity(config.formats.len());
        config.formats.retain(|f| {
            if seen.contains(f) {
                false
            } else {
                seen.push(*f);
                true
            }
        });
        Ok(config)
    }
}
