//! Input validation and page counting for the PDF being converted.
//!
//! The upload is the expensive part of a run, so [`ConversionRequest::new`]
//! checks up front that the path exists, is readable, and starts with the
//! `%PDF` magic bytes. A bad path then fails in milliseconds with a clear
//! message instead of as an opaque 400 from the service.

use crate::config::ProcessingOptions;
use crate::error::MathpixError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

/// The PDF to convert and the options to convert it with.
///
/// Immutable once constructed.
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    pdf_path: PathBuf,
    options: ProcessingOptions,
}

impl ConversionRequest {
    /// Validate `pdf_path` and pair it with `options`.
    ///
    /// # Errors
    /// - [`MathpixError::InvalidInput`] for an empty path
    /// - [`MathpixError::FileNotFound`] / [`MathpixError::PermissionDenied`]
    /// - [`MathpixError::NotAPdf`] when the magic bytes are wrong
    pub fn new(pdf_path: impl AsRef<Path>, options: ProcessingOptions) -> Result<Self, MathpixError> {
        let pdf_path = validate_pdf(pdf_path.as_ref())?;
        Ok(Self { pdf_path, options })
    }

    pub fn pdf_path(&self) -> &Path {
        &self.pdf_path
    }

    pub fn options(&self) -> &ProcessingOptions {
        &self.options
    }
}

/// Check that `path` names a readable PDF file.
fn validate_pdf(path: &Path) -> Result<PathBuf, MathpixError> {
    if path.as_os_str().is_empty() {
        return Err(MathpixError::InvalidInput {
            input: String::new(),
        });
    }

    let path = path.to_path_buf();
    if !path.is_file() {
        return Err(MathpixError::FileNotFound { path });
    }

    match std::fs::File::open(&path) {
        Ok(f) => {
            // Files shorter than the magic are rejected too; missing bytes read as zero.
            let mut head = Vec::with_capacity(4);
            let read = f.take(4).read_to_end(&mut head);
            if let Err(e) = read {
                debug!("Could not read header of {}: {}", path.display(), e);
            }
            if head.as_slice() != b"%PDF" {
                let mut magic = [0u8; 4];
                magic[..head.len()].copy_from_slice(&head);
                return Err(MathpixError::NotAPdf { path, magic });
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(MathpixError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(MathpixError::FileNotFound { path });
        }
    }

    debug!("Resolved local PDF: {}", path.display());
    Ok(path)
}

/// Count the pages of a PDF with lopdf.
///
/// lopdf parses the whole cross-reference table synchronously, so the work
/// runs on the blocking pool.
pub async fn page_count(pdf_path: &Path) -> Result<usize, MathpixError> {
    let path = pdf_path.to_path_buf();
    tokio::task::spawn_blocking(move || page_count_blocking(&path))
        .await
        .map_err(|e| MathpixError::Internal(format!("Page-count task panicked: {e}")))?
}

fn page_count_blocking(path: &Path) -> Result<usize, MathpixError> {
    let doc = lopdf::Document::load(path).map_err(|e| MathpixError::PdfInspection {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;
    Ok(doc.get_pages().len())
}
