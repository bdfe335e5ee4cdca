//! Input resolution and text extraction.
//!
//! ## Why download to a temp file?
//!
//! Downloading to a `TempDir` gives the rest of the pipeline a stable local
//! path while ensuring cleanup happens automatically when `ResolvedInput` is
//! dropped, even if the process panics or the run is cancelled. We validate
//! the PDF magic bytes (`%PDF`) before returning so callers get a meaningful
//! error rather than a garbage extraction result.
//!
//! Fetching is single-attempt by design: without a document there is no
//! meaningful partial result, so a failed download is fatal rather than
//! retried.

use crate::error::Pdf2ReelError;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

/// The resolved input — either a local path or a downloaded temp file.
#[derive(Debug)]
pub enum ResolvedInput {
    /// Input was already a local file.
    Local(PathBuf),
    /// Input was a URL; PDF downloaded to a temp directory.
    /// The `TempDir` is kept alive to prevent cleanup until the run completes.
    Downloaded { path: PathBuf, _temp_dir: TempDir },
}

impl ResolvedInput {
    /// Get the path to the PDF file regardless of how it was resolved.
    pub fn path(&self) -> &Path {
        match self {
            ResolvedInput::Local(p) => p,
            ResolvedInput::Downloaded { path, .. } => path,
        }
    }
}

/// The document as the planner sees it. Dropped after planning.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    /// Size of the raw PDF payload.
    pub byte_len: usize,
    /// Full extracted text, before truncation.
    pub extracted_text: String,
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to a local PDF file path.
///
/// If the input is a URL, download it to a temporary directory.
/// If the input is a local file, validate it exists and is readable.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<ResolvedInput, Pdf2ReelError> {
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        resolve_local(input)
    }
}

/// Resolve a local file path, validating existence and PDF magic bytes.
fn resolve_local(path_str: &str) -> Result<ResolvedInput, Pdf2ReelError> {
    let path = PathBuf::from(path_str);

    if !path.exists() {
        return Err(Pdf2ReelError::FileNotFound { path });
    }

    // Check read permission by attempting to open
    match std::fs::File::open(&path) {
        Ok(mut f) => {
            use std::io::Read;
            let mut magic = [0u8; 4];
            if f.read_exact(&mut magic).is_ok() && &magic != b"%PDF" {
                return Err(Pdf2ReelError::NotAPdf { path, magic });
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(Pdf2ReelError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(Pdf2ReelError::FileNotFound { path });
        }
    }

    debug!("Resolved local PDF: {}", path.display());
    Ok(ResolvedInput::Local(path))
}

/// Download a URL to a temporary directory and return the path.
async fn download_url(url: &str, timeout_secs: u64) -> Result<ResolvedInput, Pdf2ReelError> {
    info!("Downloading PDF from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| Pdf2ReelError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            Pdf2ReelError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            Pdf2ReelError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(Pdf2ReelError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let filename = extract_filename(url);

    let temp_dir = TempDir::new().map_err(|e| Pdf2ReelError::Internal(e.to_string()))?;
    let file_path = temp_dir.path().join(&filename);

    let bytes = response
        .bytes()
        .await
        .map_err(|e| Pdf2ReelError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    // Verify PDF magic bytes before writing anything.
    if bytes.len() < 4 || &bytes[..4] != b"%PDF" {
        let mut magic = [0u8; 4];
        let n = bytes.len().min(4);
        magic[..n].copy_from_slice(&bytes[..n]);
        return Err(Pdf2ReelError::NotAPdf {
            path: file_path,
            magic,
        });
    }

    tokio::fs::write(&file_path, &bytes)
        .await
        .map_err(|e| Pdf2ReelError::Internal(format!("Failed to write temp file: {}", e)))?;

    info!("Downloaded to: {}", file_path.display());

    Ok(ResolvedInput::Downloaded {
        path: file_path,
        _temp_dir: temp_dir,
    })
}

/// Extract a reasonable filename from the URL path.
fn extract_filename(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }

    "downloaded.pdf".to_string()
}

/// Extract the document text the planner will summarize.
///
/// `pdf-extract` is CPU-bound and synchronous, so it runs under
/// `spawn_blocking` to keep the Tokio workers free. A document with no
/// extractable text (a pure scan, an empty file) is fatal — there is
/// nothing to summarize.
pub async fn extract_document(resolved: &ResolvedInput) -> Result<SourceDocument, Pdf2ReelError> {
    let path = resolved.path().to_path_buf();

    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|e| Pdf2ReelError::Internal(format!("Failed to read PDF: {e}")))?;
    let byte_len = bytes.len();

    let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
        .await
        .map_err(|e| Pdf2ReelError::Internal(format!("Extraction task panicked: {e}")))?
        .map_err(|e| Pdf2ReelError::TextExtractionFailed {
            path: path.clone(),
            detail: e.to_string(),
        })?;

    if text.trim().is_empty() {
        return Err(Pdf2ReelError::EmptyDocument { path });
    }

    debug!(
        "Extracted {} chars of text from {} bytes of PDF",
        text.chars().count(),
        byte_len
    );

    Ok(SourceDocument {
        byte_len,
        extracted_text: text,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/paper.pdf"));
        assert!(is_url("http://example.com/paper.pdf"));
        assert!(!is_url("/tmp/paper.pdf"));
        assert!(!is_url("paper.pdf"));
        assert!(!is_url(""));
    }

    #[test]
    fn filename_from_url_path() {
        assert_eq!(
            extract_filename("https://example.com/papers/attention.pdf"),
            "attention.pdf"
        );
        assert_eq!(extract_filename("https://example.com/"), "downloaded.pdf");
        assert_eq!(
            extract_filename("https://arxiv.org/pdf/1706"),
            "downloaded.pdf"
        );
    }

    #[tokio::test]
    async fn missing_local_file_is_not_found() {
        let err = resolve_input("/definitely/not/here.pdf", 5).await.unwrap_err();
        assert!(matches!(err, Pdf2ReelError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn non_pdf_local_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fake.pdf");
        std::fs::write(&path, b"this is not a pdf at all").unwrap();

        let err = resolve_input(path.to_str().unwrap(), 5).await.unwrap_err();
        match err {
            Pdf2ReelError::NotAPdf { magic, .. } => assert_eq!(&magic, b"this"),
            other => panic!("expected NotAPdf, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn pdf_magic_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ok.pdf");
        std::fs::write(&path, b"%PDF-1.7 rest of file").unwrap();

        let resolved = resolve_input(path.to_str().unwrap(), 5).await.unwrap();
        assert_eq!(resolved.path(), path.as_path());
    }
}
