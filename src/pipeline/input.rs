//! Input resolution: turn a user-supplied path or URL into an [`InputDocument`].
//!
//! Everything downstream works on bytes in memory (pdfium can open a PDF from
//! a byte slice), so nothing is written to disk. The MIME type is taken from
//! the content's magic bytes first, then from the `Content-Type` header or
//! the file extension.

use crate::error::DocumentError;
use crate::media::{essence, mime_from_extension, sniff_mime, InputDocument};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to an in-memory document.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<InputDocument, DocumentError> {
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        read_local(Path::new(input)).await
    }
}

/// Read a local file and detect its media type.
pub async fn read_local(path: &Path) -> Result<InputDocument, DocumentError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| {
        let detail = match e.kind() {
            std::io::ErrorKind::NotFound => format!("file not found: '{}'", path.display()),
            std::io::ErrorKind::PermissionDenied => {
                format!("permission denied reading '{}'", path.display())
            }
            _ => format!("'{}': {}", path.display(), e),
        };
        DocumentError::ReadFailed { detail }
    })?;

    let mime = sniff_mime(&bytes)
        .or_else(|| mime_from_extension(path))
        .unwrap_or("application/octet-stream");

    debug!("Resolved local file: {} ({}, {} bytes)", path.display(), mime, bytes.len());
    Ok(InputDocument::new(display_name(path), mime, bytes))
}

/// Download a URL into memory.
async fn download_url(url: &str, timeout_secs: u64) -> Result<InputDocument, DocumentError> {
    info!("Downloading document from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| DocumentError::ReadFailed {
            detail: format!("{url}: {e}"),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        let detail = if e.is_timeout() {
            format!("download of '{url}' timed out after {timeout_secs}s")
        } else {
            format!("failed to download '{url}': {e}")
        };
        DocumentError::ReadFailed { detail }
    })?;

    if !response.status().is_success() {
        return Err(DocumentError::ReadFailed {
            detail: format!("failed to download '{url}': HTTP {}", response.status()),
        });
    }

    let header_mime = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(essence)
        .filter(|m| m != "application/octet-stream");

    let name = extract_filename(url);

    let bytes = response
        .bytes()
        .await
        .map_err(|e| DocumentError::ReadFailed {
            detail: format!("failed to download '{url}': {e}"),
        })?
        .to_vec();

    let mime = sniff_mime(&bytes)
        .map(str::to_string)
        .or(header_mime)
        .or_else(|| mime_from_extension(Path::new(&name)).map(str::to_string))
        .unwrap_or_else(|| "application/octet-stream".to_string());

    info!("Downloaded {} bytes ({})", bytes.len(), mime);
    Ok(InputDocument::new(name, mime, bytes))
}

/// Extract a reasonable filename from the URL path.
fn extract_filename(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() {
                    return last.to_string();
                }
            }
        }
    }
    "downloaded".to_string()
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| PathBuf::from(path).display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/statement.pdf"));
        assert!(is_url("http://example.com/statement.pdf"));
        assert!(!is_url("/tmp/statement.pdf"));
        assert!(!is_url("statement.pdf"));
        assert!(!is_url(""));
    }

    #[test]
    fn filename_from_url() {
        assert_eq!(extract_filename("https://bank.example/dl/march.pdf"), "march.pdf");
        assert_eq!(extract_filename("https://bank.example/"), "downloaded");
    }

    #[test]
    fn read_local_sniffs_content_over_extension() {
        let mut file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
        file.write_all(b"%PDF-1.4\n%stub").unwrap();

        let doc = tokio_test::block_on(read_local(file.path())).unwrap();
        assert_eq!(doc.mime_type, "application/pdf");
        assert!(doc.name.ends_with(".txt"));
    }

    #[test]
    fn read_local_falls_back_to_extension() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        file.write_all(b"Date,Amount\n").unwrap();

        let doc = tokio_test::block_on(read_local(file.path())).unwrap();
        assert_eq!(doc.mime_type, "text/csv");
        assert_eq!(doc.kind(), None);
    }

    #[tokio::test]
    async fn text_statement_starting_with_bm_is_unsupported() {
        let mut file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
        file.write_all(b"BMO Harris Bank statement\n2024-03-01 Coffee -4.50\n")
            .unwrap();

        let doc = read_local(file.path()).await.unwrap();
        assert_eq!(doc.mime_type, "text/plain");

        let err = crate::pipeline::rasterize::rasterize(&doc, &crate::ExtractionConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DocumentError::UnsupportedMedia { .. }), "{err:?}");
    }

    #[tokio::test]
    async fn missing_file_is_read_failure() {
        let err = read_local(Path::new("/definitely/not/here.pdf"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "read_failed");
        assert!(err.to_string().contains("not found"));
    }
}
