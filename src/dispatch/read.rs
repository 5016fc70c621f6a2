//! File content extraction for the read intent
//!
//! Plain text formats are read directly. PDFs are checked for pages with
//! `lopdf` before `pdf-extract` pulls the first page's text; extraction runs
//! on the blocking pool so a malformed document cannot stall or take down
//! the consumer loop.

use std::io::Read;
use std::path::Path;

use async_trait::async_trait;

use crate::{Error, Result};

/// Extensions read as UTF-8 text
const TEXT_EXTENSIONS: &[&str] = &["txt", "md", "py", "csv"];

/// What came out of a file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extracted {
    /// Readable text, already truncated
    Text(String),
    /// File has no content
    EmptyFile,
    /// Not a format we can read aloud
    UnsupportedFormat,
    /// PDF with zero pages
    NoPages,
    /// PDF pages with no extractable text
    NoText,
}

/// Pulls speakable text out of a file
#[async_trait]
pub trait FileContentExtractor: Send + Sync {
    /// Extract at most `max_chars` characters from `path`
    ///
    /// # Errors
    ///
    /// Returns `Error::FileNotFound` for a missing file, or the underlying
    /// I/O or parse error
    async fn extract(&self, path: &Path, max_chars: usize) -> Result<Extracted>;
}

/// Reads plain text and PDF documents
#[derive(Debug, Default, Clone, Copy)]
pub struct DocumentExtractor;

#[async_trait]
impl FileContentExtractor for DocumentExtractor {
    async fn extract(&self, path: &Path, max_chars: usize) -> Result<Extracted> {
        if !path.is_file() {
            return Err(Error::FileNotFound(path.display().to_string()));
        }

        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();

        let path = path.to_path_buf();
        if TEXT_EXTENSIONS.contains(&ext.as_str()) {
            tokio::task::spawn_blocking(move || read_text(&path, max_chars))
                .await
                .map_err(|e| Error::Io(std::io::Error::other(e)))?
        } else if ext == "pdf" {
            let bytes = tokio::fs::read(&path).await?;
            match tokio::task::spawn_blocking(move || read_pdf(&bytes, max_chars)).await {
                Ok(result) => result,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "pdf extraction aborted");
                    Ok(Extracted::NoText)
                }
            }
        } else {
            tracing::debug!(path = %path.display(), ext, "unsupported format");
            Ok(Extracted::UnsupportedFormat)
        }
    }
}

/// Read the first `max_chars` characters of a text file
fn read_text(path: &Path, max_chars: usize) -> Result<Extracted> {
    // A char is at most four bytes, so this always covers max_chars chars
    let limit = u64::try_from(max_chars.saturating_mul(4)).unwrap_or(u64::MAX);
    let mut bytes = Vec::new();
    std::fs::File::open(path)?
        .take(limit)
        .read_to_end(&mut bytes)?;

    let text = truncate_chars(&String::from_utf8_lossy(&bytes), max_chars);
    if text.trim().is_empty() {
        Ok(Extracted::EmptyFile)
    } else {
        Ok(Extracted::Text(text))
    }
}

/// Count pages, then extract the first page's text
fn read_pdf(bytes: &[u8], max_chars: usize) -> Result<Extracted> {
    let doc = lopdf::Document::load_mem(bytes)
        .map_err(|e| Error::UnsupportedFormat(format!("invalid PDF: {e}")))?;
    let pages = doc.get_pages().len();
    if pages == 0 {
        return Ok(Extracted::NoPages);
    }

    let text = match pdf_extract::extract_text_from_mem_by_pages(bytes) {
        Ok(pages) => pages.into_iter().next().unwrap_or_default(),
        Err(e) => {
            tracing::debug!(error = %e, pages, "pdf text extraction failed");
            return Ok(Extracted::NoText);
        }
    };

    let text = truncate_chars(text.trim(), max_chars);
    if text.is_empty() {
        Ok(Extracted::NoText)
    } else {
        Ok(Extracted::Text(text))
    }
}

/// First `max_chars` characters of `text`
#[must_use]
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_counts_chars_not_bytes() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("ab", 10), "ab");
    }

    #[tokio::test]
    async fn test_text_file_truncated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.md");
        std::fs::write(&path, "# Notes\nbuy milk").unwrap();

        let out = DocumentExtractor.extract(&path, 7).await.unwrap();
        assert_eq!(out, Extracted::Text("# Notes".to_string()));
    }

    #[tokio::test]
    async fn test_empty_text_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.txt");
        std::fs::write(&path, "").unwrap();

        assert_eq!(
            DocumentExtractor.extract(&path, 100).await.unwrap(),
            Extracted::EmptyFile
        );
    }

    #[tokio::test]
    async fn test_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.png");
        std::fs::write(&path, [0x89, b'P', b'N', b'G']).unwrap();

        assert_eq!(
            DocumentExtractor.extract(&path, 100).await.unwrap(),
            Extracted::UnsupportedFormat
        );
    }

    #[tokio::test]
    async fn test_missing_file() {
        let err = DocumentExtractor
            .extract(Path::new("/definitely/not/here.txt"), 10)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::FileNotFound(_)));
    }

    #[tokio::test]
    async fn test_garbage_pdf_is_an_error_not_a_panic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"not a pdf at all").unwrap();

        assert!(DocumentExtractor.extract(&path, 100).await.is_err());
    }
}
