//! Document text extraction

use anyhow::{Context, Result, anyhow};
use std::path::Path;

use crate::error::PipelineError;

/// Extracts plain text from a document on disk
pub trait TextExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> Result<String>;
}

/// Extractor dispatching on the file extension
///
/// PDF text comes from pdf-extract; txt and md are read as UTF-8, with
/// invalid sequences replaced. Other formats are rejected.
#[derive(Debug, Default, Clone)]
pub struct DocumentTextExtractor;

impl DocumentTextExtractor {
    pub fn new() -> Self {
        Self
    }

    fn extract_pdf(data: &[u8]) -> Result<String> {
        pdf_extract::extract_text_from_mem(data).map_err(|e| anyhow!("PDF extraction failed: {}", e))
    }
}

impl TextExtractor for DocumentTextExtractor {
    fn extract(&self, path: &Path) -> Result<String> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        let read = || std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()));

        match extension.as_str() {
            "pdf" => Self::extract_pdf(&read()?),
            "txt" | "md" => Ok(String::from_utf8_lossy(&read()?).into_owned()),
            other => Err(PipelineError::UnsupportedFormat(other.to_string()).into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_extract_text_files() {
        let dir = TempDir::new().unwrap();
        let txt = dir.path().join("notes.TXT");
        std::fs::write(&txt, "Quarterly notes").unwrap();
        let md = dir.path().join("readme.md");
        std::fs::write(&md, b"# Title\n\xffbody").unwrap();

        let extractor = DocumentTextExtractor::new();
        assert_eq!(extractor.extract(&txt).unwrap(), "Quarterly notes");
        assert!(extractor.extract(&md).unwrap().starts_with("# Title"));
    }

    #[test]
    fn test_unsupported_format() {
        let dir = TempDir::new().unwrap();
        let doc = dir.path().join("letter.docx");
        std::fs::write(&doc, "binary").unwrap();

        let err = DocumentTextExtractor::new().extract(&doc).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::UnsupportedFormat(ext)) if ext == "docx"
        ));
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        assert!(
            DocumentTextExtractor::new()
                .extract(&dir.path().join("gone.txt"))
                .is_err()
        );
    }
}
