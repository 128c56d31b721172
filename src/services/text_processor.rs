// Text Processing Service
// Document loading and whitespace normalization ahead of tokenization

use regex::Regex;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("Could not extract text from file")]
    Empty,
}

fn horizontal_ws_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[ \t]+").expect("horizontal whitespace regex"))
}

fn blank_lines_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n{3,}").expect("blank lines regex"))
}

/// Collapse runs of spaces/tabs, cap blank lines at one, and trim.
pub fn normalize_extracted_text(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let s = text.replace("\r\n", "\n").replace('\r', "\n");
    let s = horizontal_ws_re().replace_all(&s, " ");
    let s = blank_lines_re().replace_all(&s, "\n\n");
    s.trim().to_string()
}

/// Extract the text layer of a PDF held in memory.
pub fn extract_text_from_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    let raw = pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))?;
    Ok(normalize_extracted_text(&raw))
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

/// A document read from disk, normalized and ready to classify.
#[derive(Debug, Clone)]
pub struct LoadedDocument {
    pub file_name: String,
    pub file_size: u64,
    pub text: String,
}

/// Read a `.pdf` (text layer) or any other file as UTF-8 text.
///
/// Returns [`ExtractError::Empty`] when nothing but whitespace remains.
pub fn load_document(path: &Path) -> Result<LoadedDocument, ExtractError> {
    let bytes = fs::read(path).map_err(|source| ExtractError::Read {
        path: path.display().to_string(),
        source,
    })?;

    let text = if is_pdf(path) {
        extract_text_from_pdf(&bytes)?
    } else {
        normalize_extracted_text(&String::from_utf8_lossy(&bytes))
    };

    let file_name = path
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "input".to_string());

    if text.trim().is_empty() {
        warn!(file = %file_name, "[EXTRACT] no text extracted");
        return Err(ExtractError::Empty);
    }

    info!(
        file = %file_name,
        bytes = bytes.len(),
        chars = text.chars().count(),
        "[EXTRACT] document loaded"
    );
    Ok(LoadedDocument {
        file_name,
        file_size: bytes.len() as u64,
        text,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_collapses_whitespace() {
        let text = "Breaking:\t\tofficials   confirm \r\n\r\n\r\n\r\nthe report.  ";
        assert_eq!(
            normalize_extracted_text(text),
            "Breaking: officials confirm \n\nthe report."
        );
    }

    #[test]
    fn test_normalize_keeps_single_blank_line() {
        assert_eq!(normalize_extracted_text("a\n\nb"), "a\n\nb");
        assert_eq!(normalize_extracted_text("   "), "");
    }

    #[test]
    fn test_load_text_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("story.txt");
        fs::write(&path, "Scientists   discover\n\n\n\nwater on Mars").unwrap();

        let doc = load_document(&path).unwrap();
        assert_eq!(doc.file_name, "story.txt");
        assert_eq!(doc.text, "Scientists discover\n\nwater on Mars");
        assert!(doc.file_size > 0);
    }

    #[test]
    fn test_load_blank_file_is_empty_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blank.txt");
        fs::write(&path, " \n\t\n").unwrap();
        assert!(matches!(load_document(&path), Err(ExtractError::Empty)));
    }

    #[test]
    fn test_invalid_pdf_reports_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.PDF");
        fs::write(&path, b"not a pdf").unwrap();
        assert!(matches!(load_document(&path), Err(ExtractError::Pdf(_))));
    }
}
