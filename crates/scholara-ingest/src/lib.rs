use serde::Serialize;
use thiserror::Error;

pub mod docx;
pub mod sniff;

pub use sniff::{effective_mime, sniff_mime};

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_DOCX: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("unsupported file type: {0}")]
    UnsupportedFileType(String),
    #[error("PDF extraction error: {0}")]
    Pdf(#[from] scholara_core::BackendError),
    #[error("DOCX extraction error: {0}")]
    Docx(String),
    #[cfg(not(feature = "pdf"))]
    #[error("PDF support not compiled in (enable the `pdf` feature of scholara-ingest)")]
    NoPdfSupport,
}

/// Text pulled out of an uploaded document. Not persisted here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractedText {
    pub text: String,
}

/// Which extraction strategy a MIME type selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Pdf,
    Docx,
    PlainText,
}

/// Lowercased essence of a MIME type (`Text/Plain; charset=utf-8` → `text/plain`).
pub fn essence(mime_type: &str) -> String {
    mime_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}

/// Pick the extraction strategy for a declared MIME type.
pub fn strategy_for(mime_type: &str) -> Result<Strategy, IngestError> {
    let mime = essence(mime_type);
    match mime.as_str() {
        MIME_PDF => Ok(Strategy::Pdf),
        MIME_DOCX => Ok(Strategy::Docx),
        m if m.starts_with("text/") => Ok(Strategy::PlainText),
        _ => Err(IngestError::UnsupportedFileType(mime_type.to_string())),
    }
}

/// Extract text from an in-memory document.
///
/// Dispatches on the declared MIME type:
/// - `application/pdf` → PDF backend (requires `pdf` feature / mupdf)
/// - DOCX (`…wordprocessingml.document`) → raw text runs, formatting dropped
/// - `text/*` → UTF-8 decode, invalid sequences replaced
/// - anything else → [`IngestError::UnsupportedFileType`]
///
/// The whole buffer is processed in memory; callers enforce size limits.
pub fn extract_text(data: &[u8], mime_type: &str) -> Result<ExtractedText, IngestError> {
    let text = match strategy_for(mime_type)? {
        Strategy::Pdf => extract_pdf(data)?,
        Strategy::Docx => docx::extract_docx_text(data)?,
        Strategy::PlainText => String::from_utf8_lossy(data).into_owned(),
    };
    tracing::debug!(mime_type, bytes = data.len(), chars = text.len(), "extracted text");
    Ok(ExtractedText { text })
}

#[cfg(feature = "pdf")]
fn extract_pdf(data: &[u8]) -> Result<String, IngestError> {
    use scholara_core::PdfBackend;

    let backend = scholara_pdf_mupdf::MupdfBackend::new();
    Ok(backend.extract_text(data)?)
}

#[cfg(not(feature = "pdf"))]
fn extract_pdf(_data: &[u8]) -> Result<String, IngestError> {
    Err(IngestError::NoPdfSupport)
}
