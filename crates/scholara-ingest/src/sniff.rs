//! MIME detection for uploads that arrive without a useful content type.

use crate::{MIME_DOCX, MIME_PDF};

/// Guess a MIME type from the file name and magic bytes.
///
/// Used when the client declares nothing or `application/octet-stream`.
/// Returns `None` when nothing supported is recognised.
pub fn sniff_mime(filename: &str, data: &[u8]) -> Option<&'static str> {
    let lower = filename.to_lowercase();

    if data.starts_with(b"%PDF-") {
        return Some(MIME_PDF);
    }
    if lower.ends_with(".pdf") {
        // Let the PDF backend report the damage
        return Some(MIME_PDF);
    }
    if lower.ends_with(".docx") && data.starts_with(b"PK") {
        return Some(MIME_DOCX);
    }

    let extension = lower.rsplit_once('.').map(|(_, ext)| ext)?;
    match extension {
        "txt" | "text" => Some("text/plain"),
        "md" | "markdown" => Some("text/markdown"),
        "csv" => Some("text/csv"),
        _ => None,
    }
}

/// Resolve the MIME type used for extraction: the declared one unless it
/// is missing or generic, in which case sniff.
pub fn effective_mime(declared: Option<&str>, filename: &str, data: &[u8]) -> Option<String> {
    match declared.map(str::trim) {
        Some(d) if !d.is_empty() && !d.eq_ignore_ascii_case("application/octet-stream") => {
            Some(d.to_string())
        }
        _ => sniff_mime(filename, data).map(str::to_string),
    }
}
