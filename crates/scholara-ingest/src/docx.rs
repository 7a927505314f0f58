//! Raw text from Office Open XML word-processing documents.
//!
//! Only the main document part is read. Formatting, headers, footers,
//! comments and embedded objects are discarded.

use std::io::{Cursor, Read};

use quick_xml::Reader;
use quick_xml::events::Event;

use crate::IngestError;

const DOCUMENT_PART: &str = "word/document.xml";
/// Upper bound on the decompressed main part (guards against zip bombs).
const MAX_DOCUMENT_XML: u64 = 64 * 1024 * 1024;

/// Extract the text runs of a `.docx` held in memory.
pub fn extract_docx_text(data: &[u8]) -> Result<String, IngestError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(data))
        .map_err(|e| IngestError::Docx(format!("failed to open DOCX container: {e}")))?;

    let part = archive
        .by_name(DOCUMENT_PART)
        .map_err(|e| IngestError::Docx(format!("missing {DOCUMENT_PART}: {e}")))?;
    if part.size() > MAX_DOCUMENT_XML {
        return Err(IngestError::Docx(format!(
            "{DOCUMENT_PART} exceeds {}MB",
            MAX_DOCUMENT_XML / 1024 / 1024
        )));
    }

    let mut xml = String::new();
    part.take(MAX_DOCUMENT_XML)
        .read_to_string(&mut xml)
        .map_err(|e| IngestError::Docx(format!("failed to read {DOCUMENT_PART}: {e}")))?;

    document_xml_text(&xml)
}

/// Walk `word/document.xml`, keeping `<w:t>` content.
///
/// Paragraph ends become newlines, `<w:tab/>` a tab, `<w:br/>` and
/// `<w:cr/>` a newline.
fn document_xml_text(xml: &str) -> Result<String, IngestError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut out = String::new();
    let mut in_text = false;
    // <w:tab/> inside <w:tabs> is a tab-stop definition, not content
    let mut in_tab_stops = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"t" => in_text = true,
                b"tabs" => in_tab_stops = true,
                _ => {}
            },
            Ok(Event::Empty(ref e)) => match e.local_name().as_ref() {
                b"tab" if !in_tab_stops => out.push('\t'),
                b"br" | b"cr" => out.push('\n'),
                b"p" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Text(ref e)) => {
                if in_text {
                    let text = e
                        .unescape()
                        .map_err(|err| IngestError::Docx(format!("bad text run: {err}")))?;
                    out.push_str(&text);
                }
            }
            Ok(Event::CData(ref e)) => {
                if in_text {
                    out.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"tabs" => in_tab_stops = false,
                b"p" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(IngestError::Docx(format!(
                    "malformed XML at byte {}: {e}",
                    reader.buffer_position()
                )));
            }
            _ => {}
        }
    }

    Ok(out.trim_end().to_string())
}
