//! Turns uploaded PDF or Word bytes into plain résumé text.

use std::io::{Cursor, Read};
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

const PDF_MIME: &str = "application/pdf";
const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
const DOC_MIME: &str = "application/msword";

/// Body part of a Word document inside its zip container.
const DOCX_BODY: &str = "word/document.xml";

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unsupported file type: {0}")]
    Unsupported(String),

    #[error("Error reading PDF: {0}")]
    Pdf(String),

    #[error("Error reading DOCX: {0}")]
    Docx(String),

    #[error("no text could be extracted from the document")]
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    /// `.docx`, and legacy `.doc` which is attempted as the same container.
    Word,
}

impl DocumentKind {
    /// Picks the document kind from the declared media type, then the file extension.
    pub fn detect(content_type: Option<&str>, file_name: Option<&str>) -> Result<Self, ExtractError> {
        match content_type.map(|ct| ct.trim().to_ascii_lowercase()).as_deref() {
            Some(PDF_MIME) => return Ok(DocumentKind::Pdf),
            Some(DOCX_MIME) | Some(DOC_MIME) => return Ok(DocumentKind::Word),
            _ => {}
        }

        let extension = file_name
            .and_then(|name| name.rsplit_once('.'))
            .map(|(_, ext)| ext.to_ascii_lowercase());

        match extension.as_deref() {
            Some("pdf") => Ok(DocumentKind::Pdf),
            Some("docx") | Some("doc") => Ok(DocumentKind::Word),
            _ => Err(ExtractError::Unsupported(
                content_type
                    .or(file_name)
                    .unwrap_or("unknown")
                    .to_string(),
            )),
        }
    }
}

/// Extracts trimmed plain text. An empty result is reported as `ExtractError::Empty`.
pub fn extract_text(kind: DocumentKind, bytes: &[u8]) -> Result<String, ExtractError> {
    let text = match kind {
        DocumentKind::Pdf => extract_pdf(bytes)?,
        DocumentKind::Word => extract_docx(bytes)?,
    };

    let text = text.trim();
    if text.is_empty() {
        return Err(ExtractError::Empty);
    }
    Ok(text.to_string())
}

fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))
}

fn extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive =
        zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| ExtractError::Docx(e.to_string()))?;

    let mut xml = String::new();
    archive
        .by_name(DOCX_BODY)
        .map_err(|e| ExtractError::Docx(format!("{DOCX_BODY}: {e}")))?
        .read_to_string(&mut xml)
        .map_err(|e| ExtractError::Docx(e.to_string()))?;

    Ok(document_xml_to_text(&xml))
}

fn run_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"<w:t(?:\s[^>]*)?>([^<]*)</w:t>|<w:tab\s*/>|<w:br\s*/>")
            .expect("static regex is valid")
    })
}

/// One output line per `<w:p>` paragraph, text runs concatenated in order.
fn document_xml_to_text(xml: &str) -> String {
    let mut lines = Vec::new();

    for paragraph in xml.split("</w:p>") {
        let mut line = String::new();
        for capture in run_pattern().captures_iter(paragraph) {
            match capture.get(1) {
                Some(text) => line.push_str(&unescape_xml(text.as_str())),
                None if capture[0].starts_with("<w:tab") => line.push('\t'),
                None => line.push('\n'),
            }
        }
        lines.push(line);
    }

    // The segment after the last closing tag never holds a paragraph.
    lines.pop();
    lines.join("\n")
}

fn unescape_xml(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
