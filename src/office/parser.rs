//! Plain-text extraction from uploaded files

use super::unescape_xml;
use crate::error::{Result, WorkerError};
use regex::Regex;
use std::io::{Cursor, Read};
use std::panic;
use std::sync::OnceLock;
use zip::ZipArchive;

/// Turns file bytes into plain text
pub trait DocumentParser: Send + Sync {
    /// Extract the text of `data`; the file name selects the format
    fn parse(&self, data: &[u8], file_name: &str) -> Result<String>;
}

/// Parser for plain-text formats and Office Open XML documents
///
/// Handles txt, md, csv, pdf, docx and xlsx. Anything else is an error.
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinParser;

impl DocumentParser for BuiltinParser {
    fn parse(&self, data: &[u8], file_name: &str) -> Result<String> {
        match extension(file_name).as_str() {
            "txt" | "md" | "markdown" | "csv" => Ok(String::from_utf8_lossy(data).into_owned()),
            "pdf" => pdf_text(data),
            "docx" => docx_text(data),
            "xlsx" => xlsx_text(data),
            other => Err(WorkerError::DocumentError(format!(
                "Unsupported document format: {}",
                if other.is_empty() { file_name } else { other }
            ))),
        }
    }
}

/// Lowercased file extension, empty when there is none
pub fn extension(file_name: &str) -> String {
    file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default()
}

fn read_entry(archive: &mut ZipArchive<Cursor<&[u8]>>, name: &str) -> Result<String> {
    let mut entry = archive.by_name(name)?;
    let mut xml = String::new();
    entry.read_to_string(&mut xml)?;
    Ok(xml)
}

/// Text layer of a PDF; scanned pages without one yield nothing
fn pdf_text(data: &[u8]) -> Result<String> {
    // pdf-extract panics on some malformed content streams
    let extracted = panic::catch_unwind(|| pdf_extract::extract_text_from_mem(data))
        .map_err(|_| WorkerError::DocumentError("PDF text extraction panicked".to_string()))?
        .map_err(|e| WorkerError::DocumentError(format!("Invalid PDF: {}", e)))?;
    Ok(collapse_blank_lines(&extracted))
}

fn docx_text(data: &[u8]) -> Result<String> {
    static BREAKS: OnceLock<Regex> = OnceLock::new();
    static TAGS: OnceLock<Regex> = OnceLock::new();
    let breaks = BREAKS.get_or_init(|| Regex::new(r"</w:p>|<w:br\s*/>|<w:cr\s*/>").expect("invalid break regex"));
    let tags = TAGS.get_or_init(|| Regex::new(r"<[^>]+>").expect("invalid tag regex"));

    let mut archive = ZipArchive::new(Cursor::new(data))?;
    let xml = read_entry(&mut archive, "word/document.xml")?;

    let xml = xml.replace("<w:tab/>", "\t");
    let with_breaks = breaks.replace_all(&xml, "\n");
    let text = unescape_xml(&tags.replace_all(&with_breaks, ""));

    Ok(collapse_blank_lines(&text))
}

fn xlsx_text(data: &[u8]) -> Result<String> {
    static TEXT: OnceLock<Regex> = OnceLock::new();
    let text_re = TEXT.get_or_init(|| Regex::new(r"(?s)<t[^>]*>(.*?)</t>").expect("invalid text regex"));

    let mut archive = ZipArchive::new(Cursor::new(data))?;
    let mut parts: Vec<String> = archive
        .file_names()
        .filter(|name| *name == "xl/sharedStrings.xml" || name.starts_with("xl/worksheets/"))
        .map(str::to_string)
        .collect();
    parts.sort();

    let mut lines = Vec::new();
    for part in parts {
        let xml = read_entry(&mut archive, &part)?;
        lines.extend(
            text_re
                .captures_iter(&xml)
                .map(|cap| unescape_xml(&cap[1]))
                .filter(|text| !text.trim().is_empty()),
        );
    }

    Ok(lines.join("\n"))
}

fn collapse_blank_lines(text: &str) -> String {
    text.lines()
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
