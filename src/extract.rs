//! Per-format text extraction for uploaded files.
//!
//! Dispatch is by lowercased file extension. The public entry point
//! [`extract_file`] never fails: on internal extraction failure it falls back
//! to the raw file bytes interpreted as text, or to a placeholder string, so
//! the pipeline can always produce a non-empty document.

use std::io::Read;
use std::path::Path;

use crate::fingerprint::dotted_extension;

/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;
/// Maximum worksheets to process in an xlsx.
const XLSX_MAX_SHEETS: usize = 100;
/// Maximum cells to process per sheet (avoids unbounded memory).
const XLSX_MAX_CELLS_PER_SHEET: usize = 100_000;

/// Result of extracting one file.
#[derive(Debug)]
pub struct Extraction {
    pub text: String,
    /// True when the format-specific converter failed and raw/placeholder
    /// content was substituted.
    pub fallback: bool,
}

/// Internal extraction error. Never escapes [`extract_file`].
#[derive(Debug)]
enum ExtractError {
    Pdf(String),
    Html(String),
    Ooxml(String),
}

impl std::fmt::Display for ExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractError::Pdf(e) => write!(f, "PDF extraction failed: {}", e),
            ExtractError::Html(e) => write!(f, "HTML extraction failed: {}", e),
            ExtractError::Ooxml(e) => write!(f, "OOXML extraction failed: {}", e),
        }
    }
}

/// Extracts searchable text from `path` based on its extension.
pub fn extract_file(path: &Path) -> Extraction {
    let ext = dotted_extension(path);
    match ext.as_str() {
        ".pdf" => match std::fs::read(path).map_err(|e| ExtractError::Pdf(e.to_string())) {
            Ok(bytes) => match extract_pdf(&bytes) {
                Ok(text) => Extraction {
                    text,
                    fallback: false,
                },
                Err(e) => {
                    eprintln!("warning: {}: {}", path.display(), e);
                    Extraction {
                        text: format!("[unreadable PDF file - {} bytes]", bytes.len()),
                        fallback: true,
                    }
                }
            },
            Err(e) => {
                eprintln!("warning: {}: {}", path.display(), e);
                Extraction {
                    text: "[unreadable PDF file]".to_string(),
                    fallback: true,
                }
            }
        },
        ".html" | ".htm" => {
            let raw = raw_text(path);
            match extract_html(&raw.text) {
                Ok(text) if !text.trim().is_empty() => Extraction {
                    text,
                    fallback: false,
                },
                Ok(_) => raw,
                Err(e) => {
                    eprintln!("warning: {}: {}", path.display(), e);
                    Extraction {
                        fallback: true,
                        ..raw
                    }
                }
            }
        }
        ".xlsx" | ".xls" => match std::fs::read(path) {
            Ok(bytes) => match extract_xlsx(&bytes) {
                Ok(text) => Extraction {
                    text,
                    fallback: false,
                },
                Err(e) => {
                    // .xls (pre-OOXML binary) always lands here.
                    eprintln!("warning: {}: {}", path.display(), e);
                    Extraction {
                        text: String::from_utf8_lossy(&bytes).into_owned(),
                        fallback: true,
                    }
                }
            },
            Err(_) => Extraction {
                text: "[unreadable spreadsheet file]".to_string(),
                fallback: true,
            },
        },
        // CSV, plain text, CSS, .info, and everything else: raw content.
        _ => raw_text(path),
    }
}

/// Raw content fallback chain: UTF-8 text, then lossy bytes, then placeholder.
fn raw_text(path: &Path) -> Extraction {
    if let Ok(text) = std::fs::read_to_string(path) {
        return Extraction {
            text,
            fallback: false,
        };
    }
    match std::fs::read(path) {
        Ok(bytes) => Extraction {
            text: String::from_utf8_lossy(&bytes).into_owned(),
            fallback: false,
        },
        Err(e) => {
            eprintln!("warning: cannot read {}: {}", path.display(), e);
            Extraction {
                text: "[unable to read file content]".to_string(),
                fallback: true,
            }
        }
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))
}

/// Strips markup from HTML, keeping text content. Script and style bodies
/// are dropped.
fn extract_html(html: &str) -> Result<String, ExtractError> {
    let mut reader = quick_xml::Reader::from_str(html);
    reader.config_mut().trim_text(true);
    reader.config_mut().check_end_names = false;
    reader.config_mut().allow_unmatched_ends = true;

    let mut out = String::new();
    let mut skip_depth = 0usize;
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                let name = e.local_name();
                if matches!(name.as_ref(), b"script" | b"style") {
                    skip_depth += 1;
                }
            }
            Ok(quick_xml::events::Event::End(e)) => {
                let name = e.local_name();
                if matches!(name.as_ref(), b"script" | b"style") {
                    skip_depth = skip_depth.saturating_sub(1);
                }
            }
            Ok(quick_xml::events::Event::Text(te)) if skip_depth == 0 => {
                let text = te
                    .unescape()
                    .unwrap_or_else(|_| String::from_utf8_lossy(te.as_ref()));
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    if !out.is_empty() {
                        out.push(' ');
                    }
                    out.push_str(trimmed);
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(ExtractError::Html(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

fn read_zip_entry_bounded(
    archive: &mut zip::ZipArchive<std::io::Cursor<&[u8]>>,
    name: &str,
    max_bytes: u64,
) -> Result<Vec<u8>, ExtractError> {
    let entry = archive
        .by_name(name)
        .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
    let mut out = Vec::new();
    entry
        .take(max_bytes)
        .read_to_end(&mut out)
        .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
    if out.len() as u64 >= max_bytes {
        return Err(ExtractError::Ooxml(format!(
            "ZIP entry {} exceeds size limit ({} bytes)",
            name, max_bytes
        )));
    }
    Ok(out)
}

fn extract_xlsx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
    // sharedStrings.xml is absent when every cell is an inline value.
    let shared_strings = if archive.file_names().any(|n| n == "xl/sharedStrings.xml") {
        read_shared_strings(&mut archive)?
    } else {
        Vec::new()
    };
    let sheet_names = list_worksheet_names(&mut archive)?;
    let mut out = String::new();
    for (idx, name) in sheet_names.into_iter().take(XLSX_MAX_SHEETS).enumerate() {
        let sheet_xml = read_zip_entry_bounded(&mut archive, &name, MAX_XML_ENTRY_BYTES)?;
        let cell_texts = extract_xlsx_sheet_cells(&sheet_xml, &shared_strings)?;
        if idx > 0 && !out.is_empty() {
            out.push(' ');
        }
        out.push_str(&cell_texts);
    }
    Ok(out)
}

fn read_shared_strings(
    archive: &mut zip::ZipArchive<std::io::Cursor<&[u8]>>,
) -> Result<Vec<String>, ExtractError> {
    let xml = read_zip_entry_bounded(archive, "xl/sharedStrings.xml", MAX_XML_ENTRY_BYTES)?;
    let mut strings = Vec::new();
    let mut reader = quick_xml::Reader::from_reader(xml.as_slice());
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut in_si = false;
    let mut in_t = false;
    // One entry per <si>; rich-text runs (<t> fragments) collapse into it.
    let mut current = String::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                if e.local_name().as_ref() == b"si" {
                    in_si = true;
                    current.clear();
                } else if in_si && e.local_name().as_ref() == b"t" {
                    in_t = true;
                }
            }
            Ok(quick_xml::events::Event::Text(te)) if in_t => {
                current.push_str(&te.unescape().unwrap_or_default());
            }
            Ok(quick_xml::events::Event::End(e)) => {
                if e.local_name().as_ref() == b"t" {
                    in_t = false;
                } else if e.local_name().as_ref() == b"si" {
                    in_si = false;
                    strings.push(std::mem::take(&mut current));
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(strings)
}

fn list_worksheet_names(
    archive: &mut zip::ZipArchive<std::io::Cursor<&[u8]>>,
) -> Result<Vec<String>, ExtractError> {
    let mut names: Vec<String> = archive
        .file_names()
        .filter(|n| n.starts_with("xl/worksheets/sheet") && n.ends_with(".xml"))
        .map(|s| s.to_string())
        .collect();
    names.sort_by_key(|name| {
        name.trim_start_matches("xl/worksheets/sheet")
            .trim_end_matches(".xml")
            .parse::<u32>()
            .unwrap_or(u32::MAX)
    });
    Ok(names)
}

fn extract_xlsx_sheet_cells(xml: &[u8], shared_strings: &[String]) -> Result<String, ExtractError> {
    let mut cells: Vec<String> = Vec::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut in_v = false;
    let mut cell_is_shared_str = false;
    let mut cell_count = 0usize;
    loop {
        if cell_count >= XLSX_MAX_CELLS_PER_SHEET {
            break;
        }
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                if e.local_name().as_ref() == b"c" {
                    cell_is_shared_str = e.attributes().any(|a| {
                        a.as_ref()
                            .map(|a| a.key.as_ref() == b"t" && a.value.as_ref() == b"s")
                            .unwrap_or(false)
                    });
                } else if e.local_name().as_ref() == b"v" {
                    in_v = true;
                }
            }
            Ok(quick_xml::events::Event::Text(te)) if in_v => {
                let v = te.unescape().unwrap_or_default();
                let s = v.trim();
                if !s.is_empty() {
                    if cell_is_shared_str {
                        if let Ok(i) = s.parse::<usize>() {
                            if i < shared_strings.len() {
                                cells.push(shared_strings[i].clone());
                                cell_count += 1;
                            }
                        }
                    } else {
                        cells.push(s.to_string());
                        cell_count += 1;
                    }
                }
                in_v = false;
            }
            Ok(quick_xml::events::Event::End(e)) => {
                if e.local_name().as_ref() == b"v" {
                    in_v = false;
                } else if e.local_name().as_ref() == b"c" {
                    cell_is_shared_str = false;
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(cells.join(" "))
}
