//! Input decoding: spreadsheet grids and positioned document pages.
//!
//! Spreadsheets arrive as `.xlsx` (first worksheet) or as a JSON grid
//! (`[[cell, ...], ...]`). Documents arrive as JSON pages of positioned
//! fragments, the shape a PDF text-layer export produces:
//!
//! ```json
//! [{ "page": 1, "fragments": [{ "x": 72.0, "y": 700.5, "text": "MÓDULO" }] }]
//! ```
//!
//! Everything here works on bytes so the caller can fingerprint exactly
//! what was parsed.

use std::io::Read;
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde_json::Value;
use thiserror::Error;

use curriculum_harness_core::segment::Page;

/// Maximum cells read from one worksheet.
const XLSX_MAX_CELLS_PER_SHEET: usize = 100_000;
/// Widest column accepted from a cell reference (`XFD` is the format's limit).
const XLSX_MAX_COLUMNS: usize = 16_384;
/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unsupported input format: {0} (expected .xlsx or .json)")]
    UnsupportedFormat(String),

    #[error("XLSX extraction failed: {0}")]
    Ooxml(String),

    #[error("invalid JSON input: {0}")]
    Json(#[from] serde_json::Error),

    #[error("JSON spreadsheet must be an array of rows, got {0}")]
    NotAGrid(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpreadsheetFormat {
    Xlsx,
    JsonGrid,
}

impl SpreadsheetFormat {
    pub fn from_path(path: &Path) -> Result<Self, ExtractError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "xlsx" => Ok(Self::Xlsx),
            "json" => Ok(Self::JsonGrid),
            _ => Err(ExtractError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

/// Decode a spreadsheet into rows of cell text.
pub fn spreadsheet_rows(
    bytes: &[u8],
    format: SpreadsheetFormat,
) -> Result<Vec<Vec<String>>, ExtractError> {
    match format {
        SpreadsheetFormat::Xlsx => xlsx_rows(bytes),
        SpreadsheetFormat::JsonGrid => json_rows(bytes),
    }
}

/// Decode positioned document pages.
pub fn document_pages(bytes: &[u8]) -> Result<Vec<Page>, ExtractError> {
    Ok(serde_json::from_slice(bytes)?)
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn json_rows(bytes: &[u8]) -> Result<Vec<Vec<String>>, ExtractError> {
    let value: Value = serde_json::from_slice(bytes)?;
    let Value::Array(rows) = value else {
        return Err(ExtractError::NotAGrid("a non-array value"));
    };
    rows.iter()
        .map(|row| match row {
            Value::Array(cells) => Ok(cells.iter().map(cell_text).collect()),
            Value::Null => Ok(Vec::new()),
            _ => Err(ExtractError::NotAGrid("a row that is not an array")),
        })
        .collect()
}

type Archive<'a> = zip::ZipArchive<std::io::Cursor<&'a [u8]>>;

fn read_zip_entry_bounded(
    archive: &mut Archive<'_>,
    name: &str,
    max_bytes: u64,
) -> Result<Vec<u8>, ExtractError> {
    let entry = archive
        .by_name(name)
        .map_err(|e| ExtractError::Ooxml(format!("{}: {}", name, e)))?;
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

fn xlsx_rows(bytes: &[u8]) -> Result<Vec<Vec<String>>, ExtractError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
    let shared_strings = if archive.file_names().any(|n| n == "xl/sharedStrings.xml") {
        let xml =
            read_zip_entry_bounded(&mut archive, "xl/sharedStrings.xml", MAX_XML_ENTRY_BYTES)?;
        parse_shared_strings(&xml)?
    } else {
        Vec::new()
    };
    let sheet = first_worksheet_name(&archive)
        .ok_or_else(|| ExtractError::Ooxml("workbook has no worksheets".to_string()))?;
    let xml = read_zip_entry_bounded(&mut archive, &sheet, MAX_XML_ENTRY_BYTES)?;
    parse_sheet(&xml, &shared_strings)
}

fn first_worksheet_name(archive: &Archive<'_>) -> Option<String> {
    archive
        .file_names()
        .filter(|n| n.starts_with("xl/worksheets/sheet") && n.ends_with(".xml"))
        .min_by_key(|name| {
            name.trim_start_matches("xl/worksheets/sheet")
                .trim_end_matches(".xml")
                .parse::<u32>()
                .unwrap_or(u32::MAX)
        })
        .map(str::to_string)
}

/// Every `<si>` entry, concatenating rich-text runs.
fn parse_shared_strings(xml: &[u8]) -> Result<Vec<String>, ExtractError> {
    let mut strings = Vec::new();
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut current: Option<String> = None;
    let mut in_t = false;
    // phonetic runs repeat the text in another script
    let mut in_phonetic = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"si" => current = Some(String::new()),
                b"rPh" => in_phonetic = true,
                b"t" => in_t = current.is_some() && !in_phonetic,
                _ => {}
            },
            Ok(Event::Empty(e)) if e.local_name().as_ref() == b"si" => strings.push(String::new()),
            Ok(Event::Text(te)) if in_t => {
                if let Some(s) = current.as_mut() {
                    let text = te.unescape().map_err(|e| ExtractError::Ooxml(e.to_string()))?;
                    s.push_str(&text);
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"si" => {
                    if let Some(s) = current.take() {
                        strings.push(s);
                    }
                }
                b"rPh" => in_phonetic = false,
                b"t" => in_t = false,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(strings)
}

/// Zero-based column index of a cell reference such as `"AB12"`.
pub fn column_index(reference: &str) -> Option<usize> {
    let letters: Vec<u8> = reference
        .bytes()
        .take_while(|b| b.is_ascii_alphabetic())
        .collect();
    if letters.is_empty() {
        return None;
    }
    let mut col = 0usize;
    for b in letters {
        col = col * 26 + (b.to_ascii_uppercase() - b'A' + 1) as usize;
        if col > XLSX_MAX_COLUMNS {
            return None;
        }
    }
    Some(col - 1)
}

#[derive(Debug, Default)]
struct CellState {
    column: usize,
    kind: CellKind,
    value: String,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
enum CellKind {
    #[default]
    Number,
    Shared,
    Inline,
    Text,
    Bool,
}

fn attribute(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .map(|a| String::from_utf8_lossy(&a.value).into_owned())
}

fn parse_sheet(xml: &[u8], shared_strings: &[String]) -> Result<Vec<Vec<String>>, ExtractError> {
    let mut rows = Vec::new();
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut row: Option<Vec<String>> = None;
    let mut cell: Option<CellState> = None;
    let mut in_value = false;
    let mut cell_count = 0usize;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"row" => row = Some(Vec::new()),
                b"c" => {
                    let next = row.as_ref().map(Vec::len).unwrap_or(0);
                    let column = attribute(&e, b"r")
                        .and_then(|r| column_index(&r))
                        .unwrap_or(next);
                    let kind = match attribute(&e, b"t").as_deref() {
                        Some("s") => CellKind::Shared,
                        Some("inlineStr") => CellKind::Inline,
                        Some("str") => CellKind::Text,
                        Some("b") => CellKind::Bool,
                        _ => CellKind::Number,
                    };
                    cell = Some(CellState {
                        column,
                        kind,
                        value: String::new(),
                    });
                }
                b"v" | b"t" => in_value = cell.is_some(),
                _ => {}
            },
            Ok(Event::Empty(e)) if e.local_name().as_ref() == b"row" => rows.push(Vec::new()),
            Ok(Event::Text(te)) if in_value => {
                if let Some(c) = cell.as_mut() {
                    let text = te.unescape().map_err(|e| ExtractError::Ooxml(e.to_string()))?;
                    c.value.push_str(&text);
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"v" | b"t" => in_value = false,
                b"c" => {
                    if let (Some(c), Some(r)) = (cell.take(), row.as_mut()) {
                        let text = match c.kind {
                            CellKind::Shared => c
                                .value
                                .trim()
                                .parse::<usize>()
                                .ok()
                                .and_then(|i| shared_strings.get(i).cloned())
                                .unwrap_or_default(),
                            CellKind::Bool => match c.value.trim() {
                                "1" => "TRUE".to_string(),
                                _ => "FALSE".to_string(),
                            },
                            _ => c.value,
                        };
                        if r.len() <= c.column {
                            r.resize(c.column + 1, String::new());
                        }
                        r[c.column] = text;
                        cell_count += 1;
                    }
                }
                b"row" => {
                    if let Some(r) = row.take() {
                        rows.push(r);
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
        if cell_count >= XLSX_MAX_CELLS_PER_SHEET {
            break;
        }
    }
    Ok(rows)
}
