//! Tabular upload decoding for the bulk importer.
//!
//! Turns raw uploaded bytes (CSV or XLSX/XLS) or pasted delimited text
//! into a header row plus string records. No type inference happens
//! here: every cell is coerced to a trimmed string and rows whose cells
//! are all blank are dropped. Downstream stages (preview, mapping,
//! commit) only ever see [`ParsedTable`].

use std::collections::HashMap;
use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Reader};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Upload formats recognised by the importer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabularFormat {
    Csv,
    Xlsx,
}

impl TabularFormat {
    /// Derive the format from a file name's extension (case-insensitive).
    pub fn from_filename(filename: &str) -> Option<Self> {
        let extension = extension_of(filename);
        match extension.as_str() {
            "csv" => Some(Self::Csv),
            "xlsx" | "xls" => Some(Self::Xlsx),
            _ => None,
        }
    }
}

/// A decoded upload: trimmed header names plus one string map per row.
///
/// Records map header name to cell value. When a file repeats a header
/// name, the rightmost column wins on lookup; the full header list keeps
/// the duplicates as uploaded.
#[derive(Debug, Clone, Default)]
pub struct ParsedTable {
    pub headers: Vec<String>,
    pub rows: Vec<HashMap<String, String>>,
}

impl ParsedTable {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// Failure modes of upload decoding.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// The file extension is not one of csv/xlsx/xls.
    #[error("unsupported file format '.{extension}'; upload a .csv or .xlsx file")]
    UnsupportedFormat { extension: String },

    /// The first row is missing or entirely blank, so columns cannot be
    /// named.
    #[error("the file has no header row")]
    NoHeader,

    /// The bytes could not be decoded as the detected format.
    #[error("could not read the file: {0}")]
    Malformed(String),
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Decode an uploaded file, choosing the decoder by file extension.
///
/// A file with headers but zero data rows decodes successfully with an
/// empty `rows`; callers decide how to surface that.
pub fn parse(bytes: &[u8], filename: &str) -> Result<ParsedTable, ParseError> {
    match TabularFormat::from_filename(filename) {
        Some(TabularFormat::Csv) => parse_delimited(bytes, b','),
        Some(TabularFormat::Xlsx) => parse_workbook(bytes),
        None => Err(ParseError::UnsupportedFormat {
            extension: extension_of(filename),
        }),
    }
}

/// Decode pasted delimited text (the bulk-paste variant of upload).
///
/// The delimiter is sniffed from the first line: tab if one is present,
/// comma otherwise.
pub fn parse_pasted(text: &str) -> Result<ParsedTable, ParseError> {
    let first_line = text.lines().next().unwrap_or("");
    let delimiter = if first_line.contains('\t') { b'\t' } else { b',' };
    parse_delimited(text.as_bytes(), delimiter)
}

// ---------------------------------------------------------------------------
// CSV / pasted text
// ---------------------------------------------------------------------------

fn parse_delimited(bytes: &[u8], delimiter: u8) -> Result<ParsedTable, ParseError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .delimiter(delimiter)
        .from_reader(bytes);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| ParseError::Malformed(e.to_string()))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    if headers.iter().all(|h| h.is_empty()) {
        return Err(ParseError::NoHeader);
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| ParseError::Malformed(e.to_string()))?;
        if let Some(row) = record_to_row(&headers, |i| record.get(i).unwrap_or("")) {
            rows.push(row);
        }
    }

    Ok(ParsedTable { headers, rows })
}

// ---------------------------------------------------------------------------
// XLSX / XLS
// ---------------------------------------------------------------------------

fn parse_workbook(bytes: &[u8]) -> Result<ParsedTable, ParseError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| ParseError::Malformed(e.to_string()))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or(ParseError::NoHeader)?
        .map_err(|e| ParseError::Malformed(e.to_string()))?;

    let mut sheet_rows = range.rows();
    let header_cells = sheet_rows.next().ok_or(ParseError::NoHeader)?;

    let headers: Vec<String> = header_cells.iter().map(cell_to_string).collect();
    if headers.iter().all(|h| h.is_empty()) {
        return Err(ParseError::NoHeader);
    }

    let mut rows = Vec::new();
    for cells in sheet_rows {
        let values: Vec<String> = (0..headers.len())
            .map(|i| cells.get(i).map(cell_to_string).unwrap_or_default())
            .collect();
        if values.iter().all(|v| v.is_empty()) {
            continue;
        }
        let mut map = HashMap::with_capacity(headers.len());
        for (header, value) in headers.iter().zip(values) {
            map.insert(header.clone(), value);
        }
        rows.push(map);
    }

    Ok(ParsedTable { headers, rows })
}

/// Render a worksheet cell as a trimmed string.
///
/// Whole-number floats print without a trailing `.0` so numeric phone
/// and id columns survive the spreadsheet round trip.
fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Int(v) => v.to_string(),
        Data::Float(v) => {
            if v.fract() == 0.0 && v.abs() < 1e15 {
                format!("{}", *v as i64)
            } else {
                v.to_string()
            }
        }
        Data::Bool(b) => b.to_string(),
        other => other.to_string().trim().to_string(),
    }
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Build a row map from indexed cell access; `None` when every cell is
/// blank. Insertion follows header order, so duplicate header names
/// resolve to the rightmost column.
fn record_to_row<'a>(
    headers: &[String],
    cell_at: impl Fn(usize) -> &'a str,
) -> Option<HashMap<String, String>> {
    let values: Vec<String> = (0..headers.len())
        .map(|i| cell_at(i).trim().to_string())
        .collect();

    if values.iter().all(|v| v.is_empty()) {
        return None;
    }

    let mut map = HashMap::with_capacity(headers.len());
    for (header, value) in headers.iter().zip(values) {
        map.insert(header.clone(), value);
    }
    Some(map)
}

fn extension_of(filename: &str) -> String {
    match filename.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => ext.to_lowercase(),
        _ => String::new(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
