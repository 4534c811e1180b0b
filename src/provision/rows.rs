//! Row extraction from uploaded spreadsheets.
//!
//! Both delimited text and binary workbooks become the same thing: a lazy
//! stream of trimmed text rows with the header already dropped. Short rows
//! come out as [`Diagnostic`]s, never as errors.

use std::io::Cursor;
use std::path::Path;

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use thiserror::Error;

use super::diagnostics::{Diagnostic, RejectReason};

/// Source format of an uploaded sheet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SheetFormat {
    Delimited,
    Workbook,
}

impl SheetFormat {
    pub fn from_filename(name: &str) -> Option<SheetFormat> {
        let ext = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())?;
        match ext.as_str() {
            "csv" | "txt" => Some(SheetFormat::Delimited),
            "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Some(SheetFormat::Workbook),
            _ => None,
        }
    }

    /// Extension first, then content sniffing (zip or OLE container means workbook).
    pub fn detect(file_name: &str, bytes: &[u8]) -> SheetFormat {
        if let Some(format) = SheetFormat::from_filename(file_name) {
            return format;
        }
        const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
        const CFB_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0];
        if bytes.starts_with(ZIP_MAGIC) || bytes.starts_with(CFB_MAGIC) {
            SheetFormat::Workbook
        } else {
            SheetFormat::Delimited
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SheetFormat::Delimited => "CSV",
            SheetFormat::Workbook => "Excel",
        }
    }
}

/// Minimum number of columns a data row needs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RowShape {
    pub min_columns: usize,
}

impl RowShape {
    /// username + password (or roll number)
    pub const CREATE: RowShape = RowShape { min_columns: 2 };
    /// username only
    pub const DELETE: RowShape = RowShape { min_columns: 1 };
}

/// One data row. `row` is 1-based and counts the header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawRow {
    pub row: usize,
    pub fields: Vec<String>,
}

impl RawRow {
    pub fn field(&self, idx: usize) -> &str {
        self.fields.get(idx).map(|s| s.as_str()).unwrap_or("")
    }
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("cannot open workbook: {0}")]
    Workbook(#[from] calamine::Error),

    #[error("workbook has no worksheets")]
    NoSheet,
}

/// Lazy, single-pass sequence of extracted rows.
pub struct RowStream {
    inner: Box<dyn Iterator<Item = Result<RawRow, Diagnostic>> + Send>,
}

impl Iterator for RowStream {
    type Item = Result<RawRow, Diagnostic>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

/// Turn uploaded bytes into a row stream, skipping the header row.
///
/// Delimited input is parsed as it is consumed. Workbooks are decoded up front
/// (the container format requires it) and only the first sheet is read.
pub fn extract_rows(bytes: Vec<u8>, format: SheetFormat, shape: RowShape) -> Result<RowStream, ExtractError> {
    let inner: Box<dyn Iterator<Item = Result<RawRow, Diagnostic>> + Send> = match format {
        SheetFormat::Delimited => Box::new(delimited_rows(bytes, shape)),
        SheetFormat::Workbook => Box::new(workbook_rows(bytes, shape)?),
    };
    Ok(RowStream { inner })
}

fn delimited_rows(bytes: Vec<u8>, shape: RowShape) -> impl Iterator<Item = Result<RawRow, Diagnostic>> + Send {
    let reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(Cursor::new(bytes));
    reader
        .into_records()
        .enumerate()
        .skip(1)
        .map(move |(idx, record)| {
            let row = idx + 1;
            match record {
                Ok(rec) => check_shape(row, rec.iter().map(|f| f.to_string()).collect(), shape),
                Err(e) => Err(Diagnostic::new(row, RejectReason::Malformed(e.to_string()), vec![])),
            }
        })
}

fn workbook_rows(bytes: Vec<u8>, shape: RowShape) -> Result<impl Iterator<Item = Result<RawRow, Diagnostic>> + Send, ExtractError> {
    let mut sheets = open_workbook_auto_from_rs(Cursor::new(bytes))?;
    let range = sheets.worksheet_range_at(0).ok_or(ExtractError::NoSheet)??;
    let rows: Vec<Vec<String>> = range.rows().map(cells_to_fields).collect();
    Ok(rows
        .into_iter()
        .enumerate()
        .skip(1)
        .map(move |(idx, fields)| check_shape(idx + 1, fields, shape)))
}

// Trailing empty cells are dropped so a row's width reflects what was typed,
// not the widest row of the sheet.
fn cells_to_fields(cells: &[Data]) -> Vec<String> {
    let mut fields: Vec<String> = cells.iter().map(|c| c.to_string().trim().to_string()).collect();
    while fields.last().map_or(false, |f| f.is_empty()) {
        fields.pop();
    }
    fields
}

fn check_shape(row: usize, fields: Vec<String>, shape: RowShape) -> Result<RawRow, Diagnostic> {
    if fields.len() < shape.min_columns {
        return Err(Diagnostic::too_few_columns(row, shape.min_columns, fields));
    }
    Ok(RawRow { row, fields })
}
