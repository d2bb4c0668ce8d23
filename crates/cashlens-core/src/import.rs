//! Ledger file parsers (delimited text and spreadsheets)
//!
//! Turns an uploaded file into ordered `RawRow`s. The first row of every
//! format is the header; later rows map positionally onto it. Nothing here
//! interprets amounts or categories, see `normalize` for that.

use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use std::path::Path;

use async_trait::async_trait;
use calamine::{Data, Reader};
use csv::ReaderBuilder;
use tracing::debug;

use crate::error::ParseError;
use crate::models::{CellValue, RawRow};

/// Supported input formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// Comma separated values
    Csv,
    /// Tab separated values
    Tsv,
    /// Excel workbook (xlsx or legacy xls), first sheet only
    Spreadsheet,
}

impl FileKind {
    /// Detect the format from a file extension (case-insensitive)
    pub fn from_path(path: &Path) -> Result<Self, ParseError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "csv" => Ok(FileKind::Csv),
            "tsv" => Ok(FileKind::Tsv),
            "xlsx" | "xls" => Ok(FileKind::Spreadsheet),
            _ => Err(ParseError::UnsupportedFormat(
                path.file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string()),
            )),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Csv => "csv",
            FileKind::Tsv => "tsv",
            FileKind::Spreadsheet => "spreadsheet",
        }
    }
}

/// Source of file bytes
///
/// The file read is one of the pipeline's suspension points, so it is
/// async and injectable.
#[async_trait]
pub trait FileSource: Send + Sync {
    async fn read_bytes(&self, path: &Path) -> std::io::Result<Vec<u8>>;
}

/// Reads files from the local filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct FsSource;

#[async_trait]
impl FileSource for FsSource {
    async fn read_bytes(&self, path: &Path) -> std::io::Result<Vec<u8>> {
        tokio::fs::read(path).await
    }
}

/// Resolve the file kind, read the bytes and parse them
///
/// Unsupported extensions are rejected before the source is touched.
pub async fn load_file<S: FileSource + ?Sized>(
    source: &S,
    path: &Path,
) -> Result<Vec<RawRow>, ParseError> {
    let kind = FileKind::from_path(path)?;
    let bytes = source.read_bytes(path).await?;
    debug!(
        path = %path.display(),
        kind = kind.as_str(),
        bytes = bytes.len(),
        "Read ledger file"
    );
    parse(&bytes, kind)
}

/// Parse file bytes of a known kind into raw rows
pub fn parse(bytes: &[u8], kind: FileKind) -> Result<Vec<RawRow>, ParseError> {
    let rows = match kind {
        FileKind::Csv => parse_delimited(bytes, b',')?,
        FileKind::Tsv => parse_delimited(bytes, b'\t')?,
        FileKind::Spreadsheet => parse_spreadsheet(bytes)?,
    };
    debug!("Parsed {} {} rows", rows.len(), kind.as_str());
    Ok(rows)
}

/// Parse delimited text with a header row
///
/// Short rows are padded with empty cells, cells beyond the header width
/// are dropped.
fn parse_delimited(bytes: &[u8], delimiter: u8) -> Result<Vec<RawRow>, ParseError> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(bytes);

    let headers = unique_headers(
        rdr.headers()?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').to_string())
            .collect(),
    );

    let mut rows = Vec::new();
    for (line, result) in rdr.records().enumerate() {
        let record = result?;

        if record.len() != headers.len() {
            debug!(
                row = line + 1,
                expected = headers.len(),
                found = record.len(),
                "Row width does not match header"
            );
        }

        let row: RawRow = headers
            .iter()
            .enumerate()
            .map(|(i, header)| {
                let cell = record.get(i).map(CellValue::from_text).unwrap_or(CellValue::Empty);
                (header.clone(), cell)
            })
            .collect();
        rows.push(row);
    }

    Ok(rows)
}

/// Parse the first sheet of a workbook with a header row
fn parse_spreadsheet(bytes: &[u8]) -> Result<Vec<RawRow>, ParseError> {
    let mut workbook = calamine::open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;

    let Some(range) = workbook.worksheet_range_at(0) else {
        return Ok(Vec::new());
    };
    let range = range?;

    let mut sheet_rows = range.rows();
    let Some(header_row) = sheet_rows.next() else {
        return Ok(Vec::new());
    };
    let headers = header_labels(header_row);

    let mut rows = Vec::new();
    for cells in sheet_rows {
        let row: RawRow = headers
            .iter()
            .enumerate()
            .map(|(i, header)| {
                let cell = cells.get(i).map(cell_value).unwrap_or(CellValue::Empty);
                (header.clone(), cell)
            })
            .collect();

        if !row.is_blank() {
            rows.push(row);
        }
    }

    Ok(rows)
}

/// Rename repeated labels to `label_1`, `label_2`, ... so no column is lost
fn unique_headers(labels: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut repeats: HashMap<String, usize> = HashMap::new();

    labels
        .into_iter()
        .map(|label| {
            if seen.insert(label.clone()) {
                return label;
            }
            let n = repeats.entry(label.clone()).or_insert(0);
            loop {
                *n += 1;
                let candidate = format!("{}_{}", label, n);
                if seen.insert(candidate.clone()) {
                    debug!(column = %label, renamed = %candidate, "Duplicate header renamed");
                    return candidate;
                }
            }
        })
        .collect()
}

/// Header labels for a sheet; blank headers get `__EMPTY`, `__EMPTY_1`, ...
fn header_labels(cells: &[Data]) -> Vec<String> {
    let mut blanks = 0;
    let labels: Vec<String> = cells
        .iter()
        .map(|cell| {
            let label = cell.to_string().trim().to_string();
            if !label.is_empty() {
                return label;
            }
            let label = if blanks == 0 {
                "__EMPTY".to_string()
            } else {
                format!("__EMPTY_{}", blanks)
            };
            blanks += 1;
            label
        })
        .collect();
    unique_headers(labels)
}

fn cell_value(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Empty,
        Data::String(s) => CellValue::from_text(s),
        Data::Float(f) => CellValue::Number(*f),
        Data::Int(i) => CellValue::Number(*i as f64),
        other => CellValue::from_text(&other.to_string()),
    }
}

/// Path helper for callers that only have a file name (uploads)
pub fn file_kind_for(name: &str) -> Result<FileKind, ParseError> {
    FileKind::from_path(Path::new(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        reads: AtomicUsize,
        content: Vec<u8>,
    }

    #[async_trait]
    impl FileSource for CountingSource {
        async fn read_bytes(&self, _path: &Path) -> std::io::Result<Vec<u8>> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            Ok(self.content.clone())
        }
    }

    fn counting(content: &str) -> CountingSource {
        CountingSource {
            reads: AtomicUsize::new(0),
            content: content.as_bytes().to_vec(),
        }
    }

    #[test]
    fn test_file_kind_detection() {
        assert_eq!(file_kind_for("ledger.csv").unwrap(), FileKind::Csv);
        assert_eq!(file_kind_for("LEDGER.CSV").unwrap(), FileKind::Csv);
        assert_eq!(file_kind_for("ledger.tsv").unwrap(), FileKind::Tsv);
        assert_eq!(file_kind_for("book.xlsx").unwrap(), FileKind::Spreadsheet);
        assert_eq!(file_kind_for("book.xls").unwrap(), FileKind::Spreadsheet);
        assert!(matches!(
            file_kind_for("notes.txt"),
            Err(ParseError::UnsupportedFormat(name)) if name == "notes.txt"
        ));
        assert!(matches!(
            file_kind_for("no_extension"),
            Err(ParseError::UnsupportedFormat(_))
        ));
    }

    #[tokio::test]
    async fn test_unsupported_extension_never_reads() {
        let source = counting("Amount\n1\n");
        let result = load_file(&source, Path::new("ledger.txt")).await;

        assert!(matches!(result, Err(ParseError::UnsupportedFormat(_))));
        assert_eq!(source.reads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_load_file_reads_once() {
        let source = counting("Amount,Category\n10,Salary\n");
        let rows = load_file(&source, Path::new("ledger.csv")).await.unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(source.reads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_parse_csv_with_header() {
        let csv = "Date,Description,Amount,Category\n\
                   2024-01-01,Paycheck,1000,Salary\n\
                   2024-01-03,Landlord,-400,Rent\n";
        let rows = parse(csv.as_bytes(), FileKind::Csv).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("Amount"), Some(&CellValue::Text("1000".into())));
        assert_eq!(rows[1].get("Category"), Some(&CellValue::Text("Rent".into())));
        let columns: Vec<_> = rows[0].columns().collect();
        assert_eq!(columns, vec!["Date", "Description", "Amount", "Category"]);
    }

    #[test]
    fn test_parse_csv_short_and_long_rows() {
        let csv = "Amount,Category,Note\n-5,Food\n7,Gift,birthday,extra\n";
        let rows = parse(csv.as_bytes(), FileKind::Csv).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("Note"), Some(&CellValue::Empty));
        assert_eq!(rows[0].len(), 3);
        assert_eq!(rows[1].len(), 3);
        assert_eq!(rows[1].get("Note"), Some(&CellValue::Text("birthday".into())));
    }

    #[test]
    fn test_parse_csv_empty_cells() {
        let rows = parse(b"Amount,Category\n12,\n", FileKind::Csv).unwrap();
        assert_eq!(rows[0].get("Category"), Some(&CellValue::Empty));
    }

    #[test]
    fn test_parse_csv_strips_bom() {
        let rows = parse("\u{feff}Amount\n3\n".as_bytes(), FileKind::Csv).unwrap();
        assert!(rows[0].get("Amount").is_some());
    }

    #[test]
    fn test_parse_empty_file_yields_no_rows() {
        assert!(parse(b"", FileKind::Csv).unwrap().is_empty());
        assert!(parse(b"Amount,Category\n", FileKind::Csv).unwrap().is_empty());
    }

    #[test]
    fn test_parse_tsv() {
        let rows = parse(b"Amount\tCategory\n-20\tFood\n", FileKind::Tsv).unwrap();
        assert_eq!(rows[0].get("Amount"), Some(&CellValue::Text("-20".into())));
    }

    #[test]
    fn test_parse_csv_invalid_utf8() {
        let bytes = b"Amount,Category\n10,\xff\xfe\n";
        assert!(matches!(
            parse(bytes, FileKind::Csv),
            Err(ParseError::MalformedContent(_))
        ));
    }

    #[test]
    fn test_parse_spreadsheet_garbage() {
        let result = parse(b"definitely not a workbook", FileKind::Spreadsheet);
        assert!(matches!(result, Err(ParseError::MalformedContent(_))));
    }

    #[test]
    fn test_header_labels_for_blank_cells() {
        let cells = vec![
            Data::String("Amount".into()),
            Data::Empty,
            Data::String(" ".into()),
        ];
        assert_eq!(header_labels(&cells), vec!["Amount", "__EMPTY", "__EMPTY_1"]);
    }

    #[test]
    fn test_duplicate_headers_keep_every_column() {
        let csv = "Amount,Category,Amount,Amount_1\n-5,Food,7,extra\n";
        let rows = parse(csv.as_bytes(), FileKind::Csv).unwrap();

        let columns: Vec<_> = rows[0].columns().collect();
        assert_eq!(columns, vec!["Amount", "Category", "Amount_1", "Amount_1_1"]);
        assert_eq!(rows[0].get("Amount"), Some(&CellValue::Text("-5".into())));
        assert_eq!(rows[0].get("Amount_1"), Some(&CellValue::Text("7".into())));
        assert_eq!(rows[0].get("Amount_1_1"), Some(&CellValue::Text("extra".into())));
    }

    #[test]
    fn test_duplicate_sheet_headers() {
        let cells = vec![
            Data::String("Amount".into()),
            Data::String("Amount".into()),
            Data::String("Amount".into()),
        ];
        assert_eq!(header_labels(&cells), vec!["Amount", "Amount_1", "Amount_2"]);
    }

    #[test]
    fn test_parse_workbook_first_sheet_only() {
        let bytes = include_bytes!("../tests/fixtures/two_sheets.xlsx");
        let rows = parse(bytes, FileKind::Spreadsheet).unwrap();

        // Row 3 of the sheet is blank and skipped; the second sheet is never read
        assert_eq!(rows.len(), 2);
        let columns: Vec<_> = rows[0].columns().collect();
        assert_eq!(columns, vec!["Date", "Amount", "Category", "__EMPTY"]);

        assert_eq!(rows[0].get("Date"), Some(&CellValue::Text("2024-01-01".into())));
        assert_eq!(rows[0].get("Amount"), Some(&CellValue::Number(1000.0)));
        assert_eq!(rows[0].get("__EMPTY"), Some(&CellValue::Text("memo".into())));
        assert_eq!(rows[1].get("Amount"), Some(&CellValue::Number(-400.5)));
        assert_eq!(rows[1].get("Category"), Some(&CellValue::Text("Rent".into())));
        assert_eq!(rows[1].get("__EMPTY"), Some(&CellValue::Empty));
        assert!(rows.iter().all(|r| r.get("Other").is_none()));
    }

    #[test]
    fn test_spreadsheet_cell_values() {
        assert_eq!(cell_value(&Data::Float(-12.5)), CellValue::Number(-12.5));
        assert_eq!(cell_value(&Data::Int(3)), CellValue::Number(3.0));
        assert_eq!(cell_value(&Data::String(String::new())), CellValue::Empty);
        assert_eq!(cell_value(&Data::Bool(true)), CellValue::Text("true".into()));
    }
}
