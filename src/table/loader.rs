//! Load an uploaded industry table from an .xlsx workbook or CSV
//!
//! The first record is the header row. It is kept only so the column count
//! can be checked; every lookup addresses columns by position. Workbooks
//! are read from their first sheet.

use super::cell::CellValue;
use calamine::{open_workbook_from_rs, Data, Reader, Xlsx, XlsxError};
use csv::ReaderBuilder;
use std::io::{Cursor, Read};
use std::path::Path;

/// Local file header signature of a zip archive (every .xlsx is one)
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

/// Error while reading an uploaded table
#[derive(Debug, thiserror::Error)]
pub enum TableError {
    #[error("failed to open table: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse table: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to read workbook: {0}")]
    Xlsx(#[from] XlsxError),
    #[error("workbook has no sheets")]
    NoSheet,
    #[error("table has no header row")]
    MissingHeader,
}

/// Rectangular table of cells in natural row order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LookupTable {
    headers: Vec<String>,
    rows: Vec<Vec<CellValue>>,
}

impl LookupTable {
    /// Build a table from already-parsed headers and rows
    pub fn new(headers: Vec<String>, rows: Vec<Vec<CellValue>>) -> Self {
        Self { headers, rows }
    }

    /// Number of columns declared by the header row
    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> impl Iterator<Item = &[CellValue]> {
        self.rows.iter().map(|r| r.as_slice())
    }

    /// Cell at (row, column); short rows read as empty
    pub fn cell(&self, row: usize, column: usize) -> &CellValue {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .unwrap_or(&CellValue::Empty)
    }
}

/// Load a table from any reader (upload body, file, string buffer)
pub fn load_table_from_reader<R: Read>(reader: R) -> Result<LookupTable, TableError> {
    let mut csv_reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers: Vec<String> = csv_reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    if headers.is_empty() || headers.iter().all(|h| h.is_empty()) {
        return Err(TableError::MissingHeader);
    }

    let mut rows = Vec::new();
    for result in csv_reader.records() {
        let record = result?;
        rows.push(record.iter().map(CellValue::from_raw).collect());
    }

    Ok(LookupTable::new(headers, rows))
}

/// Load the first sheet of an .xlsx workbook
pub fn load_table_from_xlsx(bytes: &[u8]) -> Result<LookupTable, TableError> {
    let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes))?;
    let range = workbook.worksheet_range_at(0).ok_or(TableError::NoSheet)??;

    // The range starts at the first used cell; pad back to column A
    let (_, first_column) = range.start().unwrap_or((0, 0));
    let pad = first_column as usize;

    let mut records = range.rows().map(|row| {
        std::iter::repeat(CellValue::Empty)
            .take(pad)
            .chain(row.iter().map(cell_from_xlsx))
            .collect::<Vec<_>>()
    });

    let headers: Vec<String> = records
        .next()
        .map(|row| row.iter().map(CellValue::as_text).collect())
        .unwrap_or_default();
    if headers.iter().all(|h| h.is_empty()) {
        return Err(TableError::MissingHeader);
    }

    Ok(LookupTable::new(headers, records.collect()))
}

fn cell_from_xlsx(cell: &Data) -> CellValue {
    match cell {
        Data::Empty | Data::Error(_) => CellValue::Empty,
        Data::Float(n) => CellValue::Number(*n),
        Data::Int(n) => CellValue::Number(*n as f64),
        Data::String(s) => CellValue::from_raw(s),
        other => CellValue::from_raw(&other.to_string()),
    }
}

pub fn is_xlsx(bytes: &[u8]) -> bool {
    bytes.starts_with(ZIP_MAGIC)
}

/// Load a table from uploaded bytes, detecting .xlsx by its zip signature
pub fn load_table_from_bytes(bytes: &[u8]) -> Result<LookupTable, TableError> {
    if is_xlsx(bytes) {
        load_table_from_xlsx(bytes)
    } else {
        load_table_from_reader(bytes)
    }
}

/// Load an .xlsx or CSV table from disk
pub fn load_table<P: AsRef<Path>>(path: P) -> Result<LookupTable, TableError> {
    let bytes = std::fs::read(path)?;
    load_table_from_bytes(&bytes)
}

#[cfg(test)]
pub(crate) mod testing {
    use super::CellValue;
    use rust_xlsxwriter::Workbook;

    /// Workbook whose first sheet holds `rows` starting at A1
    pub fn xlsx_bytes(rows: &[Vec<CellValue>]) -> Vec<u8> {
        xlsx_bytes_at(rows, 0)
    }

    /// Same, starting `first_column` columns to the right of A
    pub fn xlsx_bytes_at(rows: &[Vec<CellValue>], first_column: u16) -> Vec<u8> {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        for (r, row) in rows.iter().enumerate() {
            for (c, cell) in row.iter().enumerate() {
                let col = first_column + c as u16;
                match cell {
                    CellValue::Number(n) => {
                        sheet.write_number(r as u32, col, *n).unwrap();
                    }
                    CellValue::Text(t) => {
                        sheet.write_string(r as u32, col, t).unwrap();
                    }
                    CellValue::Empty => {}
                }
            }
        }
        workbook
            .add_worksheet()
            .write_string(0, 0, "ignored second sheet")
            .unwrap();
        workbook.save_to_buffer().unwrap()
    }

    pub fn text(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{text, xlsx_bytes, xlsx_bytes_at};
    use super::*;

    #[test]
    fn test_load_from_bytes() {
        let csv = "a,b,c\n1, two ,\n4,5,6\n";
        let table = load_table_from_bytes(csv.as_bytes()).unwrap();

        assert_eq!(table.column_count(), 3);
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.cell(0, 1).as_text(), "two");
        assert!(table.cell(0, 2).is_empty());
        assert_eq!(table.cell(1, 0).as_number().unwrap(), 4.0);
    }

    #[test]
    fn test_short_rows_read_as_empty() {
        let csv = "a,b,c\n1\n";
        let table = load_table_from_bytes(csv.as_bytes()).unwrap();
        assert!(table.cell(0, 2).is_empty());
        assert!(table.cell(5, 0).is_empty());
    }

    #[test]
    fn test_empty_upload_is_rejected() {
        assert!(matches!(
            load_table_from_bytes(b""),
            Err(TableError::MissingHeader)
        ));
    }

    #[test]
    fn test_load_xlsx_first_sheet() {
        let bytes = xlsx_bytes(&[
            vec![text("code"), text("name"), text("rate")],
            vec![CellValue::Number(552101.0), text(" Lodging "), CellValue::Number(88.5)],
            vec![text("A-2"), CellValue::Empty, CellValue::Number(70.0)],
        ]);
        assert!(is_xlsx(&bytes));

        let table = load_table_from_bytes(&bytes).unwrap();
        assert_eq!(table.headers(), ["code", "name", "rate"]);
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.cell(0, 0).as_text(), "552101");
        assert_eq!(table.cell(0, 1).as_text(), "Lodging");
        assert_eq!(table.cell(0, 2).as_number().unwrap(), 88.5);
        assert!(table.cell(1, 1).is_empty());
    }

    #[test]
    fn test_xlsx_keeps_column_positions_when_column_a_is_blank() {
        let bytes = xlsx_bytes_at(
            &[vec![text("b"), text("c")], vec![text("x"), CellValue::Number(2.0)]],
            1,
        );
        let table = load_table_from_bytes(&bytes).unwrap();

        assert_eq!(table.column_count(), 3);
        assert!(table.cell(0, 0).is_empty());
        assert_eq!(table.cell(0, 1).as_text(), "x");
        assert_eq!(table.cell(0, 2).as_number().unwrap(), 2.0);
    }

    #[test]
    fn test_corrupt_xlsx_is_an_error() {
        let mut bytes = ZIP_MAGIC.to_vec();
        bytes.extend_from_slice(b"not really a workbook");
        assert!(matches!(load_table_from_bytes(&bytes), Err(TableError::Xlsx(_))));
    }

    #[test]
    fn test_load_table_from_disk_detects_format() {
        let dir = std::env::temp_dir().join(format!("consulting_report_table_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let csv_path = dir.join("table.csv");
        std::fs::write(&csv_path, "a,b\n1,2\n").unwrap();
        let xlsx_path = dir.join("table.xlsx");
        std::fs::write(&xlsx_path, xlsx_bytes(&[vec![text("a"), text("b")], vec![text("1"), text("2")]])).unwrap();

        for path in [&csv_path, &xlsx_path] {
            let table = load_table(path).unwrap();
            assert_eq!(table.column_count(), 2);
            assert_eq!(table.cell(0, 1).as_text(), "2");
        }
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
