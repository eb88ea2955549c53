//! Industry-rate lookup: two chained exact-match scans over an uploaded table
//!
//! Search column (F) holds the industry classification code. The matching
//! row's code column (C) gives the business code, which is then looked up in
//! the key column (K). That row's factor column (Q) gives the expense factor,
//! and the income rate is `100 - factor`.

use super::cell::CellValue;
use super::loader::{load_table_from_bytes, LookupTable};
use serde::{Serialize, Serializer};

/// 0-indexed column holding the business code (C)
pub const CODE_COLUMN: usize = 2;
/// 0-indexed column searched for the industry code (F)
pub const SEARCH_COLUMN: usize = 5;
/// 0-indexed column searched for the business code (K)
pub const KEY_COLUMN: usize = 10;
/// 0-indexed column holding the expense factor (Q)
pub const FACTOR_COLUMN: usize = 16;
/// Minimum number of columns an uploaded table must have
pub const REQUIRED_COLUMNS: usize = FACTOR_COLUMN + 1;

/// Outcome of a lookup attempt
#[derive(Debug, Clone, PartialEq)]
pub enum LookupStatus {
    Ok,
    UnexpectedShape { columns: usize },
    SearchCodeNotFound,
    IntermediateCodeNotFound,
    FactorNotNumeric,
    TableUnreadable(String),
}

impl LookupStatus {
    /// User-facing note
    pub fn note(&self) -> String {
        match self {
            LookupStatus::Ok => "OK".to_string(),
            LookupStatus::UnexpectedShape { columns } => format!(
                "unexpected table shape: expected at least {} columns, found {}",
                REQUIRED_COLUMNS, columns
            ),
            LookupStatus::SearchCodeNotFound => "search code not found".to_string(),
            LookupStatus::IntermediateCodeNotFound => "intermediate code not found".to_string(),
            LookupStatus::FactorNotNumeric => "factor not numeric".to_string(),
            LookupStatus::TableUnreadable(reason) => format!("table unreadable: {}", reason),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, LookupStatus::Ok)
    }
}

impl Serialize for LookupStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.note())
    }
}

/// Result of resolving an industry code to an income rate
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndustryLookupResult {
    pub industry_code: String,
    pub business_code: Option<String>,
    pub factor: Option<f64>,
    pub income_rate: Option<f64>,
    pub status: LookupStatus,
}

impl IndustryLookupResult {
    fn failed(industry_code: &str, business_code: Option<String>, status: LookupStatus) -> Self {
        Self {
            industry_code: industry_code.to_string(),
            business_code,
            factor: None,
            income_rate: None,
            status,
        }
    }
}

/// Resolve `target_code` against `table`
pub fn resolve(table: &LookupTable, target_code: &str) -> IndustryLookupResult {
    let code = target_code.trim();

    if table.column_count() < REQUIRED_COLUMNS {
        return IndustryLookupResult::failed(
            code,
            None,
            LookupStatus::UnexpectedShape { columns: table.column_count() },
        );
    }

    let Some(hit) = first_match(table, SEARCH_COLUMN, code) else {
        return IndustryLookupResult::failed(code, None, LookupStatus::SearchCodeNotFound);
    };

    let business_code = hit
        .get(CODE_COLUMN)
        .map(CellValue::as_text)
        .unwrap_or_default();

    let Some(hit2) = first_match(table, KEY_COLUMN, &business_code) else {
        return IndustryLookupResult::failed(
            code,
            Some(business_code),
            LookupStatus::IntermediateCodeNotFound,
        );
    };

    let factor = match hit2.get(FACTOR_COLUMN).unwrap_or(&CellValue::Empty).as_number() {
        Ok(v) => v,
        Err(_) => {
            return IndustryLookupResult::failed(
                code,
                Some(business_code),
                LookupStatus::FactorNotNumeric,
            )
        }
    };

    IndustryLookupResult {
        industry_code: code.to_string(),
        business_code: Some(business_code),
        factor: Some(factor),
        income_rate: Some(100.0 - factor),
        status: LookupStatus::Ok,
    }
}

/// Parse an uploaded .xlsx or CSV table, then resolve
pub fn resolve_upload(bytes: &[u8], target_code: &str) -> IndustryLookupResult {
    match load_table_from_bytes(bytes) {
        Ok(table) => resolve(&table, target_code),
        Err(e) => IndustryLookupResult::failed(
            target_code.trim(),
            None,
            LookupStatus::TableUnreadable(e.to_string()),
        ),
    }
}

/// First row whose `column`, trimmed, equals `needle`.
/// A blank needle never matches blank cells.
fn first_match<'a>(table: &'a LookupTable, column: usize, needle: &str) -> Option<&'a [CellValue]> {
    if needle.is_empty() {
        return None;
    }
    table.rows().find(|row| {
        row.get(column)
            .map(|cell| cell.as_text() == needle)
            .unwrap_or(false)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn row(values: &[(usize, &str)]) -> Vec<CellValue> {
        let mut cells = vec![CellValue::Empty; REQUIRED_COLUMNS];
        for &(col, v) in values {
            cells[col] = CellValue::from(v);
        }
        cells
    }

    fn headers(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("col{}", i)).collect()
    }

    fn sample_table() -> LookupTable {
        LookupTable::new(
            headers(REQUIRED_COLUMNS),
            vec![
                row(&[(CODE_COLUMN, "11"), (SEARCH_COLUMN, "10000")]),
                row(&[(CODE_COLUMN, " 12 "), (SEARCH_COLUMN, " 22232 ")]),
                row(&[(KEY_COLUMN, "11"), (FACTOR_COLUMN, "80")]),
                row(&[(KEY_COLUMN, "12"), (FACTOR_COLUMN, "35.0")]),
                row(&[(KEY_COLUMN, "12"), (FACTOR_COLUMN, "50.0")]),
                row(&[(CODE_COLUMN, "13"), (SEARCH_COLUMN, "33333")]),
                row(&[(CODE_COLUMN, "14"), (SEARCH_COLUMN, "44444")]),
                row(&[(KEY_COLUMN, "14"), (FACTOR_COLUMN, "abc")]),
            ],
        )
    }

    #[test]
    fn test_chained_lookup_resolves_rate() {
        let result = resolve(&sample_table(), "22232");

        assert_eq!(result.status, LookupStatus::Ok);
        assert_eq!(result.status.note(), "OK");
        assert_eq!(result.business_code.as_deref(), Some("12"));
        assert_relative_eq!(result.factor.unwrap(), 35.0);
        assert_relative_eq!(result.income_rate.unwrap(), 65.0);
    }

    #[test]
    fn test_target_code_is_trimmed() {
        let result = resolve(&sample_table(), "  22232\t");
        assert_eq!(result.industry_code, "22232");
        assert!(result.status.is_ok());
    }

    #[test]
    fn test_first_match_wins_on_duplicates() {
        // Two key rows carry "12"; the earlier one (35.0) is used
        let result = resolve(&sample_table(), "22232");
        assert_relative_eq!(result.factor.unwrap(), 35.0);
    }

    #[test]
    fn test_search_code_not_found() {
        let result = resolve(&sample_table(), "99999");

        assert_eq!(result.status, LookupStatus::SearchCodeNotFound);
        assert_eq!(result.status.note(), "search code not found");
        assert!(result.business_code.is_none());
        assert!(result.factor.is_none());
        assert!(result.income_rate.is_none());
    }

    #[test]
    fn test_intermediate_code_not_found_keeps_business_code() {
        let result = resolve(&sample_table(), "33333");

        assert_eq!(result.status, LookupStatus::IntermediateCodeNotFound);
        assert_eq!(result.business_code.as_deref(), Some("13"));
        assert!(result.income_rate.is_none());
    }

    #[test]
    fn test_non_numeric_factor() {
        let result = resolve(&sample_table(), "44444");

        assert_eq!(result.status, LookupStatus::FactorNotNumeric);
        assert_eq!(result.business_code.as_deref(), Some("14"));
        assert!(result.factor.is_none());
    }

    #[test]
    fn test_narrow_table_is_rejected_before_scanning() {
        let table = LookupTable::new(
            headers(10),
            vec![vec![CellValue::from("22232"); 10]],
        );
        let result = resolve(&table, "22232");
        assert_eq!(result.status, LookupStatus::UnexpectedShape { columns: 10 });
    }

    #[test]
    fn test_resolve_is_repeatable() {
        let table = sample_table();
        assert_eq!(resolve(&table, "22232"), resolve(&table, "22232"));
        assert_eq!(resolve(&table, "99999"), resolve(&table, "99999"));
    }

    #[test]
    fn test_resolve_upload_from_csv() {
        let mut csv = (0..REQUIRED_COLUMNS)
            .map(|i| format!("h{}", i))
            .collect::<Vec<_>>()
            .join(",");
        csv.push('\n');

        let mut search_row = vec![""; REQUIRED_COLUMNS];
        search_row[CODE_COLUMN] = "12";
        search_row[SEARCH_COLUMN] = "22232";
        csv.push_str(&search_row.join(","));
        csv.push('\n');

        let mut key_row = vec![""; REQUIRED_COLUMNS];
        key_row[KEY_COLUMN] = "12";
        key_row[FACTOR_COLUMN] = "35.0";
        csv.push_str(&key_row.join(","));
        csv.push('\n');

        let result = resolve_upload(csv.as_bytes(), "22232");
        assert!(result.status.is_ok());
        assert_relative_eq!(result.income_rate.unwrap(), 65.0);
    }

    #[test]
    fn test_resolve_upload_from_xlsx_with_numeric_cells() {
        use crate::table::loader::testing::xlsx_bytes;

        let header: Vec<CellValue> = (0..REQUIRED_COLUMNS)
            .map(|i| CellValue::Text(format!("h{}", i)))
            .collect();
        let mut search_row = vec![CellValue::Empty; REQUIRED_COLUMNS];
        search_row[CODE_COLUMN] = CellValue::Number(12.0);
        search_row[SEARCH_COLUMN] = CellValue::Number(22232.0);
        let mut key_row = vec![CellValue::Empty; REQUIRED_COLUMNS];
        key_row[KEY_COLUMN] = CellValue::from("12");
        key_row[FACTOR_COLUMN] = CellValue::Number(35.0);

        let result = resolve_upload(&xlsx_bytes(&[header, search_row, key_row]), "22232");
        assert_eq!(result.status, LookupStatus::Ok);
        assert_eq!(result.business_code.as_deref(), Some("12"));
        assert_relative_eq!(result.income_rate.unwrap(), 65.0);
    }

    #[test]
    fn test_resolve_upload_unreadable() {
        let result = resolve_upload(b"", "22232");
        assert!(matches!(result.status, LookupStatus::TableUnreadable(_)));
        assert!(result.status.note().starts_with("table unreadable"));
    }
}
