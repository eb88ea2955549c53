//! Heterogeneous spreadsheet cell values with explicit coercions

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single cell read from an uploaded table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Number(f64),
    Text(String),
    Empty,
}

/// Why a cell could not be read as a number
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CoercionError {
    #[error("cell is empty")]
    Empty,
    #[error("'{0}' is not a number")]
    NotNumeric(String),
    #[error("value is not finite")]
    NotFinite,
}

impl CellValue {
    /// Build a cell from raw text as it arrives from a CSV record.
    /// Text stays text; numeric interpretation happens at coercion time.
    pub fn from_raw(raw: &str) -> Self {
        if raw.trim().is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(raw.to_string())
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    /// Trimmed textual form used for exact-match comparisons.
    ///
    /// Whole numbers render without a fractional part so that a numeric
    /// code cell `22232` matches the typed code `"22232"`.
    pub fn as_text(&self) -> String {
        match self {
            CellValue::Text(s) => s.trim().to_string(),
            CellValue::Number(n) => format_number(*n),
            CellValue::Empty => String::new(),
        }
    }

    /// Numeric coercion; never panics
    pub fn as_number(&self) -> Result<f64, CoercionError> {
        let value = match self {
            CellValue::Number(n) => *n,
            CellValue::Text(s) => {
                let trimmed = s.trim();
                trimmed
                    .parse::<f64>()
                    .map_err(|_| CoercionError::NotNumeric(trimmed.to_string()))?
            }
            CellValue::Empty => return Err(CoercionError::Empty),
        };

        if value.is_finite() {
            Ok(value)
        } else {
            Err(CoercionError::NotFinite)
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_text())
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_is_trimmed() {
        assert_eq!(CellValue::from("  22232 ").as_text(), "22232");
    }

    #[test]
    fn test_whole_numbers_render_without_fraction() {
        assert_eq!(CellValue::Number(12.0).as_text(), "12");
        assert_eq!(CellValue::Number(35.5).as_text(), "35.5");
    }

    #[test]
    fn test_numeric_coercion() {
        assert_eq!(CellValue::from(" 35.0 ").as_number(), Ok(35.0));
        assert_eq!(CellValue::Number(7.25).as_number(), Ok(7.25));
        assert_eq!(CellValue::Empty.as_number(), Err(CoercionError::Empty));
        assert!(matches!(
            CellValue::from("n/a").as_number(),
            Err(CoercionError::NotNumeric(_))
        ));
        assert_eq!(CellValue::from("NaN").as_number(), Err(CoercionError::NotFinite));
    }

    #[test]
    fn test_from_raw_blank_is_empty() {
        assert!(CellValue::from_raw("   ").is_empty());
        assert_eq!(CellValue::from_raw("x"), CellValue::Text("x".into()));
    }
}
