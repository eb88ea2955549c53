//! Projection output structures

use serde::{Deserialize, Serialize};

/// One projected year. Currency values are rounded to whole units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionRow {
    pub year: i32,
    pub revenue: i64,
    /// Income rate in percent, rounded to 2 decimals
    pub income_rate: f64,
    pub profit: i64,
    pub individual_tax: i64,
    pub entity_tax: i64,
    pub insurance: i64,
    /// Potential saving from converting to a corporation (may be negative)
    pub conversion_delta: i64,
}

/// Complete 5-year projection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    pub rows: Vec<ProjectionRow>,
}

impl Projection {
    pub fn new(rows: Vec<ProjectionRow>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn first(&self) -> Option<&ProjectionRow> {
        self.rows.first()
    }

    /// Get summary statistics. Totals saturate at the `i64` bounds.
    pub fn summary(&self) -> ProjectionSummary {
        let total = |field: fn(&ProjectionRow) -> i64| {
            self.rows
                .iter()
                .fold(0i64, |acc, row| acc.saturating_add(field(row)))
        };
        ProjectionSummary {
            years: self.rows.len() as u32,
            total_revenue: total(|r| r.revenue),
            total_profit: total(|r| r.profit),
            total_individual_tax: total(|r| r.individual_tax),
            total_entity_tax: total(|r| r.entity_tax),
            total_insurance: total(|r| r.insurance),
            total_conversion_delta: total(|r| r.conversion_delta),
        }
    }
}

/// Five-year totals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionSummary {
    pub years: u32,
    pub total_revenue: i64,
    pub total_profit: i64,
    pub total_individual_tax: i64,
    pub total_entity_tax: i64,
    pub total_insurance: i64,
    pub total_conversion_delta: i64,
}
