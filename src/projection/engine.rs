//! Closed-form 5-year revenue / tax projection

use crate::assumptions::{Assumptions, InsuranceClass};
use crate::clock;
use super::rows::{Projection, ProjectionRow};

/// Number of projected years
pub const PROJECTION_YEARS: u32 = 5;

/// Configuration for a projection run
#[derive(Debug, Clone)]
pub struct ProjectionConfig {
    /// Calendar year of row 0
    pub base_year: i32,

    /// Owner's health-insurance class
    pub insurance_class: InsuranceClass,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            base_year: clock::current_year(&clock::now_local()),
            insurance_class: InsuranceClass::Regional,
        }
    }
}

/// Main projection engine
pub struct ProjectionEngine {
    assumptions: Assumptions,
    config: ProjectionConfig,
}

impl ProjectionEngine {
    /// Create a new projection engine with given assumptions and config
    pub fn new(assumptions: Assumptions, config: ProjectionConfig) -> Self {
        Self { assumptions, config }
    }

    /// Project `base_revenue` forward at `income_rate` percent profit margin.
    ///
    /// Callers keep `base_revenue >= 0` and `income_rate` within [0, 100];
    /// the estimators only clamp at non-positive profit.
    pub fn project(&self, base_revenue: f64, income_rate: f64) -> Projection {
        let rows = (0..PROJECTION_YEARS)
            .map(|offset| self.project_year(base_revenue, income_rate, offset))
            .collect();
        Projection::new(rows)
    }

    fn project_year(&self, base_revenue: f64, income_rate: f64, offset: u32) -> ProjectionRow {
        let tax = &self.assumptions.tax;
        let class = self.config.insurance_class;

        let revenue = base_revenue * (1.0 + self.assumptions.revenue_growth).powi(offset as i32);
        let profit = revenue * income_rate / 100.0;

        let individual_tax = tax.individual.estimate(profit);
        let entity_tax = tax.entity.estimate(profit);
        let insurance = tax.insurance.estimate(profit, class);
        let delta = tax.conversion_delta(individual_tax, entity_tax, insurance);

        ProjectionRow {
            year: self.config.base_year + offset as i32,
            revenue: round_currency(revenue),
            income_rate: round_rate(income_rate),
            profit: round_currency(profit),
            individual_tax: round_currency(individual_tax),
            entity_tax: round_currency(entity_tax),
            insurance: round_currency(insurance),
            conversion_delta: round_currency(delta),
        }
    }
}

/// Project from the current business-calendar year with default assumptions
pub fn project(base_revenue: f64, income_rate: f64, insurance_class: InsuranceClass) -> Projection {
    let base_year = clock::current_year(&clock::now_local());
    project_from(base_year, base_revenue, income_rate, insurance_class)
}

/// Project from an explicit base year with default assumptions
pub fn project_from(
    base_year: i32,
    base_revenue: f64,
    income_rate: f64,
    insurance_class: InsuranceClass,
) -> Projection {
    let config = ProjectionConfig {
        base_year,
        insurance_class,
    };
    ProjectionEngine::new(Assumptions::default_pricing(), config).project(base_revenue, income_rate)
}

/// Round to the nearest whole currency unit (half away from zero)
fn round_currency(value: f64) -> i64 {
    value.round() as i64
}

fn round_rate(rate: f64) -> f64 {
    (rate * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_reference_scenario_first_year() {
        let projection = project_from(2025, 900_000_000.0, 12.0, InsuranceClass::Regional);
        let row = projection.first().unwrap();

        assert_eq!(row.year, 2025);
        assert_eq!(row.revenue, 900_000_000);
        assert_eq!(row.profit, 108_000_000);
        // 108M * (0.08 + 108M / 500M * 0.12) = 108M * 0.10592
        assert_eq!(row.individual_tax, 11_439_360);
        assert_eq!(row.entity_tax, 9_720_000);
        assert_eq!(row.insurance, 7_560_000);
        // (11,439,360 + 7,560,000) - (9,720,000 + 4,536,000)
        assert_eq!(row.conversion_delta, 4_743_360);
        assert_relative_eq!(row.income_rate, 12.0);
    }

    #[test]
    fn test_five_rows_with_growing_revenue() {
        for &rate in &[0.0, 0.5, 12.0, 37.125, 100.0] {
            let projection = project_from(2030, 123_456_789.0, rate, InsuranceClass::Employed);
            assert_eq!(projection.len(), 5);

            for pair in projection.rows.windows(2) {
                assert!(pair[1].revenue > pair[0].revenue);
                assert_eq!(pair[1].year, pair[0].year + 1);
            }
            let expected_rate = (rate * 100.0_f64).round() / 100.0;
            assert!(projection.rows.iter().all(|r| r.income_rate == expected_rate));
        }
    }

    #[test]
    fn test_revenue_grows_four_percent_per_year() {
        let projection = project_from(2025, 1_000_000.0, 10.0, InsuranceClass::Regional);
        let revenues: Vec<i64> = projection.rows.iter().map(|r| r.revenue).collect();
        assert_eq!(revenues, vec![1_000_000, 1_040_000, 1_081_600, 1_124_864, 1_169_859]);
    }

    #[test]
    fn test_zero_revenue_yields_zero_estimates() {
        let projection = project_from(2025, 0.0, 45.0, InsuranceClass::Regional);

        for row in &projection.rows {
            assert_eq!(row.profit, 0);
            assert_eq!(row.individual_tax, 0);
            assert_eq!(row.entity_tax, 0);
            assert_eq!(row.insurance, 0);
            assert_eq!(row.conversion_delta, 0);
        }
    }

    #[test]
    fn test_currency_fields_non_negative() {
        let projection = project_from(2025, 5_000_000_000.0, 80.0, InsuranceClass::Employed);
        for row in &projection.rows {
            assert!(row.profit >= 0);
            assert!(row.individual_tax >= 0);
            assert!(row.entity_tax >= 0);
            assert!(row.insurance >= 0);
        }
    }

    #[test]
    fn test_rate_rounded_to_two_decimals() {
        let projection = project_from(2025, 1_000.0, 12.3456, InsuranceClass::Regional);
        assert_relative_eq!(projection.rows[0].income_rate, 12.35);
    }

    #[test]
    fn test_employed_class_pays_less_insurance() {
        let regional = project_from(2025, 900_000_000.0, 12.0, InsuranceClass::Regional);
        let employed = project_from(2025, 900_000_000.0, 12.0, InsuranceClass::Employed);
        assert_eq!(employed.rows[0].insurance, 4_320_000);
        assert!(employed.rows[0].insurance < regional.rows[0].insurance);
    }

    #[test]
    fn test_summary_totals() {
        let projection = project_from(2025, 900_000_000.0, 12.0, InsuranceClass::Regional);
        let summary = projection.summary();

        assert_eq!(summary.years, 5);
        assert_eq!(
            summary.total_profit,
            projection.rows.iter().map(|r| r.profit).sum::<i64>()
        );
        assert!(summary.total_conversion_delta > 0);
    }

    #[test]
    fn test_summary_of_extreme_revenue_does_not_panic() {
        let projection = project_from(2025, 2e18, 50.0, InsuranceClass::Regional);
        let summary = projection.summary();
        assert_eq!(summary.years, 5);
        assert_eq!(summary.total_revenue, i64::MAX);
    }
}
