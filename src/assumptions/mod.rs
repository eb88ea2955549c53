//! Estimation assumptions for the tax / insurance comparison

mod tax;

pub use tax::{
    estimate_entity_tax, estimate_individual_tax, estimate_insurance, EntityTax, HealthInsurance,
    IndividualTax, InsuranceClass, TaxAssumptions,
};

/// Container for all projection assumptions
#[derive(Debug, Clone)]
pub struct Assumptions {
    pub tax: TaxAssumptions,
    /// Annual revenue growth applied from the base year
    pub revenue_growth: f64,
}

impl Assumptions {
    /// Default assumptions: simplified tax brackets and 4% annual growth
    pub fn default_pricing() -> Self {
        Self {
            tax: TaxAssumptions::default(),
            revenue_growth: 0.04,
        }
    }
}

impl Default for Assumptions {
    fn default() -> Self {
        Self::default_pricing()
    }
}
