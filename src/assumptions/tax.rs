//! Simplified tax and health-insurance estimators
//!
//! These are illustrative approximations, not a real tax table. Every
//! estimator returns zero for non-positive profit.

use serde::{Deserialize, Serialize};

/// Health-insurance enrolment class of the business owner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsuranceClass {
    /// Regionally enrolled (self-employed); carries the heavier burden
    Regional,
    /// Enrolled through an employer, or other
    Employed,
}

impl InsuranceClass {
    pub fn from_regional_flag(is_regional: bool) -> Self {
        if is_regional {
            InsuranceClass::Regional
        } else {
            InsuranceClass::Employed
        }
    }

    pub fn is_regional(&self) -> bool {
        matches!(self, InsuranceClass::Regional)
    }

    pub fn label(&self) -> &'static str {
        match self {
            InsuranceClass::Regional => "Regional enrollee",
            InsuranceClass::Employed => "Employee enrollee / other",
        }
    }
}

/// Individual income tax: effective rate rises linearly with profit, capped
#[derive(Debug, Clone)]
pub struct IndividualTax {
    /// Effective rate at zero profit
    pub base_rate: f64,
    /// Rate added per `scale` of profit
    pub slope: f64,
    /// Profit scale for the slope
    pub scale: f64,
    /// Maximum effective rate
    pub cap: f64,
}

impl Default for IndividualTax {
    fn default() -> Self {
        Self {
            base_rate: 0.08,
            slope: 0.12,
            scale: 500_000_000.0,
            cap: 0.35,
        }
    }
}

impl IndividualTax {
    pub fn effective_rate(&self, profit: f64) -> f64 {
        (self.base_rate + (profit / self.scale) * self.slope).min(self.cap)
    }

    pub fn estimate(&self, profit: f64) -> f64 {
        if profit <= 0.0 {
            return 0.0;
        }
        profit * self.effective_rate(profit)
    }
}

/// Corporate tax: two flat brackets
#[derive(Debug, Clone)]
pub struct EntityTax {
    /// Profit up to and including this amount uses `lower_rate`
    pub threshold: f64,
    pub lower_rate: f64,
    pub upper_rate: f64,
}

impl Default for EntityTax {
    fn default() -> Self {
        Self {
            threshold: 200_000_000.0,
            lower_rate: 0.09,
            upper_rate: 0.19,
        }
    }
}

impl EntityTax {
    pub fn estimate(&self, profit: f64) -> f64 {
        if profit <= 0.0 {
            return 0.0;
        }
        let rate = if profit <= self.threshold {
            self.lower_rate
        } else {
            self.upper_rate
        };
        profit * rate
    }
}

/// Health-insurance premium as a flat share of profit
#[derive(Debug, Clone)]
pub struct HealthInsurance {
    pub regional_rate: f64,
    pub employed_rate: f64,
    /// Share of the insurance burden kept after converting to a corporation
    pub retained_after_conversion: f64,
}

impl Default for HealthInsurance {
    fn default() -> Self {
        Self {
            regional_rate: 0.07,
            employed_rate: 0.04,
            retained_after_conversion: 0.6,
        }
    }
}

impl HealthInsurance {
    pub fn estimate(&self, profit: f64, class: InsuranceClass) -> f64 {
        if profit <= 0.0 {
            return 0.0;
        }
        let rate = match class {
            InsuranceClass::Regional => self.regional_rate,
            InsuranceClass::Employed => self.employed_rate,
        };
        profit * rate
    }
}

/// Container for all estimator coefficients
#[derive(Debug, Clone, Default)]
pub struct TaxAssumptions {
    pub individual: IndividualTax,
    pub entity: EntityTax,
    pub insurance: HealthInsurance,
}

impl TaxAssumptions {
    /// Potential saving from converting to a corporation:
    /// `(individual + insurance) - (entity + retained insurance)`
    pub fn conversion_delta(&self, individual_tax: f64, entity_tax: f64, insurance: f64) -> f64 {
        (individual_tax + insurance)
            - (entity_tax + insurance * self.insurance.retained_after_conversion)
    }
}

/// Individual tax with default coefficients
pub fn estimate_individual_tax(profit: f64) -> f64 {
    IndividualTax::default().estimate(profit)
}

/// Entity tax with default coefficients
pub fn estimate_entity_tax(profit: f64) -> f64 {
    EntityTax::default().estimate(profit)
}

/// Health insurance with default coefficients
pub fn estimate_insurance(profit: f64, class: InsuranceClass) -> f64 {
    HealthInsurance::default().estimate(profit, class)
}
