//! Estimated weight from age.
//!
//! Standard pediatric estimation formulas per age band, for when an actual
//! weight is not available. The rendered formula string travels with the
//! estimate so the caller can show how the number was obtained.

use crate::error::{Error, Result};

/// An age-derived weight estimate with its formula
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct WeightEstimate {
    pub weight_kg: f64,
    pub formula: String,
}

/// Estimate body weight for an age in years (0-18 inclusive)
pub fn estimate_weight(age_years: f64) -> Result<WeightEstimate> {
    if !age_years.is_finite() || !(0.0..=18.0).contains(&age_years) {
        return Err(Error::InvalidAge(age_years));
    }

    let estimate = if age_years < 1.0 {
        let months = (age_years * 12.0).round();
        WeightEstimate {
            weight_kg: 3.5 + months * 0.5,
            formula: format!("3.5 + ({} months x 0.5)", months),
        }
    } else if age_years < 3.0 {
        WeightEstimate {
            weight_kg: (age_years + 9.0) * 2.0,
            formula: format!("({} + 9) x 2", age_years),
        }
    } else if age_years < 6.0 {
        WeightEstimate {
            weight_kg: age_years * 2.0 + 8.0,
            formula: format!("({} x 2) + 8", age_years),
        }
    } else if age_years < 12.0 {
        WeightEstimate {
            weight_kg: age_years * 3.0 + 7.0,
            formula: format!("({} x 3) + 7", age_years),
        }
    } else {
        WeightEstimate {
            weight_kg: age_years * 3.5 + 10.0,
            formula: format!("({} x 3.5) + 10", age_years),
        }
    };

    Ok(estimate)
}
