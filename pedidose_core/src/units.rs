//! Mass-unit conversion utilities.
//!
//! mcg and mg convert by a factor of 1000. IU is pharmacologically
//! incommensurable with mass units, so any conversion involving it fails
//! instead of approximating.

use crate::error::{Error, Result};
use crate::types::{DoseUnit, MassUnit, TimeUnit};

/// Convert a mass value to micrograms
pub fn to_micrograms(value: f64, unit: MassUnit) -> Result<f64> {
    match unit {
        MassUnit::Mcg => Ok(value),
        MassUnit::Mg => Ok(value * 1000.0),
        MassUnit::Iu => Err(Error::UnsupportedConversion {
            from: MassUnit::Iu,
            to: MassUnit::Mcg,
        }),
    }
}

/// Convert a mass value to milligrams
pub fn to_milligrams(value: f64, unit: MassUnit) -> Result<f64> {
    match unit {
        MassUnit::Mg => Ok(value),
        MassUnit::Mcg => Ok(value / 1000.0),
        MassUnit::Iu => Err(Error::UnsupportedConversion {
            from: MassUnit::Iu,
            to: MassUnit::Mg,
        }),
    }
}

/// Absolute mass delivered per hour, in the mass unit of the source dose rate
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HourlyRate {
    pub value: f64,
    pub unit: MassUnit,
}

/// Convert a per-kg dose rate into an absolute mass-per-hour value for the
/// given weight. Per-minute rates are scaled by 60.
pub fn absolute_rate_per_hour(dose: f64, dose_unit: DoseUnit, weight_kg: f64) -> HourlyRate {
    let unit = dose_unit.mass_base();
    let value = match dose_unit.time_base() {
        TimeUnit::Hour => dose * weight_kg,
        TimeUnit::Minute => dose * weight_kg * 60.0,
    };
    HourlyRate { value, unit }
}
