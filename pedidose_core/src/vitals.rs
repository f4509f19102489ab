//! Vital-sign reference ranges by age band.

use crate::error::{Error, Result};
use serde::Serialize;
use std::fmt;

/// Inclusive reference band for one vital sign
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct RefRange {
    pub min: u16,
    pub max: u16,
}

impl RefRange {
    const fn new(min: u16, max: u16) -> Self {
        Self { min, max }
    }
}

impl fmt::Display for RefRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.min, self.max)
    }
}

/// Reference ranges for one age band
#[derive(Clone, Copy, Debug, Serialize)]
pub struct VitalSigns {
    pub heart_rate_bpm: RefRange,
    pub respiratory_rate_rpm: RefRange,
    pub systolic_bp_mmhg: RefRange,
    pub diastolic_bp_mmhg: RefRange,
}

/// Vital-sign reference ranges for an age in years (0-18 inclusive)
pub fn reference_ranges(age_years: f64) -> Result<VitalSigns> {
    if !age_years.is_finite() || !(0.0..=18.0).contains(&age_years) {
        return Err(Error::InvalidAge(age_years));
    }

    let signs = if age_years < 1.0 {
        VitalSigns {
            heart_rate_bpm: RefRange::new(100, 160),
            respiratory_rate_rpm: RefRange::new(30, 60),
            systolic_bp_mmhg: RefRange::new(50, 70),
            diastolic_bp_mmhg: RefRange::new(25, 45),
        }
    } else if age_years < 2.0 {
        VitalSigns {
            heart_rate_bpm: RefRange::new(90, 150),
            respiratory_rate_rpm: RefRange::new(25, 50),
            systolic_bp_mmhg: RefRange::new(80, 100),
            diastolic_bp_mmhg: RefRange::new(55, 65),
        }
    } else if age_years < 5.0 {
        VitalSigns {
            heart_rate_bpm: RefRange::new(80, 130),
            respiratory_rate_rpm: RefRange::new(20, 40),
            systolic_bp_mmhg: RefRange::new(95, 105),
            diastolic_bp_mmhg: RefRange::new(60, 70),
        }
    } else if age_years < 12.0 {
        VitalSigns {
            heart_rate_bpm: RefRange::new(70, 110),
            respiratory_rate_rpm: RefRange::new(18, 30),
            systolic_bp_mmhg: RefRange::new(100, 120),
            diastolic_bp_mmhg: RefRange::new(65, 75),
        }
    } else {
        VitalSigns {
            heart_rate_bpm: RefRange::new(60, 100),
            respiratory_rate_rpm: RefRange::new(16, 20),
            systolic_bp_mmhg: RefRange::new(110, 135),
            diastolic_bp_mmhg: RefRange::new(65, 85),
        }
    };

    Ok(signs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infant_ranges() {
        let signs = reference_ranges(0.5).unwrap();
        assert_eq!(signs.heart_rate_bpm, RefRange::new(100, 160));
        assert_eq!(signs.respiratory_rate_rpm, RefRange::new(30, 60));
    }

    #[test]
    fn band_boundaries_belong_to_upper_band() {
        assert_eq!(
            reference_ranges(1.0).unwrap().heart_rate_bpm,
            RefRange::new(90, 150)
        );
        assert_eq!(
            reference_ranges(2.0).unwrap().heart_rate_bpm,
            RefRange::new(80, 130)
        );
        assert_eq!(
            reference_ranges(5.0).unwrap().heart_rate_bpm,
            RefRange::new(70, 110)
        );
        assert_eq!(
            reference_ranges(12.0).unwrap().heart_rate_bpm,
            RefRange::new(60, 100)
        );
    }

    #[test]
    fn adolescent_blood_pressure() {
        let signs = reference_ranges(15.0).unwrap();
        assert_eq!(signs.systolic_bp_mmhg, RefRange::new(110, 135));
        assert_eq!(signs.diastolic_bp_mmhg, RefRange::new(65, 85));
    }

    #[test]
    fn range_displays_as_span() {
        assert_eq!(RefRange::new(60, 100).to_string(), "60-100");
    }

    #[test]
    fn out_of_range_age_is_rejected() {
        assert!(matches!(
            reference_ranges(19.0),
            Err(Error::InvalidAge(_))
        ));
    }
}
